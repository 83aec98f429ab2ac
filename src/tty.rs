use crate::fds::Fd;
use log::warn;
use nix::sys::termios::{self, SetArg, SpecialCharacterIndices, Termios};
use std::os::unix::io::{AsRawFd, RawFd};

/// An owned file descriptor held in raw mode (no line editing, no signal characters, one byte at a time), which
/// restores the previous termios settings when dropped.
///
/// Grounded on the `ttySetRaw` helper the original implementation uses for the downstream serial bus in forwarding
/// mode (Michael Kerrisk's `tty_functions.c`): canonical mode, echo, and signal generation are disabled, and reads
/// return as soon as at least one byte is available. Restoring on drop has no equivalent in the original (its
/// forwarding process never restores the device it reconfigures), but matches this crate's own `Fd`, which closes
/// its descriptor on drop rather than leaving cleanup to the caller.
#[derive(Debug)]
pub struct RawTty {
	fd: Fd,
	previous: Termios,
}

impl RawTty {
	/// Put `fd` into raw mode, recording its previous settings so they can be restored on drop.
	pub fn new(fd: Fd) -> nix::Result<Self> {
		let previous = termios::tcgetattr(fd.as_raw_fd())?;
		let mut raw = previous.clone();
		termios::cfmakeraw(&mut raw);
		raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
		raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
		termios::tcsetattr(fd.as_raw_fd(), SetArg::TCSAFLUSH, &raw)?;
		Ok(Self { fd, previous })
	}
}

impl AsRawFd for RawTty {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}

impl Drop for RawTty {
	fn drop(&mut self) {
		if let Err(err) = termios::tcsetattr(self.fd.as_raw_fd(), SetArg::TCSAFLUSH, &self.previous) {
			warn!("restoring termios on {:?} failed: {err}", self.fd);
		}
	}
}
