use log::warn;
use nix::unistd::close;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};

/// An owned file descriptor.
///
/// The contained fd is not used except to call close(3) when the struct is dropped.
#[derive(Debug)]
pub struct Fd(RawFd);

impl AsRawFd for Fd {
	fn as_raw_fd(&self) -> RawFd {
		self.0
	}
}

impl IntoRawFd for Fd {
	fn into_raw_fd(self) -> RawFd {
		let fd = self.0;
		std::mem::forget(self);
		fd
	}
}

impl FromRawFd for Fd {
	unsafe fn from_raw_fd(fd: RawFd) -> Self {
		Self(fd)
	}
}

impl Drop for Fd {
	fn drop(&mut self) {
		match close(self.0) {
			Ok(()) => (),
			Err(err) => warn!("error closing {self:?}: {err:?}"),
		}
	}
}
