use crate::fds::Fd;
use log::trace;
use nix::sys::{
	signal::{SigSet, Signal},
	signalfd::{signalfd, SfdFlags},
};
use std::os::unix::io::FromRawFd;

/// Intercept `SIGINT`/`SIGTERM` on the current thread, and return a file descriptor that becomes readable when
/// either signal is caught.
///
/// Reading from the returned fd is not required: its sole purpose is to be registered with an
/// [`Epoll`](crate::epoll::Epoll) with interest `EPOLLIN` so the accept loop can poll for shutdown alongside its
/// other fds. A signalfd consumes the signal, so SIGINT/SIGTERM no longer terminate the process by default once
/// this has been called.
pub fn catch_termination() -> nix::Result<Fd> {
	let mut signals = SigSet::empty();
	signals.add(Signal::SIGINT);
	signals.add(Signal::SIGTERM);
	signals.thread_block()?;
	let fd = signalfd(-1, &signals, SfdFlags::SFD_CLOEXEC | SfdFlags::SFD_NONBLOCK)?;
	trace!("created signalfd {fd}");
	// Safety: signalfd returns a newly created file descriptor which we immediately wrap
	Ok(unsafe { Fd::from_raw_fd(fd) })
}
