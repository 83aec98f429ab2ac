use crate::dispatch::TransactionStream;
use crate::engine::ClientEngine;
use crate::epoll::{Epoll, Event, Interest};
use crate::fds::Fd;
use log::info;
use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use std::io::{ErrorKind, Result};
use std::os::unix::io::FromRawFd;
use std::path::Path;

const INPUT_KEY: u64 = 0;
const SHUTDOWN_KEY: u64 = 1;

/// Run a single-client IPbus server over a pair of serial file descriptors.
///
/// `input_path` and `output_path` may name the same device (the common case, a single bidirectional serial port) or
/// two different ones. Mainly useful for exercising the protocol layer against a loopback pseudo-terminal; see
/// `serve-serial.c` in the original implementation, whose primary purpose was the same.
pub fn serve(
	input_path: &Path,
	output_path: &Path,
	ring_capacity: usize,
	mut handler: Box<dyn TransactionStream>,
	shutdown: Fd,
) -> Result<()> {
	let input = open_device(input_path)?;
	let output = if input_path == output_path { None } else { Some(open_device(output_path)?) };

	let epoll = Epoll::new()?;
	epoll.register(&input, Interest::EPOLLIN, INPUT_KEY)?;
	epoll.register(&shutdown, Interest::EPOLLIN, SHUTDOWN_KEY)?;
	info!("serving IPbus over serial: {} -> {}", input_path.display(), output_path.display());

	let mut engine = ClientEngine::new(ring_capacity);
	let output_fd = output.as_ref().unwrap_or(&input);
	let mut events = vec![Event::empty(); 2];

	loop {
		let activity = epoll.wait_for_activity(&mut events, None)?;
		let mut shutdown_requested = false;
		let mut ready = false;
		for event in activity {
			match event.data() {
				SHUTDOWN_KEY => shutdown_requested = true,
				INPUT_KEY => ready = true,
				_ => unreachable!("serial server only registers two fds"),
			}
		}
		if shutdown_requested {
			break;
		}
		if !ready {
			continue;
		}

		match engine.read_from(&input) {
			Ok(0) => break,
			Ok(_) => (),
			Err(err) if err.kind() == ErrorKind::WouldBlock => (),
			Err(err) => return Err(err),
		}
		engine.process_input_stream(handler.as_mut())?;
		if engine.has_output() {
			match engine.write_to(output_fd) {
				Ok(_) => (),
				Err(err) if err.kind() == ErrorKind::WouldBlock => (),
				Err(err) => return Err(err),
			}
		}
	}

	info!("goodbye");
	Ok(())
}

fn open_device(path: &Path) -> Result<Fd> {
	let fd = open(path, OFlag::O_RDWR | OFlag::O_NONBLOCK, Mode::empty())
		.map_err(|err| std::io::Error::new(ErrorKind::Other, format!("opening {}: {err}", path.display())))?;
	// Safety: open() returns a newly created file descriptor which we immediately wrap
	Ok(unsafe { Fd::from_raw_fd(fd) })
}
