use crate::dispatch::TransactionStream;
use crate::protocol::{payload_size, InfoCode, TransactionHeader};
use crate::ring::WordRing;
use crate::stream::{classify, StreamState};
use crate::tty::RawTty;
use log::{debug, trace};
use nix::sys::select::{select, FdSet};
use nix::sys::time::{TimeVal, TimeValLike};
use std::io::{Error, ErrorKind, Result};
use std::os::unix::io::AsRawFd;

/// Forwards whole transactions read off a client's input stream along a serial bus to a downstream device, and
/// copies the device's replies back onto the client's output stream.
///
/// This does not implement [`MemoryHandler`](crate::handler::MemoryHandler): unlike the mmap-backed handlers, it
/// substitutes the entire dispatch step (see `forwardingtransactionhandler.c` in the original implementation), since
/// the remote device — not this process — performs the actual read-modify-write semantics and produces IPbus-framed
/// responses directly.
#[derive(Debug)]
pub struct ForwardHandler {
	tx: RawTty,
	rx: RawTty,
}

impl ForwardHandler {
	/// `tx` and `rx` may be the same underlying device (a single bidirectional serial port) or different ones.
	pub fn new(tx: RawTty, rx: RawTty) -> Self {
		Self { tx, rx }
	}

	fn poll(&self) -> Result<(bool, bool)> {
		let mut readfds = FdSet::new();
		readfds.insert(self.rx.as_raw_fd());
		let mut writefds = FdSet::new();
		writefds.insert(self.tx.as_raw_fd());
		let mut timeout = TimeVal::zero();
		select(None, &mut readfds, &mut writefds, None, &mut timeout).map_err(nix_to_io)?;
		Ok((readfds.contains(self.rx.as_raw_fd()), writefds.contains(self.tx.as_raw_fd())))
	}
}

impl TransactionStream for ForwardHandler {
	/// Forward every full transaction currently buffered in `input` to the downstream device, and copy its replies
	/// into `output`. Returns the number of input words consumed.
	///
	/// Blocks until every transaction sent has received its full reply: the original implementation does the same,
	/// trading latency for a transaction-handler interface that can pretend the remote round trip is synchronous.
	fn handle(&mut self, input: &mut WordRing, swapbytes: bool, output: &mut WordRing) -> Result<usize> {
		let mut consumed = 0;
		let mut expected_response_words = 0usize;
		let mut received_response_words = 0usize;

		while classify(input, swapbytes) == StreamState::FullTrans {
			let header_word = input.value_at_net(0);
			let header_word = if swapbytes { header_word.swap_bytes() } else { header_word };
			let header = TransactionHeader::decode(header_word);
			let this_transaction_words = 1 + header.payload_size();
			debug!("forwarding 1 transaction ({this_transaction_words} words)");

			let mut need_to_send = this_transaction_words;
			while need_to_send > 0 {
				let (readable, writable) = self.poll()?;
				if readable {
					received_response_words += output.read_from_fd(&self.rx, 1).map_err(nix_to_io)?;
				}
				if writable {
					need_to_send -= input.write_to_fd(&self.tx, 1).map_err(nix_to_io)?;
				}
			}
			consumed += this_transaction_words;

			// the request header's `info` is always REQUEST; the reply carries the same `words`/`type` but its
			// payload size is governed by the response (SUCCESS) side of the table
			expected_response_words += 1 + payload_size(header.words, header.transaction_type, InfoCode::Success);
		}

		trace!("waiting for {} remaining response words", expected_response_words - received_response_words);
		while received_response_words < expected_response_words {
			received_response_words += output.read_from_fd(&self.rx, 1).map_err(nix_to_io)?;
		}

		Ok(consumed)
	}
}

fn nix_to_io(err: nix::Error) -> Error {
	Error::new(ErrorKind::Other, err)
}
