use crate::byteshim::ByteShim;
use crate::dispatch::TransactionStream;
use crate::protocol::{Word, WORD_SIZE};
use crate::ring::WordRing;
use crate::stream::{classify, StreamState};
use log::trace;
use std::io::{Error, ErrorKind, Result};
use std::os::unix::io::AsRawFd;

/// Maximum request size the packet processor will shim in from a single read, matching the original's `MAX_REQ_LEN`
/// (the largest IPbus packet that fits in one standard Ethernet frame).
pub const MAX_REQUEST_BYTES: usize = 1472;

/// Per-client protocol state: the input/output word rings, the byte shim that buffers partial words arriving off
/// the wire, and the client's detected byte order.
///
/// One `ClientEngine` is created per connection (see `server::tcp`/`server::serial`); it owns no file descriptor
/// itself; the caller reads bytes into it and writes its output ring back out.
#[derive(Debug)]
pub struct ClientEngine {
	input: WordRing,
	output: WordRing,
	byte_shim: ByteShim,
	swapbytes: bool,
}

impl ClientEngine {
	pub fn new(ring_capacity: usize) -> Self {
		Self {
			input: WordRing::new(ring_capacity),
			output: WordRing::new(ring_capacity),
			byte_shim: ByteShim::new(),
			swapbytes: false,
		}
	}

	/// Pull up to `MAX_REQUEST_BYTES` bytes from `fd` into the byte shim, then promote as many whole words as
	/// possible onto the input ring. Returns `0` at EOF.
	pub fn read_from(&mut self, fd: &impl AsRawFd) -> Result<usize> {
		let nbytes = self.byte_shim.read_from_fd(fd, MAX_REQUEST_BYTES).map_err(nix_to_io)?;
		let nwords = self.byte_shim.len() / WORD_SIZE;
		if nwords > 0 {
			let bytes = self.byte_shim.front(nwords * WORD_SIZE);
			let words: Vec<Word> = bytes.chunks_exact(WORD_SIZE).map(word_from_ne_bytes).collect();
			// if the ring has no room yet, leave the bytes shimmed for the next call, once
			// process_input_stream has had a chance to drain it
			if self.input.append(&words).is_ok() {
				self.byte_shim.del_front(nwords * WORD_SIZE);
			}
		}
		Ok(nbytes)
	}

	/// Write as much of the output ring as possible to `fd`.
	pub fn write_to(&mut self, fd: &impl AsRawFd) -> Result<usize> {
		let size = self.output.size();
		self.output.write_to_fd(fd, size).map_err(nix_to_io)
	}

	pub fn has_output(&self) -> bool {
		self.output.size() > 0
	}

	/// Process as much of the input ring as is currently available, dispatching any complete transactions against
	/// `transactions` and echoing any packet headers straight back onto the output ring.
	///
	/// Mirrors `ipbus_process_input_stream`: it recurses (here, loops) until the stream is empty, holds a partial
	/// transaction, or hits an unrecoverable [`StreamState::Error`].
	pub fn process_input_stream(&mut self, transactions: &mut dyn TransactionStream) -> Result<usize> {
		let mut processed = 0;
		loop {
			match classify(&self.input, self.swapbytes) {
				StreamState::Empty | StreamState::PartialTrans => break,
				StreamState::Error => {
					return Err(Error::new(
						ErrorKind::InvalidData,
						"declared transaction payload can never fit in the ring buffer",
					));
				},
				StreamState::Packet => {
					self.swapbytes = false;
					processed += self.echo_packet_header()?;
				},
				StreamState::PacketSwapped => {
					self.swapbytes = true;
					processed += self.echo_packet_header()?;
				},
				StreamState::FullTrans => {
					processed += transactions.handle(&mut self.input, self.swapbytes, &mut self.output)?;
				},
			}
		}
		Ok(processed)
	}

	fn echo_packet_header(&mut self) -> Result<usize> {
		let header_word = self.input.value_at_net(0);
		self.input.delete_front(1);
		trace!("got new packet header {header_word:#010x}");
		self.output
			.push_back_net(header_word)
			.map_err(|err| Error::new(ErrorKind::Other, err))?;
		Ok(1)
	}
}

fn word_from_ne_bytes(chunk: &[u8]) -> Word {
	Word::from_ne_bytes(chunk.try_into().expect("chunks_exact(WORD_SIZE) guarantees exact length"))
}

fn nix_to_io(err: nix::Error) -> Error {
	Error::new(ErrorKind::Other, err)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handler::MemoryHandler;
	use crate::handlers::NullHandler;
	use crate::protocol::{InfoCode, PacketHeader, PacketType, TransactionHeader, TransactionType};

	fn push_word(engine: &mut ClientEngine, word: Word) {
		engine.input.push_back_net(word).unwrap();
	}

	fn null_stream() -> Box<dyn MemoryHandler> {
		Box::new(NullHandler)
	}

	#[test]
	fn echoes_packet_header() {
		let mut engine = ClientEngine::new(64);
		let header = PacketHeader { packet_id: 0, packet_type: PacketType::Control };
		push_word(&mut engine, header.encode());
		let mut handler = null_stream();
		engine.process_input_stream(&mut handler).unwrap();
		assert_eq!(engine.output.pop_front(), header.encode());
	}

	#[test]
	fn dispatches_full_transaction_and_waits_on_partial() {
		let mut engine = ClientEngine::new(64);
		let request = TransactionHeader { id: 1, words: 2, transaction_type: TransactionType::Read, info: InfoCode::Request };
		push_word(&mut engine, request.encode());
		push_word(&mut engine, 0x1000);
		let mut handler = null_stream();
		let processed = engine.process_input_stream(&mut handler).unwrap();
		assert_eq!(processed, 2);
		assert!(engine.has_output());
		assert_eq!(engine.input.size(), 0);
	}

	#[test]
	fn partial_transaction_is_left_untouched() {
		let mut engine = ClientEngine::new(64);
		let request = TransactionHeader { id: 1, words: 4, transaction_type: TransactionType::Read, info: InfoCode::Success };
		push_word(&mut engine, request.encode());
		push_word(&mut engine, 0xA);
		let mut handler = null_stream();
		let processed = engine.process_input_stream(&mut handler).unwrap();
		assert_eq!(processed, 0);
		assert_eq!(engine.input.size(), 2, "partial transaction must remain buffered");
	}
}
