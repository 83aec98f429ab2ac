use crate::handler::MemoryHandler;
use crate::protocol::{InfoCode, Transaction, TransactionType};
use crate::ring::WordRing;
use std::io::Result;

/// Execute `request` against `handler` and build the response transaction.
///
/// Mirrors `ipbus_process_transaction` in the original implementation: the response always carries the same `id`
/// and `words` as the request, with `info` set to [`InfoCode::Success`] on success, or one of the `BUSERROR_*`
/// codes if the handler fails. `request.payload` is assumed to already hold exactly the number of words
/// [`payload_size`](crate::protocol::payload_size) prescribes for a `REQUEST` of this type (true for anything that
/// reached here via [`crate::stream::classify`] returning `FullTrans`).
pub fn dispatch(handler: &mut dyn MemoryHandler, request: &Transaction) -> Transaction {
	let base = |info, payload| Transaction {
		id: request.id,
		words: request.words,
		transaction_type: request.transaction_type,
		info,
		payload,
	};

	match request.transaction_type {
		TransactionType::Read => match handler.read(request.words, request.payload[0]) {
			Ok(data) => base(InfoCode::Success, data),
			Err(_) => base(InfoCode::BusErrorRead, Vec::new()),
		},
		TransactionType::NiRead => match handler.niread(request.words, request.payload[0]) {
			Ok(data) => base(InfoCode::Success, data),
			Err(_) => base(InfoCode::BusErrorRead, Vec::new()),
		},
		TransactionType::Write => {
			let address = request.payload[0];
			let data = &request.payload[1..];
			match handler.write(address, data) {
				Ok(()) => base(InfoCode::Success, Vec::new()),
				Err(_) => base(InfoCode::BusErrorWrite, Vec::new()),
			}
		},
		TransactionType::NiWrite => {
			let address = request.payload[0];
			let data = &request.payload[1..];
			match handler.niwrite(address, data) {
				Ok(()) => base(InfoCode::Success, Vec::new()),
				Err(_) => base(InfoCode::BusErrorWrite, Vec::new()),
			}
		},
		TransactionType::Rmw => {
			let (address, and_term, or_term) = (request.payload[0], request.payload[1], request.payload[2]);
			match handler.rmw(address, and_term, or_term) {
				Ok(previous) => base(InfoCode::Success, vec![previous]),
				Err(_) => base(InfoCode::BusErrorRead, Vec::new()),
			}
		},
		TransactionType::RmwSum => {
			let (address, addend) = (request.payload[0], request.payload[1]);
			match handler.rmwsum(address, addend) {
				Ok(previous) => base(InfoCode::Success, vec![previous]),
				Err(_) => base(InfoCode::BusErrorRead, Vec::new()),
			}
		},
		// not part of the protocol; respond as a no-op success, matching the original's unhandled-case fallthrough
		TransactionType::Reserved(_) => base(InfoCode::Success, Vec::new()),
	}
}

/// The pluggable "handle a full transaction (or several)" step, matching `handle_transaction_stream` in the
/// original implementation: that function has two bodies in the original (`transactionhandler.c`, dispatching
/// against a local `MemoryHandler`-equivalent, and `forwardingtransactionhandler.c`, forwarding along a serial bus
/// instead), selected at link time there and via trait object here (see [`crate::handlers::forward`]).
///
/// Given `input` classified as holding at least one full transaction, consume whatever this implementation handles
/// and append the corresponding response(s) to `output`. Returns the number of input words consumed.
pub trait TransactionStream {
	fn handle(&mut self, input: &mut WordRing, swapbytes: bool, output: &mut WordRing) -> Result<usize>;
}

/// Dispatches exactly one transaction per call against the wrapped [`MemoryHandler`].
impl TransactionStream for Box<dyn MemoryHandler> {
	fn handle(&mut self, input: &mut WordRing, swapbytes: bool, output: &mut WordRing) -> Result<usize> {
		let request = Transaction::decode(input, swapbytes);
		let consumed = request.encoded_len();
		input.delete_front(consumed);
		let response = dispatch(self.as_mut(), &request);
		response
			.encode_into(output, swapbytes)
			.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
		Ok(consumed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::protocol::TransactionHeader;
	use std::collections::HashMap;
	use std::io;

	/// A tiny in-memory handler for exercising dispatch logic without a real mmap backend.
	struct MapHandler(HashMap<u32, u32>);

	impl MemoryHandler for MapHandler {
		fn read(&mut self, nwords: u8, base_address: u32) -> io::Result<Vec<u32>> {
			Ok((0..nwords as u32).map(|i| *self.0.get(&(base_address + i * 4)).unwrap_or(&0)).collect())
		}

		fn niread(&mut self, nwords: u8, base_address: u32) -> io::Result<Vec<u32>> {
			let value = *self.0.get(&base_address).unwrap_or(&0);
			Ok(vec![value; nwords as usize])
		}

		fn write(&mut self, base_address: u32, words: &[u32]) -> io::Result<()> {
			for (i, &word) in words.iter().enumerate() {
				self.0.insert(base_address + i as u32 * 4, word);
			}
			Ok(())
		}

		fn niwrite(&mut self, base_address: u32, words: &[u32]) -> io::Result<()> {
			if let Some(&last) = words.last() {
				self.0.insert(base_address, last);
			}
			Ok(())
		}

		fn rmw(&mut self, base_address: u32, and_term: u32, or_term: u32) -> io::Result<u32> {
			let current = *self.0.get(&base_address).unwrap_or(&0);
			self.0.insert(base_address, (current & and_term) | or_term);
			Ok(current)
		}

		fn rmwsum(&mut self, base_address: u32, addend: u32) -> io::Result<u32> {
			let current = *self.0.get(&base_address).unwrap_or(&0);
			self.0.insert(base_address, current.wrapping_add(addend));
			Ok(current)
		}
	}

	fn request(transaction_type: TransactionType, payload: Vec<u32>) -> Transaction {
		Transaction { id: 0x42, words: payload.len() as u8, transaction_type, info: InfoCode::Request, payload }
	}

	#[test]
	fn write_then_read_round_trips() {
		let mut handler = MapHandler(HashMap::new());
		let write = request(TransactionType::Write, vec![0x100, 0xAAAA, 0xBBBB]);
		let resp = dispatch(&mut handler, &write);
		assert_eq!(resp.info, InfoCode::Success);
		assert!(resp.payload.is_empty());

		let read = request(TransactionType::Read, vec![0x100]);
		let mut read = read;
		read.words = 2;
		let resp = dispatch(&mut handler, &read);
		assert_eq!(resp.info, InfoCode::Success);
		assert_eq!(resp.payload, vec![0xAAAA, 0xBBBB]);
	}

	#[test]
	fn niread_repeats_same_word() {
		let mut handler = MapHandler(HashMap::from([(0x10, 7)]));
		let mut niread = request(TransactionType::NiRead, vec![0x10]);
		niread.words = 3;
		let resp = dispatch(&mut handler, &niread);
		assert_eq!(resp.payload, vec![7, 7, 7]);
	}

	#[test]
	fn rmw_returns_previous_value_and_applies_mask() {
		let mut handler = MapHandler(HashMap::from([(0x20, 0b1010)]));
		let rmw = request(TransactionType::Rmw, vec![0x20, 0b1100, 0b0001]);
		let resp = dispatch(&mut handler, &rmw);
		assert_eq!(resp.payload, vec![0b1010]);
		assert_eq!(*handler.0.get(&0x20).unwrap(), (0b1010 & 0b1100) | 0b0001);
	}

	#[test]
	fn rmwsum_returns_previous_value_and_adds() {
		let mut handler = MapHandler(HashMap::from([(0x30, 5)]));
		let rmwsum = request(TransactionType::RmwSum, vec![0x30, 10]);
		let resp = dispatch(&mut handler, &rmwsum);
		assert_eq!(resp.payload, vec![5]);
		assert_eq!(*handler.0.get(&0x30).unwrap(), 15);
	}

	struct FailingHandler;
	impl MemoryHandler for FailingHandler {
		fn read(&mut self, _: u8, _: u32) -> io::Result<Vec<u32>> {
			Err(io::Error::new(io::ErrorKind::InvalidInput, "out of range"))
		}
		fn niread(&mut self, _: u8, _: u32) -> io::Result<Vec<u32>> {
			Err(io::Error::new(io::ErrorKind::InvalidInput, "out of range"))
		}
		fn write(&mut self, _: u32, _: &[u32]) -> io::Result<()> {
			Err(io::Error::new(io::ErrorKind::InvalidInput, "out of range"))
		}
		fn niwrite(&mut self, _: u32, _: &[u32]) -> io::Result<()> {
			Err(io::Error::new(io::ErrorKind::InvalidInput, "out of range"))
		}
		fn rmw(&mut self, _: u32, _: u32, _: u32) -> io::Result<u32> {
			Err(io::Error::new(io::ErrorKind::InvalidInput, "out of range"))
		}
		fn rmwsum(&mut self, _: u32, _: u32) -> io::Result<u32> {
			Err(io::Error::new(io::ErrorKind::InvalidInput, "out of range"))
		}
	}

	#[test]
	fn read_failure_becomes_buserror_read() {
		let mut handler = FailingHandler;
		let read = request(TransactionType::Read, vec![0x0]);
		let resp = dispatch(&mut handler, &read);
		assert_eq!(resp.info, InfoCode::BusErrorRead);
	}

	#[test]
	fn write_failure_becomes_buserror_write() {
		let mut handler = FailingHandler;
		let write = request(TransactionType::Write, vec![0x0, 0x1]);
		let resp = dispatch(&mut handler, &write);
		assert_eq!(resp.info, InfoCode::BusErrorWrite);
	}

	#[test]
	fn boxed_handler_handles_one_transaction_as_a_transaction_stream() {
		let mut stream: Box<dyn MemoryHandler> = Box::new(MapHandler(HashMap::from([(0x20, 0x55)])));
		let request = TransactionHeader { id: 7, words: 1, transaction_type: TransactionType::Read, info: InfoCode::Request };
		let mut input = WordRing::new(8);
		input.push_back_net(request.encode()).unwrap();
		input.push_back_net(0x20).unwrap();
		let mut output = WordRing::new(8);

		let consumed = stream.handle(&mut input, false, &mut output).unwrap();

		assert_eq!(consumed, 2);
		assert_eq!(input.size(), 0, "the consumed transaction must be removed from the input ring");
		let response = Transaction::decode(&output, false);
		assert_eq!(response.info, InfoCode::Success);
		assert_eq!(response.payload, vec![0x55]);
	}
}
