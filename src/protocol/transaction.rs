use super::{Word, PROTOCOL_VERSION};
use crate::ring::{RingFullError, WordRing};

/// An IPbus transaction type, carried in the `type` nibble of a transaction header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
	Read,
	Write,
	NiRead,
	NiWrite,
	Rmw,
	RmwSum,
	/// A type nibble value the protocol does not define.
	Reserved(u8),
}

impl TransactionType {
	pub fn from_nibble(n: u8) -> Self {
		match n {
			0x0 => Self::Read,
			0x1 => Self::Write,
			0x2 => Self::NiRead,
			0x3 => Self::NiWrite,
			0x4 => Self::Rmw,
			0x5 => Self::RmwSum,
			other => Self::Reserved(other),
		}
	}

	pub fn to_nibble(self) -> u8 {
		match self {
			Self::Read => 0x0,
			Self::Write => 0x1,
			Self::NiRead => 0x2,
			Self::NiWrite => 0x3,
			Self::Rmw => 0x4,
			Self::RmwSum => 0x5,
			Self::Reserved(n) => n,
		}
	}
}

/// An IPbus transaction `info` code, carried in the low nibble of a transaction header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoCode {
	Request,
	Success,
	BadHeader,
	BusErrorRead,
	BusErrorWrite,
	BusTimeoutRead,
	BusTimeoutWrite,
	Reserved(u8),
}

impl InfoCode {
	pub fn from_nibble(n: u8) -> Self {
		match n {
			0xf => Self::Request,
			0x0 => Self::Success,
			0x1 => Self::BadHeader,
			0x4 => Self::BusErrorRead,
			0x5 => Self::BusErrorWrite,
			0x6 => Self::BusTimeoutRead,
			0x7 => Self::BusTimeoutWrite,
			other => Self::Reserved(other),
		}
	}

	pub fn to_nibble(self) -> u8 {
		match self {
			Self::Request => 0xf,
			Self::Success => 0x0,
			Self::BadHeader => 0x1,
			Self::BusErrorRead => 0x4,
			Self::BusErrorWrite => 0x5,
			Self::BusTimeoutRead => 0x6,
			Self::BusTimeoutWrite => 0x7,
			Self::Reserved(n) => n,
		}
	}

	/// Whether this is one of the two info codes that carry a (possibly empty) payload: a pending `REQUEST`, or a
	/// `SUCCESS` response. Every other code denotes an error response, which never carries a payload.
	fn carries_payload(self) -> bool {
		matches!(self, Self::Request | Self::Success)
	}
}

/// A decoded IPbus transaction header (the first word of a transaction; see [`payload_size`] for how many further
/// words follow it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHeader {
	pub id: u16,
	pub words: u8,
	pub transaction_type: TransactionType,
	pub info: InfoCode,
}

impl TransactionHeader {
	pub fn decode(word: Word) -> Self {
		let info = InfoCode::from_nibble((word & 0x0f) as u8);
		let transaction_type = TransactionType::from_nibble(((word & 0xf0) >> 4) as u8);
		let words = ((word & 0xff00) >> 8) as u8;
		let id = ((word & 0x0fff_0000) >> 16) as u16;
		Self { id, words, transaction_type, info }
	}

	pub fn encode(self) -> Word {
		(PROTOCOL_VERSION << 28)
			| ((self.id as u32 & 0xfff) << 16)
			| ((self.words as u32) << 8)
			| ((self.transaction_type.to_nibble() as u32 & 0xf) << 4)
			| (self.info.to_nibble() as u32 & 0xf)
	}

	/// Number of payload words following this header, per [`payload_size`].
	pub fn payload_size(self) -> usize {
		payload_size(self.words, self.transaction_type, self.info)
	}
}

/// Number of payload words (not counting the header itself) for a transaction with the given `words` field, `type`,
/// and `info` code.
///
/// `info` distinguishes a request (`REQUEST`) from a response (`SUCCESS`); any other info code denotes an error
/// response, which never carries a payload regardless of type.
pub fn payload_size(words: u8, transaction_type: TransactionType, info: InfoCode) -> usize {
	if !info.carries_payload() {
		return 0;
	}
	let is_response = matches!(info, InfoCode::Success);
	let words = words as usize;
	match transaction_type {
		TransactionType::Read | TransactionType::NiRead => {
			if is_response {
				words
			} else {
				1
			}
		},
		TransactionType::Write | TransactionType::NiWrite => {
			if is_response {
				0
			} else {
				words + 1
			}
		},
		TransactionType::Rmw => {
			if is_response {
				1
			} else {
				3
			}
		},
		TransactionType::RmwSum => {
			if is_response {
				1
			} else {
				2
			}
		},
		TransactionType::Reserved(_) => 0,
	}
}

/// A fully decoded IPbus transaction: header fields plus its payload words, in host byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
	pub id: u16,
	pub words: u8,
	pub transaction_type: TransactionType,
	pub info: InfoCode,
	pub payload: Vec<Word>,
}

impl Transaction {
	/// Decode a transaction starting at the head of `ring`. Assumes the caller has already verified (via
	/// [`crate::stream::classify`]) that a full transaction is buffered; the ring is left untouched, matching the
	/// read-then-delete-front split the packet processor performs.
	pub fn decode(ring: &WordRing, swapbytes: bool) -> Self {
		let header_word = ring.value_at_net(0);
		let header_word = if swapbytes { header_word.swap_bytes() } else { header_word };
		let header = TransactionHeader::decode(header_word);
		let payload_size = header.payload_size();
		let payload = (0..payload_size)
			.map(|i| {
				let word = ring.value_at_net(1 + i);
				if swapbytes {
					word.swap_bytes()
				} else {
					word
				}
			})
			.collect();
		Self { id: header.id, words: header.words, transaction_type: header.transaction_type, info: header.info, payload }
	}

	/// Number of words this transaction occupies on the wire, header included.
	pub fn encoded_len(&self) -> usize {
		1 + self.payload.len()
	}

	/// Encode this transaction onto the tail of `ring`.
	pub fn encode_into(&self, ring: &mut WordRing, swapbytes: bool) -> Result<(), RingFullError> {
		let header = TransactionHeader { id: self.id, words: self.words, transaction_type: self.transaction_type, info: self.info };
		let header_word = if swapbytes { header.encode().swap_bytes() } else { header.encode() };
		ring.push_back_net(header_word)?;
		for &word in &self.payload {
			let word = if swapbytes { word.swap_bytes() } else { word };
			ring.push_back_net(word)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn header_round_trips() {
		let header = TransactionHeader {
			id: 0xBAD,
			words: 5,
			transaction_type: TransactionType::Read,
			info: InfoCode::Request,
		};
		assert_eq!(TransactionHeader::decode(header.encode()), header);
	}

	#[test]
	fn encodes_read_request_from_example() {
		let header =
			TransactionHeader { id: 0xBAD, words: 5, transaction_type: TransactionType::Read, info: InfoCode::Request };
		assert_eq!(header.encode(), 0x2BAD050f);
	}

	#[test]
	fn encodes_rmw_request_from_example() {
		let header =
			TransactionHeader { id: 0xCAB, words: 1, transaction_type: TransactionType::Rmw, info: InfoCode::Request };
		assert_eq!(header.encode(), 0x2CAB014f);
	}

	#[test]
	fn payload_sizes_match_table() {
		use InfoCode::{Request, Success};
		use TransactionType::*;
		assert_eq!(payload_size(5, Read, Request), 1);
		assert_eq!(payload_size(5, Read, Success), 5);
		assert_eq!(payload_size(5, NiRead, Request), 1);
		assert_eq!(payload_size(5, NiRead, Success), 5);
		assert_eq!(payload_size(5, Write, Request), 6);
		assert_eq!(payload_size(5, Write, Success), 0);
		assert_eq!(payload_size(5, NiWrite, Request), 6);
		assert_eq!(payload_size(1, Rmw, Request), 3);
		assert_eq!(payload_size(1, Rmw, Success), 1);
		assert_eq!(payload_size(1, RmwSum, Request), 2);
		assert_eq!(payload_size(1, RmwSum, Success), 1);
	}

	#[test]
	fn error_info_codes_carry_no_payload() {
		assert_eq!(payload_size(5, TransactionType::Read, InfoCode::BusErrorRead), 0);
	}

	#[test]
	fn transaction_round_trips_through_ring() {
		let transaction = Transaction {
			id: 0x123,
			words: 2,
			transaction_type: TransactionType::Write,
			info: InfoCode::Request,
			payload: vec![0xdead_beef, 0x1, 0x2],
		};
		let mut ring = WordRing::new(16);
		transaction.encode_into(&mut ring, false).unwrap();
		assert_eq!(ring.size(), transaction.encoded_len());
		let decoded = Transaction::decode(&ring, false);
		assert_eq!(decoded, transaction);
	}

	#[test]
	fn transaction_round_trips_swapped() {
		let transaction = Transaction {
			id: 0x456,
			words: 1,
			transaction_type: TransactionType::Rmw,
			info: InfoCode::Success,
			payload: vec![0x99],
		};
		let mut ring = WordRing::new(16);
		transaction.encode_into(&mut ring, true).unwrap();
		let decoded = Transaction::decode(&ring, true);
		assert_eq!(decoded, transaction);
	}
}
