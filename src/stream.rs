use crate::protocol::{detect_packet_header, payload_size, PacketKind, TransactionHeader};
use crate::ring::WordRing;

/// The state of a client's input stream, as classified by looking at the head of its input ring.
///
/// Mirrors `IPBUS_ISTREAM_*` in the original implementation: the packet processor loop drives off this
/// classification, consuming and responding to whatever the head of the stream contains before re-classifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
	/// Less than a whole word is buffered; wait for more data.
	Empty,
	/// A packet header is at the head of the stream, in the reader's native byte order.
	Packet,
	/// A packet header is at the head of the stream, byte-swapped relative to the reader's native order.
	PacketSwapped,
	/// A transaction header is at the head of the stream, but its declared payload hasn't fully arrived yet.
	PartialTrans,
	/// A whole transaction, header and payload, is buffered and ready to be dispatched.
	FullTrans,
	/// The declared payload size can never fit in this ring no matter how much it drains, so the stream can never
	/// make progress.
	Error,
}

/// Classify the head of `input` for the packet processor.
///
/// `swapbytes` is the client's current byte-order flag; it isn't mutated here even when a packet header reveals the
/// client speaks the opposite byte order; the caller is responsible for updating it when the returned state is
/// [`Packet`](StreamState::Packet) or [`PacketSwapped`](StreamState::PacketSwapped), same as the original detects the
/// endianness once per packet header but only acts on it via a caller-supplied flag.
pub fn classify(input: &WordRing, swapbytes: bool) -> StreamState {
	if input.size() == 0 {
		return StreamState::Empty;
	}
	let first_word = input.value_at_net(0);
	match detect_packet_header(first_word) {
		PacketKind::Native => return StreamState::Packet,
		PacketKind::Swapped => return StreamState::PacketSwapped,
		PacketKind::NotAPacket => (),
	}

	let header_word = if swapbytes { first_word.swap_bytes() } else { first_word };
	let header = TransactionHeader::decode(header_word);
	let required = 1 + payload_size(header.words, header.transaction_type, header.info);

	if input.size() >= required {
		StreamState::FullTrans
	} else if required > input.capacity() - 1 {
		// the ring can never hold `required` words even fully drained; this transaction can never be completed
		StreamState::Error
	} else {
		StreamState::PartialTrans
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::protocol::{InfoCode, TransactionType};

	fn header_word(header: TransactionHeader) -> u32 {
		header.encode()
	}

	#[test]
	fn empty_ring_is_empty() {
		let ring = WordRing::new(8);
		assert_eq!(classify(&ring, false), StreamState::Empty);
	}

	#[test]
	fn detects_native_packet_header() {
		let mut ring = WordRing::new(8);
		ring.push_back_net(0x20BEEFF0).unwrap();
		assert_eq!(classify(&ring, false), StreamState::Packet);
	}

	#[test]
	fn detects_swapped_packet_header() {
		let mut ring = WordRing::new(8);
		ring.push_back_net(0x20BEEFF0u32.swap_bytes()).unwrap();
		assert_eq!(classify(&ring, false), StreamState::PacketSwapped);
	}

	#[test]
	fn partial_transaction_waits_for_payload() {
		let mut ring = WordRing::new(16);
		let header = TransactionHeader {
			id: 1,
			words: 4,
			transaction_type: TransactionType::Read,
			info: InfoCode::Success,
		};
		ring.push_back_net(header_word(header)).unwrap();
		ring.push_back_net(1).unwrap();
		assert_eq!(classify(&ring, false), StreamState::PartialTrans);
	}

	#[test]
	fn full_transaction_is_detected_once_payload_arrives() {
		let mut ring = WordRing::new(16);
		let header = TransactionHeader {
			id: 1,
			words: 2,
			transaction_type: TransactionType::Read,
			info: InfoCode::Success,
		};
		ring.push_back_net(header_word(header)).unwrap();
		ring.push_back_net(0xA).unwrap();
		ring.push_back_net(0xB).unwrap();
		assert_eq!(classify(&ring, false), StreamState::FullTrans);
	}

	#[test]
	fn unsatisfiable_payload_is_an_error() {
		let mut ring = WordRing::new(4); // capacity - 1 == 3 usable words
		let header = TransactionHeader {
			id: 1,
			words: 200,
			transaction_type: TransactionType::Write,
			info: InfoCode::Request,
		};
		ring.push_back_net(header_word(header)).unwrap();
		assert_eq!(classify(&ring, false), StreamState::Error);
	}

	#[test]
	fn swapbytes_flag_is_applied_to_non_header_words() {
		let mut ring = WordRing::new(16);
		let header = TransactionHeader {
			id: 1,
			words: 1,
			transaction_type: TransactionType::Read,
			info: InfoCode::Success,
		};
		// store the header byte-swapped, as it would arrive from an opposite-endianness client
		ring.push_back_net(header_word(header).swap_bytes()).unwrap();
		ring.push_back_net(0xA).unwrap();
		assert_eq!(classify(&ring, true), StreamState::FullTrans);
	}
}
