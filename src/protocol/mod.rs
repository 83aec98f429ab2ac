//! Wire-level types shared by every part of the engine: word size, header layouts, and the
//! request/response payload-size table.

mod header;
mod transaction;

pub use header::{detect_packet_header, PacketHeader, PacketKind, PacketType};
pub use transaction::{payload_size, InfoCode, Transaction, TransactionHeader, TransactionType};

/// A single protocol word. Both framing levels and every payload entry are this size.
pub type Word = u32;

/// Size of a [`Word`], in bytes.
pub const WORD_SIZE: usize = std::mem::size_of::<Word>();

/// The protocol version this implementation speaks, for both packet and transaction headers.
pub const PROTOCOL_VERSION: u32 = 0x2;
