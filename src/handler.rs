use std::io;

/// A pluggable memory backend that IPbus transactions are dispatched against.
///
/// `base_address` is always a *byte* offset into the handler's address space, matching the transaction payload's
/// address word directly; implementations are responsible for any further scaling (e.g. a register file addressed
/// in words would multiply by [`WORD_SIZE`](crate::protocol::WORD_SIZE) internally).
///
/// Implementations should return `Err` only for conditions the protocol can report: an out-of-range address becomes
/// a `BUSERROR_READ`/`BUSERROR_WRITE` response, handled by [`dispatch`](crate::dispatch::dispatch). Implementations
/// are not required to be `Send`; the server is single-threaded.
pub trait MemoryHandler {
	/// Read `nwords` words starting at `base_address`.
	fn read(&mut self, nwords: u8, base_address: u32) -> io::Result<Vec<u32>>;

	/// Read the same word at `base_address`, `nwords` times.
	fn niread(&mut self, nwords: u8, base_address: u32) -> io::Result<Vec<u32>>;

	/// Write `words` sequentially starting at `base_address`.
	fn write(&mut self, base_address: u32, words: &[u32]) -> io::Result<()>;

	/// Write each of `words` to the same location, `base_address`.
	fn niwrite(&mut self, base_address: u32, words: &[u32]) -> io::Result<()>;

	/// Atomically read the word at `base_address`, replace it with `(current & and_term) | or_term`, and return the
	/// value read.
	fn rmw(&mut self, base_address: u32, and_term: u32, or_term: u32) -> io::Result<u32>;

	/// Atomically read the word at `base_address`, replace it with `current + addend`, and return the value read.
	fn rmwsum(&mut self, base_address: u32, addend: u32) -> io::Result<u32>;
}
