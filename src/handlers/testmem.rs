use super::mmap::MappedMemory;
use crate::handler::MemoryHandler;
use nix::sys::mman::MapFlags;
use std::io::Result;

/// Default size of the scratch memory block backing [`TestMemHandler`].
pub const DEFAULT_SIZE: usize = 4 * 1024 * 1024;

/// A `MemoryHandler` backed by an anonymous, process-local block of memory.
///
/// Seeded with `0xEF` bytes so reads of never-written addresses are visibly non-zero, matching the original test
/// backend. Useful for development and for the test suite: no privileges are required to create one.
#[derive(Debug)]
pub struct TestMemHandler {
	memory: MappedMemory,
}

impl TestMemHandler {
	pub fn new(size: usize) -> Result<Self> {
		let mut memory = MappedMemory::new(-1, size, MapFlags::MAP_ANON | MapFlags::MAP_SHARED)?;
		memory.write_words(0, &vec![0xEFEF_EFEFu32; size / 4])?;
		Ok(Self { memory })
	}
}

impl Default for TestMemHandler {
	fn default() -> Self {
		Self::new(DEFAULT_SIZE).expect("anonymous mmap should not fail")
	}
}

impl MemoryHandler for TestMemHandler {
	fn read(&mut self, nwords: u8, base_address: u32) -> Result<Vec<u32>> {
		self.memory.read_words(base_address, nwords as usize)
	}

	fn niread(&mut self, nwords: u8, base_address: u32) -> Result<Vec<u32>> {
		self.memory.read_word_repeated(base_address, nwords as usize)
	}

	fn write(&mut self, base_address: u32, words: &[u32]) -> Result<()> {
		self.memory.write_words(base_address, words)
	}

	fn niwrite(&mut self, base_address: u32, words: &[u32]) -> Result<()> {
		self.memory.write_word_repeated(base_address, words)
	}

	fn rmw(&mut self, base_address: u32, and_term: u32, or_term: u32) -> Result<u32> {
		self.memory.read_modify_write(base_address, |current| (current & and_term) | or_term)
	}

	fn rmwsum(&mut self, base_address: u32, addend: u32) -> Result<u32> {
		self.memory.read_modify_write(base_address, |current| current.wrapping_add(addend))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fresh_memory_is_seeded_with_0xef() {
		let mut handler = TestMemHandler::new(64).unwrap();
		assert_eq!(handler.read(1, 0).unwrap(), vec![0xEFEF_EFEF]);
	}

	#[test]
	fn write_then_read_round_trips() {
		let mut handler = TestMemHandler::new(64).unwrap();
		handler.write(0, &[1, 2, 3]).unwrap();
		assert_eq!(handler.read(3, 0).unwrap(), vec![1, 2, 3]);
	}

	#[test]
	fn niread_repeats_single_word() {
		let mut handler = TestMemHandler::new(64).unwrap();
		handler.write(4, &[0x42]).unwrap();
		assert_eq!(handler.niread(3, 4).unwrap(), vec![0x42, 0x42, 0x42]);
	}

	#[test]
	fn out_of_range_address_is_an_error() {
		let mut handler = TestMemHandler::new(64).unwrap();
		assert!(handler.read(1, 1000).is_err());
	}

	#[test]
	fn rmw_applies_mask_and_returns_previous() {
		let mut handler = TestMemHandler::new(64).unwrap();
		handler.write(0, &[0b1010]).unwrap();
		let previous = handler.rmw(0, 0b1100, 0b0001).unwrap();
		assert_eq!(previous, 0b1010);
		assert_eq!(handler.read(1, 0).unwrap(), vec![(0b1010 & 0b1100) | 0b0001]);
	}
}
