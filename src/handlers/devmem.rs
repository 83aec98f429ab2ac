use super::mmap::MappedMemory;
use crate::handler::MemoryHandler;
use nix::sys::mman::MapFlags;
use std::fs::OpenOptions;
use std::io::Result;
use std::os::unix::io::AsRawFd;

/// Size of the window mapped from `/dev/mem`, matching the original implementation.
pub const MAPPED_SIZE: usize = 4096;

/// A `MemoryHandler` backed by `/dev/mem`, giving transactions direct access to physical memory.
///
/// Requires the process to have permission to open `/dev/mem` for read/write (typically root). The file is kept
/// open for the lifetime of the handler; closing it would invalidate the mapping.
#[derive(Debug)]
pub struct DevMemHandler {
	memory: MappedMemory,
	_file: std::fs::File,
}

impl DevMemHandler {
	pub fn new() -> Result<Self> {
		let file = OpenOptions::new().read(true).write(true).open("/dev/mem")?;
		let memory = MappedMemory::new(file.as_raw_fd(), MAPPED_SIZE, MapFlags::MAP_SHARED)?;
		Ok(Self { memory, _file: file })
	}
}

impl MemoryHandler for DevMemHandler {
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
