use log::warn;
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use std::ffi::c_void;
use std::io::{Error, ErrorKind, Result};
use std::os::unix::io::RawFd;
use std::ptr;

/// A block of read/write mapped memory, shared by the `/dev/mem` and anonymous-memory handler backends.
///
/// Bounds-checks every access: the original implementation trusts every transaction's address blindly, but mapping
/// raw pointer arithmetic straight onto attacker-controlled IPbus addresses would be unsound in Rust, so every read
/// and write here is checked against `length` before any pointer is dereferenced.
#[derive(Debug)]
pub struct MappedMemory {
	ptr: *mut c_void,
	length: usize,
}

impl MappedMemory {
	/// Map `length` bytes from `fd` at `offset`. Pass `fd = -1` with `MapFlags::MAP_ANON` for an anonymous mapping.
	pub fn new(fd: RawFd, length: usize, flags: MapFlags) -> Result<Self> {
		// Safety: addr NULL lets the kernel place the mapping; the returned pointer is only ever read through bounds
		// checked accessors below
		let ptr = unsafe { mmap(ptr::null_mut(), length, ProtFlags::PROT_READ | ProtFlags::PROT_WRITE, flags, fd, 0) }
			.map_err(|err| Error::new(ErrorKind::Other, format!("mmap failed: {err}")))?;
		Ok(Self { ptr, length })
	}

	pub fn len(&self) -> usize {
		self.length
	}

	fn check_range(&self, base_address: u32, nwords: usize) -> Result<usize> {
		let start = base_address as usize;
		let end = start
			.checked_add(nwords * std::mem::size_of::<u32>())
			.ok_or_else(|| Error::new(ErrorKind::InvalidInput, "address range overflows"))?;
		if end > self.length {
			return Err(Error::new(
				ErrorKind::InvalidInput,
				format!("address range {start:#x}..{end:#x} is outside the mapped {} bytes", self.length),
			));
		}
		Ok(start)
	}

	/// Read `nwords` sequential words starting at `base_address`.
	pub fn read_words(&self, base_address: u32, nwords: usize) -> Result<Vec<u32>> {
		let start = self.check_range(base_address, nwords)?;
		// Safety: check_range ensures [start, start + nwords*4) lies within the mapping
		Ok((0..nwords)
			.map(|i| unsafe { ptr::read_volatile(self.ptr.cast::<u8>().add(start + i * 4).cast::<u32>()) })
			.collect())
	}

	/// Read the single word at `base_address`, `nwords` times (non-incrementing read).
	pub fn read_word_repeated(&self, base_address: u32, nwords: usize) -> Result<Vec<u32>> {
		let start = self.check_range(base_address, 1)?;
		// Safety: check_range ensures [start, start + 4) lies within the mapping
		let word = unsafe { ptr::read_volatile(self.ptr.cast::<u8>().add(start).cast::<u32>()) };
		Ok(vec![word; nwords])
	}

	/// Write `words` sequentially starting at `base_address`.
	pub fn write_words(&mut self, base_address: u32, words: &[u32]) -> Result<()> {
		let start = self.check_range(base_address, words.len())?;
		// Safety: check_range ensures [start, start + words.len()*4) lies within the mapping
		for (i, &word) in words.iter().enumerate() {
			unsafe { ptr::write_volatile(self.ptr.cast::<u8>().add(start + i * 4).cast::<u32>(), word) };
		}
		Ok(())
	}

	/// Write each of `words` to the same location, `base_address` (non-incrementing write).
	pub fn write_word_repeated(&mut self, base_address: u32, words: &[u32]) -> Result<()> {
		let start = self.check_range(base_address, 1)?;
		for &word in words {
			// Safety: check_range ensures [start, start + 4) lies within the mapping
			unsafe { ptr::write_volatile(self.ptr.cast::<u8>().add(start).cast::<u32>(), word) };
		}
		Ok(())
	}

	/// Atomically read-modify-write the word at `base_address` with `f`, returning the previous value.
	pub fn read_modify_write(&mut self, base_address: u32, f: impl FnOnce(u32) -> u32) -> Result<u32> {
		let start = self.check_range(base_address, 1)?;
		// Safety: check_range ensures [start, start + 4) lies within the mapping; the handler is only ever driven
		// single-threaded so there is no concurrent access to race against
		let current = unsafe {
			let slot = self.ptr.cast::<u8>().add(start).cast::<u32>();
			let current = ptr::read_volatile(slot);
			ptr::write_volatile(slot, f(current));
			current
		};
		Ok(current)
	}
}

impl Drop for MappedMemory {
	fn drop(&mut self) {
		// Safety: MappedMemory has exclusive ownership of `ptr`, and all accessors require &self/&mut self on this
		// struct, so nothing can still be using the mapping once it is dropped
		match unsafe { munmap(self.ptr, self.length) } {
			Ok(()) => (),
			Err(err) => warn!("munmap({:p}, {}) failed: {err}", self.ptr, self.length),
		}
	}
}
