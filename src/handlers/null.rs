use crate::handler::MemoryHandler;
use log::info;
use std::io::Result;

/// A `MemoryHandler` that performs no real memory access, logging every transaction and returning predictable dummy
/// data instead.
///
/// Grounded on the original's logging dummy handlers: useful for exercising the protocol layer (and clients against
/// it) without any real or simulated backing store.
#[derive(Debug, Default)]
pub struct NullHandler;

impl MemoryHandler for NullHandler {
	fn read(&mut self, nwords: u8, base_address: u32) -> Result<Vec<u32>> {
		info!("READ nwords={nwords} addr={base_address:#x}");
		Ok((1..=nwords as u32).collect())
	}

	fn niread(&mut self, nwords: u8, base_address: u32) -> Result<Vec<u32>> {
		info!("NIREAD nwords={nwords} addr={base_address:#x}");
		Ok((1..=nwords as u32).collect())
	}

	fn write(&mut self, base_address: u32, words: &[u32]) -> Result<()> {
		info!("WRITE writesize={} addr={base_address:#x}", words.len());
		for (i, word) in words.iter().enumerate() {
			info!("  datum {i}: {word:#x}");
		}
		Ok(())
	}

	fn niwrite(&mut self, base_address: u32, words: &[u32]) -> Result<()> {
		info!("NIWRITE writesize={} addr={base_address:#x}", words.len());
		for (i, word) in words.iter().enumerate() {
			info!("  datum {i}: {word:#x}");
		}
		Ok(())
	}

	fn rmw(&mut self, base_address: u32, and_term: u32, or_term: u32) -> Result<u32> {
		info!("RMW addr={base_address:#x} and={and_term:#x} or={or_term:#x}");
		Ok((base_address & and_term) | or_term)
	}

	fn rmwsum(&mut self, base_address: u32, addend: u32) -> Result<u32> {
		info!("RMWSUM addr={base_address:#x} addend={addend:#x}");
		Ok(base_address.wrapping_add(addend))
	}
}
