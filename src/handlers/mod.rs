//! Concrete [`MemoryHandler`](crate::handler::MemoryHandler) backends, plus the serial-forwarding dispatch
//! substitute.

mod mmap;

pub mod devmem;
pub mod forward;
pub mod null;
pub mod testmem;

pub use devmem::DevMemHandler;
pub use forward::ForwardHandler;
pub use null::NullHandler;
pub use testmem::TestMemHandler;
