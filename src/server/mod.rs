//! Accept loops: one per supported transport.

pub mod serial;
pub mod tcp;
