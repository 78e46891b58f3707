mod bus;
mod cache;
mod common;
mod forwarder;
mod memory;
mod processor;

pub use bus::{Bus, BusState, BusStats, BusWires, Wire};
pub use cache::{Cache, CacheLine, CacheStats, CacheStep};
pub use common::*;
pub use forwarder::{ForwardJob, Forwarder};
pub use memory::{MemoryController, MemoryStats};
pub use processor::{ProcState, ProcStep, Processor};
