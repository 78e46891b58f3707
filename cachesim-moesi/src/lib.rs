//! Cycle-level simulator of a bus-based multi-core with private caches kept
//! coherent by a MOESI snooping protocol.

pub mod error;
pub mod moesi;
pub mod sim;
pub mod stats;
pub mod trace;

pub use error::{SimError, SimResult};
pub use sim::Simulator;
