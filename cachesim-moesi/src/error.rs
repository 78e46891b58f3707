use std::path::PathBuf;

use thiserror::Error;

use crate::moesi::Cycle;

/// Top-level error type for the simulator
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Failed to read trace file '{0}': {1}")]
    TraceReadError(PathBuf, #[source] std::io::Error),

    #[error("No trace files named '{0}*.data' found")]
    NoTraces(String),

    #[error("Coherence violation at cycle {cycle}: {detail}")]
    CoherenceViolation { cycle: Cycle, detail: String },

    #[error("Simulation stalled at cycle {0} with cores still running")]
    Stalled(Cycle),

    #[error("Cycle limit reached: {0} cycles")]
    CycleLimitReached(Cycle),
}

pub type SimResult<T> = Result<T, SimError>;
