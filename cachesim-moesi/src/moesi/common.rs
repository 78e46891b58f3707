use std::fmt;

use crate::error::{SimError, SimResult};

pub type Cycle = u64;
pub type CoreId = usize;

pub const LINE_SIZE: u32 = 32;
pub const WORD_SIZE: u32 = 4;
pub const WORDS_PER_LINE: usize = (LINE_SIZE / WORD_SIZE) as usize;
const OFFSET_BITS: u32 = LINE_SIZE.trailing_zeros();

/// One line worth of data words.
pub type Block = [u32; WORDS_PER_LINE];

#[derive(Clone, Copy, Debug)]
pub struct SystemSpec {                 // unit         reasonable defaults
    pub cache_size: u32,                // bytes        2048
    pub cache_assoc: u32,               // blocks       8
    pub mem_size: u32,                  // bytes        2 MiB
    pub mem_cold_lat: Cycle,            // cpu          99
    pub mem_warm_lat: Cycle,            // cpu          10
    pub max_counter: u32,               // -            2049
    pub max_cycles: Option<Cycle>,      // cpu          unbounded
    pub check_invariants: bool,
    pub trace_bus: bool,
}

impl Default for SystemSpec {
    fn default() -> Self {
        SystemSpec {
            cache_size: 2048,
            cache_assoc: 8,
            mem_size: 2 * 1024 * 1024,
            mem_cold_lat: 99,
            mem_warm_lat: 10,
            max_counter: 2049,
            max_cycles: None,
            check_invariants: true,
            trace_bus: false,
        }
    }
}

impl SystemSpec {
    pub fn num_sets(&self) -> u32 {
        self.cache_size / (LINE_SIZE * self.cache_assoc.max(1))
    }
    pub fn index_bits(&self) -> u32 {
        self.num_sets().trailing_zeros()
    }
    pub fn mem_words(&self) -> usize {
        (self.mem_size / WORD_SIZE) as usize
    }
    pub fn validate(&self) -> SimResult<()> {
        if self.cache_assoc == 0 {
            return Err(SimError::ConfigError("associativity must be at least 1".into()));
        }
        let sets = self.num_sets();
        if sets == 0 || !sets.is_power_of_two() || sets * LINE_SIZE * self.cache_assoc != self.cache_size {
            return Err(SimError::ConfigError(format!(
                "cache of {} bytes with {}-way sets does not give a power-of-two number of {}-byte line sets",
                self.cache_size, self.cache_assoc, LINE_SIZE
            )));
        }
        if self.mem_size == 0 || self.mem_size % LINE_SIZE != 0 {
            return Err(SimError::ConfigError(format!(
                "memory of {} bytes is not a whole number of {}-byte lines",
                self.mem_size, LINE_SIZE
            )));
        }
        if self.mem_cold_lat == 0 || self.mem_warm_lat == 0 {
            return Err(SimError::ConfigError("memory latencies must be non-zero".into()));
        }
        if self.max_counter == 0 {
            return Err(SimError::ConfigError("recency counter maximum must be non-zero".into()));
        }
        Ok(())
    }
}

pub mod timing {
    use super::{Cycle, SystemSpec};

    /// tag lookup before a hit or miss is known
    pub const LOOKUP: Cycle = 1;
    /// one bus hand-off
    pub const TRANSFER: Cycle = 1;

    pub fn mem_service(spec: &SystemSpec, cold: bool) -> Cycle {
        if cold { spec.mem_cold_lat } else { spec.mem_warm_lat }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Addr(pub u32);

impl Addr {
    /// get cache index and tag of this address under given system specs
    pub fn pos(&self, specs: &SystemSpec) -> (usize, u32) {
        let index = (self.0 >> OFFSET_BITS) & (specs.num_sets() - 1);
        let tag = self.0 >> (OFFSET_BITS + specs.index_bits());
        (index as usize, tag)
    }
    /// inverse of `pos`, yields the line-aligned address
    pub fn from_pos(index: usize, tag: u32, specs: &SystemSpec) -> Self {
        Addr((tag << (OFFSET_BITS + specs.index_bits())) | ((index as u32) << OFFSET_BITS))
    }
    pub fn line(&self) -> Addr {
        Addr(self.0 & !(LINE_SIZE - 1))
    }
    /// word within the line
    pub fn word(&self) -> usize {
        ((self.0 & (LINE_SIZE - 1)) / WORD_SIZE) as usize
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instr {
    Read(Addr),
    Write(Addr, u32),
    Other(u32),
}

pub type Insts = Vec<Instr>;

// MESSAGE TYPES

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProcCacheReq {
    Read(Addr),
    Write(Addr, u32),
}

impl ProcCacheReq {
    pub fn addr(&self) -> Addr {
        match self {
            ProcCacheReq::Read(addr) | ProcCacheReq::Write(addr, _) => *addr,
        }
    }
    pub fn is_write(&self) -> bool {
        matches!(self, ProcCacheReq::Write(..))
    }
}

/// completion signal from a cache back to its core
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CacheProcResp {
    pub req: ProcCacheReq,
    /// value read, or value written
    pub value: u32,
    pub hit: bool,
    pub at: Cycle,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum LineState {
    #[default]
    Invalid,
    Modified,
    Owned,
    Exclusive,
    Shared,
    Requested,
}

impl LineState {
    pub fn has_data(&self) -> bool {
        matches!(self, LineState::Modified | LineState::Owned | LineState::Exclusive | LineState::Shared)
    }
    pub fn is_dirty(&self) -> bool {
        matches!(self, LineState::Modified | LineState::Owned)
    }
}

/// bus function codes as driven on the `func` wire
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum BusFunc {
    Nothing = 0,
    Read = 1,
    Write = 2,
    Invalidate = 3,
    Response = 4,
    Requested = 5,
}

/// who put data on the bus
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Source {
    Cache(CoreId),
    Dram,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Cache(id) => write!(f, "{}", id),
            // sentinel used on the wire for the memory controller
            Source::Dram => write!(f, "0xffffffff"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BusRequest {
    /// issuing core, or destination core for RESPONSE/REQUESTED
    pub requester: CoreId,
    pub source: Source,
    pub addr: Addr,
    pub func: BusFunc,
    /// out-of-band data lines
    pub data: Option<Block>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry_has_eight_sets() {
        let spec = SystemSpec::default();
        assert!(spec.validate().is_ok());
        assert_eq!(spec.num_sets(), 8);
        assert_eq!(spec.index_bits(), 3);
    }

    #[test]
    fn address_decomposition() {
        let spec = SystemSpec::default();
        // bits [7:5] select the set
        assert_eq!(Addr(0x1000).pos(&spec), (0, 0x10));
        assert_eq!(Addr(0x10e4).pos(&spec), (7, 0x10));
        assert_eq!(Addr(0x10e4).word(), 1);
        assert_eq!(Addr(0x10e4).line(), Addr(0x10e0));
        let (index, tag) = Addr(0xdead_beef).pos(&spec);
        assert_eq!(Addr::from_pos(index, tag, &spec), Addr(0xdead_beef).line());
    }

    #[test]
    fn rejects_bad_geometry() {
        let mut spec = SystemSpec::default();
        spec.cache_size = 3 * 32 * 8;
        assert!(spec.validate().is_err());
        spec = SystemSpec { cache_assoc: 0, ..Default::default() };
        assert!(spec.validate().is_err());
        spec = SystemSpec { mem_warm_lat: 0, ..Default::default() };
        assert!(spec.validate().is_err());
        // a line may not straddle the end of memory
        spec = SystemSpec { mem_size: 1024 + 4, ..Default::default() };
        assert!(spec.validate().is_err());
        spec = SystemSpec { mem_size: 1024 + LINE_SIZE, ..Default::default() };
        assert!(spec.validate().is_ok());
    }
}
