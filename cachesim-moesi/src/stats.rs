use std::fmt;

use crate::moesi::{BusFunc, BusStats, CacheStats, CoreId, Cycle, MemoryStats};

#[derive(Clone, Debug)]
pub struct CoreReport {
    pub id: CoreId,
    pub done_at: Option<Cycle>,
    /// cycles spent on non-memory instructions
    pub other_cycles: u64,
    pub cache: CacheStats,
    pub forwards_sent: u64,
}

impl CoreReport {
    pub fn reads(&self) -> u64 {
        self.cache.read_hits + self.cache.read_misses
    }
    pub fn writes(&self) -> u64 {
        self.cache.write_hits + self.cache.write_misses
    }
    pub fn hit_rate(&self) -> f64 {
        let total = self.reads() + self.writes();
        if total == 0 {
            return 0.0;
        }
        (self.cache.read_hits + self.cache.write_hits) as f64 / total as f64 * 100.0
    }
}

#[derive(Clone, Debug)]
pub struct Report {
    pub cycles: Cycle,
    pub cores: Vec<CoreReport>,
    pub bus: BusStats,
    pub memory: MemoryStats,
}

impl Report {
    pub fn main_memory_accesses(&self) -> u64 {
        self.memory.reads + self.memory.writes
    }
    /// cycles a core spends retrying before it gets the bus, per acquisition
    pub fn avg_bus_acquisition(&self) -> f64 {
        let acquisitions: u64 = self.cores.iter().map(|c| c.cache.bus_acquisitions).sum();
        let waited: u64 = self.cores.iter().map(|c| c.cache.bus_wait_cycles).sum();
        if acquisitions == 0 {
            return 0.0;
        }
        waited as f64 / acquisitions as f64
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "finished simulation in {} cycles", self.cycles)?;
        writeln!(f, "{:>4} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
            "CPU", "Reads", "RHit", "RMiss", "Writes", "WHit", "WMiss", "WBack", "Hitrate")?;
        for c in &self.cores {
            writeln!(f, "{:>4} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>7.2}%",
                c.id, c.reads(), c.cache.read_hits, c.cache.read_misses,
                c.writes(), c.cache.write_hits, c.cache.write_misses, c.cache.write_backs, c.hit_rate())?;
        }
        writeln!(f)?;
        for func in [BusFunc::Read, BusFunc::Write, BusFunc::Invalidate, BusFunc::Response, BusFunc::Requested] {
            writeln!(f, "bus {:<10} {:>10}", func, self.bus.transfers[func as usize])?;
        }
        writeln!(f, "bus rejected attempts {:>10}", self.bus.rejected)?;
        writeln!(f, "main memory accesses {:>11}", self.main_memory_accesses())?;
        write!(f, "average bus acquisition time: {:.2} cycles", self.avg_bus_acquisition())
    }
}
