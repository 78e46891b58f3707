use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use log::trace;

use super::common::*;

/// a single bus wire, `HighZ` when nobody drives it
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Wire<T> {
    HighZ,
    Driven(T),
}

impl<T: fmt::Display> fmt::Display for Wire<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wire::HighZ => write!(f, "Z"),
            Wire::Driven(v) => write!(f, "{}", v),
        }
    }
}

impl fmt::Display for BusFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BusFunc::Nothing => "NOTHING",
            BusFunc::Read => "READ",
            BusFunc::Write => "WRITE",
            BusFunc::Invalidate => "INVALIDATE",
            BusFunc::Response => "RESPONSE",
            BusFunc::Requested => "REQUESTED",
        };
        f.pad(name)
    }
}

/// the request fields as seen on the wires during one clock period
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BusWires {
    pub proc_id: Wire<CoreId>,
    pub source_id: Wire<Source>,
    pub addr: Wire<Addr>,
    pub func: Wire<BusFunc>,
}

impl fmt::Display for BusWires {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proc_id={} source_id={} addr={} func={}", self.proc_id, self.source_id, self.addr, self.func)
    }
}

// priority tiers, highest first
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Tier {
    CacheToCache,
    Memory,
    Core,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BusState {
    Unlocked,
    Locked(BusRequest),
}

#[derive(Clone, Default, Debug)]
pub struct BusStats {
    /// driven transfers, indexed by function code
    pub transfers: [u64; 6],
    /// attempts turned away because of a pending higher tier or a held arbiter
    pub rejected: u64,
}

/// Shared bus and arbiter.
///
/// At most one request is driven per clock period. Everything driven in period `t`
/// is broadcast to all snoopers within `t`; `begin_period` releases the arbiter and
/// returns the wires to the undriven state.
///
/// Ordinary core requests (`read`, `write`, `invalidate`) are non-blocking attempts
/// that back off whenever a response or a cache-to-cache forward intends to use the
/// bus. Arbitration is not fair: a core can starve under sustained higher-tier traffic.
pub struct Bus {
    now: Cycle,
    state: BusState,
    shared: bool,
    claimed: bool,
    response_intended: AtomicBool,
    c2c_intended: AtomicBool,
    stats: BusStats,
    history: Option<Vec<(Cycle, BusRequest)>>,
}

impl Bus {
    pub fn new(record: bool) -> Self {
        Bus {
            now: 0,
            state: BusState::Unlocked,
            shared: false,
            claimed: false,
            response_intended: AtomicBool::new(false),
            c2c_intended: AtomicBool::new(false),
            stats: BusStats::default(),
            history: record.then(Vec::new),
        }
    }

    // helper functions

    fn acquire(&mut self, tier: Tier, req: BusRequest) -> bool {
        let backoff = match tier {
            Tier::CacheToCache => false,
            Tier::Memory => self.c2c_intended.load(Ordering::Acquire),
            Tier::Core => {
                self.c2c_intended.load(Ordering::Acquire) || self.response_intended.load(Ordering::Acquire)
            }
        };
        if backoff || self.state != BusState::Unlocked {
            self.stats.rejected += 1;
            return false;
        }
        self.state = BusState::Locked(req);
        self.stats.transfers[req.func as usize] += 1;
        if let Some(history) = self.history.as_mut() {
            history.push((self.now, req));
        }
        trace!("bus: cycle {}: {}", self.now, self.wires());
        true
    }
    fn core_request(&mut self, core_id: CoreId, addr: Addr, func: BusFunc, data: Option<Block>) -> bool {
        let req = BusRequest { requester: core_id, source: Source::Cache(core_id), addr: addr.line(), func, data };
        self.acquire(Tier::Core, req)
    }

    // clock

    /// start clock period `now`, releasing whatever was driven in the previous one
    pub fn begin_period(&mut self, now: Cycle) {
        self.now = now;
        self.state = BusState::Unlocked;
        self.shared = false;
        self.claimed = false;
    }

    // tier 3

    pub fn read(&mut self, core_id: CoreId, addr: Addr) -> bool {
        self.core_request(core_id, addr, BusFunc::Read, None)
    }
    /// write-back; the victim's data travels out-of-band with the request
    pub fn write(&mut self, core_id: CoreId, addr: Addr, data: Block) -> bool {
        self.core_request(core_id, addr, BusFunc::Write, Some(data))
    }
    pub fn invalidate(&mut self, addr: Addr, core_id: CoreId) -> bool {
        self.core_request(core_id, addr, BusFunc::Invalidate, None)
    }

    // tiers 1 and 2
    //
    // Both raise their intent flag before trying, which keeps lower tiers off the
    // bus until they get through. Callers retry every cycle until they return true.

    pub fn memory_response(&mut self, core_id: CoreId, addr: Addr, data: Option<Block>) -> bool {
        self.response_intended.store(true, Ordering::Release);
        let req = BusRequest { requester: core_id, source: Source::Dram, addr: addr.line(), func: BusFunc::Response, data };
        let granted = self.acquire(Tier::Memory, req);
        if granted {
            self.response_intended.store(false, Ordering::Release);
        }
        granted
    }
    /// forward a line to `dest_id`; a REQUESTED line carries no data and becomes a REQUESTED notice
    pub fn cache_to_cache(&mut self, dest_id: CoreId, source_id: CoreId, addr: Addr, state: LineState, data: Option<Block>) -> bool {
        self.c2c_intended.store(true, Ordering::Release);
        let func = if state == LineState::Requested { BusFunc::Requested } else { BusFunc::Response };
        let req = BusRequest { requester: dest_id, source: Source::Cache(source_id), addr: addr.line(), func, data };
        let granted = self.acquire(Tier::CacheToCache, req);
        if granted {
            self.c2c_intended.store(false, Ordering::Release);
        }
        granted
    }

    // observers

    pub fn current(&self) -> Option<BusRequest> {
        match self.state {
            BusState::Unlocked => None,
            BusState::Locked(req) => Some(req),
        }
    }
    pub fn wires(&self) -> BusWires {
        match self.current() {
            None => BusWires { proc_id: Wire::HighZ, source_id: Wire::HighZ, addr: Wire::HighZ, func: Wire::HighZ },
            Some(req) => BusWires {
                proc_id: Wire::Driven(req.requester),
                source_id: Wire::Driven(req.source),
                addr: Wire::Driven(req.addr),
                func: Wire::Driven(req.func),
            },
        }
    }
    /// RESPONSE or REQUESTED notice for `core_id` about `addr`, if driven this period
    pub fn wait_for_response(&self, core_id: CoreId, addr: Addr) -> Option<BusRequest> {
        self.current().filter(|req| {
            req.requester == core_id
                && req.addr == addr.line()
                && matches!(req.func, BusFunc::Response | BusFunc::Requested)
        })
    }
    /// State to install for a data RESPONSE taken off the bus this period. Only a memory
    /// response nobody else showed interest in may be installed EXCLUSIVE.
    pub fn fill_state(&self, resp: &BusRequest, contended: bool) -> LineState {
        if contended || self.shared || resp.source != Source::Dram {
            LineState::Shared
        } else {
            LineState::Exclusive
        }
    }
    /// READ, WRITE or INVALIDATE driven this period by a core other than `core_id`
    pub fn wait_for_any(&self, core_id: CoreId) -> Option<BusRequest> {
        self.current().filter(|req| {
            req.requester != core_id && matches!(req.func, BusFunc::Read | BusFunc::Write | BusFunc::Invalidate)
        })
    }
    /// a request the memory controller has to serve: any WRITE, or a READ no cache claimed
    pub fn get_next_request(&self) -> Option<BusRequest> {
        self.current().filter(|req| match req.func {
            BusFunc::Write => true,
            BusFunc::Read => !self.claimed,
            _ => false,
        })
    }
    /// true when the bus function changed this period, which is what an idle controller waits for
    pub fn controller_wait(&self) -> bool {
        self.current().is_some()
    }

    // snoop side-band

    /// claim the current READ for a cache-to-cache forward; only the first caller gets it
    pub fn claim(&mut self) -> bool {
        !std::mem::replace(&mut self.claimed, true)
    }
    /// wired-OR shared line
    pub fn assert_shared(&mut self) {
        self.shared = true;
    }
    pub fn shared(&self) -> bool {
        self.shared
    }

    pub fn response_intended(&self) -> bool {
        self.response_intended.load(Ordering::Acquire)
    }
    pub fn c2c_intended(&self) -> bool {
        self.c2c_intended.load(Ordering::Acquire)
    }
    pub fn now(&self) -> Cycle {
        self.now
    }
    pub fn stats(&self) -> &BusStats {
        &self.stats
    }
    pub fn history(&self) -> &[(Cycle, BusRequest)] {
        self.history.as_deref().unwrap_or(&[])
    }
}
