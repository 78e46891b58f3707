use log::debug;

use super::bus::Bus;
use super::common::*;
use super::forwarder::ForwardJob;
use crate::error::SimResult;
use crate::sim::Next;

// data cache

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheLine {
    pub counter: u32,
    pub state: LineState,
    pub tag: u32,
    pub data: Block,
}

#[derive(Clone)]
struct CacheSet {
    lines: Vec<CacheLine>,
}

impl CacheSet {
    fn new(assoc: usize) -> Self {
        CacheSet { lines: vec![CacheLine::default(); assoc] }
    }
    fn find(&self, tag: u32) -> Option<usize> {
        self.lines.iter().position(|l| l.state != LineState::Invalid && l.tag == tag)
    }
    /// hit way or eviction candidate; every other line ages by one
    fn lookup(&mut self, tag: u32) -> Result<usize, usize> {
        let hit = self.find(tag);
        for (way, line) in self.lines.iter_mut().enumerate() {
            if hit != Some(way) {
                line.counter = line.counter.saturating_sub(1);
            }
        }
        hit.ok_or_else(|| self.victim())
    }
    fn victim(&self) -> usize {
        self.lines
            .iter()
            .position(|l| l.state == LineState::Invalid)
            .or_else(|| {
                self.lines
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, l)| l.counter)
                    .map(|(way, _)| way)
            })
            .unwrap_or(0)
    }
}

// cache

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum CacheState {
    Idle,
    Lookup,
    Resolve { way: usize, hit: bool },
    Upgrade { way: usize },
    Promote { way: usize },
    WriteBack { way: usize, victim: Addr },
    AwaitWriteBack { way: usize, victim: Addr },
    Fill { way: usize },
    AwaitFill { way: usize },
    Installed { way: usize },
}

#[derive(Clone, Copy, Debug)]
struct Access {
    req: ProcCacheReq,
    missed: bool,
    /// a peer showed interest in the line while it was being fetched
    contended: bool,
}

#[derive(Clone, Default, Debug)]
pub struct CacheStats {
    pub read_hits: u64,
    pub read_misses: u64,
    pub write_hits: u64,
    pub write_misses: u64,
    pub write_backs: u64,
    pub invalidations_sent: u64,
    pub invalidated: u64,
    pub forwards: u64,
    pub restarts: u64,
    pub bus_acquisitions: u64,
    pub bus_wait_cycles: u64,
}

pub struct CacheStep {
    pub next: Next,
    pub done: Option<CacheProcResp>,
}

impl CacheStep {
    fn wait(d: Cycle) -> Self {
        CacheStep { next: Next::In(d), done: None }
    }
    fn park() -> Self {
        CacheStep { next: Next::Park, done: None }
    }
}

/// Private cache of one core.
///
/// Two logical processes share the line array. The execute side (`submit`, `on_tick`,
/// `observe`) serves the core one request at a time. The snoop side (`snoop`) reacts to
/// peer traffic and may invalidate or downgrade any line at any broadcast, so the
/// execute side re-checks its line after every suspension and restarts from lookup
/// when the line was taken away.
pub struct Cache {
    pub id: CoreId,
    specs: SystemSpec,
    state: CacheState,
    sets: Vec<CacheSet>,
    access: Option<Access>,
    stats: CacheStats,
}

impl Cache {
    pub fn new(id: CoreId, specs: SystemSpec) -> SimResult<Self> {
        specs.validate()?;
        Ok(Cache {
            id,
            specs,
            state: CacheState::Idle,
            sets: vec![CacheSet::new(specs.cache_assoc as usize); specs.num_sets() as usize],
            access: None,
            stats: CacheStats::default(),
        })
    }

    // helper functions

    fn restart(&mut self) -> CacheStep {
        debug!("cache {}: line lost to a peer, restarting lookup", self.id);
        self.stats.restarts += 1;
        self.state = CacheState::Lookup;
        CacheStep::wait(1)
    }
    fn bus_retry(&mut self) -> CacheStep {
        self.stats.bus_wait_cycles += 1;
        CacheStep::wait(1)
    }
    fn complete(&mut self, index: usize, way: usize, now: Cycle) -> CacheStep {
        let Some(access) = self.access.take() else {
            self.state = CacheState::Idle;
            return CacheStep::park();
        };
        let line = &mut self.sets[index].lines[way];
        line.counter = self.specs.max_counter;
        let value = match access.req {
            ProcCacheReq::Read(addr) => line.data[addr.word()],
            ProcCacheReq::Write(addr, value) => {
                line.state = LineState::Modified;
                line.data[addr.word()] = value;
                value
            }
        };
        let stat = match (access.req.is_write(), access.missed) {
            (false, false) => &mut self.stats.read_hits,
            (false, true) => &mut self.stats.read_misses,
            (true, false) => &mut self.stats.write_hits,
            (true, true) => &mut self.stats.write_misses,
        };
        *stat += 1;
        debug!("cache {}: cycle {}: {:?} done, {:#x} ({})", self.id, now, access.req, value,
            if access.missed { "miss" } else { "hit" });
        self.state = CacheState::Idle;
        CacheStep {
            next: Next::Park,
            done: Some(CacheProcResp { req: access.req, value, hit: !access.missed, at: now }),
        }
    }

    // execute side

    /// accept the next request of the core; the cache has to be ticked in the same cycle
    pub fn submit(&mut self, req: ProcCacheReq) {
        debug_assert!(self.state == CacheState::Idle, "cache {} is busy", self.id);
        self.access = Some(Access { req, missed: false, contended: false });
        self.state = CacheState::Lookup;
    }

    pub fn on_tick(&mut self, bus: &mut Bus, now: Cycle) -> CacheStep {
        let Some(access) = self.access else {
            self.state = CacheState::Idle;
            return CacheStep::park();
        };
        let addr = access.req.addr();
        let (index, tag) = addr.pos(&self.specs);
        loop {
            match self.state {
                CacheState::Idle | CacheState::AwaitWriteBack { .. } | CacheState::AwaitFill { .. } => {
                    return CacheStep::park();
                }
                CacheState::Lookup => {
                    let (way, hit) = match self.sets[index].lookup(tag) {
                        Ok(way) => (way, true),
                        Err(way) => (way, false),
                    };
                    self.state = CacheState::Resolve { way, hit };
                    return CacheStep::wait(timing::LOOKUP);
                }
                CacheState::Resolve { way, hit: true } => {
                    let line = &mut self.sets[index].lines[way];
                    if !line.state.has_data() || line.tag != tag {
                        return self.restart();
                    }
                    line.counter = self.specs.max_counter;
                    match (access.req, line.state) {
                        (ProcCacheReq::Read(_), _)
                        | (ProcCacheReq::Write(..), LineState::Modified | LineState::Exclusive) => {
                            return self.complete(index, way, now);
                        }
                        (ProcCacheReq::Write(..), _) => self.state = CacheState::Upgrade { way },
                    }
                }
                CacheState::Resolve { way, hit: false } => {
                    if let Some(a) = self.access.as_mut() {
                        a.missed = true;
                    }
                    let line = self.sets[index].lines[way];
                    self.state = if line.state.is_dirty() {
                        CacheState::WriteBack { way, victim: Addr::from_pos(index, line.tag, &self.specs) }
                    } else {
                        CacheState::Fill { way }
                    };
                }
                CacheState::Upgrade { way } => {
                    let line = &self.sets[index].lines[way];
                    if !line.state.has_data() || line.tag != tag {
                        return self.restart();
                    }
                    if !bus.invalidate(addr, self.id) {
                        return self.bus_retry();
                    }
                    self.stats.invalidations_sent += 1;
                    self.stats.bus_acquisitions += 1;
                    self.state = CacheState::Promote { way };
                    return CacheStep::wait(timing::TRANSFER);
                }
                CacheState::Promote { way } => return self.complete(index, way, now),
                CacheState::WriteBack { way, victim } => {
                    let line = self.sets[index].lines[way];
                    if !line.state.is_dirty() || Addr::from_pos(index, line.tag, &self.specs) != victim {
                        // a peer took the line over, nothing left to write back
                        self.state = CacheState::Fill { way };
                        continue;
                    }
                    if !bus.write(self.id, victim, line.data) {
                        return self.bus_retry();
                    }
                    debug!("cache {}: cycle {}: writing back {}", self.id, now, victim);
                    self.stats.write_backs += 1;
                    self.stats.bus_acquisitions += 1;
                    self.state = CacheState::AwaitWriteBack { way, victim };
                    return CacheStep::park();
                }
                CacheState::Fill { way } => {
                    let line = &mut self.sets[index].lines[way];
                    if line.state != LineState::Requested || line.tag != tag {
                        *line = CacheLine { counter: self.specs.max_counter, state: LineState::Requested, tag, data: Block::default() };
                        if let Some(a) = self.access.as_mut() {
                            a.contended = false;
                        }
                    }
                    if !bus.read(self.id, addr) {
                        return self.bus_retry();
                    }
                    self.stats.bus_acquisitions += 1;
                    self.state = CacheState::AwaitFill { way };
                    return CacheStep::park();
                }
                CacheState::Installed { way } => {
                    let line = &self.sets[index].lines[way];
                    if !line.state.has_data() || line.tag != tag {
                        return self.restart();
                    }
                    match (access.req, line.state) {
                        // one invalidate round-trip, same as a write hit on a shared line
                        (ProcCacheReq::Write(..), LineState::Shared) => self.state = CacheState::Upgrade { way },
                        _ => return self.complete(index, way, now),
                    }
                }
            }
        }
    }

    /// deliver this period's bus traffic to a suspended execute side; true if it woke up
    pub fn observe(&mut self, bus: &Bus) -> bool {
        let Some(access) = self.access else { return false };
        match self.state {
            CacheState::AwaitWriteBack { way, victim } => {
                match bus.wait_for_response(self.id, victim) {
                    Some(resp) if resp.func == BusFunc::Response && resp.source == Source::Dram => {
                        self.state = CacheState::Fill { way };
                        true
                    }
                    _ => false,
                }
            }
            CacheState::AwaitFill { way } => {
                let addr = access.req.addr();
                let Some(resp) = bus.wait_for_response(self.id, addr) else { return false };
                if resp.func == BusFunc::Requested {
                    if let Some(a) = self.access.as_mut() {
                        a.contended = true;
                    }
                    return false;
                }
                let (index, tag) = addr.pos(&self.specs);
                let line = &mut self.sets[index].lines[way];
                if line.state != LineState::Requested || line.tag != tag {
                    // invalidated while the fill was in flight, the data is stale
                    self.stats.restarts += 1;
                    self.state = CacheState::Lookup;
                    return true;
                }
                line.state = bus.fill_state(&resp, access.contended);
                line.counter = self.specs.max_counter;
                line.data = resp.data.unwrap_or_default();
                debug!("cache {}: cycle {}: filled {} as {:?} from {}", self.id, bus.now(), addr.line(), line.state, resp.source);
                self.state = CacheState::Installed { way };
                true
            }
            _ => false,
        }
    }

    // snoop side

    /// react to peer traffic driven this period; may hand back a forward for the forwarding task
    pub fn snoop(&mut self, bus: &mut Bus) -> Option<ForwardJob> {
        let current = bus.current()?;
        if current.func == BusFunc::Response && current.requester != self.id {
            if self.holds(current.addr) {
                bus.assert_shared();
            }
            return None;
        }
        let req = bus.wait_for_any(self.id)?;
        let (index, tag) = req.addr.pos(&self.specs);
        let way = self.sets[index].find(tag)?;
        let line = &mut self.sets[index].lines[way];
        match req.func {
            BusFunc::Write | BusFunc::Invalidate => {
                debug!("cache {}: cycle {}: {} invalidated by core {} ({:?})", self.id, bus.now(), req.addr, req.requester, line.state);
                line.state = LineState::Invalid;
                self.stats.invalidated += 1;
                None
            }
            BusFunc::Read if line.state == LineState::Requested => {
                if let Some(a) = self.access.as_mut() {
                    a.contended = true;
                }
                Some(ForwardJob { dest: req.requester, addr: req.addr, state: LineState::Requested, data: None })
            }
            BusFunc::Read => {
                line.state = match line.state {
                    LineState::Modified => LineState::Owned,
                    LineState::Exclusive => LineState::Shared,
                    s => s,
                };
                if !bus.claim() {
                    return None;
                }
                debug!("cache {}: cycle {}: forwarding {} to core {} ({:?})", self.id, bus.now(), req.addr, req.requester, line.state);
                self.stats.forwards += 1;
                Some(ForwardJob { dest: req.requester, addr: req.addr, state: line.state, data: Some(line.data) })
            }
            _ => None,
        }
    }

    // inspection

    /// true if any line, including one still being fetched, carries this address
    pub fn holds(&self, addr: Addr) -> bool {
        let (index, tag) = addr.pos(&self.specs);
        self.sets[index].find(tag).is_some()
    }
    pub fn line(&self, addr: Addr) -> Option<&CacheLine> {
        let (index, tag) = addr.pos(&self.specs);
        self.sets[index].find(tag).map(|way| &self.sets[index].lines[way])
    }
    pub fn line_state(&self, addr: Addr) -> LineState {
        self.line(addr).map(|l| l.state).unwrap_or_default()
    }
    /// every non-invalid line with its line address
    pub fn resident(&self) -> impl Iterator<Item = (Addr, &CacheLine)> + '_ {
        self.sets.iter().enumerate().flat_map(move |(index, set)| {
            set.lines
                .iter()
                .filter(|l| l.state != LineState::Invalid)
                .map(move |l| (Addr::from_pos(index, l.tag, &self.specs), l))
        })
    }
    /// first set holding two live lines with the same tag
    pub fn duplicate_tag(&self) -> Option<Addr> {
        self.sets.iter().enumerate().find_map(|(index, set)| {
            set.lines.iter().enumerate().find_map(|(way, l)| {
                let dup = l.state != LineState::Invalid
                    && set.lines[way + 1..].iter().any(|o| o.state != LineState::Invalid && o.tag == l.tag);
                dup.then(|| Addr::from_pos(index, l.tag, &self.specs))
            })
        })
    }
    pub fn is_idle(&self) -> bool {
        self.state == CacheState::Idle
    }
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(state: LineState, tag: u32, counter: u32) -> CacheLine {
        CacheLine { counter, state, tag, data: Block::default() }
    }

    #[test]
    fn lookup_ages_other_lines() {
        let mut set = CacheSet::new(4);
        set.lines[0] = line(LineState::Shared, 1, 5);
        set.lines[1] = line(LineState::Modified, 2, 0);
        set.lines[2] = line(LineState::Exclusive, 3, 9);
        set.lines[3] = line(LineState::Invalid, 4, 3);
        assert_eq!(set.lookup(3), Ok(2));
        let counters: Vec<_> = set.lines.iter().map(|l| l.counter).collect();
        // floor at zero, the hit keeps its value
        assert_eq!(counters, vec![4, 0, 9, 2]);
    }

    #[test]
    fn victim_prefers_invalid_then_lru() {
        let mut set = CacheSet::new(3);
        set.lines[0] = line(LineState::Shared, 1, 1);
        set.lines[1] = line(LineState::Invalid, 2, 0);
        set.lines[2] = line(LineState::Owned, 3, 7);
        assert_eq!(set.lookup(9), Err(1));
        set.lines[1] = line(LineState::Exclusive, 2, 4);
        // counters are now 0, 3, 5
        assert_eq!(set.lookup(9), Err(0));
        // an invalid line with a matching tag is no hit
        set.lines[0].state = LineState::Invalid;
        assert_eq!(set.lookup(1), Err(0));
    }

    #[test]
    fn read_hit_refreshes_recency() {
        let specs = SystemSpec::default();
        let mut bus = Bus::new(false);
        let mut cache = Cache::new(0, specs).unwrap();
        let addr = Addr(0x1000);
        let (index, tag) = addr.pos(&specs);
        cache.sets[index].lines[5] = CacheLine { counter: 10, state: LineState::Exclusive, tag, data: [42; WORDS_PER_LINE] };

        cache.submit(ProcCacheReq::Read(addr));
        bus.begin_period(0);
        assert!(matches!(cache.on_tick(&mut bus, 0).next, Next::In(1)));
        bus.begin_period(1);
        let step = cache.on_tick(&mut bus, 1);
        let done = step.done.unwrap();
        assert_eq!(done.value, 42);
        assert!(done.hit);
        assert_eq!(cache.line(addr).unwrap().counter, specs.max_counter);
        assert!(bus.current().is_none());
        assert!(cache.is_idle());
    }

    #[test]
    fn read_hit_restarts_after_invalidation() {
        let specs = SystemSpec::default();
        let mut bus = Bus::new(false);
        let mut cache = Cache::new(1, specs).unwrap();
        let addr = Addr(0x3000);
        let (index, tag) = addr.pos(&specs);
        cache.sets[index].lines[0] = line(LineState::Shared, tag, 3);

        cache.submit(ProcCacheReq::Read(addr));
        bus.begin_period(0);
        cache.on_tick(&mut bus, 0);
        // a peer invalidates between lookup and delivery
        assert!(bus.invalidate(addr, 0));
        assert!(cache.snoop(&mut bus).is_none());
        assert_eq!(cache.line_state(addr), LineState::Invalid);

        bus.begin_period(1);
        let step = cache.on_tick(&mut bus, 1);
        assert!(step.done.is_none());
        assert_eq!(cache.stats().restarts, 1);
        // the restarted lookup misses and goes to the bus
        bus.begin_period(2);
        cache.on_tick(&mut bus, 2);
        bus.begin_period(3);
        assert!(matches!(cache.on_tick(&mut bus, 3).next, Next::Park));
        assert_eq!(bus.current().map(|r| r.func), Some(BusFunc::Read));
        assert_eq!(cache.line_state(addr), LineState::Requested);
    }

    #[test]
    fn snoop_read_downgrades_and_forwards_once() {
        let specs = SystemSpec::default();
        let mut bus = Bus::new(false);
        let addr = Addr(0x2000);
        let (index, tag) = addr.pos(&specs);
        let mut owner = Cache::new(0, specs).unwrap();
        owner.sets[index].lines[2] = CacheLine { counter: 1, state: LineState::Modified, tag, data: [5; WORDS_PER_LINE] };
        let mut sharer = Cache::new(2, specs).unwrap();
        sharer.sets[index].lines[0] = line(LineState::Shared, tag, 1);

        bus.begin_period(0);
        assert!(bus.read(1, addr));
        let job = owner.snoop(&mut bus).unwrap();
        assert_eq!(job.dest, 1);
        assert_eq!(job.data, Some([5; WORDS_PER_LINE]));
        assert_eq!(owner.line_state(addr), LineState::Owned);
        // already claimed
        assert!(sharer.snoop(&mut bus).is_none());
        assert!(bus.get_next_request().is_none());
    }

    #[test]
    fn snoop_read_on_requested_line_sends_notice() {
        let specs = SystemSpec::default();
        let mut bus = Bus::new(false);
        let addr = Addr(0x5000);
        let mut cache = Cache::new(0, specs).unwrap();
        cache.submit(ProcCacheReq::Read(addr));
        bus.begin_period(0);
        cache.on_tick(&mut bus, 0);
        bus.begin_period(1);
        cache.on_tick(&mut bus, 1);
        assert_eq!(cache.line_state(addr), LineState::Requested);

        bus.begin_period(2);
        assert!(bus.read(1, addr));
        let job = cache.snoop(&mut bus).unwrap();
        assert_eq!(job.state, LineState::Requested);
        assert_eq!(job.data, None);
        // nobody claimed the read, memory has to serve it
        assert!(bus.get_next_request().is_some());

        // memory answers the first reader, who installs shared
        bus.begin_period(30);
        assert!(bus.memory_response(0, addr, Some([3; WORDS_PER_LINE])));
        assert!(cache.observe(&bus));
        assert_eq!(cache.line_state(addr), LineState::Shared);
    }

    #[test]
    fn duplicate_tags_are_reported() {
        let specs = SystemSpec::default();
        let mut cache = Cache::new(0, specs).unwrap();
        assert_eq!(cache.duplicate_tag(), None);
        cache.sets[3].lines[1] = line(LineState::Shared, 7, 0);
        cache.sets[3].lines[6] = line(LineState::Owned, 7, 0);
        assert_eq!(cache.duplicate_tag(), Some(Addr::from_pos(3, 7, &specs)));
        assert_eq!(cache.resident().count(), 2);
    }

    #[test]
    fn write_hit_restarts_when_line_lost_before_invalidate() {
        let specs = SystemSpec::default();
        let mut bus = Bus::new(false);
        let mut cache = Cache::new(1, specs).unwrap();
        let addr = Addr(0x3000);
        let (index, tag) = addr.pos(&specs);
        cache.sets[index].lines[0] = line(LineState::Shared, tag, 3);

        cache.submit(ProcCacheReq::Write(addr, 5));
        bus.begin_period(0);
        assert_eq!(cache.on_tick(&mut bus, 0).next, Next::In(1));
        // the invalidate loses arbitration
        bus.begin_period(1);
        assert!(bus.read(3, Addr(0x8000)));
        assert_eq!(cache.on_tick(&mut bus, 1).next, Next::In(1));
        // and again, to a peer invalidating the same line
        bus.begin_period(2);
        assert!(bus.invalidate(addr, 0));
        assert_eq!(cache.on_tick(&mut bus, 2).next, Next::In(1));
        assert!(cache.snoop(&mut bus).is_none());
        assert_eq!(cache.line_state(addr), LineState::Invalid);

        bus.begin_period(3);
        let step = cache.on_tick(&mut bus, 3);
        assert!(step.done.is_none());
        assert_eq!(cache.stats().restarts, 1);
        assert!(bus.current().is_none());
        // full lookup, then a fill instead of another invalidate
        bus.begin_period(4);
        cache.on_tick(&mut bus, 4);
        bus.begin_period(5);
        assert_eq!(cache.on_tick(&mut bus, 5).next, Next::Park);
        assert_eq!(bus.current().map(|r| (r.func, r.requester)), Some((BusFunc::Read, 1)));
        assert_eq!(cache.stats().invalidations_sent, 0);
    }

    #[test]
    fn write_back_skipped_when_victim_lost() {
        let specs = SystemSpec::default();
        let mut bus = Bus::new(false);
        let mut cache = Cache::new(0, specs).unwrap();
        let addr = Addr(0x9000);
        let (index, tag) = addr.pos(&specs);
        for (way, l) in cache.sets[index].lines.iter_mut().enumerate() {
            *l = line(LineState::Shared, 0x10 + way as u32, 100);
        }
        // least recently used and dirty, a peer holds a shared copy
        cache.sets[index].lines[4] = line(LineState::Owned, 0x40, 0);
        let victim = Addr::from_pos(index, 0x40, &specs);

        cache.submit(ProcCacheReq::Read(addr));
        bus.begin_period(0);
        cache.on_tick(&mut bus, 0);
        // the peer upgrades its copy before the write-back gets the bus
        bus.begin_period(1);
        assert!(bus.invalidate(victim, 2));
        assert_eq!(cache.on_tick(&mut bus, 1).next, Next::In(1));
        assert!(cache.snoop(&mut bus).is_none());
        assert_eq!(cache.line_state(victim), LineState::Invalid);

        bus.begin_period(2);
        assert_eq!(cache.on_tick(&mut bus, 2).next, Next::Park);
        assert_eq!(bus.current().map(|r| (r.func, r.addr)), Some((BusFunc::Read, addr)));
        assert_eq!(cache.stats().write_backs, 0);
        assert_eq!(cache.line_state(addr), LineState::Requested);
        assert_eq!(cache.sets[index].lines[4].tag, tag);
    }

    #[test]
    fn fill_invalidated_in_flight_is_discarded() {
        let specs = SystemSpec::default();
        let mut bus = Bus::new(false);
        let mut cache = Cache::new(0, specs).unwrap();
        let addr = Addr(0x5000);
        cache.submit(ProcCacheReq::Read(addr));
        bus.begin_period(0);
        cache.on_tick(&mut bus, 0);
        bus.begin_period(1);
        assert_eq!(cache.on_tick(&mut bus, 1).next, Next::Park);

        // a peer upgrades its copy while the read sits in the memory queue
        bus.begin_period(2);
        assert!(bus.invalidate(addr, 1));
        assert!(cache.snoop(&mut bus).is_none());
        assert!(!cache.observe(&bus));
        assert_eq!(cache.line_state(addr), LineState::Invalid);

        bus.begin_period(40);
        assert!(bus.memory_response(0, addr, Some([8; WORDS_PER_LINE])));
        assert!(cache.observe(&bus));
        assert_eq!(cache.stats().restarts, 1);
        assert!(cache.line(addr).is_none());
        assert!(!cache.is_idle());

        // back to lookup, which misses again
        bus.begin_period(41);
        assert_eq!(cache.on_tick(&mut bus, 41).next, Next::In(1));
        bus.begin_period(42);
        assert_eq!(cache.on_tick(&mut bus, 42).next, Next::Park);
        assert_eq!(cache.line_state(addr), LineState::Requested);
    }

    #[test]
    fn rejects_unusable_geometry() {
        let specs = SystemSpec { cache_assoc: 0, ..Default::default() };
        assert!(Cache::new(0, specs).is_err());
    }
}
