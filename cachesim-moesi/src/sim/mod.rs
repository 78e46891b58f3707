use std::collections::HashMap;

use log::{info, trace};

use crate::error::{SimError, SimResult};
use crate::moesi::*;
use crate::stats::{CoreReport, Report};

mod delayed_q;

pub use delayed_q::{DelayedMsg, DelayedQ};

/// how a logical process suspends after running
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Next {
    /// resume after this many cycles
    In(Cycle),
    /// wait for an event delivered by somebody else
    Park,
    Halt,
}

/// logical processes, in the order they run within one cycle
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Pid {
    Forwarder(CoreId),
    Memory,
    Core(CoreId),
    Cache(CoreId),
}

/// Global clock and wiring.
///
/// Every cycle first runs the processes due in that cycle in `Pid` order, which lets
/// cache-to-cache forwards and memory responses reach the bus before core requests.
/// Whatever got driven is then broadcast: caches snoop, memory snoops, and suspended
/// caches look for their response. Cycles with nothing due are skipped.
pub struct Simulator {
    specs: SystemSpec,
    bus: Bus,
    caches: Vec<Cache>,
    forwarders: Vec<Forwarder>,
    memory: MemoryController,
    procs: Vec<Processor>,
    queue: DelayedQ<Pid>,
}

impl Simulator {
    pub fn new(specs: SystemSpec, traces: Vec<Insts>) -> SimResult<Self> {
        specs.validate()?;
        if traces.is_empty() {
            return Err(SimError::ConfigError("at least one core trace is required".into()));
        }
        let num_cores = traces.len();
        let mut queue = DelayedQ::new();
        for i in 0..num_cores {
            queue.schedule(0, Pid::Core(i));
        }
        Ok(Simulator {
            specs,
            bus: Bus::new(specs.trace_bus),
            caches: (0..num_cores).map(|i| Cache::new(i, specs)).collect::<SimResult<_>>()?,
            forwarders: (0..num_cores).map(Forwarder::new).collect(),
            memory: MemoryController::new(specs),
            procs: traces.into_iter().enumerate().map(|(i, insts)| Processor::new(i, insts)).collect(),
            queue,
        })
    }

    /// run one cycle; false if nothing is left to run
    pub fn step(&mut self) -> SimResult<bool> {
        let Some(now) = self.queue.next_time() else { return Ok(false) };
        if let Some(limit) = self.specs.max_cycles {
            if now > limit {
                return Err(SimError::CycleLimitReached(limit));
            }
        }
        self.queue.update_time(now);
        self.bus.begin_period(now);
        while let Some(pid) = self.queue.try_fetch() {
            trace!("cycle {}: running {:?}", now, pid);
            self.run_process(pid);
        }
        self.broadcast();
        if self.specs.check_invariants {
            self.check_coherence()?;
        }
        Ok(true)
    }

    pub fn run(&mut self) -> SimResult<Report> {
        info!("simulating {} cores", self.procs.len());
        while !self.procs.iter().all(Processor::is_done) {
            if !self.step()? {
                return Err(SimError::Stalled(self.now()));
            }
        }
        info!("finished simulation in {} cycles", self.now());
        Ok(self.report())
    }

    fn reschedule(&mut self, pid: Pid, next: Next) {
        if let Next::In(d) = next {
            self.queue.send(DelayedMsg { t: d, msg: pid });
        }
    }

    fn run_process(&mut self, pid: Pid) {
        let now = self.now();
        match pid {
            Pid::Forwarder(i) => {
                let next = self.forwarders[i].on_tick(&mut self.bus, now);
                self.reschedule(pid, next);
            }
            Pid::Memory => {
                let next = self.memory.on_tick(&mut self.bus, now);
                self.reschedule(pid, next);
            }
            Pid::Core(i) => match self.procs[i].on_tick(now) {
                ProcStep::Issue(req) => {
                    self.caches[i].submit(req);
                    self.queue.schedule(now, Pid::Cache(i));
                }
                ProcStep::Wait(next) => self.reschedule(pid, next),
            },
            Pid::Cache(i) => {
                let step = self.caches[i].on_tick(&mut self.bus, now);
                if let Some(resp) = step.done {
                    self.procs[i].on_cache_resp(resp);
                    self.queue.send(DelayedMsg { t: 1, msg: Pid::Core(i) });
                }
                self.reschedule(pid, step.next);
            }
        }
    }

    fn broadcast(&mut self) {
        if !self.bus.controller_wait() {
            return;
        }
        let next = self.now() + 1;
        for i in 0..self.caches.len() {
            if let Some(job) = self.caches[i].snoop(&mut self.bus) {
                if self.forwarders[i].push(job) {
                    self.queue.schedule(next, Pid::Forwarder(i));
                }
            }
        }
        if self.memory.snoop(&self.bus) {
            self.queue.schedule(next, Pid::Memory);
        }
        for i in 0..self.caches.len() {
            if self.caches[i].observe(&self.bus) {
                self.queue.schedule(next, Pid::Cache(i));
            }
        }
    }

    /// no duplicate tags within a set, and at most one MODIFIED/EXCLUSIVE copy of any line
    pub fn check_coherence(&self) -> SimResult<()> {
        let violation = |detail: String| -> SimResult<()> {
            Err(SimError::CoherenceViolation { cycle: self.now(), detail })
        };
        let mut exclusive: HashMap<Addr, CoreId> = HashMap::new();
        for cache in &self.caches {
            if let Some(addr) = cache.duplicate_tag() {
                return violation(format!("cache {} holds {} twice", cache.id, addr));
            }
            for (addr, line) in cache.resident() {
                if !matches!(line.state, LineState::Modified | LineState::Exclusive) {
                    continue;
                }
                if let Some(other) = exclusive.insert(addr, cache.id) {
                    return violation(format!("caches {} and {} both hold {} exclusively", other, cache.id, addr));
                }
            }
        }
        Ok(())
    }

    pub fn report(&self) -> Report {
        Report {
            cycles: self.now(),
            cores: self
                .procs
                .iter()
                .zip(&self.caches)
                .zip(&self.forwarders)
                .map(|((core, cache), fwd)| CoreReport {
                    id: core.id,
                    done_at: core.done_at(),
                    other_cycles: core.other_cycles(),
                    cache: cache.stats().clone(),
                    forwards_sent: fwd.sent(),
                })
                .collect(),
            bus: self.bus.stats().clone(),
            memory: self.memory.stats().clone(),
        }
    }

    // inspection

    pub fn now(&self) -> Cycle {
        self.queue.time()
    }
    pub fn num_cores(&self) -> usize {
        self.procs.len()
    }
    pub fn bus(&self) -> &Bus {
        &self.bus
    }
    pub fn cache(&self, id: CoreId) -> &Cache {
        &self.caches[id]
    }
    pub fn processor(&self, id: CoreId) -> &Processor {
        &self.procs[id]
    }
    pub fn memory(&self) -> &MemoryController {
        &self.memory
    }
    /// state of `addr` in every cache, by core id
    pub fn line_states(&self, addr: Addr) -> Vec<LineState> {
        self.caches.iter().map(|c| c.line_state(addr)).collect()
    }
}
