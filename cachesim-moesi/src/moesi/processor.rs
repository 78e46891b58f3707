use std::collections::VecDeque;

use log::{debug, info};

use super::common::*;
use crate::sim::Next;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ProcState {
    #[default]
    Idle,
    ExecutingOther,
    WaitingForCache,
    Done,
}

pub enum ProcStep {
    /// hand a request to the cache, which runs in the same cycle
    Issue(ProcCacheReq),
    Wait(Next),
}

/// Core driver: replays one trace into its cache, one request at a time.
pub struct Processor {
    pub id: CoreId,
    pub state: ProcState,
    insts: VecDeque<Instr>,
    completed: Vec<CacheProcResp>,
    other_cycles: u64,
    done_at: Option<Cycle>,
}

impl Processor {
    pub fn new(id: CoreId, insts: Insts) -> Self {
        Processor {
            id,
            state: ProcState::Idle,
            insts: insts.into(),
            completed: Vec::new(),
            other_cycles: 0,
            done_at: None,
        }
    }
    pub fn on_tick(&mut self, now: Cycle) -> ProcStep {
        match self.insts.pop_front() {
            None => {
                info!("core {}: trace finished at cycle {}", self.id, now);
                self.state = ProcState::Done;
                self.done_at = Some(now);
                ProcStep::Wait(Next::Halt)
            }
            Some(Instr::Read(addr)) => {
                self.state = ProcState::WaitingForCache;
                ProcStep::Issue(ProcCacheReq::Read(addr))
            }
            Some(Instr::Write(addr, value)) => {
                self.state = ProcState::WaitingForCache;
                ProcStep::Issue(ProcCacheReq::Write(addr, value))
            }
            Some(Instr::Other(d)) => {
                // every cycle of other work is one NOP
                let d = Cycle::from(d.max(1));
                self.state = ProcState::ExecutingOther;
                self.other_cycles += d;
                ProcStep::Wait(Next::In(d))
            }
        }
    }
    /// completion signal from the cache; the core carries on in the next cycle
    pub fn on_cache_resp(&mut self, resp: CacheProcResp) {
        debug!("core {}: cycle {}: {:?} -> {:#x}", self.id, resp.at, resp.req, resp.value);
        self.state = ProcState::Idle;
        self.completed.push(resp);
    }
    pub fn is_done(&self) -> bool {
        self.state == ProcState::Done
    }
    pub fn done_at(&self) -> Option<Cycle> {
        self.done_at
    }
    pub fn completed(&self) -> &[CacheProcResp] {
        &self.completed
    }
    /// values returned by completed reads, in program order
    pub fn reads(&self) -> impl Iterator<Item = (Addr, u32)> + '_ {
        self.completed.iter().filter_map(|r| match r.req {
            ProcCacheReq::Read(addr) => Some((addr, r.value)),
            ProcCacheReq::Write(..) => None,
        })
    }
    pub fn other_cycles(&self) -> u64 {
        self.other_cycles
    }
}
