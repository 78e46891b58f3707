use std::collections::VecDeque;

use log::trace;

use super::bus::Bus;
use super::common::*;
use crate::sim::Next;

/// a line (or a REQUESTED notice) one cache owes to a peer
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ForwardJob {
    pub dest: CoreId,
    pub addr: Addr,
    pub state: LineState,
    pub data: Option<Block>,
}

/// Cache-to-cache forwarding task of one cache.
///
/// The snoop side only pushes jobs here and never waits for the bus itself.
pub struct Forwarder {
    pub source: CoreId,
    queue: VecDeque<ForwardJob>,
    parked: bool,
    sent: u64,
}

impl Forwarder {
    pub fn new(source: CoreId) -> Self {
        Forwarder { source, queue: VecDeque::new(), parked: true, sent: 0 }
    }
    /// queue a job; true if the task was parked and has to be woken
    pub fn push(&mut self, job: ForwardJob) -> bool {
        self.queue.push_back(job);
        std::mem::replace(&mut self.parked, false)
    }
    pub fn on_tick(&mut self, bus: &mut Bus, now: Cycle) -> Next {
        let Some(job) = self.queue.front().copied() else {
            self.parked = true;
            return Next::Park;
        };
        if bus.cache_to_cache(job.dest, self.source, job.addr, job.state, job.data) {
            trace!("forwarder {}: cycle {}: {} to core {} as {:?}", self.source, now, job.addr, job.dest, job.state);
            self.queue.pop_front();
            self.sent += 1;
            return Next::In(timing::TRANSFER);
        }
        Next::In(1)
    }
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
    pub fn sent(&self) -> u64 {
        self.sent
    }
}
