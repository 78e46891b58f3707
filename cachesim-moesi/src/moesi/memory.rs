use std::collections::VecDeque;

use log::debug;

use super::bus::Bus;
use super::common::*;
use crate::sim::Next;

enum Service {
    Idle,
    Busy { req: BusRequest, ready_at: Cycle },
    Responding { req: BusRequest, data: Option<Block> },
}

#[derive(Clone, Default, Debug)]
pub struct MemoryStats {
    pub reads: u64,
    pub writes: u64,
    pub dropped_writes: u64,
}

/// Main memory behind the bus.
///
/// The snoop half (`snoop`) queues every WRITE and every READ no cache claimed. The
/// service half (`on_tick`) parks while the queue is empty and then works through it
/// in order. The first request after idling pays the cold latency, back-to-back ones
/// the warm latency.
pub struct MemoryController {
    specs: SystemSpec,
    words: Vec<u32>,
    queue: VecDeque<BusRequest>,
    service: Service,
    cold: bool,
    parked: bool,
    stats: MemoryStats,
}

impl MemoryController {
    pub fn new(specs: SystemSpec) -> Self {
        MemoryController {
            specs,
            words: vec![0; specs.mem_words()],
            queue: VecDeque::new(),
            service: Service::Idle,
            cold: true,
            parked: true,
            stats: MemoryStats::default(),
        }
    }

    // backing store, out-of-range reads yield zero and out-of-range writes are dropped

    pub fn read_word(&self, addr: Addr) -> u32 {
        self.words.get((addr.0 / WORD_SIZE) as usize).copied().unwrap_or(0)
    }
    pub fn read_block(&self, addr: Addr) -> Block {
        let base = addr.line();
        let mut block = Block::default();
        for (i, word) in block.iter_mut().enumerate() {
            *word = self.read_word(Addr(base.0.wrapping_add(i as u32 * WORD_SIZE)));
        }
        block
    }
    pub fn write_block(&mut self, addr: Addr, block: &Block) {
        let base = (addr.line().0 / WORD_SIZE) as usize;
        match self.words.get_mut(base..base + WORDS_PER_LINE) {
            Some(dst) => dst.copy_from_slice(block),
            None => {
                debug!("memory: dropping write-back to {} beyond {} bytes", addr, self.specs.mem_size);
                self.stats.dropped_writes += 1;
            }
        }
    }

    /// snoop half: take this period's request off the bus if it is ours; true if the
    /// service half was parked and has to be woken
    pub fn snoop(&mut self, bus: &Bus) -> bool {
        let Some(req) = bus.get_next_request() else { return false };
        self.enqueue(req)
    }
    pub fn enqueue(&mut self, req: BusRequest) -> bool {
        self.queue.push_back(req);
        std::mem::replace(&mut self.parked, false)
    }

    /// service half
    pub fn on_tick(&mut self, bus: &mut Bus, now: Cycle) -> Next {
        loop {
            match self.service {
                Service::Idle => {
                    let Some(req) = self.queue.pop_front() else {
                        self.cold = true;
                        self.parked = true;
                        return Next::Park;
                    };
                    let delay = timing::mem_service(&self.specs, self.cold);
                    debug!("memory: cycle {}: serving {} {} for core {} in {} cycles", now, req.func, req.addr, req.requester, delay);
                    self.cold = false;
                    self.service = Service::Busy { req, ready_at: now + delay };
                    return Next::In(delay);
                }
                Service::Busy { req, ready_at } => {
                    if now < ready_at {
                        return Next::In(ready_at - now);
                    }
                    let data = match req.func {
                        BusFunc::Read => Some(self.read_block(req.addr)),
                        _ => None,
                    };
                    self.service = Service::Responding { req, data };
                }
                Service::Responding { req, data } => {
                    if !bus.memory_response(req.requester, req.addr, data) {
                        return Next::In(1);
                    }
                    match req.func {
                        BusFunc::Write => {
                            if let Some(block) = req.data {
                                self.write_block(req.addr, &block);
                            }
                            self.stats.writes += 1;
                        }
                        _ => self.stats.reads += 1,
                    }
                    self.service = Service::Idle;
                    return Next::In(timing::TRANSFER);
                }
            }
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
    pub fn stats(&self) -> &MemoryStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(requester: CoreId, addr: u32, func: BusFunc) -> BusRequest {
        let data = (func == BusFunc::Write).then(|| [requester as u32 + 1; WORDS_PER_LINE]);
        BusRequest { requester, source: Source::Cache(requester), addr: Addr(addr), func, data }
    }

    /// ticks the service half on its own and records every cycle a response is driven
    fn serve(mem: &mut MemoryController, until: Cycle) -> Vec<(Cycle, BusRequest)> {
        let mut bus = Bus::new(false);
        let mut wake = Some(0);
        let mut responses = Vec::new();
        for t in 0..until {
            bus.begin_period(t);
            if wake == Some(t) {
                wake = match mem.on_tick(&mut bus, t) {
                    Next::In(d) => Some(t + d),
                    _ => None,
                };
            }
            if let Some(req) = bus.current() {
                responses.push((t, req));
            }
        }
        responses
    }

    #[test]
    fn cold_then_warm_latency() {
        let specs = SystemSpec::default();
        let mut mem = MemoryController::new(specs);
        assert!(mem.enqueue(request(0, 0x100, BusFunc::Read)));
        assert!(!mem.enqueue(request(1, 0x200, BusFunc::Write)));
        assert!(!mem.enqueue(request(2, 0x300, BusFunc::Read)));

        let responses = serve(&mut mem, 400);
        let cycles: Vec<_> = responses.iter().map(|(t, _)| *t).collect();
        assert_eq!(cycles, vec![
            specs.mem_cold_lat,
            specs.mem_cold_lat + 1 + specs.mem_warm_lat,
            specs.mem_cold_lat + 2 * (1 + specs.mem_warm_lat),
        ]);
        // exactly one response per request, in order
        let dests: Vec<_> = responses.iter().map(|(_, r)| (r.requester, r.func, r.source)).collect();
        assert_eq!(dests, vec![
            (0, BusFunc::Response, Source::Dram),
            (1, BusFunc::Response, Source::Dram),
            (2, BusFunc::Response, Source::Dram),
        ]);
        assert_eq!(mem.queued(), 0);
        assert_eq!(mem.stats().reads, 2);
        assert_eq!(mem.stats().writes, 1);
    }

    #[test]
    fn goes_cold_again_after_idling() {
        let specs = SystemSpec::default();
        let mut mem = MemoryController::new(specs);
        mem.enqueue(request(0, 0x100, BusFunc::Read));
        assert_eq!(serve(&mut mem, 200).len(), 1);
        // the service half parked on the empty queue
        assert!(mem.enqueue(request(0, 0x100, BusFunc::Read)));
        let responses = serve(&mut mem, 200);
        assert_eq!(responses[0].0, specs.mem_cold_lat);
    }

    #[test]
    fn write_back_lands_before_later_read() {
        let mut mem = MemoryController::new(SystemSpec::default());
        mem.enqueue(request(3, 0x2004, BusFunc::Write));
        mem.enqueue(request(0, 0x2000, BusFunc::Read));
        let responses = serve(&mut mem, 300);
        assert_eq!(responses[0].1.data, None);
        assert_eq!(responses[1].1.data, Some([4; WORDS_PER_LINE]));
        assert_eq!(mem.read_word(Addr(0x201c)), 4);
    }

    #[test]
    fn out_of_range_accesses() {
        let specs = SystemSpec { mem_size: 1024, ..Default::default() };
        let mut mem = MemoryController::new(specs);
        assert_eq!(mem.read_word(Addr(4096)), 0);
        assert_eq!(mem.read_block(Addr(1020)), [0; WORDS_PER_LINE]);
        mem.write_block(Addr(1024), &[9; WORDS_PER_LINE]);
        assert_eq!(mem.stats().dropped_writes, 1);
        mem.write_block(Addr(992), &[9; WORDS_PER_LINE]);
        assert_eq!(mem.read_word(Addr(1020)), 9);
    }
}
