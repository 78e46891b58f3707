// wake-up queue with discrete delays, keyed by cycle

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::moesi::Cycle;

#[derive(Clone, Copy, Debug)]
pub struct DelayedMsg<MsgType> {
    pub t: Cycle,
    pub msg: MsgType,
}

/*
    TimedMsg carries the absolute timestamp at which the message becomes available,
    DelayedMsg the delay from the current time. Within one timestamp messages come
    out in the order of the message type, and equal (t, msg) pairs are delivered once.
 */

struct TimedMsg<MsgType> {
    t: Cycle,
    msg: MsgType,
}

impl<MsgType: Ord> Eq for TimedMsg<MsgType> {}

impl<MsgType: Ord> PartialEq for TimedMsg<MsgType> {
    fn eq(&self, other: &Self) -> bool {
        (self.t, &self.msg) == (other.t, &other.msg)
    }
}

impl<MsgType: Ord> Ord for TimedMsg<MsgType> {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed, the heap pops the earliest first
        (other.t, &other.msg).cmp(&(self.t, &self.msg))
    }
}

impl<MsgType: Ord> PartialOrd for TimedMsg<MsgType> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct DelayedQ<MsgType> {
    q: BinaryHeap<TimedMsg<MsgType>>,
    time: Cycle,
}

impl<MsgType: Ord> Default for DelayedQ<MsgType> {
    fn default() -> Self {
        Self::new()
    }
}

impl<MsgType: Ord> DelayedQ<MsgType> {
    pub fn new() -> Self {
        DelayedQ { q: BinaryHeap::new(), time: 0 }
    }
    pub fn send(&mut self, DelayedMsg { t: d, msg }: DelayedMsg<MsgType>) {
        // transform delay into timestamp
        self.schedule(self.time + d, msg);
    }
    pub fn schedule(&mut self, t: Cycle, msg: MsgType) {
        assert!(t >= self.time, "delayed message queue is out of sync: message scheduled in the past");
        self.q.push(TimedMsg { t, msg });
    }
    pub fn update_time(&mut self, new_time: Cycle) {
        self.time = new_time;
    }
    pub fn time(&self) -> Cycle {
        self.time
    }
    pub fn next_time(&self) -> Option<Cycle> {
        self.q.peek().map(|m| m.t)
    }
    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }
    pub fn msg_available(&self) -> bool {
        if let Some(msg) = self.q.peek() {
            if      msg.t == self.time { true }
            else if msg.t > self.time { false }
            else { panic!("delayed message queue is out of sync: missed message") }
        } else { false }
    }
    pub fn try_fetch(&mut self) -> Option<MsgType> {
        if !self.msg_available() {
            return None;
        }
        let first = self.q.pop()?;
        while self.q.peek().is_some_and(|m| *m == first) {
            self.q.pop();
        }
        Some(first.msg)
    }
}
