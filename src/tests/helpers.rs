//! Test helper utilities and common functionality.
//!
//! A test plays the part of whichever thread is running: it calls kernel
//! operations directly and then services the switch interrupt by hand.

use crate::arch::host::HostArch;
use crate::kernel::Kernel;
use crate::thread::{ThreadId, ThreadState};
use std::boxed::Box;
use std::vec::Vec;

pub(crate) type TestKernel = Kernel<HostArch>;

pub(crate) fn noop() {}

/// A fresh, initialized kernel on the heap.
pub(crate) fn kernel() -> Box<TestKernel> {
    let kernel = Box::new(Kernel::new(HostArch::new()));
    kernel.init();
    kernel
}

pub(crate) fn spawn(kernel: &TestKernel, priority: u8, name: &str) -> ThreadId {
    kernel.add_thread(noop, priority, name).expect("thread pool has room")
}

/// Take a pending context switch, as the switch interrupt would once
/// interrupts are enabled. Returns the thread now running.
pub(crate) fn service_switch(kernel: &TestKernel) -> Option<ThreadId> {
    if kernel.arch().take_switch_request() {
        Some(kernel.context_switch().thread)
    } else {
        None
    }
}

/// Deliver `count` ticks, servicing the switch each one requests.
pub(crate) fn run_ticks(kernel: &TestKernel, count: u32) {
    for _ in 0..count {
        kernel.tick();
        service_switch(kernel);
    }
}

/// Ids currently in the ring, background thread first.
pub(crate) fn ring(kernel: &TestKernel) -> Vec<ThreadId> {
    let mut ids = [ThreadId::BACKGROUND; crate::config::THREAD_SLOTS];
    let len = kernel.ring_order(&mut ids);
    ids[..len].to_vec()
}

pub(crate) fn blocked_count(kernel: &TestKernel) -> usize {
    ring(kernel)
        .into_iter()
        .filter_map(|id| kernel.thread_info(id))
        .filter(|info| info.state == ThreadState::Blocked)
        .count()
}

/// Simple linear congruential generator for property testing.
pub(crate) struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    pub(crate) fn gen_range(&mut self, min: u64, max: u64) -> u64 {
        min + ((self.next_u64() >> 33) % (max - min))
    }

    pub(crate) fn gen_bool(&mut self) -> bool {
        (self.next_u64() >> 33) & 1 == 0
    }
}
