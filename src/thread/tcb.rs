//! Thread control block.

use super::{ThreadId, ThreadName, ThreadState};
use crate::sync::Semaphore;

/// Occupancy of a TCB slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// Free for `add_thread`.
    Free,
    /// Linked into the ring.
    Live,
    /// Killed while running: unlinked, but its slot is held until the
    /// pending context switch moves the CPU off it.
    Exiting,
}

/// Per-thread scheduling record. `next`/`prev` index the slot arena.
#[derive(Clone, Copy)]
pub(crate) struct Tcb<C> {
    pub(crate) id: Option<ThreadId>,
    pub(crate) name: ThreadName,
    pub(crate) priority: u8,
    pub(crate) slot: SlotState,
    pub(crate) asleep: bool,
    /// Tick the current sleep began at.
    pub(crate) sleep_start: u32,
    /// Length of the current sleep in ticks.
    pub(crate) sleep_ticks: u32,
    pub(crate) blocked: Option<Semaphore>,
    pub(crate) context: C,
    pub(crate) next: usize,
    pub(crate) prev: usize,
}

impl<C> Tcb<C> {
    pub(crate) const fn vacant(context: C) -> Self {
        Self {
            id: None,
            name: ThreadName::EMPTY,
            priority: 0,
            slot: SlotState::Free,
            asleep: false,
            sleep_start: 0,
            sleep_ticks: 0,
            blocked: None,
            context,
            next: 0,
            prev: 0,
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        self.slot == SlotState::Live
    }

    /// Neither blocked nor asleep.
    pub(crate) fn is_ready(&self) -> bool {
        self.is_live() && self.blocked.is_none() && !self.asleep
    }

    /// Whether a sleep has run its full length at tick `now`. Elapsed time
    /// is measured from the start tick, so any `u32` length survives the
    /// counter wrapping.
    pub(crate) fn sleep_elapsed(&self, now: u32) -> bool {
        now.wrapping_sub(self.sleep_start) >= self.sleep_ticks
    }

    pub(crate) fn state(&self, running: bool) -> ThreadState {
        if self.blocked.is_some() {
            ThreadState::Blocked
        } else if self.asleep {
            ThreadState::Sleeping
        } else if running {
            ThreadState::Running
        } else {
            ThreadState::Ready
        }
    }
}
