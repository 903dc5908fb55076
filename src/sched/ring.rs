//! The TCB ring: a circular doubly-linked list threaded through the slot
//! arena by index.
//!
//! The background thread's slot is always linked, so the ring is never
//! empty. A slot that is unlinked keeps its own `next`/`prev` values, which
//! lets a killed running thread still name where the scan should resume.

use super::{KernelState, BACKGROUND_SLOT};
use crate::arch::Arch;
use crate::config::THREAD_SLOTS;
use crate::thread::ThreadId;

impl<A: Arch> KernelState<A> {
    /// Splice `slot` into the ring immediately before `anchor`.
    pub(crate) fn link_before(&mut self, slot: usize, anchor: usize) {
        let prev = self.tcbs[anchor].prev;
        self.tcbs[slot].next = anchor;
        self.tcbs[slot].prev = prev;
        self.tcbs[prev].next = slot;
        self.tcbs[anchor].prev = slot;
    }

    /// Remove `slot` from the ring, leaving its own links untouched.
    pub(crate) fn unlink(&mut self, slot: usize) {
        let Self { tcbs, .. } = self;
        let (prev, next) = (tcbs[slot].prev, tcbs[slot].next);
        tcbs[prev].next = next;
        tcbs[next].prev = prev;
    }

    /// Number of TCBs in the ring, background thread included.
    pub(crate) fn ring_len(&self) -> usize {
        self.app_threads + 1
    }

    /// Slot of the live application thread with `id`.
    pub(crate) fn find_live(&self, id: ThreadId) -> Option<usize> {
        (0..THREAD_SLOTS)
            .filter(|&slot| slot != BACKGROUND_SLOT)
            .find(|&slot| self.tcbs[slot].is_live() && self.tcbs[slot].id == Some(id))
    }

    /// Where a ring scan for "the thread after the running one" begins.
    ///
    /// Falls back to the slot after the background thread when nothing has
    /// run yet or when the running thread was killed and its old successor
    /// has since left the ring too.
    pub(crate) fn scan_start(&self) -> usize {
        match self.current {
            Some(slot) => {
                let next = self.tcbs[slot].next;
                if self.tcbs[next].is_live() {
                    next
                } else {
                    self.tcbs[BACKGROUND_SLOT].next
                }
            }
            None => self.tcbs[BACKGROUND_SLOT].next,
        }
    }

    /// Walk the ring from the background thread and check that it is closed,
    /// that every `next.prev` points back, that only live slots are linked,
    /// and that its length matches the live thread count.
    pub(crate) fn ring_is_consistent(&self) -> bool {
        if !self.tcbs[BACKGROUND_SLOT].is_live() {
            return false;
        }
        let mut slot = BACKGROUND_SLOT;
        let mut count = 0;
        loop {
            let tcb = &self.tcbs[slot];
            if !tcb.is_live() || self.tcbs[tcb.next].prev != slot {
                return false;
            }
            count += 1;
            slot = tcb.next;
            if slot == BACKGROUND_SLOT {
                break;
            }
            if count > THREAD_SLOTS {
                return false;
            }
        }
        count == self.ring_len()
    }

    /// Ids in ring order, starting with the background thread. Returns how
    /// many entries of `out` were written.
    pub(crate) fn ring_order(&self, out: &mut [ThreadId]) -> usize {
        let mut slot = BACKGROUND_SLOT;
        let mut written = 0;
        for _ in 0..self.ring_len() {
            if written == out.len() {
                break;
            }
            if let Some(id) = self.tcbs[slot].id {
                out[written] = id;
                written += 1;
            }
            slot = self.tcbs[slot].next;
        }
        written
    }
}
