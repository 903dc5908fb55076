//! Scheduler state and the selection algorithm.
//!
//! [`KernelState`] is everything the tick interrupt, the context-switch
//! interrupt and application threads share. It is only ever touched with
//! interrupts masked; the [`Kernel`](crate::Kernel) wraps each access in a
//! critical section.

mod ring;

use crate::arch::Arch;
use crate::config::{BACKGROUND_PRIORITY, MAX_THREADS, THREAD_SLOTS};
use crate::errors::{KernelError, KernelResult};
use crate::event::aperiodic::AperiodicTable;
use crate::event::periodic::PeriodicTable;
use crate::mem::Stack;
use crate::sync::semaphore::SemaphoreTable;
use crate::thread::{SlotState, Tcb, ThreadId, ThreadInfo, ThreadName};

/// Slot of the background thread. It is linked at all times.
pub(crate) const BACKGROUND_SLOT: usize = 0;

/// Result of a context switch: where to save the outgoing thread and where
/// to load the incoming one from.
///
/// `save` is null when there is nothing to save (first launch, or the
/// outgoing thread was killed).
#[derive(Debug, Clone, Copy)]
pub struct Switch<C> {
    pub save: *mut C,
    pub load: *const C,
    /// Thread that now runs.
    pub thread: ThreadId,
}

/// Body of the background thread.
fn background_loop<A: Arch>() {
    loop {
        A::wait_for_interrupt();
    }
}

pub(crate) struct KernelState<A: Arch> {
    pub(crate) tcbs: [Tcb<A::SavedContext>; THREAD_SLOTS],
    pub(crate) stacks: [Stack; THREAD_SLOTS],
    /// Slot the CPU is executing, `None` before launch.
    pub(crate) current: Option<usize>,
    /// Live application threads; the background thread is not counted.
    pub(crate) app_threads: usize,
    next_id: u32,
    pub(crate) semaphores: SemaphoreTable,
    pub(crate) periodic: PeriodicTable,
    pub(crate) aperiodic: AperiodicTable,
}

impl<A: Arch> KernelState<A> {
    pub(crate) const fn new() -> Self {
        Self {
            tcbs: [Tcb::vacant(A::EMPTY_CONTEXT); THREAD_SLOTS],
            stacks: [Stack::ZEROED; THREAD_SLOTS],
            current: None,
            app_threads: 0,
            next_id: ThreadId::BACKGROUND.get() + 1,
            semaphores: SemaphoreTable::new(),
            periodic: PeriodicTable::new(),
            aperiodic: AperiodicTable::new(),
        }
    }

    /// Install the background thread in its slot if that has not happened
    /// yet. Its context points into this state's own stack, so this runs once
    /// the state has reached its final address.
    pub(crate) fn ensure_background(&mut self) {
        if self.tcbs[BACKGROUND_SLOT].slot != SlotState::Free {
            return;
        }
        let stack = &mut self.stacks[BACKGROUND_SLOT];
        stack.reset();
        let top = stack.stack_top();

        let tcb = &mut self.tcbs[BACKGROUND_SLOT];
        A::init_context(&mut tcb.context, top, background_loop::<A>);
        tcb.id = Some(ThreadId::BACKGROUND);
        tcb.name = ThreadName::new("idle");
        tcb.priority = BACKGROUND_PRIORITY;
        tcb.slot = SlotState::Live;
        tcb.next = BACKGROUND_SLOT;
        tcb.prev = BACKGROUND_SLOT;
    }

    /// Slot of the running thread, unless that is the background thread or
    /// nothing runs yet.
    pub(crate) fn running_application_thread(&self) -> Option<usize> {
        self.current
            .filter(|&slot| slot != BACKGROUND_SLOT && self.tcbs[slot].is_live())
    }

    pub(crate) fn running_id(&self) -> ThreadId {
        self.current
            .and_then(|slot| self.tcbs[slot].id)
            .unwrap_or(ThreadId::BACKGROUND)
    }

    fn fresh_id(&mut self) -> ThreadId {
        loop {
            let raw = self.next_id;
            self.next_id = match raw.wrapping_add(1) {
                0 => ThreadId::BACKGROUND.get() + 1,
                next => next,
            };
            if let Some(id) = ThreadId::new(raw) {
                if id != ThreadId::BACKGROUND && self.find_live(id).is_none() {
                    return id;
                }
            }
        }
    }

    /// Create a ready thread that starts at `entry`, spliced into the ring
    /// just before the background thread (so ring order is creation order).
    pub(crate) fn add_thread(&mut self, entry: fn(), priority: u8, name: &str) -> KernelResult<ThreadId> {
        self.ensure_background();
        if self.app_threads >= MAX_THREADS {
            return Err(KernelError::ThreadLimitReached);
        }
        let slot = (0..THREAD_SLOTS)
            .filter(|&slot| slot != BACKGROUND_SLOT)
            .find(|&slot| self.tcbs[slot].slot == SlotState::Free)
            .ok_or(KernelError::ThreadLimitReached)?;

        let id = self.fresh_id();
        let stack = &mut self.stacks[slot];
        stack.reset();
        let top = stack.stack_top();

        let tcb = &mut self.tcbs[slot];
        A::init_context(&mut tcb.context, top, entry);
        tcb.id = Some(id);
        tcb.name = ThreadName::new(name);
        tcb.priority = priority;
        tcb.slot = SlotState::Live;
        tcb.asleep = false;
        tcb.sleep_start = 0;
        tcb.sleep_ticks = 0;
        tcb.blocked = None;

        self.link_before(slot, BACKGROUND_SLOT);
        self.app_threads += 1;
        Ok(id)
    }

    /// Kill the application thread `id`.
    ///
    /// Returns `true` if the killed thread is the running one, in which case
    /// the caller must request a context switch.
    pub(crate) fn kill_thread(&mut self, id: ThreadId) -> KernelResult<bool> {
        let slot = self.find_live(id).ok_or(KernelError::ThreadDoesNotExist)?;
        if self.app_threads == 1 {
            return Err(KernelError::CannotKillLastThread);
        }
        Ok(self.retire(slot))
    }

    /// Kill every application thread except the running one.
    pub(crate) fn kill_all(&mut self) -> KernelResult<()> {
        let keep = self.running_application_thread();
        let mut slot = self.tcbs[BACKGROUND_SLOT].next;
        for _ in 0..THREAD_SLOTS {
            if slot == BACKGROUND_SLOT {
                break;
            }
            let next = self.tcbs[slot].next;
            if Some(slot) != keep {
                self.retire(slot);
            }
            slot = next;
        }

        let expected = usize::from(keep.is_some());
        if self.app_threads != expected || !self.ring_is_consistent() {
            klog!(
                "sched",
                "kill-all left {} threads alive, expected {}",
                self.app_threads,
                expected
            );
            return Err(KernelError::ThreadsIncorrectlyAlive);
        }
        Ok(())
    }

    /// Unlink `slot` and give it back to the pool. A thread blocked on a
    /// semaphore withdraws its claim, so the counter stays equal to minus the
    /// number of remaining waiters.
    fn retire(&mut self, slot: usize) -> bool {
        if let Some(sem) = self.tcbs[slot].blocked.take() {
            self.semaphores.increment(sem);
        }
        self.tcbs[slot].asleep = false;
        self.unlink(slot);
        self.app_threads -= 1;

        let running = self.current == Some(slot);
        if running {
            self.tcbs[slot].slot = SlotState::Exiting;
        } else {
            self.release(slot);
        }
        running
    }

    fn release(&mut self, slot: usize) {
        let tcb = &mut self.tcbs[slot];
        tcb.slot = SlotState::Free;
        tcb.id = None;
        tcb.context = A::EMPTY_CONTEXT;
    }

    /// Choose the next thread to run.
    ///
    /// The ready thread with the numerically lowest priority wins. The scan
    /// starts after the running thread and only replaces its pick on a
    /// strictly better priority, so equal-priority threads take turns in ring
    /// order. With nothing ready the background thread runs.
    pub(crate) fn select_next(&self) -> usize {
        if !self.tcbs[BACKGROUND_SLOT].is_ready() {
            panic!("background thread is not schedulable");
        }
        let mut best: Option<(usize, u8)> = None;
        let mut slot = self.scan_start();
        for _ in 0..self.ring_len() {
            let tcb = &self.tcbs[slot];
            if slot != BACKGROUND_SLOT
                && tcb.is_ready()
                && best.map_or(true, |(_, priority)| tcb.priority < priority)
            {
                best = Some((slot, tcb.priority));
            }
            slot = tcb.next;
        }
        best.map_or(BACKGROUND_SLOT, |(slot, _)| slot)
    }

    /// Switch the CPU to the next selected thread.
    pub(crate) fn switch(&mut self) -> Switch<A::SavedContext> {
        self.ensure_background();
        let next = self.select_next();

        let save = match self.current {
            Some(slot) if self.tcbs[slot].slot == SlotState::Exiting => {
                self.release(slot);
                core::ptr::null_mut()
            }
            Some(slot) => {
                if !self.stacks[slot].canary_intact() {
                    klog!("sched", "stack overflow detected in thread {}", self.running_id());
                }
                &mut self.tcbs[slot].context as *mut A::SavedContext
            }
            None => core::ptr::null_mut(),
        };

        self.current = Some(next);
        let tcb = &self.tcbs[next];
        Switch {
            save,
            load: &tcb.context as *const A::SavedContext,
            thread: tcb.id.unwrap_or(ThreadId::BACKGROUND),
        }
    }

    /// Put the running thread to sleep for `ticks` ticks starting at `now`.
    ///
    /// Returns `true` if a thread went to sleep. The background thread never
    /// sleeps.
    pub(crate) fn sleep_for(&mut self, now: u32, ticks: u32) -> bool {
        match self.running_application_thread() {
            Some(slot) => {
                let tcb = &mut self.tcbs[slot];
                tcb.asleep = true;
                tcb.sleep_start = now;
                tcb.sleep_ticks = ticks;
                true
            }
            None => false,
        }
    }

    /// Clear the sleep flag of every thread whose sleep has run out.
    pub(crate) fn wake_sleepers(&mut self, now: u32) -> usize {
        let mut woken = 0;
        for tcb in self.tcbs.iter_mut() {
            if tcb.is_live() && tcb.asleep && tcb.sleep_elapsed(now) {
                tcb.asleep = false;
                woken += 1;
            }
        }
        woken
    }

    pub(crate) fn thread_info(&self, id: ThreadId) -> Option<ThreadInfo> {
        let slot = if id == ThreadId::BACKGROUND {
            Some(BACKGROUND_SLOT).filter(|&slot| self.tcbs[slot].is_live())
        } else {
            self.find_live(id)
        };
        let slot = slot?;
        let tcb = &self.tcbs[slot];
        Some(ThreadInfo {
            id,
            name: tcb.name,
            priority: tcb.priority,
            state: tcb.state(self.current == Some(slot)),
        })
    }

    pub(crate) fn stack_intact(&self, id: ThreadId) -> Option<bool> {
        let slot = if id == ThreadId::BACKGROUND {
            BACKGROUND_SLOT
        } else {
            self.find_live(id)?
        };
        Some(self.stacks[slot].canary_intact())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::host::HostArch;
    use crate::thread::ThreadState;
    use std::boxed::Box;

    fn body() {}

    fn state() -> Box<KernelState<HostArch>> {
        let mut state = Box::new(KernelState::<HostArch>::new());
        state.ensure_background();
        state
    }

    fn add(state: &mut KernelState<HostArch>, priority: u8) -> ThreadId {
        state.add_thread(body, priority, "worker").expect("pool has room")
    }

    #[test]
    fn test_background_only_ring() {
        let state = state();
        assert!(state.ring_is_consistent());
        assert_eq!(state.ring_len(), 1);
        assert_eq!(state.select_next(), BACKGROUND_SLOT);
    }

    #[test]
    fn test_ring_order_is_creation_order() {
        let mut state = state();
        let a = add(&mut state, 1);
        let b = add(&mut state, 1);
        let c = add(&mut state, 1);

        let mut order = [ThreadId::BACKGROUND; 4];
        assert_eq!(state.ring_order(&mut order), 4);
        assert_eq!(order, [ThreadId::BACKGROUND, a, b, c]);
        assert!(state.ring_is_consistent());
    }

    #[test]
    fn test_round_robin_among_equal_priority() {
        let mut state = state();
        let a = add(&mut state, 2);
        let b = add(&mut state, 2);
        let c = add(&mut state, 2);

        let picks: [ThreadId; 4] = core::array::from_fn(|_| state.switch().thread);
        assert_eq!(picks, [a, b, c, a]);
    }

    #[test]
    fn test_lower_value_wins_and_background_is_fallback() {
        let mut state = state();
        let low = add(&mut state, 3);
        let high = add(&mut state, 1);

        assert_eq!(state.switch().thread, high);
        assert_eq!(state.switch().thread, high);

        assert!(state.sleep_for(0, 10));
        assert_eq!(state.switch().thread, low);

        let low_slot = state.find_live(low).expect("live");
        state.tcbs[low_slot].asleep = true;
        state.tcbs[low_slot].sleep_start = 0;
        state.tcbs[low_slot].sleep_ticks = 10;
        assert_eq!(state.switch().thread, ThreadId::BACKGROUND);

        assert_eq!(state.wake_sleepers(10), 2);
        assert_eq!(state.switch().thread, high);
    }

    #[test]
    fn test_sleep_longer_than_half_the_counter_range() {
        let mut state = state();
        let a = add(&mut state, 1);
        state.switch();

        let start = u32::MAX - 5;
        assert!(state.sleep_for(start, u32::MAX - 1));
        assert_eq!(state.wake_sleepers(start.wrapping_add(1)), 0);
        assert_eq!(state.wake_sleepers(start.wrapping_add(u32::MAX / 2 + 10)), 0);
        assert_eq!(state.wake_sleepers(start.wrapping_add(u32::MAX - 2)), 0);
        assert_eq!(state.wake_sleepers(start.wrapping_add(u32::MAX - 1)), 1);
        assert_eq!(state.thread_info(a).map(|info| info.state), Some(ThreadState::Running));
    }

    #[test]
    fn test_killed_running_slot_is_held_until_switch() {
        let mut state = state();
        let a = add(&mut state, 1);
        let _b = add(&mut state, 1);
        assert_eq!(state.switch().thread, a);

        let slot = state.find_live(a).expect("live");
        assert_eq!(state.kill_thread(a), Ok(true));
        assert_eq!(state.tcbs[slot].slot, SlotState::Exiting);
        assert!(state.ring_is_consistent());

        let switch = state.switch();
        assert!(switch.save.is_null());
        assert_eq!(state.tcbs[slot].slot, SlotState::Free);
    }

    #[test]
    fn test_fresh_ids_skip_live_ids_after_wrap() {
        let mut state = state();
        let a = add(&mut state, 1);
        state.next_id = u32::MAX;
        let b = add(&mut state, 1);
        assert_eq!(b.get(), u32::MAX);
        let c = add(&mut state, 1);
        // Wrapped past 0 and the background id; 2 is taken by `a`.
        assert_eq!(a.get(), 2);
        assert_eq!(c.get(), 3);
    }

    #[test]
    fn test_thread_info_states() {
        let mut state = state();
        let a = add(&mut state, 4);
        state.switch();

        let info = state.thread_info(a).expect("live");
        assert_eq!(info.state, ThreadState::Running);
        assert_eq!(info.priority, 4);
        assert_eq!(info.name.as_str(), "worker");

        let idle = state.thread_info(ThreadId::BACKGROUND).expect("installed");
        assert_eq!(idle.state, ThreadState::Ready);
        assert_eq!(idle.priority, BACKGROUND_PRIORITY);
    }
}
