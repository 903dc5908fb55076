//! Counting semaphores.
//!
//! A semaphore is a signed counter kept in the kernel's registry and named by
//! a [`Semaphore`] handle. `wait` takes one unit and blocks the running thread
//! when the counter goes negative; `signal` returns one unit and, if anyone is
//! waiting, clears the block on exactly one thread.
//!
//! Waiters are released in ring order starting after the running thread, not
//! in the order they arrived. Under sustained contention a waiter that sits
//! far from the signalling thread in the ring can be passed over repeatedly.

use crate::sched::KernelState;
use crate::arch::Arch;
use crate::config::MAX_SEMAPHORES;
use crate::errors::{KernelError, KernelResult};
use crate::thread::ThreadId;

/// Handle to a semaphore in the kernel's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Semaphore(u16);

impl Semaphore {
    /// Position of this semaphore in the registry.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Fixed-capacity registry of semaphore counters.
pub(crate) struct SemaphoreTable {
    values: [i32; MAX_SEMAPHORES],
    len: usize,
}

impl SemaphoreTable {
    pub(crate) const fn new() -> Self {
        Self {
            values: [0; MAX_SEMAPHORES],
            len: 0,
        }
    }

    pub(crate) fn create(&mut self, initial: i32) -> KernelResult<Semaphore> {
        if self.len >= MAX_SEMAPHORES {
            return Err(KernelError::SemaphoreLimitReached);
        }
        let handle = Semaphore(self.len as u16);
        self.values[self.len] = initial;
        self.len += 1;
        Ok(handle)
    }

    fn counter(&mut self, sem: Semaphore) -> &mut i32 {
        match self.values[..self.len].get_mut(sem.index()) {
            Some(value) => value,
            None => panic!("semaphore handle {} was not issued by this kernel", sem.index()),
        }
    }

    pub(crate) fn value(&self, sem: Semaphore) -> Option<i32> {
        self.values[..self.len].get(sem.index()).copied()
    }

    pub(crate) fn set(&mut self, sem: Semaphore, value: i32) {
        *self.counter(sem) = value;
    }

    /// Take one unit, returning the new value.
    pub(crate) fn decrement(&mut self, sem: Semaphore) -> i32 {
        let value = self.counter(sem);
        *value = value.wrapping_sub(1);
        *value
    }

    /// Return one unit, returning the new value.
    pub(crate) fn increment(&mut self, sem: Semaphore) -> i32 {
        let value = self.counter(sem);
        *value = value.wrapping_add(1);
        *value
    }
}

impl<A: Arch> KernelState<A> {
    /// Take one unit of `sem` for the running thread.
    ///
    /// Returns `true` if the thread is now blocked and must be switched out.
    pub(crate) fn semaphore_wait(&mut self, sem: Semaphore) -> bool {
        if self.semaphores.decrement(sem) >= 0 {
            return false;
        }
        match self.running_application_thread() {
            Some(slot) => {
                self.tcbs[slot].blocked = Some(sem);
                true
            }
            None => panic!("semaphore wait would block the background thread"),
        }
    }

    /// Return one unit of `sem`, releasing the first waiter in ring order
    /// after the running thread.
    pub(crate) fn semaphore_signal(&mut self, sem: Semaphore) -> Option<ThreadId> {
        if self.semaphores.increment(sem) > 0 {
            return None;
        }

        let mut slot = self.scan_start();
        for _ in 0..self.ring_len() {
            let tcb = &mut self.tcbs[slot];
            if tcb.blocked == Some(sem) {
                tcb.blocked = None;
                return tcb.id;
            }
            slot = tcb.next;
        }

        klog!("sem", "signal on semaphore {} found no waiter", sem.index());
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_count() {
        let mut table = SemaphoreTable::new();
        let sem = table.create(2).expect("registry has room");
        assert_eq!(table.value(sem), Some(2));
        assert_eq!(table.decrement(sem), 1);
        assert_eq!(table.decrement(sem), 0);
        assert_eq!(table.decrement(sem), -1);
        assert_eq!(table.increment(sem), 0);
        table.set(sem, -3);
        assert_eq!(table.value(sem), Some(-3));
    }

    #[test]
    fn test_registry_capacity() {
        let mut table = SemaphoreTable::new();
        for i in 0..MAX_SEMAPHORES {
            assert_eq!(table.create(0).map(Semaphore::index), Ok(i));
        }
        assert_eq!(table.create(0), Err(KernelError::SemaphoreLimitReached));
    }

    #[test]
    #[should_panic(expected = "was not issued")]
    fn test_foreign_handle_is_rejected() {
        let mut table = SemaphoreTable::new();
        table.increment(Semaphore(3));
    }

    #[test]
    fn test_unknown_handle_has_no_value() {
        let table = SemaphoreTable::new();
        assert_eq!(table.value(Semaphore(0)), None);
    }
}
