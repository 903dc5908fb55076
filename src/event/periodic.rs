//! Periodic events, run from the tick interrupt.

use super::EventHandler;
use crate::config::MAX_PERIODIC_EVENTS;
use crate::errors::{KernelError, KernelResult};

/// A handler invoked every `period` ticks.
#[derive(Clone, Copy)]
pub struct PeriodicEvent {
    pub handler: EventHandler,
    /// Period in ticks, at least 1.
    pub period: u32,
    /// Tick at which the event last fired (registration tick before that).
    pub last_fired: u32,
}

impl PeriodicEvent {
    fn is_due(&self, now: u32) -> bool {
        now.wrapping_sub(self.last_fired) >= self.period
    }
}

/// Registered periodic events, in registration order. Events are never
/// removed.
pub(crate) struct PeriodicTable {
    events: [Option<PeriodicEvent>; MAX_PERIODIC_EVENTS],
    len: usize,
}

impl PeriodicTable {
    pub(crate) const fn new() -> Self {
        Self {
            events: [None; MAX_PERIODIC_EVENTS],
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Register `handler` to fire every `period` ticks, the first time one
    /// period after `now`. A zero period is treated as one tick.
    pub(crate) fn add(&mut self, handler: EventHandler, period: u32, now: u32) -> KernelResult<()> {
        if self.len >= MAX_PERIODIC_EVENTS {
            return Err(KernelError::EventLimitReached);
        }
        self.events[self.len] = Some(PeriodicEvent {
            handler,
            period: period.max(1),
            last_fired: now,
        });
        self.len += 1;
        Ok(())
    }

    /// Mark every event due at `now` as fired and collect its handler.
    pub(crate) fn collect_due(&mut self, now: u32) -> DueEvents {
        let mut due = DueEvents::new();
        for event in self.events[..self.len].iter_mut().flatten() {
            if event.is_due(now) {
                event.last_fired = now;
                due.push(event.handler);
            }
        }
        due
    }
}

/// Handlers that came due on one tick, in registration order.
///
/// Collected under the critical section and run after it is released, so a
/// handler may call `signal`.
pub struct DueEvents {
    handlers: [Option<EventHandler>; MAX_PERIODIC_EVENTS],
    len: usize,
}

impl DueEvents {
    const fn new() -> Self {
        Self {
            handlers: [None; MAX_PERIODIC_EVENTS],
            len: 0,
        }
    }

    fn push(&mut self, handler: EventHandler) {
        self.handlers[self.len] = Some(handler);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Run every collected handler in order.
    pub fn run(&self) {
        for handler in self.handlers[..self.len].iter().flatten() {
            handler();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() {}

    #[test]
    fn test_first_firing_is_one_period_after_registration() {
        let mut table = PeriodicTable::new();
        table.add(noop, 3, 10).expect("room");

        assert!(table.collect_due(11).is_empty());
        assert!(table.collect_due(12).is_empty());
        assert_eq!(table.collect_due(13).len(), 1);
        assert!(table.collect_due(14).is_empty());
        assert_eq!(table.collect_due(16).len(), 1);
    }

    #[test]
    fn test_zero_period_fires_every_tick() {
        let mut table = PeriodicTable::new();
        table.add(noop, 0, 0).expect("room");
        for now in 1..5 {
            assert_eq!(table.collect_due(now).len(), 1);
        }
    }

    #[test]
    fn test_due_across_counter_wrap() {
        let mut table = PeriodicTable::new();
        table.add(noop, 4, u32::MAX - 1).expect("room");
        assert!(table.collect_due(u32::MAX).is_empty());
        assert!(table.collect_due(1).is_empty());
        assert_eq!(table.collect_due(2).len(), 1);
    }

    #[test]
    fn test_capacity() {
        let mut table = PeriodicTable::new();
        for _ in 0..MAX_PERIODIC_EVENTS {
            assert_eq!(table.add(noop, 1, 0), Ok(()));
        }
        assert_eq!(table.add(noop, 1, 0), Err(KernelError::EventLimitReached));
        assert_eq!(table.len(), MAX_PERIODIC_EVENTS);
    }
}
