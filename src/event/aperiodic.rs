//! Aperiodic events: handlers bound to hardware interrupt lines.

use super::EventHandler;
use crate::config::MAX_APERIODIC_EVENTS;
use crate::errors::{KernelError, KernelResult};

/// A handler bound to an interrupt line at a hardware priority.
#[derive(Clone, Copy)]
pub struct AperiodicEvent {
    pub line: u32,
    pub priority: u8,
    pub handler: EventHandler,
}

/// Interrupt line bindings. Bindings live as long as the kernel.
pub(crate) struct AperiodicTable {
    events: [Option<AperiodicEvent>; MAX_APERIODIC_EVENTS],
    len: usize,
}

impl AperiodicTable {
    pub(crate) const fn new() -> Self {
        Self {
            events: [None; MAX_APERIODIC_EVENTS],
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Bind `event`. A line that is already bound gets the new handler and
    /// priority.
    pub(crate) fn bind(&mut self, event: AperiodicEvent) -> KernelResult<()> {
        if let Some(existing) = self.events[..self.len]
            .iter_mut()
            .flatten()
            .find(|bound| bound.line == event.line)
        {
            *existing = event;
            return Ok(());
        }
        if self.len >= MAX_APERIODIC_EVENTS {
            return Err(KernelError::EventLimitReached);
        }
        self.events[self.len] = Some(event);
        self.len += 1;
        Ok(())
    }

    pub(crate) fn lookup(&self, line: u32) -> Option<AperiodicEvent> {
        self.events[..self.len]
            .iter()
            .flatten()
            .find(|bound| bound.line == line)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first() {}
    fn second() {}

    #[test]
    fn test_bind_and_lookup() {
        let mut table = AperiodicTable::new();
        table
            .bind(AperiodicEvent { line: 40, priority: 2, handler: first })
            .expect("room");

        let event = table.lookup(40).expect("bound");
        assert_eq!(event.priority, 2);
        assert_eq!(event.handler as usize, first as usize);
        assert!(table.lookup(41).is_none());
    }

    #[test]
    fn test_rebinding_replaces() {
        let mut table = AperiodicTable::new();
        table.bind(AperiodicEvent { line: 3, priority: 1, handler: first }).expect("room");
        table.bind(AperiodicEvent { line: 3, priority: 5, handler: second }).expect("room");

        assert_eq!(table.len(), 1);
        let event = table.lookup(3).expect("bound");
        assert_eq!(event.priority, 5);
        assert_eq!(event.handler as usize, second as usize);
    }

    #[test]
    fn test_capacity() {
        let mut table = AperiodicTable::new();
        for line in 0..MAX_APERIODIC_EVENTS as u32 {
            table.bind(AperiodicEvent { line, priority: 0, handler: first }).expect("room");
        }
        let overflow = AperiodicEvent { line: 1000, priority: 0, handler: first };
        assert_eq!(table.bind(overflow), Err(KernelError::EventLimitReached));
        // Rebinding an existing line still works when full.
        let rebind = AperiodicEvent { line: 0, priority: 1, handler: second };
        assert_eq!(table.bind(rebind), Ok(()));
    }
}
