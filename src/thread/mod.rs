//! Thread identity, names and the thread control block.

use crate::config::MAX_NAME_LEN;
use core::num::NonZeroU32;

pub(crate) mod tcb;

pub(crate) use tcb::{SlotState, Tcb};

/// Identifier of a thread.
///
/// Ids are handed out from a counter and never reused while the counter has
/// not wrapped, so an id stays unique for as long as its thread is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(NonZeroU32);

impl core::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ThreadId {
    /// Id of the background thread.
    pub const BACKGROUND: ThreadId = ThreadId(NonZeroU32::MIN);

    /// Create a thread id from its raw value. Zero is not a valid id.
    pub const fn new(id: u32) -> Option<Self> {
        match NonZeroU32::new(id) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Get the raw ID value.
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

/// Scheduling state of a live thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Eligible for selection.
    Ready,
    /// The thread the CPU is executing.
    Running,
    /// Waiting on a semaphore.
    Blocked,
    /// Waiting for its wake tick.
    Sleeping,
}

impl ThreadState {
    /// Ready or running: the thread competes for the CPU.
    pub const fn is_runnable(self) -> bool {
        matches!(self, ThreadState::Ready | ThreadState::Running)
    }
}

/// A thread name, truncated to `MAX_NAME_LEN` bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ThreadName {
    bytes: [u8; MAX_NAME_LEN],
    len: u8,
}

impl ThreadName {
    /// The empty name.
    pub const EMPTY: ThreadName = ThreadName { bytes: [0; MAX_NAME_LEN], len: 0 };

    /// Build a name, cutting it at the last char boundary that fits.
    pub fn new(name: &str) -> Self {
        let mut end = name.len().min(MAX_NAME_LEN);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0; MAX_NAME_LEN];
        bytes[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self { bytes, len: end as u8 }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl core::fmt::Debug for ThreadName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self.as_str(), f)
    }
}

impl core::fmt::Display for ThreadName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a thread's scheduling attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub name: ThreadName,
    pub priority: u8,
    pub state: ThreadState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_zero_is_invalid() {
        assert_eq!(ThreadId::new(0), None);
        assert_eq!(ThreadId::new(7).map(ThreadId::get), Some(7));
        assert_eq!(ThreadId::BACKGROUND.get(), 1);
    }

    #[test]
    fn test_name_truncation() {
        assert_eq!(ThreadName::new("idle").as_str(), "idle");
        assert_eq!(ThreadName::new("").as_str(), "");

        let long = ThreadName::new("a_rather_long_thread_name");
        assert_eq!(long.as_str(), "a_rather_long_th");
        assert_eq!(long.as_str().len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_name_truncates_on_char_boundary() {
        // 15 ASCII bytes followed by a two-byte char straddling the limit.
        let name = ThreadName::new("sensor_readoutXé");
        assert_eq!(name.as_str(), "sensor_readoutX");
    }
}
