//! Error codes reported by kernel operations.
//!
//! Every fallible operation returns its error synchronously; nothing in the
//! kernel unwinds. The numeric values are stable and match the codes an
//! application sees through [`KernelError::code`].

#![allow(clippy::uninlined_format_args)]

use core::fmt;

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Code reported for a successful operation.
pub const NO_ERROR: i32 = 0;

/// Errors returned by the scheduler, the event managers and the semaphore
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum KernelError {
    /// The thread pool is exhausted.
    ThreadLimitReached = -1,
    /// `launch` was called before any application thread was added.
    NoThreadsScheduled = -2,
    /// A bulk kill left a live set that disagrees with the ring.
    ThreadsIncorrectlyAlive = -3,
    /// No live application thread has the requested id.
    ThreadDoesNotExist = -4,
    /// The requested kill would leave no application thread alive.
    CannotKillLastThread = -5,
    /// The interrupt line is outside the controller's range.
    IrqInvalid = -6,
    /// The interrupt priority is outside the range available to applications.
    HwiPriorityInvalid = -7,
    /// The periodic or aperiodic event table is full.
    EventLimitReached = -8,
    /// The semaphore registry is full.
    SemaphoreLimitReached = -9,
}

impl KernelError {
    /// Numeric error code of this error.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Map a numeric code back to an error. `NO_ERROR` and unknown codes
    /// yield `None`.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::ThreadLimitReached),
            -2 => Some(Self::NoThreadsScheduled),
            -3 => Some(Self::ThreadsIncorrectlyAlive),
            -4 => Some(Self::ThreadDoesNotExist),
            -5 => Some(Self::CannotKillLastThread),
            -6 => Some(Self::IrqInvalid),
            -7 => Some(Self::HwiPriorityInvalid),
            -8 => Some(Self::EventLimitReached),
            -9 => Some(Self::SemaphoreLimitReached),
            _ => None,
        }
    }
}

/// Collapse a kernel result into its numeric code, `NO_ERROR` for `Ok`.
pub fn error_code<T>(result: &KernelResult<T>) -> i32 {
    match result {
        Ok(_) => NO_ERROR,
        Err(error) => error.code(),
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::ThreadLimitReached => write!(f, "Thread limit reached"),
            KernelError::NoThreadsScheduled => write!(f, "No threads scheduled"),
            KernelError::ThreadsIncorrectlyAlive => {
                write!(f, "Live thread count disagrees with the thread ring")
            }
            KernelError::ThreadDoesNotExist => write!(f, "Thread does not exist"),
            KernelError::CannotKillLastThread => write!(f, "Cannot kill the last thread"),
            KernelError::IrqInvalid => write!(f, "Interrupt line out of range"),
            KernelError::HwiPriorityInvalid => write!(f, "Interrupt priority out of range"),
            KernelError::EventLimitReached => write!(f, "Event table full"),
            KernelError::SemaphoreLimitReached => write!(f, "Semaphore registry full"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_published_values() {
        assert_eq!(KernelError::ThreadLimitReached.code(), -1);
        assert_eq!(KernelError::NoThreadsScheduled.code(), -2);
        assert_eq!(KernelError::ThreadsIncorrectlyAlive.code(), -3);
        assert_eq!(KernelError::ThreadDoesNotExist.code(), -4);
        assert_eq!(KernelError::CannotKillLastThread.code(), -5);
        assert_eq!(KernelError::IrqInvalid.code(), -6);
        assert_eq!(KernelError::HwiPriorityInvalid.code(), -7);
    }

    #[test]
    fn test_from_code() {
        for code in -9..=-1 {
            let error = KernelError::from_code(code).expect("known code");
            assert_eq!(error.code(), code);
        }
        assert_eq!(KernelError::from_code(NO_ERROR), None);
        assert_eq!(KernelError::from_code(-42), None);
    }

    #[test]
    fn test_error_code_of_result() {
        let ok: KernelResult<u8> = Ok(3);
        let err: KernelResult<u8> = Err(KernelError::IrqInvalid);
        assert_eq!(error_code(&ok), NO_ERROR);
        assert_eq!(error_code(&err), -6);
    }
}
