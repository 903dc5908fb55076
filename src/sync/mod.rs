//! Synchronization primitives built on the critical section.

pub mod semaphore;

pub use semaphore::Semaphore;
