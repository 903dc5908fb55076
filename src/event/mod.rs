//! Events: handlers that run in interrupt context instead of as threads.
//!
//! Events are a separate task variant from ring threads. They have no stack,
//! no TCB, no priority in the thread sense, and cannot sleep, block or be
//! killed. They run to completion inside the interrupt that triggers them,
//! so a handler must never call `wait` or `sleep`.

pub mod aperiodic;
pub mod periodic;

pub use aperiodic::AperiodicEvent;
pub use periodic::PeriodicEvent;

/// Function run by an event.
pub type EventHandler = fn();
