//! Memory for thread stacks.
//!
//! Stacks are carved from a static pool at thread creation; there is no heap.

pub mod stack;

pub use stack::Stack;
