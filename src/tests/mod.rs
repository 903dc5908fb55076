//! Crate-level tests that drive a whole kernel on the hosted backend.

mod helpers;
mod property;
