//! Testing utilities
//!
//! Scriptable agents for exercising the dispatcher without real handlers.

pub mod mocks;

pub use mocks::*;
