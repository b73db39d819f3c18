//! Test utilities
//!
//! Fixtures and async helpers shared by unit tests, the integration tests in
//! `tests/` and the scenario harness.

pub mod async_helpers;
pub mod fixtures;

pub use async_helpers::*;
pub use fixtures::*;
