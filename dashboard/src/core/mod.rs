//! Deterministic, pure logic shared by the dashboard.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod reducer;
pub mod status;
pub mod types;
pub mod wire;
