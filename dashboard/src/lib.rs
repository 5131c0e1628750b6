//! Dashboard client for an automated mobile-app test platform.
//!
//! This crate drives and observes a test run against an orchestration server:
//! it submits runs, ingests the push event stream, and reconciles everything
//! into one consistent `RunSession`. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (event reduction, status
//!   aggregation, wire parsing). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (REST calls, persistence, polling,
//!   the stream connection). Isolated so the lifecycle rules can be tested
//!   without a server.
//!
//! Orchestration modules ([`controller`], [`dispatch`]) coordinate core logic
//! with I/O on a single cooperative event queue.

pub mod controller;
pub mod core;
pub mod dispatch;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
