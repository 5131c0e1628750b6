//! Side-effecting operations: REST calls, persistence, polling, the stream.

pub mod api;
pub mod config;
pub mod poller;
pub mod session_store;
pub mod stream;
