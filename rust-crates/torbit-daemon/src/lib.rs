//! Torbit Chat daemon library
//!
//! Everything outside the chat core: configuration, logging setup and the
//! transport acceptor. Exposed as a library for integration testing.

pub mod config;
pub mod logging;
pub mod server;
pub mod version;
