//! Logging utilities.
//!
//! Centralizes logger initialization. Only the standard `log` facade leaks
//! into the rest of the crate; `env_logger` stays an implementation detail.

mod init;

pub use init::{init_logging, LoggingConfig};
