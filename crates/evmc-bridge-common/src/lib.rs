//! Common errors and configuration for evmc-bridge.
//!
//! This crate provides shared functionality used across the evmc-bridge workspace:
//! - Error types using `thiserror`, split by how the bridge reacts to them
//! - Configuration structures for the scheduler and logging

pub mod config;
pub mod error;

pub use config::{BridgeConfig, ConfigError, LoggingConfig, SchedulerConfig};
pub use error::{BridgeError, CallError, ProtocolViolation, fatal};
