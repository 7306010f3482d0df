//! Synchronous cross-thread callback bridge between EVMC engines and a
//! single-threaded host runtime.
//!
//! Engines call their host synchronously from worker threads; the host only
//! ever runs on its own thread and may answer later. This crate re-exports
//! the workspace crates and sets up logging:
//!
//! - [`common`]: Errors and configuration
//! - [`vm`]: Values, codecs, the engine traits and the native ABI
//! - [`host`]: Channels and rendezvous between workers and the host thread
//! - [`binding`]: Instances, scheduling and the boundary operations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── host thread (LocalSet) ───────────────────────────┐
//! │  Bridge::execute_instance ──▶ PendingExecution.await ──▶ {statusCode, ...}    │
//! │  serve loops ──▶ HostCallbacks (immediate or deferred)                        │
//! └──────────────▲──────────────────────────────────────────────┬─────────────────┘
//!                │ Submission                                    │ Completion
//! ┌──────────────┴──────────────── worker thread ────────────────▼─────────────────┐
//! │  VmEngine::execute ──▶ HostInterfaceDispatcher ──▶ CallChannel::submit (waits) │
//! └────────────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub use evmc_bridge_binding as binding;
pub use evmc_bridge_common as common;
pub use evmc_bridge_core as vm;
pub use evmc_bridge_host as host;

pub use evmc_bridge_binding::{Bridge, InstanceHandle, PendingExecution};
pub use evmc_bridge_common::{BridgeConfig, BridgeError, LoggingConfig, SchedulerConfig};
pub use evmc_bridge_core::{HostValue, NativeEngine, VmEngine};
pub use evmc_bridge_host::{HostCallbacks, HostReturn};

/// Install a global tracing subscriber.
///
/// `RUST_LOG` takes precedence over [`LoggingConfig::filter`]. Returns
/// `false` if a subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
    };

    match installed {
        Ok(()) => {
            tracing::info!(filter = %config.filter, json = config.json, "Tracing initialised");
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_once() {
        let config = LoggingConfig::default();
        init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
