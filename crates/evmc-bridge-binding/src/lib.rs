//! Engine instances and boundary operations for evmc-bridge.
//!
//! This crate is what a host binding talks to. It handles:
//!
//! - Loading engines and binding them to a host callbacks object
//! - Parsing execute parameters from host values
//! - Running each execution on its own worker thread
//! - Publishing results back on the host thread
//!
//! # Quick Start
//!
//! ```ignore
//! use std::rc::Rc;
//! use evmc_bridge_binding::Bridge;
//!
//! let local = tokio::task::LocalSet::new();
//! local.run_until(async {
//!     let bridge = Bridge::default();
//!     let host = Rc::new(MyHost::default());
//!     let instance = bridge.create_instance("libevmone.so", &host)?;
//!
//!     let result = bridge.execute_instance(&instance, &params)?.await?;
//!     bridge.release_instance(&instance);
//!     Ok::<_, evmc_bridge_common::BridgeError>(result)
//! }).await?;
//! ```

pub mod bridge;
pub mod instance;
pub mod params;
pub mod scheduler;

pub use bridge::{Bridge, InstanceHandle};
pub use instance::VmInstance;
pub use params::ExecuteParams;
pub use scheduler::{ExecutionScheduler, PendingExecution};
