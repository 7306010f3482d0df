//! Boundary operations exposed to the host environment.
//!
//! [`Bridge`] is the entry point a host binding calls into:
//!
//! - [`Bridge::create_instance`]: Load an engine library for a host object
//! - [`Bridge::execute_instance`]: Start an execution, resolved later
//! - [`Bridge::release_instance`]: Destroy the engine, idempotently

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use evmc_bridge_common::{BridgeConfig, BridgeError};
use evmc_bridge_core::{HostValue, VmEngine};
use evmc_bridge_host::HostCallbacks;

use crate::instance::VmInstance;
use crate::scheduler::PendingExecution;

/// Shared handle to a [`VmInstance`], held by the host.
#[derive(Clone)]
pub struct InstanceHandle(Rc<VmInstance>);

impl InstanceHandle {
    /// The instance behind this handle.
    pub fn instance(&self) -> &VmInstance {
        &self.0
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InstanceHandle").field(&*self.0).finish()
    }
}

/// Creates, runs and releases engine instances.
///
/// Every method must be called on the host thread, inside a
/// [`tokio::task::LocalSet`].
#[derive(Debug, Clone, Default)]
pub struct Bridge {
    config: BridgeConfig,
}

impl Bridge {
    /// Create a bridge with the given configuration.
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Get the bridge configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Load the engine at `library_path` and bind it to `host`.
    ///
    /// `host` answers the engine's callbacks and owns the instance's
    /// lifetime on the host side.
    ///
    /// # Errors
    ///
    /// Returns a load error if the engine cannot be brought up.
    pub fn create_instance<H>(
        &self,
        library_path: &str,
        host: &Rc<H>,
    ) -> Result<InstanceHandle, BridgeError>
    where
        H: HostCallbacks + 'static,
    {
        let instance = VmInstance::create(library_path, host, &self.config.scheduler)?;
        Ok(InstanceHandle(Rc::new(instance)))
    }

    /// Bind an in-process engine to `host`.
    pub fn instance_with_engine<H>(&self, engine: Arc<dyn VmEngine>, host: &Rc<H>) -> InstanceHandle
    where
        H: HostCallbacks + 'static,
    {
        InstanceHandle(Rc::new(VmInstance::with_engine(
            engine,
            host,
            &self.config.scheduler,
        )))
    }

    /// Start executing `{revision, message, code}` on `handle`.
    ///
    /// # Errors
    ///
    /// Returns a usage error for malformed parameters or a released
    /// instance, or [`BridgeError::WorkerSpawn`].
    pub fn execute_instance(
        &self,
        handle: &InstanceHandle,
        params: &HostValue,
    ) -> Result<PendingExecution, BridgeError> {
        handle.0.execute(params)
    }

    /// Release the engine behind `handle`.
    ///
    /// Returns `false` if it was already released.
    pub fn release_instance(&self, handle: &InstanceHandle) -> bool {
        handle.0.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmc_bridge_common::SchedulerConfig;

    #[test]
    fn test_default_config() {
        let bridge = Bridge::default();
        let defaults = SchedulerConfig::default();
        assert_eq!(bridge.config().scheduler.thread_name, defaults.thread_name);
        assert_eq!(bridge.config().scheduler.stack_size_kb, defaults.stack_size_kb);
    }

    #[test]
    fn test_custom_config() {
        let config = BridgeConfig::from_toml("[scheduler]\nthread_name = \"vm\"\n").unwrap();
        let bridge = Bridge::new(config);
        assert_eq!(bridge.config().scheduler.thread_name, "vm");
        assert_eq!(bridge.config().scheduler.stack_size_kb, 16384);
    }
}
