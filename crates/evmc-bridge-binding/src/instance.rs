//! A loaded engine bound to one host object.
//!
//! [`VmInstance`] ties together:
//! - The engine, shared with every running execution
//! - The callback channels and their serve loops on the host thread
//! - The scheduler that starts executions on worker threads
//!
//! Instances live on the host thread. Creating one spawns serve loops, so it
//! must happen inside a [`tokio::task::LocalSet`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use evmc_bridge_common::{BridgeError, SchedulerConfig};
use evmc_bridge_core::{DynamicEngine, HostValue, VmEngine};
use evmc_bridge_host::{CallChannels, HostCallbacks, HostInterfaceDispatcher};

use crate::params::ExecuteParams;
use crate::scheduler::{ExecutionScheduler, PendingExecution};

/// An engine instance and the host it calls back into.
pub struct VmInstance {
    engine: RefCell<Option<Arc<dyn VmEngine>>>,
    dispatcher: HostInterfaceDispatcher,
    serve_loops: RefCell<Vec<JoinHandle<()>>>,
    scheduler: ExecutionScheduler,
    name: String,
    version: String,
}

impl VmInstance {
    /// Load an engine from a shared library and bind it to `host`.
    ///
    /// # Arguments
    ///
    /// * `library_path` - Path of the engine's shared library
    /// * `host` - Object answering the engine's callbacks
    /// * `config` - Worker thread settings
    ///
    /// # Errors
    ///
    /// Returns a load error if the library cannot be opened, exports no
    /// create function, or was built for another ABI version.
    #[instrument(skip(host, config))]
    pub fn create<H>(
        library_path: &str,
        host: &Rc<H>,
        config: &SchedulerConfig,
    ) -> Result<Self, BridgeError>
    where
        H: HostCallbacks + 'static,
    {
        let engine = DynamicEngine::load(library_path)?;
        Ok(Self::with_engine(Arc::new(engine), host, config))
    }

    /// Bind an already constructed engine to `host`.
    ///
    /// The instance holds the host weakly; the caller keeps it alive for as
    /// long as executions may call back.
    pub fn with_engine<H>(
        engine: Arc<dyn VmEngine>,
        host: &Rc<H>,
        config: &SchedulerConfig,
    ) -> Self
    where
        H: HostCallbacks + 'static,
    {
        let host: Rc<dyn HostCallbacks> = host.clone();
        let weak = Rc::downgrade(&host);
        let (channels, receivers) = CallChannels::open();
        let serve_loops = receivers.spawn(&weak);

        let name = engine.name().to_string();
        let version = engine.version().to_string();
        info!(engine = %name, version = %version, "Engine instance created");

        Self {
            engine: RefCell::new(Some(engine)),
            dispatcher: HostInterfaceDispatcher::new(channels),
            serve_loops: RefCell::new(serve_loops),
            scheduler: ExecutionScheduler::new(config.clone()),
            name,
            version,
        }
    }

    /// Start an execution and return without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InstanceReleased`] after [`release`](Self::release),
    /// a usage error if `params` is malformed, or
    /// [`BridgeError::WorkerSpawn`] if no worker could be started.
    pub fn execute(&self, params: &HostValue) -> Result<PendingExecution, BridgeError> {
        let engine = self
            .engine
            .borrow()
            .as_ref()
            .map(Arc::clone)
            .ok_or(BridgeError::InstanceReleased)?;
        let params = ExecuteParams::from_host(params)?;

        debug!(
            engine = %self.name,
            revision = ?params.revision,
            kind = ?params.message.kind,
            code_len = params.code.len(),
            "Executing"
        );

        self.scheduler.schedule(engine, self.dispatcher.clone(), params)
    }

    /// Destroy the engine and stop serving callbacks.
    ///
    /// Returns `true` the first time and `false` on every later call.
    /// Executions still running keep the engine alive until they return,
    /// but any callback they make afterwards aborts the process.
    pub fn release(&self) -> bool {
        let Some(engine) = self.engine.borrow_mut().take() else {
            return false;
        };

        let running = self.scheduler.in_flight();
        if running > 0 {
            warn!(engine = %self.name, running, "Releasing instance with executions in flight");
        }

        self.dispatcher.channels().close_all();
        self.serve_loops.borrow_mut().clear();
        drop(engine);

        info!(engine = %self.name, "Engine instance released");
        true
    }

    /// Returns `true` once the instance has been released.
    pub fn is_released(&self) -> bool {
        self.engine.borrow().is_none()
    }

    /// Engine name reported at load time.
    pub fn engine_name(&self) -> &str {
        &self.name
    }

    /// Engine version reported at load time.
    pub fn engine_version(&self) -> &str {
        &self.version
    }

    /// Executions whose worker has not returned yet.
    pub fn running(&self) -> usize {
        self.scheduler.in_flight()
    }
}

impl Drop for VmInstance {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for VmInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmInstance")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use num_bigint::BigInt;
    use tokio::task::LocalSet;

    use super::*;
    use evmc_bridge_core::marshal::message_to_host;
    use evmc_bridge_core::{
        Address, ExecutionResult, HostContext, Message, NativeEngine, Revision, Word256,
    };
    use evmc_bridge_host::HostReturn;

    struct QuietHost;

    impl HostCallbacks for QuietHost {
        fn account_exists(&self, _: BigInt) -> HostReturn {
            HostReturn::immediate(true)
        }
        fn get_storage(&self, _: BigInt, key: BigInt) -> HostReturn {
            HostReturn::immediate(key + 1)
        }
        fn set_storage(&self, _: BigInt, _: BigInt, _: BigInt) -> HostReturn {
            HostReturn::immediate(0)
        }
        fn get_balance(&self, _: BigInt) -> HostReturn {
            HostReturn::immediate(BigInt::from(0))
        }
        fn get_code_size(&self, _: BigInt) -> HostReturn {
            HostReturn::immediate(BigInt::from(0))
        }
        fn get_code_hash(&self, _: BigInt) -> HostReturn {
            HostReturn::immediate(BigInt::from(0))
        }
        fn copy_code(&self, _: BigInt, _: i64, _: i64) -> HostReturn {
            HostReturn::immediate(Vec::<u8>::new())
        }
        fn selfdestruct(&self, _: BigInt, _: BigInt) -> HostReturn {
            HostReturn::none()
        }
        fn call(&self, _: HostValue) -> HostReturn {
            HostReturn::none()
        }
        fn get_tx_context(&self) -> HostReturn {
            HostReturn::none()
        }
        fn get_block_hash(&self, _: BigInt) -> HostReturn {
            HostReturn::immediate(BigInt::from(0))
        }
        fn emit_log(&self, _: BigInt, _: Vec<u8>, _: Vec<BigInt>) -> HostReturn {
            HostReturn::none()
        }
        fn access_account(&self, _: BigInt) -> HostReturn {
            HostReturn::immediate(0)
        }
        fn access_storage(&self, _: BigInt, _: BigInt) -> HostReturn {
            HostReturn::immediate(0)
        }
    }

    fn params() -> HostValue {
        HostValue::object([
            ("revision", HostValue::from(Revision::London.code())),
            (
                "message",
                message_to_host(&Message::call(Address::from_u64(1), Address::from_u64(2), 50)),
            ),
            ("code", HostValue::Buffer(vec![0x00])),
        ])
    }

    fn storage_engine() -> Arc<dyn VmEngine> {
        Arc::new(NativeEngine::new(
            "storage",
            "0.1.0",
            |host: &dyn HostContext, _, message, _| {
                let value = host.get_storage(&message.destination, &Word256::from_u64(9));
                ExecutionResult::success(message.gas, value.as_bytes().to_vec())
            },
        ))
    }

    #[tokio::test]
    async fn test_execute_calls_back_into_host() {
        LocalSet::new()
            .run_until(async {
                let host = Rc::new(QuietHost);
                let instance =
                    VmInstance::with_engine(storage_engine(), &host, &SchedulerConfig::default());
                assert_eq!(instance.engine_name(), "storage");
                assert_eq!(instance.engine_version(), "0.1.0");

                let result = instance.execute(&params()).unwrap().into_result().await.unwrap();
                assert_eq!(result.output[31], 10);
                assert_eq!(result.gas_left, 50);
            })
            .await;
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        LocalSet::new()
            .run_until(async {
                let host = Rc::new(QuietHost);
                let instance =
                    VmInstance::with_engine(storage_engine(), &host, &SchedulerConfig::default());

                assert!(instance.release());
                assert!(instance.is_released());
                assert!(!instance.release());
            })
            .await;
    }

    #[tokio::test]
    async fn test_execute_after_release() {
        LocalSet::new()
            .run_until(async {
                let host = Rc::new(QuietHost);
                let instance =
                    VmInstance::with_engine(storage_engine(), &host, &SchedulerConfig::default());
                instance.release();

                let err = instance.execute(&params()).unwrap_err();
                assert!(matches!(err, BridgeError::InstanceReleased));
            })
            .await;
    }

    #[tokio::test]
    async fn test_malformed_params_start_nothing() {
        let executed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&executed);
        LocalSet::new()
            .run_until(async move {
                let engine: Arc<dyn VmEngine> =
                    Arc::new(NativeEngine::new("count", "1", move |_, _, _, _| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        ExecutionResult::failure()
                    }));
                let host = Rc::new(QuietHost);
                let instance = VmInstance::with_engine(engine, &host, &SchedulerConfig::default());

                let err = instance
                    .execute(&HostValue::object([("code", HostValue::Buffer(Vec::new()))]))
                    .unwrap_err();
                assert!(err.is_usage_error());
                assert_eq!(instance.running(), 0);
            })
            .await;
        assert_eq!(executed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_revision_reaches_engine() {
        LocalSet::new()
            .run_until(async {
                let engine: Arc<dyn VmEngine> =
                    Arc::new(NativeEngine::new("rev", "1", |_, revision, _, _| {
                        ExecutionResult::success(i64::from(revision.code()), Vec::new())
                    }));
                let host = Rc::new(QuietHost);
                let instance = VmInstance::with_engine(engine, &host, &SchedulerConfig::default());

                let result = instance.execute(&params()).unwrap().into_result().await.unwrap();
                assert_eq!(result.gas_left, i64::from(Revision::London.code()));
            })
            .await;
    }

    #[tokio::test]
    async fn test_create_missing_library() {
        LocalSet::new()
            .run_until(async {
                let host = Rc::new(QuietHost);
                let err = VmInstance::create(
                    "/nonexistent/libnothing.so",
                    &host,
                    &SchedulerConfig::default(),
                )
                .unwrap_err();
                assert!(err.is_load_error());
            })
            .await;
    }
}
