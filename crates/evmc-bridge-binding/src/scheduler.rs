//! Running executions off the host thread.
//!
//! The engine call blocks for as long as the bytecode runs, including every
//! callback round trip, so each execution gets its own worker thread. The
//! host thread only ever awaits a [`PendingExecution`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::thread;

use tokio::sync::oneshot;
use tracing::{Instrument as _, debug, info_span, instrument};
use uuid::Uuid;

use evmc_bridge_common::{BridgeError, SchedulerConfig};
use evmc_bridge_core::marshal::result_to_host;
use evmc_bridge_core::{ExecutionResult, HostValue, VmEngine};
use evmc_bridge_host::HostInterfaceDispatcher;

use crate::params::ExecuteParams;

/// Decrements the shared in-flight count when dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Dispatches executions to worker threads.
#[derive(Debug)]
pub struct ExecutionScheduler {
    config: SchedulerConfig,
    spawned: AtomicU64,
    in_flight: Arc<AtomicUsize>,
}

impl ExecutionScheduler {
    /// Create a scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            spawned: AtomicU64::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start an execution on a new worker thread and return immediately.
    ///
    /// # Arguments
    ///
    /// * `engine` - Engine to run; kept alive until the worker finishes
    /// * `host` - Dispatcher the engine calls back through
    /// * `params` - Revision, message and code, moved to the worker
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::WorkerSpawn`] if the thread cannot be started.
    #[instrument(skip_all, fields(engine = engine.name(), revision = ?params.revision))]
    pub fn schedule(
        &self,
        engine: Arc<dyn VmEngine>,
        host: HostInterfaceDispatcher,
        params: ExecuteParams,
    ) -> Result<PendingExecution, BridgeError> {
        let execution_id = Uuid::new_v4().to_string();
        let sequence = self.spawned.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        let in_flight = InFlight::enter(&self.in_flight);
        let span = info_span!("execution", id = %execution_id, gas = params.message.gas);

        thread::Builder::new()
            .name(format!("{}-{sequence}", self.config.thread_name))
            .stack_size(self.config.stack_size_bytes())
            .spawn(move || {
                let guard = in_flight;
                let _entered = span.enter();

                let ExecuteParams {
                    revision,
                    message,
                    code,
                } = params;
                let result = engine.execute(&host, revision, &message, &code);
                drop(code);
                drop(message);
                drop(host);
                drop(engine);

                debug!(
                    status = ?result.status,
                    gas_left = result.gas_left,
                    output_len = result.output.len(),
                    "Execution finished"
                );

                drop(guard);
                // The host may have stopped waiting.
                let _ = sender.send(result);
            })
            .map_err(BridgeError::WorkerSpawn)?;

        debug!(execution_id = %execution_id, "Execution scheduled");

        Ok(PendingExecution {
            execution_id,
            receiver,
        })
    }

    /// Number of executions whose worker has not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

/// An execution running on a worker, resolved on the host thread.
///
/// Resolves to the host result object
/// `{statusCode, gasLeft, outputData, createAddress?}`.
#[derive(Debug)]
pub struct PendingExecution {
    execution_id: String,
    receiver: oneshot::Receiver<ExecutionResult>,
}

impl PendingExecution {
    /// Identifier recorded in the execution's tracing span.
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Wait for the native result instead of the host object.
    pub async fn into_result(self) -> Result<ExecutionResult, BridgeError> {
        let execution_id = self.execution_id;
        self.receiver
            .instrument(info_span!("await_execution", id = %execution_id))
            .await
            .map_err(|_| BridgeError::ExecutionLost { execution_id })
    }
}

impl Future for PendingExecution {
    type Output = Result<HostValue, BridgeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => {
                let value = result_to_host(&result);
                debug!(execution_id = %this.execution_id, "Execution result published");
                Poll::Ready(Ok(value))
            }
            Poll::Ready(Err(_)) => Poll::Ready(Err(BridgeError::ExecutionLost {
                execution_id: this.execution_id.clone(),
            })),
        }
    }
}
