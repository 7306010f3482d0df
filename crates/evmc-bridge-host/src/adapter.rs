//! Host-thread side of a callback round trip.
//!
//! Each channel has a serve loop that pulls submissions, invokes the host and
//! settles the worker's slot. Immediate answers settle right away. Deferred
//! answers get one continuation task that settles the slot when the future
//! resolves. Both paths go through [`finish`].

use std::rc::Weak;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, trace};

use evmc_bridge_common::{ProtocolViolation, fatal};
use evmc_bridge_core::HostValue;

use crate::callbacks::{HostCallbacks, HostReturn};
use crate::calls::HostCall;
use crate::channel::Submission;
use crate::rendezvous::Completion;

/// Where a single round trip stands on the host thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// The host callback is being invoked.
    AwaitingImmediate,
    /// The host answered with a future that has not resolved yet.
    AwaitingDeferred,
    /// The worker's slot has been settled.
    Completed,
}

/// Serve one channel until it is closed and drained.
///
/// Must run inside a [`tokio::task::LocalSet`] on the host thread.
pub async fn serve<C: HostCall>(
    mut receiver: UnboundedReceiver<Submission<C>>,
    host: Weak<dyn HostCallbacks>,
) {
    while let Some(submission) = receiver.recv().await {
        let Some(host) = host.upgrade() else {
            fatal(C::NAME, &ProtocolViolation::HostReleased);
        };
        resolve(submission, &*host);
    }
    debug!(operation = C::NAME, "Callback serve loop finished");
}

/// Invoke the host for one submission and arrange for its answer.
pub fn resolve<C: HostCall>(submission: Submission<C>, host: &dyn HostCallbacks) {
    let Submission {
        request,
        completion,
    } = submission;

    trace!(operation = C::NAME, phase = ?CallPhase::AwaitingImmediate, "Invoking host callback");

    match request.invoke(host) {
        HostReturn::Immediate(value) => finish(&request, completion, value),
        HostReturn::Deferred(future) => {
            trace!(operation = C::NAME, phase = ?CallPhase::AwaitingDeferred, "Host answer deferred");
            tokio::task::spawn_local(async move {
                let value = future.await;
                finish(&request, completion, value);
            });
        }
    }
}

/// Convert the host's answer and wake the worker.
///
/// A malformed answer aborts the process.
pub fn finish<C: HostCall>(request: &C, completion: Completion<C::Output>, value: HostValue) {
    match request.convert(value) {
        Ok(output) => {
            completion.complete(output);
            trace!(operation = C::NAME, phase = ?CallPhase::Completed, "Host callback answered");
        }
        Err(violation) => fatal(C::NAME, &violation),
    }
}
