//! Thread-safe channel from engine workers to the host thread.
//!
//! One [`CallChannel`] exists per callback kind and instance. Workers submit
//! requests and block until the host thread answers. The host thread drains
//! the matching receiver in a serve loop (see [`crate::adapter::serve`]).

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::RwLock;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, warn};

use evmc_bridge_common::CallError;

use crate::calls::HostCall;
use crate::rendezvous::{Completion, PendingCallSlot};

/// A request on its way to the host thread, with the means to answer it.
pub struct Submission<C: HostCall> {
    pub request: C,
    pub completion: Completion<C::Output>,
}

impl<C: HostCall + fmt::Debug> fmt::Debug for Submission<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

struct ChannelShared<C: HostCall> {
    sender: RwLock<Option<UnboundedSender<Submission<C>>>>,
    in_flight: AtomicUsize,
    host_thread: ThreadId,
}

/// Scoped marker for one call in flight.
#[derive(Debug)]
pub(crate) struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self { counter }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Submission side of a callback channel.
pub struct CallChannel<C: HostCall> {
    shared: Arc<ChannelShared<C>>,
}

impl<C: HostCall> Clone for CallChannel<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: HostCall> CallChannel<C> {
    /// Open a channel. The calling thread becomes its host thread.
    pub fn open() -> (Self, UnboundedReceiver<Submission<C>>) {
        let (sender, receiver) = unbounded_channel();
        let channel = Self {
            shared: Arc::new(ChannelShared {
                sender: RwLock::new(Some(sender)),
                in_flight: AtomicUsize::new(0),
                host_thread: thread::current().id(),
            }),
        };
        (channel, receiver)
    }

    /// Mark a call as in flight until the guard is dropped.
    pub(crate) fn acquire(&self) -> InFlightGuard<'_> {
        InFlightGuard::new(&self.shared.in_flight)
    }

    /// Send `request` to the host thread and block until it is answered.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The caller is the host thread itself
    /// - The channel has been closed
    /// - The host thread no longer serves the channel
    /// - The host dropped the request without answering
    pub fn submit(&self, request: C) -> Result<C::Output, CallError> {
        if thread::current().id() == self.shared.host_thread {
            return Err(CallError::HostThreadReentry);
        }

        let _guard = self.acquire();
        let (slot, completion) = PendingCallSlot::new();

        {
            let sender = self.shared.sender.read();
            let Some(sender) = sender.as_ref() else {
                return Err(CallError::Closed);
            };
            sender
                .send(Submission {
                    request,
                    completion,
                })
                .map_err(|_| CallError::Disconnected)?;
        }

        slot.wait()
    }

    /// Close the channel. Returns `true` only for the first close.
    ///
    /// Requests already queued are still answered.
    pub fn close(&self) -> bool {
        let Some(sender) = self.shared.sender.write().take() else {
            return false;
        };
        drop(sender);

        let in_flight = self.in_flight();
        if in_flight > 0 {
            warn!(
                operation = C::NAME,
                in_flight, "Callback channel closed with calls in flight"
            );
        } else {
            debug!(operation = C::NAME, "Callback channel closed");
        }
        true
    }

    /// Returns `true` once the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.sender.read().is_none()
    }

    /// Number of submissions currently waiting for an answer.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Acquire)
    }
}

impl<C: HostCall> fmt::Debug for CallChannel<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallChannel")
            .field("operation", &C::NAME)
            .field("closed", &self.is_closed())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::calls::GetBlockHash;
    use evmc_bridge_core::Word256;

    #[test]
    fn test_submit_from_host_thread_rejected() {
        let (channel, _receiver) = CallChannel::<GetBlockHash>::open();
        let result = channel.submit(GetBlockHash { number: 1 });
        assert_eq!(result, Err(CallError::HostThreadReentry));
        assert_eq!(channel.in_flight(), 0);
    }

    #[test]
    fn test_close_only_once() {
        let (channel, _receiver) = CallChannel::<GetBlockHash>::open();
        assert!(!channel.is_closed());
        assert!(channel.close());
        assert!(!channel.close());
        assert!(channel.is_closed());
    }

    #[test]
    fn test_submit_on_closed_channel() {
        let (channel, _receiver) = CallChannel::<GetBlockHash>::open();
        channel.close();

        let worker = channel.clone();
        let result = std::thread::spawn(move || worker.submit(GetBlockHash { number: 1 }))
            .join()
            .unwrap();
        assert_eq!(result, Err(CallError::Closed));
    }

    #[test]
    fn test_submit_after_receiver_dropped() {
        let (channel, receiver) = CallChannel::<GetBlockHash>::open();
        drop(receiver);

        let worker = channel.clone();
        let result = std::thread::spawn(move || worker.submit(GetBlockHash { number: 1 }))
            .join()
            .unwrap();
        assert_eq!(result, Err(CallError::Disconnected));
    }

    #[test]
    fn test_round_trip_and_in_flight() {
        let (channel, mut receiver) = CallChannel::<GetBlockHash>::open();

        let worker = channel.clone();
        let handle = std::thread::spawn(move || worker.submit(GetBlockHash { number: 9 }));

        let submission = receiver.blocking_recv().unwrap();
        assert_eq!(submission.request.number, 9);
        assert_eq!(channel.in_flight(), 1);
        submission.completion.complete(Word256::from_u64(9));

        assert_eq!(handle.join().unwrap(), Ok(Word256::from_u64(9)));
        assert_eq!(channel.in_flight(), 0);
    }

    #[test]
    fn test_dropped_submission_wakes_worker() {
        let (channel, mut receiver) = CallChannel::<GetBlockHash>::open();

        let worker = channel.clone();
        let handle = std::thread::spawn(move || worker.submit(GetBlockHash { number: 3 }));

        let submission = receiver.blocking_recv().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        drop(submission);

        assert_eq!(handle.join().unwrap(), Err(CallError::Abandoned));
    }

    #[test]
    fn test_queued_request_survives_close() {
        let (channel, mut receiver) = CallChannel::<GetBlockHash>::open();

        let worker = channel.clone();
        let handle = std::thread::spawn(move || worker.submit(GetBlockHash { number: 4 }));

        let submission = receiver.blocking_recv().unwrap();
        assert!(channel.close());
        submission.completion.complete(Word256::from_u64(4));

        assert_eq!(handle.join().unwrap(), Ok(Word256::from_u64(4)));
        assert!(receiver.blocking_recv().is_none());
    }
}
