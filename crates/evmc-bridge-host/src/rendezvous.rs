//! Per-call rendezvous between a blocked worker and the host thread.
//!
//! A worker creates a [`PendingCallSlot`], hands the matching [`Completion`]
//! to the host thread and blocks in [`PendingCallSlot::wait`]. The host
//! thread fills the slot exactly once. If the completion is dropped unused,
//! the worker wakes with [`CallError::Abandoned`] instead of hanging.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use evmc_bridge_common::CallError;

/// Counting semaphore.
#[derive(Debug, Default)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Create a semaphore holding `permits` permits.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Add a permit and wake one waiter.
    pub fn post(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        self.available.notify_one();
    }

    /// Block until a permit is available, then take it.
    pub fn wait(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Take a permit if one is available.
    #[cfg(test)]
    pub(crate) fn try_wait(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }
}

enum Outcome<T> {
    Pending,
    Ready(T),
    Abandoned,
}

struct SlotState<T> {
    outcome: Mutex<Outcome<T>>,
    signal: Semaphore,
}

impl<T> SlotState<T> {
    fn settle(&self, outcome: Outcome<T>) {
        *self.outcome.lock() = outcome;
        self.signal.post();
    }
}

/// The waiting half of a rendezvous, held by the worker.
pub struct PendingCallSlot<T> {
    state: Arc<SlotState<T>>,
}

/// The answering half of a rendezvous, sent to the host thread.
pub struct Completion<T> {
    state: Option<Arc<SlotState<T>>>,
}

impl<T> PendingCallSlot<T> {
    /// Create a slot and its completion.
    pub fn new() -> (Self, Completion<T>) {
        let state = Arc::new(SlotState {
            outcome: Mutex::new(Outcome::Pending),
            signal: Semaphore::new(0),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            Completion { state: Some(state) },
        )
    }

    /// Block until the completion is used or dropped.
    pub fn wait(self) -> Result<T, CallError> {
        self.state.signal.wait();
        match std::mem::replace(&mut *self.state.outcome.lock(), Outcome::Abandoned) {
            Outcome::Ready(value) => Ok(value),
            Outcome::Pending | Outcome::Abandoned => Err(CallError::Abandoned),
        }
    }
}

impl<T> Completion<T> {
    /// Store the answer and wake the worker.
    pub fn complete(mut self, value: T) {
        if let Some(state) = self.state.take() {
            state.settle(Outcome::Ready(value));
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.settle(Outcome::Abandoned);
        }
    }
}

impl<T> fmt::Debug for PendingCallSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCallSlot").finish_non_exhaustive()
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("used", &self.state.is_none())
            .finish()
    }
}
