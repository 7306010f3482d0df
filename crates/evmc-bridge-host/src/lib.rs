//! Cross-thread callback plumbing for evmc-bridge.
//!
//! Engines run on worker threads, while the host object that answers their
//! callbacks lives on a single host thread. This crate connects the two:
//!
//! - [`HostCallbacks`]: The host object, answering immediately or deferred
//! - [`PendingCallSlot`] / [`Completion`]: Per-call rendezvous
//! - [`CallChannel`]: Worker-to-host request queue, one per callback kind
//! - [`calls`]: The fourteen callback descriptors
//! - [`adapter`]: Host-thread serve loops that settle each call
//! - [`HostInterfaceDispatcher`]: The engine-facing [`HostContext`]
//!
//! # Round trip
//!
//! ```text
//!  worker thread                         host thread (LocalSet)
//!  ─────────────                         ──────────────────────
//!  dispatcher.get_storage()
//!    └─ channel.submit() ──Submission──▶ serve loop
//!         │                                └─ host.get_storage()
//!         │                                     ├─ Immediate ─┐
//!         │                                     └─ Deferred ──┤ (spawn_local)
//!         ▼                                                   ▼
//!    slot.wait() ◀────────── Completion::complete ───────── finish()
//! ```
//!
//! [`HostContext`]: evmc_bridge_core::HostContext

pub mod adapter;
pub mod callbacks;
pub mod calls;
pub mod channel;
pub mod dispatcher;
pub mod rendezvous;

pub use adapter::CallPhase;
pub use callbacks::{HostCallbacks, HostReturn, LocalBoxFuture};
pub use calls::HostCall;
pub use channel::{CallChannel, Submission};
pub use dispatcher::{CallChannels, ChannelReceivers, HostInterfaceDispatcher};
pub use rendezvous::{Completion, PendingCallSlot, Semaphore};
