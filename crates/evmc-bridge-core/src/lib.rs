//! Core data model and engines for evmc-bridge.
//!
//! This crate knows nothing about threads or the host runtime. It provides:
//! - [`types`]: Words, addresses, messages, results and EVMC enumerations
//! - [`codec`]: Conversion between fixed-width values and host bigints
//! - [`HostValue`]: The dynamically typed value model of the host
//! - [`marshal`]: Host object shapes for messages, results and contexts
//! - [`VmEngine`] / [`HostContext`]: The engine and host interfaces
//! - [`DynamicEngine`]: EVMC engines loaded from shared libraries
//! - [`NativeEngine`]: Engines written as Rust closures
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────┐       ┌───────────────────────────┐
//! │        VmEngine           │       │       HostContext         │
//! │  DynamicEngine (C ABI)    │──────▶│  14 synchronous host      │
//! │  NativeEngine (closure)   │       │  operations               │
//! └───────────────────────────┘       └───────────────────────────┘
//!              │                                   ▲
//!              ▼                                   │
//! ┌───────────────────────────┐       ┌───────────────────────────┐
//! │   Message / Revision      │       │  codec + marshal          │
//! │   ExecutionResult         │       │  native <-> HostValue     │
//! └───────────────────────────┘       └───────────────────────────┘
//! ```

pub mod codec;
pub mod engine;
pub mod ffi;
pub mod loader;
pub mod marshal;
pub mod types;
pub mod value;

pub use engine::{HostContext, NativeEngine, VmEngine};
pub use loader::DynamicEngine;
pub use types::{
    AccessStatus, Address, CallKind, ExecutionResult, Message, Revision, StatusCode,
    StorageStatus, TxContext, Word256,
};
pub use value::HostValue;
