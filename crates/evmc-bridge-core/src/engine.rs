//! Engine and host interfaces.
//!
//! An engine runs bytecode on a worker thread and talks to the outside world
//! only through a [`HostContext`]. Every host operation is synchronous from
//! the engine's point of view: the call returns once the answer is known.

use std::fmt;
use std::sync::Arc;

use crate::types::{
    AccessStatus, Address, ExecutionResult, Message, Revision, StorageStatus, TxContext, Word256,
};

/// The fourteen host operations an engine may invoke during execution.
///
/// Implementations must be callable from any worker thread.
pub trait HostContext: Send + Sync {
    /// Check whether an account exists.
    fn account_exists(&self, address: &Address) -> bool;

    /// Read a storage slot.
    fn get_storage(&self, address: &Address, key: &Word256) -> Word256;

    /// Write a storage slot.
    fn set_storage(&self, address: &Address, key: &Word256, value: &Word256) -> StorageStatus;

    /// Read an account balance.
    fn get_balance(&self, address: &Address) -> Word256;

    /// Size of an account's code in bytes.
    fn get_code_size(&self, address: &Address) -> usize;

    /// Hash of an account's code.
    fn get_code_hash(&self, address: &Address) -> Word256;

    /// Copy code starting at `code_offset` into `buffer`.
    ///
    /// Returns the number of bytes written, never more than `buffer.len()`.
    fn copy_code(&self, address: &Address, code_offset: usize, buffer: &mut [u8]) -> usize;

    /// Destroy an account, sending its balance to `beneficiary`.
    fn selfdestruct(&self, address: &Address, beneficiary: &Address);

    /// Perform a nested call or create.
    fn call(&self, message: &Message) -> ExecutionResult;

    /// Read the transaction and block environment.
    fn get_tx_context(&self) -> TxContext;

    /// Hash of a past block.
    fn get_block_hash(&self, number: u64) -> Word256;

    /// Record a log entry.
    fn emit_log(&self, address: &Address, data: &[u8], topics: &[Word256]);

    /// Mark an account as accessed.
    fn access_account(&self, address: &Address) -> AccessStatus;

    /// Mark a storage slot as accessed.
    fn access_storage(&self, address: &Address, key: &Word256) -> AccessStatus;
}

/// A bytecode execution engine.
pub trait VmEngine: Send + Sync {
    /// Run `code` for `message`, calling back into `host` as needed.
    fn execute(
        &self,
        host: &dyn HostContext,
        revision: Revision,
        message: &Message,
        code: &[u8],
    ) -> ExecutionResult;

    /// Engine name.
    fn name(&self) -> &str;

    /// Engine version string.
    fn version(&self) -> &str;
}

type ExecuteFn =
    dyn Fn(&dyn HostContext, Revision, &Message, &[u8]) -> ExecutionResult + Send + Sync;

/// An engine implemented by a Rust closure.
///
/// Useful for embedding interpreters written in Rust and for exercising the
/// bridge without a shared library.
#[derive(Clone)]
pub struct NativeEngine {
    name: String,
    version: String,
    execute: Arc<ExecuteFn>,
}

impl NativeEngine {
    /// Create an engine from an execute function.
    pub fn new<F>(name: impl Into<String>, version: impl Into<String>, execute: F) -> Self
    where
        F: Fn(&dyn HostContext, Revision, &Message, &[u8]) -> ExecutionResult
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            version: version.into(),
            execute: Arc::new(execute),
        }
    }
}

impl VmEngine for NativeEngine {
    fn execute(
        &self,
        host: &dyn HostContext,
        revision: Revision,
        message: &Message,
        code: &[u8],
    ) -> ExecutionResult {
        (self.execute)(host, revision, message, code)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Debug for NativeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeEngine")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
