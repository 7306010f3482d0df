//! The host-side callback object.
//!
//! A host implements [`HostCallbacks`] once per engine instance. Every
//! method runs on the host thread and answers either right away or with a
//! future that the host thread drives to completion.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use num_bigint::BigInt;

use evmc_bridge_core::HostValue;

/// A boxed future that stays on the thread that created it.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Answer of a host callback.
pub enum HostReturn {
    /// The value is available now.
    Immediate(HostValue),
    /// The value arrives when the future resolves on the host thread.
    Deferred(LocalBoxFuture<'static, HostValue>),
}

impl HostReturn {
    /// Answer immediately.
    pub fn immediate(value: impl Into<HostValue>) -> Self {
        Self::Immediate(value.into())
    }

    /// Answer once `future` resolves.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = HostValue> + 'static,
    {
        Self::Deferred(Box::pin(future))
    }

    /// Answer with no value, for notifications.
    pub fn none() -> Self {
        Self::Immediate(HostValue::Undefined)
    }

    /// Returns `true` if the answer is still pending.
    #[cfg(test)]
    pub(crate) fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl From<HostValue> for HostReturn {
    fn from(value: HostValue) -> Self {
        Self::Immediate(value)
    }
}

impl fmt::Debug for HostReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
            Self::Deferred(_) => f.debug_tuple("Deferred").finish_non_exhaustive(),
        }
    }
}

/// Host callbacks invoked on behalf of a running engine.
///
/// Addresses, words and block numbers arrive as non-negative bigints.
/// Implementations live on the host thread and need not be `Send`.
pub trait HostCallbacks {
    /// Answer with a boolean.
    fn account_exists(&self, address: BigInt) -> HostReturn;

    /// Answer with a bigint word.
    fn get_storage(&self, address: BigInt, key: BigInt) -> HostReturn;

    /// Answer with a storage status code.
    fn set_storage(&self, address: BigInt, key: BigInt, value: BigInt) -> HostReturn;

    /// Answer with a bigint word.
    fn get_balance(&self, address: BigInt) -> HostReturn;

    /// Answer with a non-negative bigint.
    fn get_code_size(&self, address: BigInt) -> HostReturn;

    /// Answer with a bigint word.
    fn get_code_hash(&self, address: BigInt) -> HostReturn;

    /// Answer with a buffer. Bytes past `capacity` are ignored.
    fn copy_code(&self, address: BigInt, code_offset: i64, capacity: i64) -> HostReturn;

    /// The answer is ignored, but still awaited.
    fn selfdestruct(&self, address: BigInt, beneficiary: BigInt) -> HostReturn;

    /// Answer with a result object `{statusCode, gasLeft, outputData, createAddress?}`.
    fn call(&self, message: HostValue) -> HostReturn;

    /// Answer with a transaction context object.
    fn get_tx_context(&self) -> HostReturn;

    /// Answer with a bigint word.
    fn get_block_hash(&self, number: BigInt) -> HostReturn;

    /// The answer is ignored, but still awaited.
    fn emit_log(&self, address: BigInt, data: Vec<u8>, topics: Vec<BigInt>) -> HostReturn;

    /// Answer with an access status code.
    fn access_account(&self, address: BigInt) -> HostReturn;

    /// Answer with an access status code.
    fn access_storage(&self, address: BigInt, key: BigInt) -> HostReturn;
}
