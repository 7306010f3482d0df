//! The fourteen callback descriptors.
//!
//! Each descriptor owns the arguments of one engine callback, knows how to
//! present them to the host and how to read the host's answer back. Owning
//! the data lets a request outlive the engine frame that issued it.

use num_bigint::BigInt;

use evmc_bridge_common::ProtocolViolation;
use evmc_bridge_core::codec::{address_to_host, u64_from_host, word_from_host, word_to_host};
use evmc_bridge_core::marshal::{message_to_host, result_from_host, tx_context_from_host};
use evmc_bridge_core::{
    AccessStatus, Address, ExecutionResult, HostValue, Message, StorageStatus, TxContext, Word256,
};

use crate::callbacks::{HostCallbacks, HostReturn};

/// One kind of callback round trip.
pub trait HostCall: Send + 'static {
    /// Native answer handed back to the engine.
    type Output: Send + 'static;

    /// Host-facing name of the operation, used in logs and errors.
    const NAME: &'static str;

    /// Present the request to the host.
    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn;

    /// Convert the host's answer into the native output.
    fn convert(&self, value: HostValue) -> Result<Self::Output, ProtocolViolation>;
}

fn read_word(value: &HostValue, field: &str) -> Result<Word256, ProtocolViolation> {
    word_from_host(value.as_bigint(field)?, field)
}

fn read_access_status(value: &HostValue, field: &str) -> Result<AccessStatus, ProtocolViolation> {
    AccessStatus::from_code(value.to_i64(field)?)
}

fn host_usize(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `account_exists(address) -> bool`
#[derive(Debug, Clone)]
pub struct AccountExists {
    pub address: Address,
}

impl HostCall for AccountExists {
    type Output = bool;
    const NAME: &'static str = "accountExists";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.account_exists(address_to_host(&self.address))
    }

    fn convert(&self, value: HostValue) -> Result<bool, ProtocolViolation> {
        value.as_bool(Self::NAME)
    }
}

/// `get_storage(address, key) -> word`
#[derive(Debug, Clone)]
pub struct GetStorage {
    pub address: Address,
    pub key: Word256,
}

impl HostCall for GetStorage {
    type Output = Word256;
    const NAME: &'static str = "getStorage";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.get_storage(address_to_host(&self.address), word_to_host(&self.key))
    }

    fn convert(&self, value: HostValue) -> Result<Word256, ProtocolViolation> {
        read_word(&value, Self::NAME)
    }
}

/// `set_storage(address, key, value) -> status`
#[derive(Debug, Clone)]
pub struct SetStorage {
    pub address: Address,
    pub key: Word256,
    pub value: Word256,
}

impl HostCall for SetStorage {
    type Output = StorageStatus;
    const NAME: &'static str = "setStorage";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.set_storage(
            address_to_host(&self.address),
            word_to_host(&self.key),
            word_to_host(&self.value),
        )
    }

    fn convert(&self, value: HostValue) -> Result<StorageStatus, ProtocolViolation> {
        StorageStatus::from_code(value.to_i64(Self::NAME)?)
    }
}

/// `get_balance(address) -> word`
#[derive(Debug, Clone)]
pub struct GetBalance {
    pub address: Address,
}

impl HostCall for GetBalance {
    type Output = Word256;
    const NAME: &'static str = "getBalance";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.get_balance(address_to_host(&self.address))
    }

    fn convert(&self, value: HostValue) -> Result<Word256, ProtocolViolation> {
        read_word(&value, Self::NAME)
    }
}

/// `get_code_size(address) -> size`
#[derive(Debug, Clone)]
pub struct GetCodeSize {
    pub address: Address,
}

impl HostCall for GetCodeSize {
    type Output = usize;
    const NAME: &'static str = "getCodeSize";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.get_code_size(address_to_host(&self.address))
    }

    fn convert(&self, value: HostValue) -> Result<usize, ProtocolViolation> {
        let size = u64_from_host(value.as_bigint(Self::NAME)?, Self::NAME)?;
        usize::try_from(size).map_err(|_| ProtocolViolation::OutOfRange {
            field: Self::NAME.to_string(),
            target: "usize",
        })
    }
}

/// `get_code_hash(address) -> word`
#[derive(Debug, Clone)]
pub struct GetCodeHash {
    pub address: Address,
}

impl HostCall for GetCodeHash {
    type Output = Word256;
    const NAME: &'static str = "getCodeHash";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.get_code_hash(address_to_host(&self.address))
    }

    fn convert(&self, value: HostValue) -> Result<Word256, ProtocolViolation> {
        read_word(&value, Self::NAME)
    }
}

/// `copy_code(address, offset, capacity) -> bytes`
///
/// The answer is cut to `capacity` bytes.
#[derive(Debug, Clone)]
pub struct CopyCode {
    pub address: Address,
    pub code_offset: usize,
    pub capacity: usize,
}

impl HostCall for CopyCode {
    type Output = Vec<u8>;
    const NAME: &'static str = "copyCode";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.copy_code(
            address_to_host(&self.address),
            host_usize(self.code_offset),
            host_usize(self.capacity),
        )
    }

    fn convert(&self, value: HostValue) -> Result<Vec<u8>, ProtocolViolation> {
        let code = value.as_bytes(Self::NAME)?;
        let copied = code.len().min(self.capacity);
        Ok(code[..copied].to_vec())
    }
}

/// `selfdestruct(address, beneficiary)`
#[derive(Debug, Clone)]
pub struct SelfDestruct {
    pub address: Address,
    pub beneficiary: Address,
}

impl HostCall for SelfDestruct {
    type Output = ();
    const NAME: &'static str = "selfDestruct";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.selfdestruct(
            address_to_host(&self.address),
            address_to_host(&self.beneficiary),
        )
    }

    fn convert(&self, _value: HostValue) -> Result<(), ProtocolViolation> {
        Ok(())
    }
}

/// `call(message) -> result`
#[derive(Debug, Clone)]
pub struct Call {
    pub message: Message,
}

impl HostCall for Call {
    type Output = ExecutionResult;
    const NAME: &'static str = "call";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.call(message_to_host(&self.message))
    }

    fn convert(&self, value: HostValue) -> Result<ExecutionResult, ProtocolViolation> {
        result_from_host(&value, Self::NAME)
    }
}

/// `get_tx_context() -> context`
#[derive(Debug, Clone)]
pub struct GetTxContext;

impl HostCall for GetTxContext {
    type Output = TxContext;
    const NAME: &'static str = "getTxContext";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.get_tx_context()
    }

    fn convert(&self, value: HostValue) -> Result<TxContext, ProtocolViolation> {
        tx_context_from_host(&value, Self::NAME)
    }
}

/// `get_block_hash(number) -> word`
#[derive(Debug, Clone)]
pub struct GetBlockHash {
    pub number: u64,
}

impl HostCall for GetBlockHash {
    type Output = Word256;
    const NAME: &'static str = "getBlockHash";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.get_block_hash(BigInt::from(self.number))
    }

    fn convert(&self, value: HostValue) -> Result<Word256, ProtocolViolation> {
        read_word(&value, Self::NAME)
    }
}

/// `emit_log(address, data, topics)`
#[derive(Debug, Clone)]
pub struct EmitLog {
    pub address: Address,
    pub data: Vec<u8>,
    pub topics: Vec<Word256>,
}

impl HostCall for EmitLog {
    type Output = ();
    const NAME: &'static str = "emitLog";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.emit_log(
            address_to_host(&self.address),
            self.data.clone(),
            self.topics.iter().map(word_to_host).collect(),
        )
    }

    fn convert(&self, _value: HostValue) -> Result<(), ProtocolViolation> {
        Ok(())
    }
}

/// `access_account(address) -> status`
#[derive(Debug, Clone)]
pub struct AccessAccount {
    pub address: Address,
}

impl HostCall for AccessAccount {
    type Output = AccessStatus;
    const NAME: &'static str = "accessAccount";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.access_account(address_to_host(&self.address))
    }

    fn convert(&self, value: HostValue) -> Result<AccessStatus, ProtocolViolation> {
        read_access_status(&value, Self::NAME)
    }
}

/// `access_storage(address, key) -> status`
#[derive(Debug, Clone)]
pub struct AccessStorage {
    pub address: Address,
    pub key: Word256,
}

impl HostCall for AccessStorage {
    type Output = AccessStatus;
    const NAME: &'static str = "accessStorage";

    fn invoke(&self, host: &dyn HostCallbacks) -> HostReturn {
        host.access_storage(address_to_host(&self.address), word_to_host(&self.key))
    }

    fn convert(&self, value: HostValue) -> Result<AccessStatus, ProtocolViolation> {
        read_access_status(&value, Self::NAME)
    }
}
