//! EVMC ABI version 8 declarations and host trampolines.
//!
//! The structs mirror `evmc.h` field for field. Enumerations are carried as
//! `i32` and validated on the Rust side, since a foreign value outside the
//! Rust enum's range would be undefined behavior.
//!
//! The engine receives a [`host_interface`] table plus an opaque context pointer
//! that points at a [`HostBinding`]. Every trampoline turns the raw
//! arguments into owned native values and forwards to the bound
//! [`HostContext`].

#![allow(unsafe_code, non_camel_case_types)]

use std::ffi::c_char;
use std::ptr;

use evmc_bridge_common::fatal;

use crate::engine::HostContext;
use crate::types::{Address, CallKind, ExecutionResult, Message, TxContext, Word256};

/// ABI version this bridge speaks.
pub const EVMC_ABI_VERSION: i32 = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct evmc_bytes32 {
    pub bytes: [u8; 32],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct evmc_address {
    pub bytes: [u8; 20],
}

/// Opaque host context handed back to every host function.
#[repr(C)]
pub struct evmc_host_context {
    _private: [u8; 0],
}

#[repr(C)]
pub struct evmc_message {
    pub kind: i32,
    pub flags: u32,
    pub depth: i32,
    pub gas: i64,
    pub destination: evmc_address,
    pub sender: evmc_address,
    pub input_data: *const u8,
    pub input_size: usize,
    pub value: evmc_bytes32,
    pub create2_salt: evmc_bytes32,
}

pub type evmc_release_result_fn = unsafe extern "C" fn(result: *const evmc_result);

#[repr(C)]
pub struct evmc_result {
    pub status_code: i32,
    pub gas_left: i64,
    pub output_data: *const u8,
    pub output_size: usize,
    pub release: Option<evmc_release_result_fn>,
    pub create_address: evmc_address,
    pub padding: [u8; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct evmc_tx_context {
    pub tx_gas_price: evmc_bytes32,
    pub tx_origin: evmc_address,
    pub block_coinbase: evmc_address,
    pub block_number: i64,
    pub block_timestamp: i64,
    pub block_gas_limit: i64,
    pub block_difficulty: evmc_bytes32,
    pub chain_id: evmc_bytes32,
    pub block_base_fee: evmc_bytes32,
}

pub type evmc_account_exists_fn =
    unsafe extern "C" fn(*mut evmc_host_context, *const evmc_address) -> bool;
pub type evmc_get_storage_fn = unsafe extern "C" fn(
    *mut evmc_host_context,
    *const evmc_address,
    *const evmc_bytes32,
) -> evmc_bytes32;
pub type evmc_set_storage_fn = unsafe extern "C" fn(
    *mut evmc_host_context,
    *const evmc_address,
    *const evmc_bytes32,
    *const evmc_bytes32,
) -> i32;
pub type evmc_get_balance_fn =
    unsafe extern "C" fn(*mut evmc_host_context, *const evmc_address) -> evmc_bytes32;
pub type evmc_get_code_size_fn =
    unsafe extern "C" fn(*mut evmc_host_context, *const evmc_address) -> usize;
pub type evmc_get_code_hash_fn =
    unsafe extern "C" fn(*mut evmc_host_context, *const evmc_address) -> evmc_bytes32;
pub type evmc_copy_code_fn = unsafe extern "C" fn(
    *mut evmc_host_context,
    *const evmc_address,
    usize,
    *mut u8,
    usize,
) -> usize;
pub type evmc_selfdestruct_fn =
    unsafe extern "C" fn(*mut evmc_host_context, *const evmc_address, *const evmc_address);
pub type evmc_call_fn =
    unsafe extern "C" fn(*mut evmc_host_context, *const evmc_message) -> evmc_result;
pub type evmc_get_tx_context_fn = unsafe extern "C" fn(*mut evmc_host_context) -> evmc_tx_context;
pub type evmc_get_block_hash_fn = unsafe extern "C" fn(*mut evmc_host_context, i64) -> evmc_bytes32;
pub type evmc_emit_log_fn = unsafe extern "C" fn(
    *mut evmc_host_context,
    *const evmc_address,
    *const u8,
    usize,
    *const evmc_bytes32,
    usize,
);
pub type evmc_access_account_fn =
    unsafe extern "C" fn(*mut evmc_host_context, *const evmc_address) -> i32;
pub type evmc_access_storage_fn = unsafe extern "C" fn(
    *mut evmc_host_context,
    *const evmc_address,
    *const evmc_bytes32,
) -> i32;

#[repr(C)]
pub struct evmc_host_interface {
    pub account_exists: Option<evmc_account_exists_fn>,
    pub get_storage: Option<evmc_get_storage_fn>,
    pub set_storage: Option<evmc_set_storage_fn>,
    pub get_balance: Option<evmc_get_balance_fn>,
    pub get_code_size: Option<evmc_get_code_size_fn>,
    pub get_code_hash: Option<evmc_get_code_hash_fn>,
    pub copy_code: Option<evmc_copy_code_fn>,
    pub selfdestruct: Option<evmc_selfdestruct_fn>,
    pub call: Option<evmc_call_fn>,
    pub get_tx_context: Option<evmc_get_tx_context_fn>,
    pub get_block_hash: Option<evmc_get_block_hash_fn>,
    pub emit_log: Option<evmc_emit_log_fn>,
    pub access_account: Option<evmc_access_account_fn>,
    pub access_storage: Option<evmc_access_storage_fn>,
}

pub type evmc_destroy_fn = unsafe extern "C" fn(*mut evmc_vm);
pub type evmc_execute_fn = unsafe extern "C" fn(
    *mut evmc_vm,
    *const evmc_host_interface,
    *mut evmc_host_context,
    i32,
    *const evmc_message,
    *const u8,
    usize,
) -> evmc_result;
pub type evmc_get_capabilities_fn = unsafe extern "C" fn(*mut evmc_vm) -> u32;
pub type evmc_set_option_fn =
    unsafe extern "C" fn(*mut evmc_vm, *const c_char, *const c_char) -> i32;
pub type evmc_create_fn = unsafe extern "C" fn() -> *mut evmc_vm;

#[repr(C)]
pub struct evmc_vm {
    pub abi_version: i32,
    pub name: *const c_char,
    pub version: *const c_char,
    pub destroy: Option<evmc_destroy_fn>,
    pub execute: Option<evmc_execute_fn>,
    pub get_capabilities: Option<evmc_get_capabilities_fn>,
    pub set_option: Option<evmc_set_option_fn>,
}

impl From<evmc_address> for Address {
    fn from(raw: evmc_address) -> Self {
        Self(raw.bytes)
    }
}

impl From<Address> for evmc_address {
    fn from(address: Address) -> Self {
        Self {
            bytes: address.0,
        }
    }
}

impl From<evmc_bytes32> for Word256 {
    fn from(raw: evmc_bytes32) -> Self {
        Self(raw.bytes)
    }
}

impl From<Word256> for evmc_bytes32 {
    fn from(word: Word256) -> Self {
        Self { bytes: word.0 }
    }
}

impl From<TxContext> for evmc_tx_context {
    fn from(context: TxContext) -> Self {
        Self {
            tx_gas_price: context.gas_price.into(),
            tx_origin: context.origin.into(),
            block_coinbase: context.coinbase.into(),
            block_number: context.block_number,
            block_timestamp: context.timestamp,
            block_gas_limit: context.gas_limit,
            block_difficulty: context.difficulty.into(),
            chain_id: context.chain_id.into(),
            block_base_fee: context.base_fee.into(),
        }
    }
}

/// Build the raw message for `message`. The result borrows its input.
pub(crate) fn message_to_ffi(message: &Message) -> evmc_message {
    evmc_message {
        kind: message.kind.code(),
        flags: message.flags,
        depth: message.depth,
        gas: message.gas,
        destination: message.destination.into(),
        sender: message.sender.into(),
        input_data: message.input.as_ptr(),
        input_size: message.input.len(),
        value: message.value.into(),
        create2_salt: message.create2_salt.into(),
    }
}

/// Copy a raw message into an owned one.
///
/// # Safety
///
/// `input_data` must be null or valid for `input_size` bytes.
pub(crate) unsafe fn message_from_ffi(raw: &evmc_message) -> Message {
    let kind = CallKind::from_code(i64::from(raw.kind)).unwrap_or_else(|e| fatal("call", &e));
    Message {
        kind,
        flags: raw.flags,
        depth: raw.depth,
        gas: raw.gas,
        destination: raw.destination.into(),
        sender: raw.sender.into(),
        input: unsafe { copy_bytes(raw.input_data, raw.input_size) },
        value: raw.value.into(),
        create2_salt: raw.create2_salt.into(),
    }
}

/// Hand an owned result to the engine. The engine frees it via `release`.
pub(crate) fn result_into_ffi(result: ExecutionResult) -> evmc_result {
    let output_size = result.output.len();
    let output_data = Box::into_raw(result.output).cast::<u8>().cast_const();
    evmc_result {
        status_code: result.status.code(),
        gas_left: result.gas_left,
        output_data,
        output_size,
        release: Some(release_boxed_output),
        create_address: result.create_address.unwrap_or_default().into(),
        padding: [0; 4],
    }
}

unsafe extern "C" fn release_boxed_output(result: *const evmc_result) {
    let Some(result) = (unsafe { result.as_ref() }) else {
        return;
    };
    if result.output_data.is_null() {
        return;
    }
    let output = ptr::slice_from_raw_parts_mut(result.output_data.cast_mut(), result.output_size);
    drop(unsafe { Box::from_raw(output) });
}

unsafe fn copy_bytes(data: *const u8, size: usize) -> Vec<u8> {
    if data.is_null() || size == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(data, size) }.to_vec()
    }
}

/// Context the trampolines resolve their host through.
pub(crate) struct HostBinding<'a> {
    pub(crate) host: &'a dyn HostContext,
}

impl HostBinding<'_> {
    pub(crate) fn as_context(&mut self) -> *mut evmc_host_context {
        ptr::from_mut(self).cast()
    }
}

unsafe fn bound_host<'a>(context: *mut evmc_host_context) -> &'a dyn HostContext {
    unsafe { (*context.cast::<HostBinding<'a>>()).host }
}

unsafe fn read<T: Copy + Default>(value: *const T) -> T {
    unsafe { value.as_ref() }.copied().unwrap_or_default()
}

unsafe extern "C" fn account_exists(
    context: *mut evmc_host_context,
    address: *const evmc_address,
) -> bool {
    let host = unsafe { bound_host(context) };
    host.account_exists(&unsafe { read(address) }.into())
}

unsafe extern "C" fn get_storage(
    context: *mut evmc_host_context,
    address: *const evmc_address,
    key: *const evmc_bytes32,
) -> evmc_bytes32 {
    let host = unsafe { bound_host(context) };
    let (address, key) = unsafe { (read(address), read(key)) };
    host.get_storage(&address.into(), &key.into()).into()
}

unsafe extern "C" fn set_storage(
    context: *mut evmc_host_context,
    address: *const evmc_address,
    key: *const evmc_bytes32,
    value: *const evmc_bytes32,
) -> i32 {
    let host = unsafe { bound_host(context) };
    let (address, key, value) = unsafe { (read(address), read(key), read(value)) };
    host.set_storage(&address.into(), &key.into(), &value.into())
        .code()
}

unsafe extern "C" fn get_balance(
    context: *mut evmc_host_context,
    address: *const evmc_address,
) -> evmc_bytes32 {
    let host = unsafe { bound_host(context) };
    host.get_balance(&unsafe { read(address) }.into()).into()
}

unsafe extern "C" fn get_code_size(
    context: *mut evmc_host_context,
    address: *const evmc_address,
) -> usize {
    let host = unsafe { bound_host(context) };
    host.get_code_size(&unsafe { read(address) }.into())
}

unsafe extern "C" fn get_code_hash(
    context: *mut evmc_host_context,
    address: *const evmc_address,
) -> evmc_bytes32 {
    let host = unsafe { bound_host(context) };
    host.get_code_hash(&unsafe { read(address) }.into()).into()
}

unsafe extern "C" fn copy_code(
    context: *mut evmc_host_context,
    address: *const evmc_address,
    code_offset: usize,
    buffer_data: *mut u8,
    buffer_size: usize,
) -> usize {
    let host = unsafe { bound_host(context) };
    let address = unsafe { read(address) };
    if buffer_data.is_null() || buffer_size == 0 {
        return host.copy_code(&address.into(), code_offset, &mut []);
    }
    let buffer = unsafe { std::slice::from_raw_parts_mut(buffer_data, buffer_size) };
    host.copy_code(&address.into(), code_offset, buffer)
}

unsafe extern "C" fn selfdestruct(
    context: *mut evmc_host_context,
    address: *const evmc_address,
    beneficiary: *const evmc_address,
) {
    let host = unsafe { bound_host(context) };
    let (address, beneficiary) = unsafe { (read(address), read(beneficiary)) };
    host.selfdestruct(&address.into(), &beneficiary.into());
}

unsafe extern "C" fn call(
    context: *mut evmc_host_context,
    message: *const evmc_message,
) -> evmc_result {
    let host = unsafe { bound_host(context) };
    let Some(raw) = (unsafe { message.as_ref() }) else {
        fatal("call", &"engine passed a null message");
    };
    let message = unsafe { message_from_ffi(raw) };
    result_into_ffi(host.call(&message))
}

unsafe extern "C" fn get_tx_context(context: *mut evmc_host_context) -> evmc_tx_context {
    let host = unsafe { bound_host(context) };
    host.get_tx_context().into()
}

#[allow(clippy::cast_sign_loss)]
unsafe extern "C" fn get_block_hash(context: *mut evmc_host_context, number: i64) -> evmc_bytes32 {
    let host = unsafe { bound_host(context) };
    // evmc.h declares the number as int64_t; hosts see it unsigned, bit for bit.
    host.get_block_hash(number as u64).into()
}

unsafe extern "C" fn emit_log(
    context: *mut evmc_host_context,
    address: *const evmc_address,
    data: *const u8,
    data_size: usize,
    topics: *const evmc_bytes32,
    topics_count: usize,
) {
    let host = unsafe { bound_host(context) };
    let address = unsafe { read(address) };
    let data = unsafe { copy_bytes(data, data_size) };
    let topics: Vec<Word256> = if topics.is_null() || topics_count == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(topics, topics_count) }
            .iter()
            .map(|topic| Word256::from(*topic))
            .collect()
    };
    host.emit_log(&address.into(), &data, &topics);
}

unsafe extern "C" fn access_account(
    context: *mut evmc_host_context,
    address: *const evmc_address,
) -> i32 {
    let host = unsafe { bound_host(context) };
    host.access_account(&unsafe { read(address) }.into()).code()
}

unsafe extern "C" fn access_storage(
    context: *mut evmc_host_context,
    address: *const evmc_address,
    key: *const evmc_bytes32,
) -> i32 {
    let host = unsafe { bound_host(context) };
    let (address, key) = unsafe { (read(address), read(key)) };
    host.access_storage(&address.into(), &key.into()).code()
}

/// Build the host function table for one engine instance.
pub fn host_interface() -> evmc_host_interface {
    evmc_host_interface {
        account_exists: Some(account_exists),
        get_storage: Some(get_storage),
        set_storage: Some(set_storage),
        get_balance: Some(get_balance),
        get_code_size: Some(get_code_size),
        get_code_hash: Some(get_code_hash),
        copy_code: Some(copy_code),
        selfdestruct: Some(selfdestruct),
        call: Some(call),
        get_tx_context: Some(get_tx_context),
        get_block_hash: Some(get_block_hash),
        emit_log: Some(emit_log),
        access_account: Some(access_account),
        access_storage: Some(access_storage),
    }
}
