//! Native data model shared by engines and the bridge.
//!
//! Fixed-width values are stored big-endian, the way EVMC lays them out.
//! Enumerations carry their EVMC integer codes so they can cross both the
//! C ABI and the host boundary unchanged.

use std::fmt;

use evmc_bridge_common::ProtocolViolation;

/// A 256-bit word, big-endian.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Word256(pub [u8; 32]);

/// A 160-bit account address, big-endian.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Word256 {
    /// The all-zero word.
    pub const ZERO: Self = Self([0; 32]);

    /// Build a word holding `value` in its low 8 bytes.
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Raw big-endian bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns `true` if every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Address {
    /// The all-zero address.
    pub const ZERO: Self = Self([0; 20]);

    /// Build an address holding `value` in its low 8 bytes.
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Raw big-endian bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<[u8; 32]> for Word256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_str("0x")?;
    for byte in bytes {
        write!(f, "{byte:02x}")?;
    }
    Ok(())
}

impl fmt::Display for Word256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for Word256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word256({self})")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// EVM specification revision, named after the network upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum Revision {
    Frontier = 0,
    Homestead = 1,
    TangerineWhistle = 2,
    SpuriousDragon = 3,
    Byzantium = 4,
    Constantinople = 5,
    Petersburg = 6,
    Istanbul = 7,
    Berlin = 8,
    London = 9,
    Shanghai = 10,
}

impl Revision {
    /// The newest revision this bridge knows about.
    pub const MAX: Self = Self::Shanghai;

    /// The newest revision with a finalized specification.
    pub const LATEST_STABLE: Self = Self::London;

    /// Look up a revision by its integer code.
    pub fn from_code(code: i64) -> Result<Self, ProtocolViolation> {
        Ok(match code {
            0 => Self::Frontier,
            1 => Self::Homestead,
            2 => Self::TangerineWhistle,
            3 => Self::SpuriousDragon,
            4 => Self::Byzantium,
            5 => Self::Constantinople,
            6 => Self::Petersburg,
            7 => Self::Istanbul,
            8 => Self::Berlin,
            9 => Self::London,
            10 => Self::Shanghai,
            other => return Err(ProtocolViolation::unknown_code("revision", other)),
        })
    }

    /// The integer code of this revision.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// The kind of call a [`Message`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CallKind {
    Call = 0,
    /// Valid since Homestead; the value field is ignored.
    DelegateCall = 1,
    CallCode = 2,
    Create = 3,
    /// Valid since Constantinople.
    Create2 = 4,
}

impl CallKind {
    /// Look up a call kind by its integer code.
    pub fn from_code(code: i64) -> Result<Self, ProtocolViolation> {
        Ok(match code {
            0 => Self::Call,
            1 => Self::DelegateCall,
            2 => Self::CallCode,
            3 => Self::Create,
            4 => Self::Create2,
            other => return Err(ProtocolViolation::unknown_code("kind", other)),
        })
    }

    /// The integer code of this call kind.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Outcome of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    Success = 0,
    Failure = 1,
    /// Terminated by REVERT; gas left and output may be non-zero.
    Revert = 2,
    OutOfGas = 3,
    InvalidInstruction = 4,
    UndefinedInstruction = 5,
    StackOverflow = 6,
    StackUnderflow = 7,
    BadJumpDestination = 8,
    InvalidMemoryAccess = 9,
    CallDepthExceeded = 10,
    StaticModeViolation = 11,
    PrecompileFailure = 12,
    ContractValidationFailure = 13,
    ArgumentOutOfRange = 14,
    WasmUnreachableInstruction = 15,
    WasmTrap = 16,
    InsufficientBalance = 17,
    InternalError = -1,
    Rejected = -2,
    OutOfMemory = -3,
}

impl StatusCode {
    /// Look up a status by its integer code.
    pub fn from_code(code: i64) -> Result<Self, ProtocolViolation> {
        Ok(match code {
            0 => Self::Success,
            1 => Self::Failure,
            2 => Self::Revert,
            3 => Self::OutOfGas,
            4 => Self::InvalidInstruction,
            5 => Self::UndefinedInstruction,
            6 => Self::StackOverflow,
            7 => Self::StackUnderflow,
            8 => Self::BadJumpDestination,
            9 => Self::InvalidMemoryAccess,
            10 => Self::CallDepthExceeded,
            11 => Self::StaticModeViolation,
            12 => Self::PrecompileFailure,
            13 => Self::ContractValidationFailure,
            14 => Self::ArgumentOutOfRange,
            15 => Self::WasmUnreachableInstruction,
            16 => Self::WasmTrap,
            17 => Self::InsufficientBalance,
            -1 => Self::InternalError,
            -2 => Self::Rejected,
            -3 => Self::OutOfMemory,
            other => return Err(ProtocolViolation::unknown_code("statusCode", other)),
        })
    }

    /// The integer code of this status.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Returns `true` for [`StatusCode::Success`].
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Effect of a storage write.
///
/// Notation: 0 is zero, X != 0, Y != X and Y != 0, Z != Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StorageStatus {
    /// 0 -> 0 or X -> X.
    Unchanged = 0,
    /// X -> Y.
    Modified = 1,
    /// X -> Y -> Z.
    ModifiedAgain = 2,
    /// 0 -> X.
    Added = 3,
    /// X -> 0.
    Deleted = 4,
}

impl StorageStatus {
    /// Look up a storage status by its integer code.
    pub fn from_code(code: i64) -> Result<Self, ProtocolViolation> {
        Ok(match code {
            0 => Self::Unchanged,
            1 => Self::Modified,
            2 => Self::ModifiedAgain,
            3 => Self::Added,
            4 => Self::Deleted,
            other => return Err(ProtocolViolation::unknown_code("setStorage", other)),
        })
    }

    /// The integer code of this status.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// EIP-2929 access status of an account or storage slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AccessStatus {
    /// First access.
    Cold = 0,
    /// Already in the accessed set.
    Warm = 1,
}

impl AccessStatus {
    /// Look up an access status by its integer code.
    pub fn from_code(code: i64) -> Result<Self, ProtocolViolation> {
        match code {
            0 => Ok(Self::Cold),
            1 => Ok(Self::Warm),
            other => Err(ProtocolViolation::unknown_code("accessStatus", other)),
        }
    }

    /// The integer code of this status.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// One call into the engine.
///
/// The input buffer is an owned copy: a message built on the host thread
/// must stay valid on the worker after the host call has returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: CallKind,
    pub flags: u32,
    pub depth: i32,
    pub gas: i64,
    pub destination: Address,
    pub sender: Address,
    pub input: Vec<u8>,
    pub value: Word256,
    pub create2_salt: Word256,
}

impl Message {
    /// Flag bit marking a static call.
    pub const STATIC: u32 = 1;

    /// A plain `CALL` with no input and no value.
    pub fn call(sender: Address, destination: Address, gas: i64) -> Self {
        Self {
            kind: CallKind::Call,
            flags: 0,
            depth: 0,
            gas,
            destination,
            sender,
            input: Vec::new(),
            value: Word256::ZERO,
            create2_salt: Word256::ZERO,
        }
    }

    /// Returns `true` if the static flag is set.
    pub fn is_static(&self) -> bool {
        self.flags & Self::STATIC != 0
    }
}

/// Result of an execution.
///
/// The output buffer is owned; dropping the result is its release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status: StatusCode,
    pub gas_left: i64,
    pub output: Box<[u8]>,
    /// Only meaningful when `status` is [`StatusCode::Success`].
    pub create_address: Option<Address>,
}

impl ExecutionResult {
    /// Create a result without a created address.
    pub fn new(status: StatusCode, gas_left: i64, output: impl Into<Box<[u8]>>) -> Self {
        Self {
            status,
            gas_left,
            output: output.into(),
            create_address: None,
        }
    }

    /// Create a successful result.
    pub fn success(gas_left: i64, output: impl Into<Box<[u8]>>) -> Self {
        Self::new(StatusCode::Success, gas_left, output)
    }

    /// Create a generic failure with no gas left.
    pub fn failure() -> Self {
        Self::new(StatusCode::Failure, 0, Vec::new())
    }

    /// Attach the address of a created account.
    #[must_use]
    pub fn with_create_address(mut self, address: Address) -> Self {
        self.create_address = Some(address);
        self
    }

    /// The created address, if the execution succeeded and reported one.
    pub fn created(&self) -> Option<&Address> {
        if self.status.is_success() {
            self.create_address.as_ref()
        } else {
            None
        }
    }
}

/// Transaction and block environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxContext {
    pub gas_price: Word256,
    pub origin: Address,
    pub coinbase: Address,
    pub block_number: i64,
    pub timestamp: i64,
    pub gas_limit: i64,
    pub difficulty: Word256,
    pub chain_id: Word256,
    pub base_fee: Word256,
}
