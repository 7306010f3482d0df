//! Error types for the evmc-bridge.
//!
//! Errors are split by how the bridge reacts to them:
//! - [`BridgeError`]: usage and setup errors, reported back to the caller
//! - [`ProtocolViolation`]: malformed data crossing the boundary, fatal
//! - [`CallError`]: a callback round trip that could not complete, fatal
//!
//! Fatal errors go through [`fatal`], which logs and aborts the process. The
//! engine's internal state cannot be trusted once a callback answer is lost
//! or malformed.

use std::fmt::Display;
use std::io;

use thiserror::Error;

/// Recoverable errors surfaced at the boundary operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The engine library could not be opened.
    #[error("Failed to load engine library '{path}': {reason}")]
    LibraryLoad {
        /// Path that was passed to the loader.
        path: String,
        /// Loader error message.
        reason: String,
    },

    /// The engine library does not export a create function.
    #[error("Engine library '{path}' exports neither '{symbol}' nor 'evmc_create'")]
    MissingCreateSymbol {
        /// Path of the library.
        path: String,
        /// The name-derived symbol that was tried first.
        symbol: String,
    },

    /// The engine was built against an incompatible ABI.
    #[error("Engine ABI version mismatch: expected {expected}, found {found}")]
    AbiMismatch {
        /// ABI version this bridge speaks.
        expected: i32,
        /// ABI version reported by the engine.
        found: i32,
    },

    /// A boundary operation was called with a missing or mistyped argument.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of what was wrong.
        reason: String,
    },

    /// The instance was already released.
    #[error("Engine instance has been released")]
    InstanceReleased,

    /// The worker running an execution went away without producing a result.
    #[error("Execution {execution_id} finished without a result")]
    ExecutionLost {
        /// Identifier of the lost execution.
        execution_id: String,
    },

    /// A worker thread could not be started.
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] io::Error),
}

impl BridgeError {
    /// Create a new `InvalidArgument` error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a new `LibraryLoad` error.
    pub fn library_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LibraryLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the caller misused a boundary operation.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. } | Self::InstanceReleased)
    }

    /// Returns `true` if the engine library could not be brought up.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::LibraryLoad { .. } | Self::MissingCreateSymbol { .. } | Self::AbiMismatch { .. }
        )
    }
}

impl From<ProtocolViolation> for BridgeError {
    /// At the boundary operations a malformed host value is the caller's
    /// mistake, not a broken callback.
    fn from(violation: ProtocolViolation) -> Self {
        Self::invalid_argument(violation.to_string())
    }
}

/// A host value that does not have the shape the bridge requires.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// A required object field is absent or undefined.
    #[error("missing field '{field}'")]
    MissingField {
        /// Name of the field.
        field: String,
    },

    /// A value has the wrong host type.
    #[error("'{field}' must be a {expected}, got {found}")]
    TypeMismatch {
        /// What was being read.
        field: String,
        /// Expected host type.
        expected: &'static str,
        /// Actual host type.
        found: &'static str,
    },

    /// A negative integer was passed where only unsigned values are allowed.
    #[error("'{field}' must not be negative")]
    NegativeInteger {
        /// What was being read.
        field: String,
    },

    /// An integer does not fit the native type.
    #[error("'{field}' does not fit in {target}")]
    OutOfRange {
        /// What was being read.
        field: String,
        /// Native target type.
        target: &'static str,
    },

    /// A number has a fractional part or is not finite.
    #[error("'{field}' is not an integer")]
    NotAnInteger {
        /// What was being read.
        field: String,
    },

    /// An enum code is not part of the enumeration.
    #[error("'{field}' has unknown code {code}")]
    UnknownEnumCode {
        /// Name of the enumeration.
        field: String,
        /// The offending code.
        code: i64,
    },

    /// The host object backing an instance no longer exists.
    #[error("host object was dropped while the instance was still in use")]
    HostReleased,
}

impl ProtocolViolation {
    /// Create a new `MissingField` error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create a new `TypeMismatch` error.
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
            found,
        }
    }

    /// Create a new `UnknownEnumCode` error.
    pub fn unknown_code(field: impl Into<String>, code: i64) -> Self {
        Self::UnknownEnumCode {
            field: field.into(),
            code,
        }
    }
}

/// Failure of a single callback round trip.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallError {
    /// The channel was closed by instance teardown.
    #[error("callback channel is closed")]
    Closed,

    /// The call was issued from the host thread, which would block forever.
    #[error("callback issued from the host thread")]
    HostThreadReentry,

    /// The host side of the channel is gone.
    #[error("host thread stopped serving callbacks")]
    Disconnected,

    /// The host dropped the call without answering it.
    #[error("callback was dropped without an answer")]
    Abandoned,
}

/// Log a contract violation and abort the process.
///
/// Used wherever continuing would hand undefined data to the engine.
pub fn fatal(operation: &str, error: &dyn Display) -> ! {
    tracing::error!(operation, error = %error, "Fatal bridge contract violation, aborting");
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::invalid_argument("missing message");
        assert_eq!(err.to_string(), "Invalid argument: missing message");

        let err = BridgeError::AbiMismatch {
            expected: 8,
            found: 6,
        };
        assert_eq!(
            err.to_string(),
            "Engine ABI version mismatch: expected 8, found 6"
        );
    }

    #[test]
    fn test_violation_becomes_usage_error() {
        let violation = ProtocolViolation::missing_field("message.gas");
        let err: BridgeError = violation.into();

        assert!(err.is_usage_error());
        assert!(err.to_string().contains("message.gas"));
    }

    #[test]
    fn test_is_usage_error() {
        assert!(BridgeError::InstanceReleased.is_usage_error());
        assert!(BridgeError::invalid_argument("x").is_usage_error());
        assert!(!BridgeError::library_load("a.so", "nope").is_usage_error());
    }

    #[test]
    fn test_is_load_error() {
        assert!(BridgeError::library_load("a.so", "nope").is_load_error());
        assert!(
            BridgeError::AbiMismatch {
                expected: 8,
                found: 1
            }
            .is_load_error()
        );
        assert!(!BridgeError::InstanceReleased.is_load_error());
    }

    #[test]
    fn test_runtime_errors_are_neither_usage_nor_load() {
        let errors = [
            BridgeError::ExecutionLost {
                execution_id: "e1".to_string(),
            },
            BridgeError::WorkerSpawn(io::Error::other("no threads")),
        ];
        for err in &errors {
            assert!(!err.is_usage_error());
            assert!(!err.is_load_error());
        }
        assert_eq!(
            errors[1].to_string(),
            "Failed to spawn worker thread: no threads"
        );
    }

    #[test]
    fn test_violation_display() {
        let err = ProtocolViolation::type_mismatch("getStorage", "bigint", "number");
        assert_eq!(err.to_string(), "'getStorage' must be a bigint, got number");

        let err = ProtocolViolation::unknown_code("setStorage", 9);
        assert_eq!(err.to_string(), "'setStorage' has unknown code 9");
    }
}
