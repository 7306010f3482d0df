//! Values as the host runtime sees them.
//!
//! The host is dynamically typed: every callback answer and every argument
//! of a boundary operation arrives as a [`HostValue`]. Accessors check the
//! shape and report a [`ProtocolViolation`] naming the offending field.

use std::collections::BTreeMap;

use evmc_bridge_common::ProtocolViolation;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

/// Largest integer a host number represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A dynamically typed host value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum HostValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(BigInt),
    Buffer(Vec<u8>),
    Array(Vec<HostValue>),
    Object(BTreeMap<String, HostValue>),
}

impl HostValue {
    /// Build an object from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, HostValue)>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Host-side type name, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::BigInt(_) => "bigint",
            Self::Buffer(_) => "buffer",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Returns `true` for `undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Look up an object property. Absent and `undefined` are the same.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        match self {
            Self::Object(map) => map.get(key).filter(|v| !v.is_undefined()),
            _ => None,
        }
    }

    /// Look up a required object property.
    pub fn field(&self, key: &str) -> Result<&HostValue, ProtocolViolation> {
        match self {
            Self::Object(_) => self
                .get(key)
                .ok_or_else(|| ProtocolViolation::missing_field(key)),
            other => Err(ProtocolViolation::type_mismatch(
                key,
                "object",
                other.type_name(),
            )),
        }
    }

    /// Insert or replace an object property. No-op on non-objects.
    pub fn set(&mut self, key: impl Into<String>, value: HostValue) {
        if let Self::Object(map) = self {
            map.insert(key.into(), value);
        }
    }

    /// Read a bigint.
    pub fn as_bigint(&self, field: &str) -> Result<&BigInt, ProtocolViolation> {
        match self {
            Self::BigInt(value) => Ok(value),
            other => Err(ProtocolViolation::type_mismatch(
                field,
                "bigint",
                other.type_name(),
            )),
        }
    }

    /// Read a buffer.
    pub fn as_bytes(&self, field: &str) -> Result<&[u8], ProtocolViolation> {
        match self {
            Self::Buffer(bytes) => Ok(bytes),
            other => Err(ProtocolViolation::type_mismatch(
                field,
                "buffer",
                other.type_name(),
            )),
        }
    }

    /// Read a boolean.
    pub fn as_bool(&self, field: &str) -> Result<bool, ProtocolViolation> {
        match self {
            Self::Bool(value) => Ok(*value),
            other => Err(ProtocolViolation::type_mismatch(
                field,
                "boolean",
                other.type_name(),
            )),
        }
    }

    /// Read an array.
    pub fn as_array(&self, field: &str) -> Result<&[HostValue], ProtocolViolation> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(ProtocolViolation::type_mismatch(
                field,
                "array",
                other.type_name(),
            )),
        }
    }

    /// Read a signed 64-bit integer from a number or a bigint.
    pub fn to_i64(&self, field: &str) -> Result<i64, ProtocolViolation> {
        match self {
            Self::Number(value) => number_to_i64(*value, field),
            Self::BigInt(value) => value.to_i64().ok_or_else(|| ProtocolViolation::OutOfRange {
                field: field.to_string(),
                target: "i64",
            }),
            other => Err(ProtocolViolation::type_mismatch(
                field,
                "number",
                other.type_name(),
            )),
        }
    }

    /// Read a signed 32-bit integer from a number or a bigint.
    pub fn to_i32(&self, field: &str) -> Result<i32, ProtocolViolation> {
        let value = self.to_i64(field)?;
        i32::try_from(value).map_err(|_| ProtocolViolation::OutOfRange {
            field: field.to_string(),
            target: "i32",
        })
    }

    /// Read an unsigned 32-bit integer from a number or a bigint.
    pub fn to_u32(&self, field: &str) -> Result<u32, ProtocolViolation> {
        let value = self.to_i64(field)?;
        if value < 0 {
            return Err(ProtocolViolation::NegativeInteger {
                field: field.to_string(),
            });
        }
        u32::try_from(value).map_err(|_| ProtocolViolation::OutOfRange {
            field: field.to_string(),
            target: "u32",
        })
    }

    /// Read an unsigned size from a number or a bigint.
    pub fn to_usize(&self, field: &str) -> Result<usize, ProtocolViolation> {
        match self {
            Self::BigInt(value) if value.is_negative() => Err(ProtocolViolation::NegativeInteger {
                field: field.to_string(),
            }),
            Self::BigInt(value) => value.to_usize().ok_or_else(|| ProtocolViolation::OutOfRange {
                field: field.to_string(),
                target: "usize",
            }),
            other => {
                let value = other.to_i64(field)?;
                usize::try_from(value).map_err(|_| ProtocolViolation::NegativeInteger {
                    field: field.to_string(),
                })
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_to_i64(value: f64, field: &str) -> Result<i64, ProtocolViolation> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(ProtocolViolation::NotAnInteger {
            field: field.to_string(),
        });
    }
    if value.abs() > MAX_SAFE_INTEGER {
        return Err(ProtocolViolation::OutOfRange {
            field: field.to_string(),
            target: "i64",
        });
    }
    Ok(value as i64)
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for HostValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<BigInt> for HostValue {
    fn from(value: BigInt) -> Self {
        Self::BigInt(value)
    }
}

impl From<Vec<u8>> for HostValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Buffer(value)
    }
}

impl From<&[u8]> for HostValue {
    fn from(value: &[u8]) -> Self {
        Self::Buffer(value.to_vec())
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(value: Vec<HostValue>) -> Self {
        Self::Array(value)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Undefined, Into::into)
    }
}
