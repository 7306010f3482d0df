//! Conversion between fixed-width EVM values and host integers.
//!
//! Host bigints are exchanged as little-endian 64-bit limbs: limb 0 holds
//! the least significant bits. A word is four limbs, an address three with
//! the top limb carrying only 32 bits.
//!
//! Decoding zero-fills missing limbs and ignores limbs past the width of
//! the target, so an oversized bigint is truncated to its low bits.

use evmc_bridge_common::ProtocolViolation;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::ToPrimitive;

use crate::types::{Address, Word256};

/// Number of limbs in a 256-bit word.
pub const WORD_LIMBS: usize = 4;

/// Number of limbs in a 160-bit address.
pub const ADDRESS_LIMBS: usize = 3;

/// Encode a word as four little-endian limbs.
pub fn encode_word(word: &Word256) -> [u64; WORD_LIMBS] {
    let mut limbs = [0u64; WORD_LIMBS];
    for (i, limb) in limbs.iter_mut().enumerate() {
        let end = 32 - 8 * i;
        let mut chunk = [0u8; 8];
        chunk.copy_from_slice(&word.0[end - 8..end]);
        *limb = u64::from_be_bytes(chunk);
    }
    limbs
}

/// Decode little-endian limbs into a word.
pub fn decode_word(limbs: &[u64]) -> Word256 {
    let mut bytes = [0u8; 32];
    for (i, limb) in limbs.iter().take(WORD_LIMBS).enumerate() {
        let end = 32 - 8 * i;
        bytes[end - 8..end].copy_from_slice(&limb.to_be_bytes());
    }
    Word256(bytes)
}

/// Encode an address as three little-endian limbs.
pub fn encode_address(address: &Address) -> [u64; ADDRESS_LIMBS] {
    let mut widened = [0u8; 32];
    widened[12..].copy_from_slice(&address.0);
    let limbs = encode_word(&Word256(widened));
    [limbs[0], limbs[1], limbs[2]]
}

/// Decode little-endian limbs into an address, keeping the low 160 bits.
pub fn decode_address(limbs: &[u64]) -> Address {
    let word = decode_word(limbs);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word.0[12..]);
    Address(bytes)
}

#[allow(clippy::cast_possible_truncation)]
fn limbs_to_bigint(limbs: &[u64]) -> BigInt {
    let digits = limbs
        .iter()
        .flat_map(|limb| [*limb as u32, (*limb >> 32) as u32])
        .collect();
    BigInt::from_biguint(Sign::Plus, BigUint::new(digits))
}

fn bigint_to_limbs(value: &BigInt, field: &str) -> Result<Vec<u64>, ProtocolViolation> {
    if value.sign() == Sign::Minus {
        return Err(ProtocolViolation::NegativeInteger {
            field: field.to_string(),
        });
    }
    Ok(value.magnitude().to_u64_digits())
}

/// Convert a word to a host bigint.
pub fn word_to_host(word: &Word256) -> BigInt {
    limbs_to_bigint(&encode_word(word))
}

/// Convert a host bigint to a word.
pub fn word_from_host(value: &BigInt, field: &str) -> Result<Word256, ProtocolViolation> {
    Ok(decode_word(&bigint_to_limbs(value, field)?))
}

/// Convert an address to a host bigint.
pub fn address_to_host(address: &Address) -> BigInt {
    limbs_to_bigint(&encode_address(address))
}

/// Convert a host bigint to an address.
pub fn address_from_host(value: &BigInt, field: &str) -> Result<Address, ProtocolViolation> {
    Ok(decode_address(&bigint_to_limbs(value, field)?))
}

/// Convert a host bigint to a signed 64-bit integer.
pub fn i64_from_host(value: &BigInt, field: &str) -> Result<i64, ProtocolViolation> {
    value.to_i64().ok_or_else(|| ProtocolViolation::OutOfRange {
        field: field.to_string(),
        target: "i64",
    })
}

/// Convert a host bigint to an unsigned 64-bit integer.
pub fn u64_from_host(value: &BigInt, field: &str) -> Result<u64, ProtocolViolation> {
    if value.sign() == Sign::Minus {
        return Err(ProtocolViolation::NegativeInteger {
            field: field.to_string(),
        });
    }
    value.to_u64().ok_or_else(|| ProtocolViolation::OutOfRange {
        field: field.to_string(),
        target: "u64",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_word_zero_fills() {
        let word = decode_word(&[5]);
        let mut expected = [0u8; 32];
        expected[31] = 5;
        assert_eq!(word, Word256(expected));
    }

    #[test]
    fn test_decode_word_truncates_extra_limbs() {
        let word = decode_word(&[1, 2, 3, 4, 99]);
        assert_eq!(encode_word(&word), [1, 2, 3, 4]);
    }

    #[test]
    fn test_word_limb_order() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x80;
        bytes[31] = 0x01;
        let limbs = encode_word(&Word256(bytes));
        assert_eq!(limbs[0], 1);
        assert_eq!(limbs[3], 0x8000_0000_0000_0000);
    }

    #[test]
    fn test_address_limbs() {
        let mut bytes = [0u8; 20];
        bytes[0..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        bytes[19] = 0x42;
        let limbs = encode_address(&Address(bytes));
        assert_eq!(limbs[2], 0xdead_beef);
        assert_eq!(limbs[0], 0x42);
        assert_eq!(decode_address(&limbs), Address(bytes));
    }

    #[test]
    fn test_decode_address_keeps_low_bits() {
        // bits above 160 are dropped
        let address = decode_address(&[7, 0, 0x1_0000_0001, 0xffff]);
        let mut expected = [0u8; 20];
        expected[3] = 1;
        expected[19] = 7;
        assert_eq!(address, Address(expected));
    }

    #[test]
    fn test_word_host_round_trip() {
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::try_from(i).unwrap() * 7;
        }
        let word = Word256(bytes);
        let host = word_to_host(&word);
        assert_eq!(word_from_host(&host, "value").unwrap(), word);
    }

    #[test]
    fn test_storage_value_from_host() {
        let word = word_from_host(&BigInt::from(0x2a), "getStorage").unwrap();
        assert_eq!(word, Word256::from_u64(0x2a));
        assert_eq!(word_to_host(&word), BigInt::from(42));
    }

    #[test]
    fn test_oversized_bigint_truncates() {
        let value = (BigInt::from(1) << 256) + 9;
        let word = word_from_host(&value, "value").unwrap();
        assert_eq!(word, Word256::from_u64(9));
    }

    #[test]
    fn test_negative_bigint_rejected() {
        let err = word_from_host(&BigInt::from(-1), "value").unwrap_err();
        assert!(matches!(err, ProtocolViolation::NegativeInteger { .. }));
        assert!(address_from_host(&BigInt::from(-5), "address").is_err());
    }

    #[test]
    fn test_address_to_host() {
        let address = Address::from_u64(0x1234);
        assert_eq!(address_to_host(&address), BigInt::from(0x1234));
        assert_eq!(address_from_host(&BigInt::from(0x1234), "a").unwrap(), address);
    }

    #[test]
    fn test_integer_ranges() {
        assert_eq!(i64_from_host(&BigInt::from(-3), "n").unwrap(), -3);
        assert!(i64_from_host(&(BigInt::from(1) << 64), "n").is_err());
        assert_eq!(u64_from_host(&BigInt::from(u64::MAX), "n").unwrap(), u64::MAX);
        assert!(u64_from_host(&BigInt::from(-1), "n").is_err());
    }
}
