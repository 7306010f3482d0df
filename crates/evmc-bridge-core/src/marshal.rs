//! Structured values crossing the host boundary.
//!
//! Messages, results and transaction contexts travel as host objects with
//! camelCase keys. Fixed-width fields are bigints; kinds, flags, depth and
//! status codes are plain numbers.

use evmc_bridge_common::ProtocolViolation;
use num_bigint::BigInt;

use crate::codec::{address_from_host, address_to_host, word_from_host, word_to_host};
use crate::types::{Address, CallKind, ExecutionResult, Message, StatusCode, TxContext, Word256};
use crate::value::HostValue;

fn path(context: &str, key: &str) -> String {
    if context.is_empty() {
        key.to_string()
    } else {
        format!("{context}.{key}")
    }
}

fn required<'a>(
    object: &'a HostValue,
    context: &str,
    key: &str,
) -> Result<&'a HostValue, ProtocolViolation> {
    object
        .field(key)
        .map_err(|_| match object {
            HostValue::Object(_) => ProtocolViolation::missing_field(path(context, key)),
            other => ProtocolViolation::type_mismatch(context, "object", other.type_name()),
        })
}

fn read_word(object: &HostValue, context: &str, key: &str) -> Result<Word256, ProtocolViolation> {
    let field = path(context, key);
    word_from_host(required(object, context, key)?.as_bigint(&field)?, &field)
}

fn read_address(
    object: &HostValue,
    context: &str,
    key: &str,
) -> Result<Address, ProtocolViolation> {
    let field = path(context, key);
    address_from_host(required(object, context, key)?.as_bigint(&field)?, &field)
}

fn read_i64(object: &HostValue, context: &str, key: &str) -> Result<i64, ProtocolViolation> {
    required(object, context, key)?.to_i64(&path(context, key))
}

fn word(value: &Word256) -> HostValue {
    HostValue::BigInt(word_to_host(value))
}

fn address(value: &Address) -> HostValue {
    HostValue::BigInt(address_to_host(value))
}

/// Build the host object for a message.
pub fn message_to_host(message: &Message) -> HostValue {
    HostValue::object([
        ("gas", HostValue::BigInt(BigInt::from(message.gas))),
        ("depth", HostValue::from(message.depth)),
        ("flags", HostValue::from(message.flags)),
        ("kind", HostValue::from(message.kind.code())),
        ("destination", address(&message.destination)),
        ("sender", address(&message.sender)),
        ("inputData", HostValue::Buffer(message.input.clone())),
        ("value", word(&message.value)),
        ("create2Salt", word(&message.create2_salt)),
    ])
}

/// Read a message from a host object.
///
/// Every field is required, including `flags` and `create2Salt`.
pub fn message_from_host(value: &HostValue, context: &str) -> Result<Message, ProtocolViolation> {
    let kind = CallKind::from_code(read_i64(value, context, "kind")?)?;
    let input_field = path(context, "inputData");

    Ok(Message {
        kind,
        flags: required(value, context, "flags")?.to_u32(&path(context, "flags"))?,
        depth: required(value, context, "depth")?.to_i32(&path(context, "depth"))?,
        gas: read_i64(value, context, "gas")?,
        destination: read_address(value, context, "destination")?,
        sender: read_address(value, context, "sender")?,
        input: required(value, context, "inputData")?
            .as_bytes(&input_field)?
            .to_vec(),
        value: read_word(value, context, "value")?,
        create2_salt: read_word(value, context, "create2Salt")?,
    })
}

/// Build the host object for an execution result.
///
/// `createAddress` is present only for successful results.
pub fn result_to_host(result: &ExecutionResult) -> HostValue {
    let mut object = HostValue::object([
        ("statusCode", HostValue::from(result.status.code())),
        ("gasLeft", HostValue::BigInt(BigInt::from(result.gas_left))),
        ("outputData", HostValue::Buffer(result.output.to_vec())),
    ]);
    if result.status.is_success() {
        let created = result.create_address.unwrap_or_default();
        object.set("createAddress", address(&created));
    }
    object
}

/// Read an execution result from a host object.
///
/// `statusCode`, `gasLeft` and `outputData` are required. `createAddress`
/// is read only when it is a bigint.
pub fn result_from_host(
    value: &HostValue,
    context: &str,
) -> Result<ExecutionResult, ProtocolViolation> {
    let status = StatusCode::from_code(read_i64(value, context, "statusCode")?)?;
    let gas_left = read_i64(value, context, "gasLeft")?;
    let output = required(value, context, "outputData")?
        .as_bytes(&path(context, "outputData"))?
        .to_vec();
    let create_address = match value.get("createAddress") {
        Some(HostValue::BigInt(raw)) => {
            Some(address_from_host(raw, &path(context, "createAddress"))?)
        }
        _ => None,
    };

    Ok(ExecutionResult {
        status,
        gas_left,
        output: output.into_boxed_slice(),
        create_address,
    })
}

/// Build the host object for a transaction context.
pub fn tx_context_to_host(context: &TxContext) -> HostValue {
    HostValue::object([
        ("txGasPrice", word(&context.gas_price)),
        ("txOrigin", address(&context.origin)),
        ("blockCoinbase", address(&context.coinbase)),
        ("blockNumber", HostValue::BigInt(BigInt::from(context.block_number))),
        ("blockTimestamp", HostValue::BigInt(BigInt::from(context.timestamp))),
        ("blockGasLimit", HostValue::BigInt(BigInt::from(context.gas_limit))),
        ("blockDifficulty", word(&context.difficulty)),
        ("chainId", word(&context.chain_id)),
        ("blockBaseFee", word(&context.base_fee)),
    ])
}

/// Read a transaction context from a host object.
pub fn tx_context_from_host(
    value: &HostValue,
    context: &str,
) -> Result<TxContext, ProtocolViolation> {
    Ok(TxContext {
        gas_price: read_word(value, context, "txGasPrice")?,
        origin: read_address(value, context, "txOrigin")?,
        coinbase: read_address(value, context, "blockCoinbase")?,
        block_number: read_i64(value, context, "blockNumber")?,
        timestamp: read_i64(value, context, "blockTimestamp")?,
        gas_limit: read_i64(value, context, "blockGasLimit")?,
        difficulty: read_word(value, context, "blockDifficulty")?,
        chain_id: read_word(value, context, "chainId")?,
        base_fee: read_word(value, context, "blockBaseFee")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> Message {
        Message {
            kind: CallKind::DelegateCall,
            flags: Message::STATIC,
            depth: 3,
            gas: 21_000,
            destination: Address::from_u64(0xbeef),
            sender: Address::from_u64(0xcafe),
            input: vec![1, 2, 3],
            value: Word256::from_u64(10),
            create2_salt: Word256::from_u64(0x55),
        }
    }

    #[test]
    fn test_message_shape() {
        let host = message_to_host(&sample_message());

        assert_eq!(host.get("gas"), Some(&HostValue::BigInt(BigInt::from(21_000))));
        assert_eq!(host.get("depth"), Some(&HostValue::Number(3.0)));
        // flags carry the flags, not the depth
        assert_eq!(host.get("flags"), Some(&HostValue::Number(1.0)));
        assert_eq!(host.get("kind"), Some(&HostValue::Number(1.0)));
        assert_eq!(
            host.get("destination"),
            Some(&HostValue::BigInt(BigInt::from(0xbeef)))
        );
        assert_eq!(host.get("inputData"), Some(&HostValue::Buffer(vec![1, 2, 3])));
        assert_eq!(host.get("create2Salt"), Some(&HostValue::BigInt(BigInt::from(0x55))));
    }

    #[test]
    fn test_message_from_host() {
        let message = sample_message();
        let parsed = message_from_host(&message_to_host(&message), "message").unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_message_requires_flags_and_salt() {
        for key in ["flags", "create2Salt"] {
            let mut host = message_to_host(&sample_message());
            if let HostValue::Object(map) = &mut host {
                map.remove(key);
            }

            let err = message_from_host(&host, "message").unwrap_err();
            assert_eq!(err, ProtocolViolation::missing_field(format!("message.{key}")));
        }
    }

    #[test]
    fn test_message_missing_gas() {
        let mut host = message_to_host(&sample_message());
        if let HostValue::Object(map) = &mut host {
            map.remove("gas");
        }

        let err = message_from_host(&host, "message").unwrap_err();
        assert_eq!(err, ProtocolViolation::missing_field("message.gas"));
    }

    #[test]
    fn test_message_unknown_kind() {
        let mut host = message_to_host(&sample_message());
        host.set("kind", HostValue::from(9));

        let err = message_from_host(&host, "message").unwrap_err();
        assert!(matches!(err, ProtocolViolation::UnknownEnumCode { code: 9, .. }));
    }

    #[test]
    fn test_message_not_an_object() {
        let err = message_from_host(&HostValue::Null, "message").unwrap_err();
        assert_eq!(
            err,
            ProtocolViolation::type_mismatch("message", "object", "null")
        );
    }

    #[test]
    fn test_result_create_address_only_on_success() {
        let created = Address::from_u64(0x99);
        let ok = ExecutionResult::success(5, vec![0xaa]).with_create_address(created);
        let host = result_to_host(&ok);
        assert_eq!(host.get("createAddress"), Some(&HostValue::BigInt(BigInt::from(0x99))));
        assert_eq!(host.get("statusCode"), Some(&HostValue::Number(0.0)));

        let mut reverted = ok;
        reverted.status = StatusCode::Revert;
        let host = result_to_host(&reverted);
        assert!(host.get("createAddress").is_none());
        assert_eq!(host.get("gasLeft"), Some(&HostValue::BigInt(BigInt::from(5))));
    }

    #[test]
    fn test_result_from_host() {
        let host = HostValue::object([
            ("statusCode", HostValue::from(2)),
            ("gasLeft", HostValue::BigInt(BigInt::from(77))),
            ("outputData", HostValue::Buffer(vec![9, 9])),
            ("createAddress", HostValue::Number(1.0)),
        ]);

        let result = result_from_host(&host, "call").unwrap();
        assert_eq!(result.status, StatusCode::Revert);
        assert_eq!(result.gas_left, 77);
        assert_eq!(&*result.output, &[9, 9]);
        // a non-bigint createAddress is ignored
        assert_eq!(result.create_address, None);
    }

    #[test]
    fn test_result_without_output_rejected() {
        let host = HostValue::object([
            ("statusCode", HostValue::from(0)),
            ("gasLeft", HostValue::from(5)),
        ]);
        let err = result_from_host(&host, "call").unwrap_err();
        assert_eq!(err, ProtocolViolation::missing_field("call.outputData"));
    }

    #[test]
    fn test_result_with_empty_output() {
        let host = HostValue::object([
            ("statusCode", HostValue::from(0)),
            ("gasLeft", HostValue::from(5)),
            ("outputData", HostValue::Buffer(Vec::new())),
        ]);
        let result = result_from_host(&host, "call").unwrap();
        assert!(result.output.is_empty());
        assert_eq!(result.gas_left, 5);
    }

    #[test]
    fn test_tx_context_round_trip() {
        let context = TxContext {
            gas_price: Word256::from_u64(1),
            origin: Address::from_u64(2),
            coinbase: Address::from_u64(3),
            block_number: 4,
            timestamp: 5,
            gas_limit: 6,
            difficulty: Word256::from_u64(7),
            chain_id: Word256::from_u64(8),
            base_fee: Word256::from_u64(9),
        };
        let host = tx_context_to_host(&context);
        assert_eq!(host.get("blockNumber"), Some(&HostValue::BigInt(BigInt::from(4))));
        assert_eq!(tx_context_from_host(&host, "getTxContext").unwrap(), context);
    }

    #[test]
    fn test_tx_context_missing_field() {
        let mut host = tx_context_to_host(&TxContext::default());
        if let HostValue::Object(map) = &mut host {
            map.remove("chainId");
        }
        let err = tx_context_from_host(&host, "getTxContext").unwrap_err();
        assert_eq!(err, ProtocolViolation::missing_field("getTxContext.chainId"));
    }
}
