//! Parsing of execute parameters.

use evmc_bridge_common::BridgeError;
use evmc_bridge_core::marshal::message_from_host;
use evmc_bridge_core::{HostValue, Message, Revision};

/// Everything one execution needs, owned so it can move to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteParams {
    pub revision: Revision,
    pub message: Message,
    pub code: Vec<u8>,
}

impl ExecuteParams {
    /// Read `{revision, message, code}` from a host object.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidArgument`] if a required field is
    /// missing or has the wrong type.
    pub fn from_host(params: &HostValue) -> Result<Self, BridgeError> {
        if !matches!(params, HostValue::Object(_)) {
            return Err(BridgeError::invalid_argument(format!(
                "execute parameters must be an object, got {}",
                params.type_name()
            )));
        }

        let revision = Revision::from_code(params.field("revision")?.to_i64("revision")?)?;
        let message = message_from_host(params.field("message")?, "message")?;
        let code = params.field("code")?.as_bytes("code")?.to_vec();

        Ok(Self {
            revision,
            message,
            code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmc_bridge_core::Address;
    use evmc_bridge_core::marshal::message_to_host;

    fn message() -> Message {
        Message::call(Address::from_u64(1), Address::from_u64(2), 1000)
    }

    #[test]
    fn test_parses_all_fields() {
        let params = HostValue::object([
            ("revision", HostValue::from(Revision::MAX.code())),
            ("message", message_to_host(&message())),
            ("code", HostValue::Buffer(vec![0x00])),
        ]);

        let parsed = ExecuteParams::from_host(&params).unwrap();
        assert_eq!(parsed.revision, Revision::Shanghai);
        assert_eq!(parsed.message, message());
        assert_eq!(parsed.code, vec![0x00]);
    }

    #[test]
    fn test_missing_revision_is_usage_error() {
        let params = HostValue::object([
            ("message", message_to_host(&message())),
            ("code", HostValue::Buffer(vec![0x00])),
        ]);

        let err = ExecuteParams::from_host(&params).unwrap_err();
        assert!(err.is_usage_error());
        assert!(err.to_string().contains("revision"));
    }

    #[test]
    fn test_missing_flags_or_salt_is_usage_error() {
        for key in ["flags", "create2Salt"] {
            let mut host_message = message_to_host(&message());
            if let HostValue::Object(map) = &mut host_message {
                map.remove(key);
            }
            let params = HostValue::object([
                ("revision", HostValue::from(Revision::MAX.code())),
                ("message", host_message),
                ("code", HostValue::Buffer(Vec::new())),
            ]);

            let err = ExecuteParams::from_host(&params).unwrap_err();
            assert!(err.is_usage_error());
            assert!(err.to_string().contains(&format!("message.{key}")));
        }
    }

    #[test]
    fn test_explicit_revision() {
        let params = HostValue::object([
            ("revision", HostValue::from(Revision::LATEST_STABLE.code())),
            ("message", message_to_host(&message())),
            ("code", HostValue::Buffer(Vec::new())),
        ]);

        let parsed = ExecuteParams::from_host(&params).unwrap();
        assert_eq!(parsed.revision, Revision::London);
    }

    #[test]
    fn test_missing_code_is_usage_error() {
        let params = HostValue::object([
            ("revision", HostValue::from(Revision::MAX.code())),
            ("message", message_to_host(&message())),
        ]);

        let err = ExecuteParams::from_host(&params).unwrap_err();
        assert!(err.is_usage_error());
        assert!(err.to_string().contains("code"));
    }

    #[test]
    fn test_missing_message_field() {
        let mut host_message = message_to_host(&message());
        if let HostValue::Object(map) = &mut host_message {
            map.remove("sender");
        }
        let params = HostValue::object([
            ("revision", HostValue::from(Revision::MAX.code())),
            ("message", host_message),
            ("code", HostValue::Buffer(Vec::new())),
        ]);

        let err = ExecuteParams::from_host(&params).unwrap_err();
        assert!(err.is_usage_error());
        assert!(err.to_string().contains("message.sender"));
    }

    #[test]
    fn test_unknown_revision() {
        let params = HostValue::object([
            ("revision", HostValue::from(42)),
            ("message", message_to_host(&message())),
            ("code", HostValue::Buffer(Vec::new())),
        ]);
        assert!(ExecuteParams::from_host(&params).is_err());
    }

    #[test]
    fn test_params_not_an_object() {
        let err = ExecuteParams::from_host(&HostValue::Null).unwrap_err();
        assert!(err.is_usage_error());
    }
}
