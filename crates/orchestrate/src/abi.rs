//! ABI helpers: selectors, calldata encoding and return-value decoding.

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue},
    primitives::{Address, Bytes, U256, keccak256},
};
use anyhow::Context;

/// Selector of the standard `Error(string)` revert payload.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// The 4-byte selector of a function signature such as `setController(address)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode a call to `signature` with `args`.
pub fn encode_call(signature: &str, args: &[DynSolValue]) -> Bytes {
    let mut data = selector(signature).to_vec();
    data.extend(encode_params(args));
    data.into()
}

/// ABI-encode `args` as a parameter list (no selector), e.g. constructor arguments.
pub fn encode_params(args: &[DynSolValue]) -> Vec<u8> {
    if args.is_empty() {
        return Vec::new();
    }
    DynSolValue::Tuple(args.to_vec()).abi_encode_params()
}

/// Decode a single return value of type `ty`.
pub fn decode_output(ty: DynSolType, data: &[u8]) -> anyhow::Result<DynSolValue> {
    let decoded = DynSolType::Tuple(vec![ty.clone()])
        .abi_decode_params(data)
        .with_context(|| format!("Failed to decode {} return value", ty))?;

    match decoded {
        DynSolValue::Tuple(mut values) if values.len() == 1 => Ok(values.remove(0)),
        other => anyhow::bail!("Unexpected decoded shape for {}: {:?}", ty, other),
    }
}

pub fn decode_address(data: &[u8]) -> anyhow::Result<Address> {
    decode_output(DynSolType::Address, data)?
        .as_address()
        .context("Return value is not an address")
}

pub fn decode_uint(data: &[u8]) -> anyhow::Result<U256> {
    decode_output(DynSolType::Uint(256), data)?
        .as_uint()
        .map(|(value, _)| value)
        .context("Return value is not a uint256")
}

pub fn decode_bool(data: &[u8]) -> anyhow::Result<bool> {
    decode_output(DynSolType::Bool, data)?
        .as_bool()
        .context("Return value is not a bool")
}

pub fn decode_uint_array(data: &[u8]) -> anyhow::Result<Vec<U256>> {
    let value = decode_output(DynSolType::Array(Box::new(DynSolType::Uint(256))), data)?;
    value
        .as_array()
        .context("Return value is not an array")?
        .iter()
        .map(|v| {
            v.as_uint()
                .map(|(value, _)| value)
                .context("Array element is not a uint256")
        })
        .collect()
}

/// Parse a typed argument written as `type:value`, e.g. `address:0x…` or `uint256:10`.
pub fn parse_typed_arg(arg: &str) -> anyhow::Result<DynSolValue> {
    let (ty, value) = arg
        .split_once(':')
        .with_context(|| format!("Argument '{}' must be written as <type>:<value>", arg))?;

    let ty: DynSolType = ty
        .trim()
        .parse()
        .with_context(|| format!("Unknown ABI type '{}'", ty))?;

    ty.coerce_str(value.trim())
        .with_context(|| format!("Value '{}' does not parse as {}", value, ty))
}

/// Best-effort human-readable revert reason from hex-encoded revert data.
///
/// `Error(string)` payloads are decoded; anything else is returned unchanged.
pub fn decode_revert_reason(raw: &str) -> String {
    let Ok(bytes) = hex::decode(raw.trim_start_matches("0x")) else {
        return raw.to_string();
    };

    if bytes.len() < 4 || bytes[..4] != ERROR_STRING_SELECTOR {
        return raw.to_string();
    }

    decode_output(DynSolType::String, &bytes[4..])
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| raw.to_string())
}

/// The 32-byte ABI word of an address.
pub fn address_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("approve(address,uint256)")), "095ea7b3");
        assert_eq!(selector("Error(string)"), ERROR_STRING_SELECTOR);
    }

    #[test]
    fn test_encode_call_with_address() {
        let controller: Address = "0x0000000000000000000000000000000000001b59".parse().unwrap();
        let data = encode_call("setController(address)", &[DynSolValue::Address(controller)]);

        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], &selector("setController(address)"));
        assert_eq!(&data[4..], &address_word(controller));
    }

    #[test]
    fn test_encode_call_without_args() {
        let data = encode_call("ADMIN()", &[]);
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn test_decode_scalars() {
        let address: Address = "0x00000000000000000000000000000000000013a5".parse().unwrap();
        assert_eq!(decode_address(&address_word(address)).unwrap(), address);

        let mut word = [0u8; 32];
        word[31] = 1;
        assert!(decode_bool(&word).unwrap());
        assert_eq!(decode_uint(&word).unwrap(), U256::from(1u8));

        assert!(decode_address(&[0u8; 4]).is_err());
    }

    #[test]
    fn test_decode_uint_array() {
        let encoded = DynSolValue::Tuple(vec![DynSolValue::Array(vec![
            DynSolValue::Uint(U256::from(30u8), 256),
            DynSolValue::Uint(U256::from(70u8), 256),
        ])])
        .abi_encode_params();

        assert_eq!(
            decode_uint_array(&encoded).unwrap(),
            vec![U256::from(30u8), U256::from(70u8)]
        );
    }

    #[test]
    fn test_parse_typed_arg() {
        let value = parse_typed_arg("uint256:42").unwrap();
        assert_eq!(value.as_uint().map(|(v, _)| v), Some(U256::from(42u8)));

        let value = parse_typed_arg("address:0x00000000000000000000000000000000000013a5").unwrap();
        assert!(value.as_address().is_some());

        let value = parse_typed_arg("string:Lynx Index").unwrap();
        assert_eq!(value.as_str(), Some("Lynx Index"));

        assert!(parse_typed_arg("42").is_err());
        assert!(parse_typed_arg("uint256:forty-two").is_err());
    }

    #[test]
    fn test_decode_revert_reason() {
        let mut payload = ERROR_STRING_SELECTOR.to_vec();
        payload.extend(
            DynSolValue::Tuple(vec![DynSolValue::String("not approved".into())])
                .abi_encode_params(),
        );
        let raw = format!("0x{}", hex::encode(payload));

        assert_eq!(decode_revert_reason(&raw), "not approved");
        assert_eq!(decode_revert_reason("0xdeadbeef"), "0xdeadbeef");
        assert_eq!(decode_revert_reason("CONTRACT_REVERT_EXECUTED"), "CONTRACT_REVERT_EXECUTED");
    }
}
