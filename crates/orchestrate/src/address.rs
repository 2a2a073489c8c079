//! Translation between Hedera native identifiers and EVM addresses.
//!
//! Entities without an explicit alias live at their "long-zero" EVM address: the
//! entity number rendered as big-endian hex and left-padded to 20 bytes.

use std::{fmt, str::FromStr};

use alloy_core::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::OrchestrateError;

/// Number of bits an entity number may occupy to fit into an EVM address.
const ADDRESS_BITS: usize = 160;

/// A Hedera `shard.realm.num` identifier.
///
/// `num` is parsed with arbitrary precision; only its fit into 20 bytes is checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeId {
    pub shard: u64,
    pub realm: u64,
    pub num: U256,
}

impl NativeId {
    /// The long-zero EVM address of this entity.
    pub fn evm_address(&self) -> Address {
        let word = self.num.to_be_bytes::<32>();
        Address::from_slice(&word[12..])
    }
}

impl FromStr for NativeId {
    type Err = OrchestrateError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = input.trim().split('.').collect();
        let [shard, realm, num] = segments.as_slice() else {
            return Err(OrchestrateError::invalid_id(
                input,
                format!("expected 3 dot-separated segments, got {}", segments.len()),
            ));
        };

        let shard = parse_small_segment(input, "shard", shard)?;
        let realm = parse_small_segment(input, "realm", realm)?;

        if num.is_empty() || !num.chars().all(|c| c.is_ascii_digit()) {
            return Err(OrchestrateError::invalid_id(
                input,
                "entity number is not a decimal integer",
            ));
        }

        let num = U256::from_str_radix(num, 10)
            .map_err(|e| OrchestrateError::invalid_id(input, e.to_string()))?;

        if num.bit_len() > ADDRESS_BITS {
            return Err(OrchestrateError::invalid_id(
                input,
                "entity number does not fit into a 20-byte address",
            ));
        }

        Ok(Self { shard, realm, num })
    }
}

impl fmt::Display for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl Serialize for NativeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NativeId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn parse_small_segment(input: &str, name: &str, segment: &str) -> Result<u64, OrchestrateError> {
    if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
        return Err(OrchestrateError::invalid_id(
            input,
            format!("{} segment is not a decimal integer", name),
        ));
    }

    segment
        .parse()
        .map_err(|_| OrchestrateError::invalid_id(input, format!("{} segment overflows", name)))
}

/// Render an address as lowercase `0x`-prefixed hex (42 characters).
pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// Convert a `shard.realm.num` identifier into its long-zero EVM address string.
pub fn native_to_evm_address(input: &str) -> Result<String, OrchestrateError> {
    let id: NativeId = input.parse()?;
    Ok(format_address(&id.evm_address()))
}
