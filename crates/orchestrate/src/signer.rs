//! Operator key handling.

use std::fmt;

use alloy::{network::EthereumWallet, signers::local::PrivateKeySigner};
use alloy_core::primitives::{Address, B256};
use anyhow::Context;

/// DER prefix Hedera uses when exporting ECDSA(secp256k1) private keys.
const HEDERA_ECDSA_DER_PREFIX: &str = "3030020100300706052b8104000a04220420";

/// The operator's secp256k1 signing key.
#[derive(Clone)]
pub struct OperatorKey {
    signer: PrivateKeySigner,
}

impl fmt::Debug for OperatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorKey")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl OperatorKey {
    /// Parse a private key.
    ///
    /// Accepts a raw 32-byte hex key (with or without `0x`) or the DER-encoded
    /// form exported by the Hedera portal.
    pub fn from_hex(private_key_hex: &str) -> Result<Self, anyhow::Error> {
        let trimmed = private_key_hex.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed).to_lowercase();
        let raw = trimmed
            .strip_prefix(HEDERA_ECDSA_DER_PREFIX)
            .unwrap_or(trimmed.as_str());

        let private_key_bytes: [u8; 32] = hex::decode(raw)
            .context("Operator key is not valid hex")?
            .try_into()
            .map_err(|_| {
                anyhow::anyhow!("Operator key must be exactly 32 bytes (or DER-encoded ECDSA)")
            })?;

        let signer = PrivateKeySigner::from_bytes(&B256::from(private_key_bytes))
            .context("Invalid secp256k1 private key")?;

        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// A wallet signing with this key, for a provider's wallet filler.
    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}
