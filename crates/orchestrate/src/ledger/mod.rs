//! Ledger access used by every orchestration step.
//!
//! A [`Ledger`] signs as the operator, submits transactions and blocks until the
//! receipt is available. Implementations never retry a submission.

mod rpc;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

use std::future::Future;

use alloy_core::primitives::{Address, Bytes, TxHash, U256};
use serde::{Deserialize, Serialize};

pub use rpc::{RpcLedger, connect_relay};

/// Default gas limit for contract deployments.
pub const DEFAULT_DEPLOY_GAS_LIMIT: u64 = 4_000_000;
/// Default gas limit for contract calls. Token association through the HTS
/// precompile needs far more than a plain EVM call.
pub const DEFAULT_CALL_GAS_LIMIT: u64 = 1_000_000;
/// Default gas limit for native-currency transfers to contracts.
pub const DEFAULT_TRANSFER_GAS_LIMIT: u64 = 100_000;

/// Gas parameters for a single transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasConfig {
    pub limit: u64,
    /// Overrides the network's minimum gas price when set.
    pub price: Option<U256>,
}

impl GasConfig {
    pub fn new(limit: u64) -> Self {
        Self { limit, price: None }
    }

    pub fn deploy() -> Self {
        Self::new(DEFAULT_DEPLOY_GAS_LIMIT)
    }

    pub fn call() -> Self {
        Self::new(DEFAULT_CALL_GAS_LIMIT)
    }

    pub fn transfer() -> Self {
        Self::new(DEFAULT_TRANSFER_GAS_LIMIT)
    }

    pub fn with_price(mut self, price: Option<U256>) -> Self {
        self.price = price;
        self
    }

    /// The price to submit with, given the network's floor.
    ///
    /// Fails when an explicit price is below the floor.
    pub fn resolve_price(&self, floor: U256) -> Result<U256, String> {
        match self.price {
            None => Ok(floor),
            Some(price) if price < floor => Err(format!(
                "gas price {} is below the network minimum {}",
                price, floor
            )),
            Some(price) => Ok(price),
        }
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self::call()
    }
}

/// A transaction to be signed by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    /// `None` creates a contract from `data`.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    pub gas_price: U256,
}

impl TxRequest {
    pub fn call(to: Address, data: Bytes) -> Self {
        Self {
            to: Some(to),
            value: U256::ZERO,
            data,
            gas_limit: DEFAULT_CALL_GAS_LIMIT,
            gas_price: U256::ZERO,
        }
    }

    pub fn create(code: Bytes) -> Self {
        Self {
            to: None,
            value: U256::ZERO,
            data: code,
            gas_limit: DEFAULT_DEPLOY_GAS_LIMIT,
            gas_price: U256::ZERO,
        }
    }

    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to: Some(to),
            value,
            data: Bytes::new(),
            gas_limit: DEFAULT_TRANSFER_GAS_LIMIT,
            gas_price: U256::ZERO,
        }
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn gas(mut self, limit: u64, price: U256) -> Self {
        self.gas_limit = limit;
        self.gas_price = price;
        self
    }

    /// The 4-byte selector of the call, if any.
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.data.get(..4).map(|s| [s[0], s[1], s[2], s[3]])
    }
}

/// The confirmed outcome of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub success: bool,
    pub contract_address: Option<Address>,
    pub gas_used: u64,
    pub revert_reason: Option<String>,
}

impl Receipt {
    /// A short description of why the transaction failed.
    pub fn failure_reason(&self) -> String {
        match &self.revert_reason {
            Some(reason) => format!("transaction {} reverted: {}", self.tx_hash, reason),
            None => format!("transaction {} reverted", self.tx_hash),
        }
    }
}

/// Operator-signed access to the ledger.
pub trait Ledger: Send + Sync {
    /// The address transactions are signed from.
    fn operator(&self) -> Address;

    /// The network's minimum accepted gas price.
    fn min_gas_price(&self) -> U256;

    /// Execute a read-only call against `to`.
    fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = anyhow::Result<Bytes>> + Send;

    /// The native balance of `address`.
    fn balance(&self, address: Address) -> impl Future<Output = anyhow::Result<U256>> + Send;

    /// Sign and submit `tx`, then block until its receipt is available.
    ///
    /// An `Err` means the transaction was rejected or never confirmed; a reverted
    /// transaction is an `Ok` receipt with `success == false`.
    fn submit(&self, tx: TxRequest) -> impl Future<Output = anyhow::Result<Receipt>> + Send;
}
