//! Funding contracts with HBAR from the operator account.

use alloy_core::primitives::{
    Address, TxHash, U256,
    utils::{format_ether, parse_ether},
};
use anyhow::Context;

use crate::{
    OrchestrateError,
    ledger::{GasConfig, Ledger, TxRequest},
};

/// Weibars per tinybar. The relay exposes 18 decimals; HBAR only has 8.
const WEIBARS_PER_TINYBAR: u64 = 10_000_000_000;

/// Parse a decimal HBAR amount such as `"12.5"` into the relay's 18-decimal unit.
pub fn parse_hbar(amount: &str) -> anyhow::Result<U256> {
    let value = parse_ether(amount.trim())
        .with_context(|| format!("'{}' is not a valid HBAR amount", amount))?;

    if value % U256::from(WEIBARS_PER_TINYBAR) != U256::ZERO {
        anyhow::bail!("'{}' has more than 8 decimal places (1 tinybar = 0.00000001 HBAR)", amount);
    }

    Ok(value)
}

/// Render an 18-decimal amount as HBAR.
pub fn format_hbar(value: U256) -> String {
    format_ether(value)
}

/// A confirmed funding transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingReceipt {
    pub target: Address,
    pub amount: U256,
    pub tx_hash: TxHash,
}

/// Sends native currency from the operator to contracts. Never retries.
pub struct Funder<'a, L> {
    ledger: &'a L,
    gas: GasConfig,
}

impl<'a, L: Ledger> Funder<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self {
            ledger,
            gas: GasConfig::transfer(),
        }
    }

    pub fn with_gas(mut self, gas: GasConfig) -> Self {
        self.gas = gas;
        self
    }

    /// Transfer `amount` to `target` and wait for the receipt.
    ///
    /// Fails before submission when the operator cannot cover `amount` plus the
    /// maximum gas cost.
    pub async fn fund(
        &self,
        target: Address,
        amount: U256,
    ) -> Result<FundingReceipt, OrchestrateError> {
        let failed = |reason: String, tx_hash: Option<TxHash>| OrchestrateError::FundingFailed {
            target,
            reason,
            tx_hash,
        };

        if amount.is_zero() {
            return Err(failed("amount must be positive".to_string(), None));
        }

        let gas_price = self
            .gas
            .resolve_price(self.ledger.min_gas_price())
            .map_err(|reason| failed(reason, None))?;

        let operator = self.ledger.operator();
        let balance = self
            .ledger
            .balance(operator)
            .await
            .map_err(|e| failed(format!("could not read operator balance: {:#}", e), None))?;

        let max_gas_cost = U256::from(self.gas.limit) * gas_price;
        let required = amount.saturating_add(max_gas_cost);
        if balance < required {
            return Err(failed(
                format!(
                    "insufficient operator balance: {} HBAR available, {} HBAR required ({} + gas)",
                    format_hbar(balance),
                    format_hbar(required),
                    format_hbar(amount)
                ),
                None,
            ));
        }

        tracing::info!(
            %operator,
            %target,
            amount_hbar = %format_hbar(amount),
            "Funding contract..."
        );

        let receipt = self
            .ledger
            .submit(TxRequest::transfer(target, amount).gas(self.gas.limit, gas_price))
            .await
            .map_err(|e| failed(format!("{:#}", e), None))?;

        if !receipt.success {
            return Err(failed(receipt.failure_reason(), Some(receipt.tx_hash)));
        }

        tracing::info!(%target, tx_hash = %receipt.tx_hash, "Contract funded");

        Ok(FundingReceipt {
            target,
            amount,
            tx_hash: receipt.tx_hash,
        })
    }
}
