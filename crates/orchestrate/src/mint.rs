//! The approve -> mint flow against the Controller.
//!
//! Every submitted sub-transaction is recorded in the outcome's diagnostics, in
//! submission order, whether it succeeded or not. Nothing is rolled back or
//! retried: a failed outcome keeps the ids of the steps that did go through.

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, Bytes, TxHash, U256},
};
use serde::Serialize;

use crate::{
    abi,
    contracts::{APPROVE, MINT},
    ledger::{GasConfig, Ledger, TxRequest},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// One logical step of the mint flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MintStep {
    Approve,
    Mint,
}

/// A transaction submitted while executing a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTransaction {
    pub step: MintStep,
    pub tx_hash: TxHash,
    pub success: bool,
}

/// Result of a mint-flow operation.
///
/// `tx_id` is only present on success. `diagnostics` lists every transaction
/// submitted by the operation, including a reverted one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutcome {
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<TxHash>,
    pub diagnostics: Vec<SubTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransactionOutcome {
    fn success(tx_id: TxHash, diagnostics: Vec<SubTransaction>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            tx_id: Some(tx_id),
            diagnostics,
            error: None,
        }
    }

    fn error(reason: String, diagnostics: Vec<SubTransaction>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            tx_id: None,
            diagnostics,
            error: Some(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Progress of the mint flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MintState {
    #[default]
    NotStarted,
    Approved,
    Minted,
    Failed {
        during: MintStep,
    },
}

impl MintState {
    /// The state after `step` completed with `success`.
    ///
    /// There is no transition back to `NotStarted`; a failed step is recovered by
    /// running it again.
    pub fn after(self, step: MintStep, success: bool) -> Self {
        match (step, success) {
            (step, false) => Self::Failed { during: step },
            (MintStep::Approve, true) => Self::Approved,
            (MintStep::Mint, true) => Self::Minted,
        }
    }
}

/// Drives approvals of the deposit token and mints on the Controller.
pub struct MintOrchestrator<'a, L> {
    ledger: &'a L,
    token: Address,
    controller: Address,
    gas: GasConfig,
    state: MintState,
}

impl<'a, L: Ledger> MintOrchestrator<'a, L> {
    /// `token` is the ERC-20 approved for spending, `controller` the Lynx Controller.
    pub fn new(ledger: &'a L, token: Address, controller: Address) -> Self {
        Self {
            ledger,
            token,
            controller,
            gas: GasConfig::call(),
            state: MintState::NotStarted,
        }
    }

    pub fn with_gas(mut self, gas: GasConfig) -> Self {
        self.gas = gas;
        self
    }

    pub fn state(&self) -> MintState {
        self.state
    }

    /// Approve `spender` to move `amount` of the token.
    pub async fn approve_token(&mut self, spender: Address, amount: U256) -> TransactionOutcome {
        let mut diagnostics = Vec::new();
        match self.approve(spender, amount, &mut diagnostics).await {
            Ok(tx_hash) => TransactionOutcome::success(tx_hash, diagnostics),
            Err(reason) => TransactionOutcome::error(reason, diagnostics),
        }
    }

    /// Mint `amount` of the index token through the Controller.
    pub async fn mint_lynx(&mut self, amount: U256) -> TransactionOutcome {
        let mut diagnostics = Vec::new();
        match self.mint(amount, &mut diagnostics).await {
            Ok(tx_hash) => TransactionOutcome::success(tx_hash, diagnostics),
            Err(reason) => TransactionOutcome::error(reason, diagnostics),
        }
    }

    /// Approve `vault` for `amount`, then mint `amount`. Stops at the first failure.
    ///
    /// There is no separate deposit transaction: the vault pulls the approved
    /// amount from the operator while executing `mint`. The primary id of a
    /// successful outcome is the mint transaction.
    pub async fn deposit_and_mint(&mut self, vault: Address, amount: U256) -> TransactionOutcome {
        let mut diagnostics = Vec::new();

        if let Err(reason) = self.approve(vault, amount, &mut diagnostics).await {
            return TransactionOutcome::error(reason, diagnostics);
        }

        match self.mint(amount, &mut diagnostics).await {
            Ok(tx_hash) => TransactionOutcome::success(tx_hash, diagnostics),
            Err(reason) => {
                tracing::warn!(
                    approvals = diagnostics.iter().filter(|d| d.step == MintStep::Approve).count(),
                    "Mint failed after approval; the approval stands"
                );
                TransactionOutcome::error(reason, diagnostics)
            }
        }
    }

    async fn approve(
        &mut self,
        spender: Address,
        amount: U256,
        diagnostics: &mut Vec<SubTransaction>,
    ) -> Result<TxHash, String> {
        let data = abi::encode_call(
            APPROVE,
            &[DynSolValue::Address(spender), DynSolValue::Uint(amount, 256)],
        );
        tracing::info!(token = %self.token, %spender, %amount, "Approving token...");
        self.execute(MintStep::Approve, self.token, data, diagnostics)
            .await
    }

    async fn mint(
        &mut self,
        amount: U256,
        diagnostics: &mut Vec<SubTransaction>,
    ) -> Result<TxHash, String> {
        let data = abi::encode_call(MINT, &[DynSolValue::Uint(amount, 256)]);
        tracing::info!(controller = %self.controller, %amount, "Minting index token...");
        self.execute(MintStep::Mint, self.controller, data, diagnostics)
            .await
    }

    async fn execute(
        &mut self,
        step: MintStep,
        to: Address,
        data: Bytes,
        diagnostics: &mut Vec<SubTransaction>,
    ) -> Result<TxHash, String> {
        let result = self.submit(step, to, data, diagnostics).await;

        let next = self.state.after(step, result.is_ok());
        tracing::debug!(from = ?self.state, to = ?next, %step, "Mint flow transition");
        self.state = next;

        match &result {
            Ok(tx_hash) => tracing::info!(%step, %tx_hash, "Step confirmed"),
            Err(reason) => tracing::error!(%step, %reason, "Step failed"),
        }
        result
    }

    async fn submit(
        &self,
        step: MintStep,
        to: Address,
        data: Bytes,
        diagnostics: &mut Vec<SubTransaction>,
    ) -> Result<TxHash, String> {
        let gas_price = self.gas.resolve_price(self.ledger.min_gas_price())?;

        let receipt = self
            .ledger
            .submit(TxRequest::call(to, data).gas(self.gas.limit, gas_price))
            .await
            .map_err(|e| format!("{} rejected: {:#}", step, e))?;

        diagnostics.push(SubTransaction {
            step,
            tx_hash: receipt.tx_hash,
            success: receipt.success,
        });

        if receipt.success {
            Ok(receipt.tx_hash)
        } else {
            Err(format!("{} failed: {}", step, receipt.failure_reason()))
        }
    }
}
