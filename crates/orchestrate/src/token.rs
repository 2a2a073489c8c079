//! Creation of the index token through the Controller.

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, TxHash, U256},
};

use crate::{
    OrchestrateError, abi,
    contracts::{self, CREATE_INDEX_TOKEN, TOKEN_VIEWS},
    ledger::{GasConfig, Ledger, TxRequest},
};

/// Name, symbol and memo passed to `createIndexToken`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTokenParams {
    pub name: String,
    pub symbol: String,
    pub memo: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexToken {
    pub address: Address,
    /// `None` when the controller already had a token.
    pub tx_hash: Option<TxHash>,
}

/// Create the index token, attaching `fee` for the network's token-creation charge.
///
/// Skipped when the controller already reports a non-zero token address.
pub async fn create_index_token<L: Ledger>(
    ledger: &L,
    controller: Address,
    params: &IndexTokenParams,
    fee: U256,
    gas: &GasConfig,
) -> Result<IndexToken, OrchestrateError> {
    let failed = |reason: String, tx_hash: Option<TxHash>| OrchestrateError::TokenCreationFailed {
        controller,
        reason,
        tx_hash,
    };

    if let Ok(existing) = contracts::read_address(ledger, controller, TOKEN_VIEWS).await {
        if !existing.is_zero() {
            tracing::info!(
                %controller,
                token = %existing,
                "Index token already exists, skipping creation"
            );
            return Ok(IndexToken {
                address: existing,
                tx_hash: None,
            });
        }
    }

    let gas_price = gas
        .resolve_price(ledger.min_gas_price())
        .map_err(|reason| failed(reason, None))?;
    let data = abi::encode_call(
        CREATE_INDEX_TOKEN,
        &[
            DynSolValue::String(params.name.clone()),
            DynSolValue::String(params.symbol.clone()),
            DynSolValue::String(params.memo.clone()),
        ],
    );

    tracing::info!(
        %controller,
        name = %params.name,
        symbol = %params.symbol,
        fee = %fee,
        "Creating index token..."
    );

    let receipt = ledger
        .submit(
            TxRequest::call(controller, data)
                .value(fee)
                .gas(gas.limit, gas_price),
        )
        .await
        .map_err(|e| failed(format!("{:#}", e), None))?;

    if !receipt.success {
        return Err(failed(receipt.failure_reason(), Some(receipt.tx_hash)));
    }

    let address = contracts::read_address(ledger, controller, TOKEN_VIEWS)
        .await
        .map_err(|e| failed(format!("token address unreadable: {:#}", e), Some(receipt.tx_hash)))?;

    if address.is_zero() {
        return Err(failed(
            "controller still reports the zero token address".to_string(),
            Some(receipt.tx_hash),
        ));
    }

    tracing::info!(
        %controller,
        token = %address,
        tx_hash = %receipt.tx_hash,
        "Index token created"
    );

    Ok(IndexToken {
        address,
        tx_hash: Some(receipt.tx_hash),
    })
}
