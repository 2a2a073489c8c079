//! [`Ledger`] over the Hedera JSON-RPC relay.

use std::time::Duration;

use alloy::{
    network::TransactionBuilder,
    providers::{Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
};
use alloy_core::primitives::{Address, Bytes, TxHash, U64, U256};
use anyhow::Context;
use serde::Deserialize;
use url::Url;

use super::{Ledger, Receipt, TxRequest};
use crate::{
    OperatorKey,
    abi::decode_revert_reason,
    rpc::{self, DEFAULT_POLL_INTERVAL},
};

/// Receipt fields returned by `eth_getTransactionReceipt`.
///
/// Read leniently: the relay's receipts carry a `revertReason` extension and do
/// not always match the shape of an Ethereum node's.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    contract_address: Option<Address>,
    gas_used: U64,
    /// Hex-encoded revert data.
    #[serde(default)]
    revert_reason: Option<String>,
}

impl From<RpcReceipt> for Receipt {
    fn from(receipt: RpcReceipt) -> Self {
        let success = receipt.status.is_some_and(|status| status == U64::from(1u64));
        let revert_reason = if success {
            None
        } else {
            receipt
                .revert_reason
                .filter(|r| !r.is_empty() && r != "0x")
                .map(|r| decode_revert_reason(&r))
        };

        Self {
            tx_hash: receipt.transaction_hash,
            success,
            contract_address: receipt.contract_address,
            gas_used: receipt.gas_used.to::<u64>(),
            revert_reason,
        }
    }
}

/// Connect to the relay at `url`, signing as `key`.
///
/// The provider only carries a wallet filler: nonce, chain id and gas are set
/// explicitly on every transaction.
pub async fn connect_relay(
    url: Url,
    key: OperatorKey,
    chain_id: Option<u64>,
    min_gas_price: U256,
) -> Result<RpcLedger<impl Provider>, anyhow::Error> {
    let provider = ProviderBuilder::new()
        .disable_recommended_fillers()
        .wallet(key.wallet())
        .connect_http(url.clone());

    RpcLedger::new(provider, key.address(), chain_id, min_gas_price)
        .await
        .with_context(|| format!("Failed to reach JSON-RPC relay at {}", url))
}

/// Submits operator-signed transactions through an alloy provider.
#[derive(Debug)]
pub struct RpcLedger<P> {
    provider: P,
    operator: Address,
    chain_id: u64,
    min_gas_price: U256,
    poll_interval: Duration,
}

impl<P: Provider> RpcLedger<P> {
    /// Wrap `provider`, checking the relay's chain id against `chain_id` when given.
    pub async fn new(
        provider: P,
        operator: Address,
        chain_id: Option<u64>,
        min_gas_price: U256,
    ) -> Result<Self, anyhow::Error> {
        let remote_chain_id = provider
            .get_chain_id()
            .await
            .context("Failed to fetch chain id")?;

        if let Some(expected) = chain_id {
            if expected != remote_chain_id {
                anyhow::bail!(
                    "Chain id mismatch: configured {}, relay reports {}",
                    expected,
                    remote_chain_id
                );
            }
        }

        tracing::info!(
            chain_id = remote_chain_id,
            %operator,
            "Connected to JSON-RPC relay"
        );

        Ok(Self {
            provider,
            operator,
            chain_id: remote_chain_id,
            min_gas_price,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, anyhow::Error> {
        let receipt: RpcReceipt = rpc::poll_until_some(
            &format!("receipt of {}", tx_hash),
            self.poll_interval,
            || {
                self.provider.raw_request::<_, Option<RpcReceipt>>(
                    "eth_getTransactionReceipt".into(),
                    (tx_hash,),
                )
            },
            rpc::is_transport_error,
        )
        .await?;

        Ok(receipt.into())
    }
}

impl<P: Provider> Ledger for RpcLedger<P> {
    fn operator(&self) -> Address {
        self.operator
    }

    fn min_gas_price(&self) -> U256 {
        self.min_gas_price
    }

    async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes> {
        let request = TransactionRequest::default()
            .with_from(self.operator)
            .with_to(to)
            .with_input(data);

        self.provider.call(request).await.map_err(|e| {
            anyhow::anyhow!("eth_call to {} failed: {}", to, rpc::describe_rpc_error(&e))
        })
    }

    async fn balance(&self, address: Address) -> anyhow::Result<U256> {
        self.provider
            .get_balance(address)
            .await
            .with_context(|| format!("Failed to fetch balance of {}", address))
    }

    async fn submit(&self, tx: TxRequest) -> anyhow::Result<Receipt> {
        let nonce = self
            .provider
            .get_transaction_count(self.operator)
            .await
            .context("Failed to fetch operator nonce")?;

        let request = match tx.to {
            Some(to) => TransactionRequest::default().with_to(to).with_input(tx.data),
            None => TransactionRequest::default().with_deploy_code(tx.data),
        };
        let request = request
            .with_from(self.operator)
            .with_value(tx.value)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id)
            .with_gas_limit(tx.gas_limit)
            .with_gas_price(tx.gas_price.saturating_to::<u128>());

        let pending = self.provider.send_transaction(request).await.map_err(|e| {
            anyhow::anyhow!("Relay rejected the transaction: {}", rpc::describe_rpc_error(&e))
        })?;
        let tx_hash = *pending.tx_hash();

        tracing::info!(
            %tx_hash,
            nonce,
            to = ?tx.to,
            gas_limit = tx.gas_limit,
            gas_price = %tx.gas_price,
            "Transaction submitted, waiting for receipt..."
        );

        let receipt = self.wait_for_receipt(tx_hash).await?;

        tracing::info!(
            tx_hash = %receipt.tx_hash,
            success = receipt.success,
            gas_used = receipt.gas_used,
            "Transaction confirmed"
        );

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::providers::mock::Asserter;

    /// Hardhat / Anvil default account #0.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const HEDERA_TESTNET: u64 = 296;

    fn floor() -> U256 {
        U256::from(530_000_000_000u64)
    }

    fn tx_hash() -> TxHash {
        TxHash::repeat_byte(0x11)
    }

    async fn mocked_ledger(asserter: &Asserter) -> RpcLedger<impl Provider> {
        let key = OperatorKey::from_hex(DEV_KEY).unwrap();
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .wallet(key.wallet())
            .connect_mocked_client(asserter.clone());

        asserter.push_success(&U64::from(HEDERA_TESTNET));
        RpcLedger::new(provider, key.address(), Some(HEDERA_TESTNET), floor())
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(1))
    }

    #[test]
    fn test_receipt_success() {
        let receipt: RpcReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "status": "0x1",
            "contractAddress": "0x0000000000000000000000000000000000001389",
            "gasUsed": "0x3d090",
            "blockNumber": "0x10"
        }))
        .unwrap();

        let receipt = Receipt::from(receipt);
        assert!(receipt.success);
        assert_eq!(receipt.gas_used, 250_000);
        assert_eq!(
            receipt.contract_address,
            Some("0x0000000000000000000000000000000000001389".parse().unwrap())
        );
        assert_eq!(receipt.revert_reason, None);
    }

    #[test]
    fn test_receipt_reverted_with_reason() {
        let receipt: RpcReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "status": "0x0",
            "contractAddress": null,
            "gasUsed": "0x5208",
            "revertReason": "0x08c379a0\
                0000000000000000000000000000000000000000000000000000000000000020\
                0000000000000000000000000000000000000000000000000000000000000004\
                6e6f706500000000000000000000000000000000000000000000000000000000"
        }))
        .unwrap();

        let receipt = Receipt::from(receipt);
        assert!(!receipt.success);
        assert_eq!(receipt.revert_reason.as_deref(), Some("nope"));
        assert!(receipt.failure_reason().contains("nope"));
    }

    #[test]
    fn test_receipt_missing_status_is_failure() {
        let receipt: RpcReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x3333333333333333333333333333333333333333333333333333333333333333",
            "gasUsed": "0x0"
        }))
        .unwrap();

        assert!(!Receipt::from(receipt).success);
    }

    #[tokio::test]
    async fn test_chain_id_mismatch_aborts() {
        let asserter = Asserter::new();
        let provider = ProviderBuilder::new().connect_mocked_client(asserter.clone());
        asserter.push_success(&U64::from(HEDERA_TESTNET));

        let err = RpcLedger::new(provider, Address::ZERO, Some(295), floor())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Chain id mismatch"));
    }

    #[tokio::test]
    async fn test_chain_id_resolved_from_relay() {
        let asserter = Asserter::new();
        let provider = ProviderBuilder::new().connect_mocked_client(asserter.clone());
        asserter.push_success(&U64::from(HEDERA_TESTNET));

        let ledger = RpcLedger::new(provider, Address::ZERO, None, floor())
            .await
            .unwrap();

        assert_eq!(ledger.chain_id(), HEDERA_TESTNET);
    }

    #[tokio::test]
    async fn test_submit_signs_sends_and_waits_for_receipt() {
        let asserter = Asserter::new();
        let ledger = mocked_ledger(&asserter).await;

        asserter.push_success(&U64::from(7u64)); // eth_getTransactionCount
        asserter.push_success(&tx_hash()); // eth_sendRawTransaction
        asserter.push_success(&serde_json::Value::Null); // receipt not yet available
        asserter.push_success(&serde_json::json!({
            "transactionHash": tx_hash(),
            "status": "0x1",
            "contractAddress": "0x0000000000000000000000000000000000001389",
            "gasUsed": "0x3d090"
        }));

        let receipt = ledger
            .submit(TxRequest::create(Bytes::from(vec![0x60, 0x80])).gas(4_000_000, floor()))
            .await
            .unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.tx_hash, tx_hash());
        assert_eq!(
            receipt.contract_address,
            Some("0x0000000000000000000000000000000000001389".parse().unwrap())
        );
    }

    #[tokio::test]
    async fn test_relay_rejection_is_an_error() {
        let asserter = Asserter::new();
        let ledger = mocked_ledger(&asserter).await;

        asserter.push_success(&U64::from(0u64));
        asserter.push_failure_msg("INSUFFICIENT_PAYER_BALANCE");

        let tx = TxRequest::transfer(Address::repeat_byte(0x55), U256::from(1u8));
        let err = ledger.submit(tx.gas(100_000, floor())).await.unwrap_err();

        assert!(err.to_string().contains("Relay rejected the transaction"));
        assert!(err.to_string().contains("INSUFFICIENT_PAYER_BALANCE"));
    }

    #[tokio::test]
    async fn test_unreadable_receipt_is_surfaced_with_tx_hash() {
        let asserter = Asserter::new();
        let ledger = mocked_ledger(&asserter).await;

        asserter.push_success(&U64::from(0u64));
        asserter.push_success(&tx_hash());
        asserter.push_success(&serde_json::json!({ "unexpected": true }));

        let tx = TxRequest::call(Address::repeat_byte(0xc1), Bytes::new());
        let err = tokio::time::timeout(
            Duration::from_secs(2),
            ledger.submit(tx.gas(1_000_000, floor())),
        )
        .await
        .expect("an unreadable receipt ends the wait")
        .unwrap_err();

        assert!(format!("{:#}", err).contains(&tx_hash().to_string()));
    }
}
