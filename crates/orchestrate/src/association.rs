//! Association of fungible tokens with a contract.
//!
//! Tokens are associated one at a time through `associateWithTokens(address[])`,
//! each waiting for its receipt before the next, so a failure identifies exactly
//! which tokens are associated and which were never attempted.

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, TxHash},
};

use crate::{
    OrchestrateError, abi,
    contracts::ASSOCIATE_WITH_TOKENS,
    ledger::{GasConfig, Ledger, TxRequest},
};

/// A completed token association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub token: Address,
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationReport {
    pub contract: Address,
    /// In submission order.
    pub associated: Vec<Association>,
}

pub struct TokenAssociator<'a, L> {
    ledger: &'a L,
    gas: GasConfig,
}

impl<'a, L: Ledger> TokenAssociator<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self {
            ledger,
            gas: GasConfig::call(),
        }
    }

    pub fn with_gas(mut self, gas: GasConfig) -> Self {
        self.gas = gas;
        self
    }

    /// Associate each of `tokens` with `contract`, in order.
    ///
    /// Stops at the first failure and reports the tokens that succeeded and the
    /// ones never attempted.
    pub async fn associate(
        &self,
        contract: Address,
        tokens: &[Address],
    ) -> Result<AssociationReport, OrchestrateError> {
        let mut associated: Vec<Association> = Vec::with_capacity(tokens.len());

        for (index, token) in tokens.iter().enumerate() {
            let result = self.associate_one(contract, *token).await;

            match result {
                Ok(tx_hash) => {
                    tracing::info!(
                        %contract,
                        %token,
                        %tx_hash,
                        position = index + 1,
                        total = tokens.len(),
                        "Token associated"
                    );
                    associated.push(Association {
                        token: *token,
                        tx_hash,
                    });
                }
                Err(reason) => {
                    tracing::error!(%contract, %token, %reason, "Token association failed");
                    return Err(OrchestrateError::AssociationFailed {
                        contract,
                        failed: *token,
                        succeeded: associated.iter().map(|a| a.token).collect(),
                        not_attempted: tokens[index + 1..].to_vec(),
                        reason,
                    });
                }
            }
        }

        Ok(AssociationReport {
            contract,
            associated,
        })
    }

    async fn associate_one(&self, contract: Address, token: Address) -> Result<TxHash, String> {
        let gas_price = self.gas.resolve_price(self.ledger.min_gas_price())?;
        let data = abi::encode_call(
            ASSOCIATE_WITH_TOKENS,
            &[DynSolValue::Array(vec![DynSolValue::Address(token)])],
        );

        let receipt = self
            .ledger
            .submit(TxRequest::call(contract, data).gas(self.gas.limit, gas_price))
            .await
            .map_err(|e| format!("{:#}", e))?;

        if receipt.success {
            Ok(receipt.tx_hash)
        } else {
            Err(receipt.failure_reason())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;

    fn contract() -> Address {
        Address::repeat_byte(0xcc)
    }

    fn tokens() -> [Address; 3] {
        [
            Address::repeat_byte(0xa1),
            Address::repeat_byte(0xb2),
            Address::repeat_byte(0xc3),
        ]
    }

    #[tokio::test]
    async fn test_associates_in_order_one_token_per_call() {
        let ledger = MockLedger::new();
        let [a, b, c] = tokens();

        let report = TokenAssociator::new(&ledger)
            .associate(contract(), &[a, b, c])
            .await
            .unwrap();

        let tokens: Vec<Address> = report.associated.iter().map(|a| a.token).collect();
        assert_eq!(tokens, vec![a, b, c]);

        let submitted = ledger.submitted();
        assert_eq!(submitted.len(), 3);
        for (tx, token) in submitted.iter().zip([a, b, c]) {
            assert_eq!(tx.to, Some(contract()));
            // selector, offset, length, single element
            assert_eq!(tx.data.len(), 4 + 32 * 3);
            assert_eq!(&tx.data[68..], &abi::address_word(token));
        }
    }

    #[tokio::test]
    async fn test_failure_reports_succeeded_and_not_attempted() {
        let ledger = MockLedger::new();
        let [a, b, c] = tokens();
        ledger.revert_on_arg(contract(), ASSOCIATE_WITH_TOKENS, b);

        let err = TokenAssociator::new(&ledger)
            .associate(contract(), &[a, b, c])
            .await
            .unwrap_err();

        match err {
            OrchestrateError::AssociationFailed {
                contract: failed_on,
                failed,
                succeeded,
                not_attempted,
                ..
            } => {
                assert_eq!(failed_on, contract());
                assert_eq!(failed, b);
                assert_eq!(succeeded, vec![a]);
                assert_eq!(not_attempted, vec![c]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // C was never submitted.
        assert_eq!(ledger.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_first_token() {
        let ledger = MockLedger::new();
        let [a, b, _] = tokens();
        ledger.reject_on(contract(), ASSOCIATE_WITH_TOKENS);

        let err = TokenAssociator::new(&ledger)
            .associate(contract(), &[a, b])
            .await
            .unwrap_err();

        match err {
            OrchestrateError::AssociationFailed {
                failed,
                succeeded,
                not_attempted,
                ..
            } => {
                assert_eq!(failed, a);
                assert!(succeeded.is_empty());
                assert_eq!(not_attempted, vec![b]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_tokens_is_a_no_op() {
        let ledger = MockLedger::new();
        let report = TokenAssociator::new(&ledger).associate(contract(), &[]).await.unwrap();

        assert!(report.associated.is_empty());
        assert!(ledger.submitted().is_empty());
    }
}
