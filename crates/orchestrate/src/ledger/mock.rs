//! In-memory [`Ledger`] for tests.
//!
//! Available to other crates' tests through the `test-utils` feature.
//!
//! Views return programmed values, setters can be wired to their getters, and
//! calls can be made to revert, to be rejected, or to require an earlier call.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use alloy_core::primitives::{Address, Bytes, TxHash, U256, keccak256};

use super::{Ledger, Receipt, TxRequest};
use crate::abi::{address_word, selector};

type CallKey = (Address, [u8; 4]);

/// Starting operator balance: 1000 HBAR in the relay's 18-decimal unit.
const OPERATOR_BALANCE: u128 = 1_000_000_000_000_000_000_000;

#[derive(Default)]
struct MockChain {
    tx_count: u64,
    contract_count: u64,
    submitted: Vec<TxRequest>,
    succeeded: HashSet<CallKey>,
    views: HashMap<CallKey, Bytes>,
    wires: HashMap<CallKey, [u8; 4]>,
    effects: HashMap<CallKey, ([u8; 4], Bytes)>,
    reverts: HashSet<CallKey>,
    reverts_with_arg: Vec<(CallKey, Address)>,
    rejects: HashSet<CallKey>,
    prerequisites: HashMap<CallKey, CallKey>,
    balances: HashMap<Address, U256>,
}

pub struct MockLedger {
    operator: Address,
    min_gas_price: U256,
    chain: Mutex<MockChain>,
}

impl MockLedger {
    pub fn new() -> Self {
        let operator = Address::repeat_byte(0x0a);
        let mut chain = MockChain::default();
        chain.balances.insert(operator, U256::from(OPERATOR_BALANCE));

        Self {
            operator,
            min_gas_price: U256::from(530_000_000_000u64),
            chain: Mutex::new(chain),
        }
    }

    fn chain(&self) -> std::sync::MutexGuard<'_, MockChain> {
        self.chain.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Program the raw return value of a view.
    pub fn set_view(&self, contract: Address, signature: &str, value: Bytes) {
        self.chain()
            .views
            .insert((contract, selector(signature)), value);
    }

    pub fn set_view_address(&self, contract: Address, signature: &str, value: Address) {
        self.set_view(contract, signature, Bytes::from(address_word(value).to_vec()));
    }

    /// After a successful `setter` call, `getter` returns the setter's first argument.
    pub fn wire(&self, contract: Address, setter: &str, getter: &str) {
        self.chain()
            .wires
            .insert((contract, selector(setter)), selector(getter));
    }

    /// After a successful `call`, `view` returns `value`.
    pub fn set_view_after(&self, contract: Address, call: &str, view: &str, value: Address) {
        self.chain().effects.insert(
            (contract, selector(call)),
            (selector(view), Bytes::from(address_word(value).to_vec())),
        );
    }

    pub fn revert_on(&self, contract: Address, signature: &str) {
        self.chain().reverts.insert((contract, selector(signature)));
    }

    /// Revert `signature` on `contract` only when its calldata mentions `arg`.
    pub fn revert_on_arg(&self, contract: Address, signature: &str, arg: Address) {
        self.chain()
            .reverts_with_arg
            .push(((contract, selector(signature)), arg));
    }

    /// Make the relay refuse `signature` on `contract` before it is executed.
    pub fn reject_on(&self, contract: Address, signature: &str) {
        self.chain().rejects.insert((contract, selector(signature)));
    }

    /// `signature` on `contract` reverts until `prerequisite` has succeeded.
    pub fn require_before(
        &self,
        contract: Address,
        signature: &str,
        prerequisite_contract: Address,
        prerequisite: &str,
    ) {
        self.chain().prerequisites.insert(
            (contract, selector(signature)),
            (prerequisite_contract, selector(prerequisite)),
        );
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.chain().balances.insert(address, balance);
    }

    pub fn submitted(&self) -> Vec<TxRequest> {
        self.chain().submitted.clone()
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    fn next_hash(&mut self) -> TxHash {
        self.tx_count += 1;
        keccak256(self.tx_count.to_be_bytes())
    }

    fn balance(&self, address: &Address) -> U256 {
        self.balances.get(address).copied().unwrap_or_default()
    }

    fn execute(&mut self, operator: Address, tx: &TxRequest) -> anyhow::Result<Receipt> {
        let key = tx.to.zip(tx.selector());

        if let Some(key) = key {
            if self.rejects.contains(&key) {
                anyhow::bail!("RPC error: transaction rejected by relay precheck");
            }
        }

        let cost = tx.value + U256::from(tx.gas_limit) * tx.gas_price;
        if self.balance(&operator) < cost {
            anyhow::bail!("RPC error: insufficient funds for transfer");
        }

        self.submitted.push(tx.clone());
        let tx_hash = self.next_hash();

        if let Some(revert_reason) = key.and_then(|key| self.revert_reason(key, &tx.data)) {
            return Ok(Receipt {
                tx_hash,
                success: false,
                contract_address: None,
                gas_used: tx.gas_limit,
                revert_reason: Some(revert_reason),
            });
        }

        if let Some(to) = tx.to {
            let from_balance = self.balance(&operator) - tx.value;
            self.balances.insert(operator, from_balance);
            let to_balance = self.balance(&to) + tx.value;
            self.balances.insert(to, to_balance);
        }

        let contract_address = match tx.to {
            Some(_) => None,
            None => {
                self.contract_count += 1;
                Some(Address::left_padding_from(&self.contract_count.to_be_bytes()))
            }
        };

        if let Some(key) = key {
            self.succeeded.insert(key);
            if let Some(getter) = self.wires.get(&key).copied() {
                let arg = tx.data.get(4..36).map(|w| Bytes::from(w.to_vec()));
                if let Some(arg) = arg {
                    self.views.insert((key.0, getter), arg);
                }
            }
            if let Some((view, value)) = self.effects.get(&key).cloned() {
                self.views.insert((key.0, view), value);
            }
        }

        Ok(Receipt {
            tx_hash,
            success: true,
            contract_address,
            gas_used: tx.gas_limit / 2,
            revert_reason: None,
        })
    }

    fn revert_reason(&self, key: CallKey, data: &[u8]) -> Option<String> {
        if self.reverts.contains(&key) {
            return Some("mock revert".to_string());
        }

        let mentions = |arg: &Address| data.windows(32).any(|w| w == address_word(*arg));
        if self
            .reverts_with_arg
            .iter()
            .any(|(k, arg)| *k == key && mentions(arg))
        {
            return Some("mock revert for argument".to_string());
        }

        match self.prerequisites.get(&key) {
            Some(prerequisite) if !self.succeeded.contains(prerequisite) => {
                Some("prerequisite call missing".to_string())
            }
            _ => None,
        }
    }
}

impl Ledger for MockLedger {
    fn operator(&self) -> Address {
        self.operator
    }

    fn min_gas_price(&self) -> U256 {
        self.min_gas_price
    }

    async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes> {
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| anyhow::anyhow!("calldata without selector"))?;

        self.chain()
            .views
            .get(&(to, selector))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("RPC error: execution reverted"))
    }

    async fn balance(&self, address: Address) -> anyhow::Result<U256> {
        Ok(self.chain().balance(&address))
    }

    async fn submit(&self, tx: TxRequest) -> anyhow::Result<Receipt> {
        let operator = self.operator;
        self.chain().execute(operator, &tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_created_contracts_get_distinct_addresses() {
        let ledger = MockLedger::new();
        let price = ledger.min_gas_price();

        let first = ledger
            .submit(TxRequest::create(Bytes::from(vec![0x60])).gas(4_000_000, price))
            .await
            .unwrap();
        let second = ledger
            .submit(TxRequest::create(Bytes::from(vec![0x60])).gas(4_000_000, price))
            .await
            .unwrap();

        assert_eq!(first.contract_address, Some(Address::with_last_byte(1)));
        assert_eq!(second.contract_address, Some(Address::with_last_byte(2)));
    }
}
