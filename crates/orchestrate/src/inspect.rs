//! Read-only inspection of a deployed Controller.

use alloy_core::primitives::{Address, U256};

use crate::{
    abi,
    address::format_address,
    contracts::{self, ADMIN, GET_CURRENT_RATIOS, GOVERNANCE, HAS_SUPPLY_KEY, TOKEN_VIEWS, VAULT},
    ledger::Ledger,
};

/// A snapshot of a Controller's views. Views that fail to answer are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerReport {
    pub controller: Address,
    pub admin: Option<Address>,
    pub governance: Option<Address>,
    pub token: Option<Address>,
    pub has_supply_key: Option<bool>,
    pub current_ratios: Option<Vec<U256>>,
    pub vault: Option<Address>,
}

impl ControllerReport {
    /// Label/value pairs for display.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let address = |value: &Option<Address>| value.as_ref().map(format_address);

        vec![
            ("controller", format_address(&self.controller)),
            ("admin", or_unavailable(address(&self.admin))),
            ("governance", or_unavailable(address(&self.governance))),
            ("index token", or_unavailable(address(&self.token))),
            (
                "has supply key",
                or_unavailable(self.has_supply_key.map(|v| v.to_string())),
            ),
            (
                "current ratios",
                or_unavailable(self.current_ratios.as_ref().map(|ratios| {
                    ratios
                        .iter()
                        .map(U256::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                })),
            ),
            ("vault", or_unavailable(address(&self.vault))),
        ]
    }
}

fn or_unavailable(value: Option<String>) -> String {
    value.unwrap_or_else(|| "unavailable".to_string())
}

/// Read every known view of `controller`.
pub async fn inspect_controller<L: Ledger>(ledger: &L, controller: Address) -> ControllerReport {
    let address_view = move |views: &'static [&'static str]| async move {
        contracts::read_address(ledger, controller, views)
            .await
            .inspect_err(|e| tracing::debug!(%controller, ?views, error = %e, "View unavailable"))
            .ok()
    };

    let has_supply_key = contracts::call_first(ledger, controller, &[HAS_SUPPLY_KEY])
        .await
        .and_then(|(_, output)| abi::decode_bool(&output))
        .ok();
    let current_ratios = contracts::call_first(ledger, controller, &[GET_CURRENT_RATIOS])
        .await
        .and_then(|(_, output)| abi::decode_uint_array(&output))
        .ok();

    ControllerReport {
        controller,
        admin: address_view(&[ADMIN]).await,
        governance: address_view(&[GOVERNANCE]).await,
        token: address_view(TOKEN_VIEWS).await,
        has_supply_key,
        current_ratios,
        vault: address_view(&[VAULT]).await,
    }
}
