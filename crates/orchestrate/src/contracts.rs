//! The Lynx contract surface used by the orchestration steps.

use alloy_core::primitives::{Address, Bytes};

use crate::{abi, ledger::Ledger};

pub const SET_CONTROLLER: &str = "setController(address)";
pub const CONTROLLER: &str = "controller()";
pub const GET_CONTROLLER: &str = "getController()";
pub const SET_VAULT: &str = "setVault(address)";
pub const VAULT: &str = "vault()";
pub const ASSOCIATE_WITH_TOKENS: &str = "associateWithTokens(address[])";
pub const CREATE_INDEX_TOKEN: &str = "createIndexToken(string,string,string)";
pub const GET_CURRENT_RATIOS: &str = "getCurrentRatios()";
pub const ADMIN: &str = "ADMIN()";
pub const GOVERNANCE: &str = "GOVERNANCE()";
pub const INDEX_TOKEN: &str = "INDEX_TOKEN()";
pub const GET_TOKEN_ADDRESS: &str = "getTokenAddress()";
pub const HAS_SUPPLY_KEY: &str = "hasSupplyKey()";
pub const APPROVE: &str = "approve(address,uint256)";
pub const MINT: &str = "mint(uint256)";

/// Views answering with the controller a vault is linked to, in lookup order.
pub const CONTROLLER_VIEWS: &[&str] = &[CONTROLLER, GET_CONTROLLER];
/// Views answering with a controller's index token, in lookup order.
pub const TOKEN_VIEWS: &[&str] = &[INDEX_TOKEN, GET_TOKEN_ADDRESS];

/// Call the first view in `views` that answers, returning its name and raw output.
///
/// Views that revert or return no data fall through to the next one.
pub async fn call_first<L: Ledger>(
    ledger: &L,
    contract: Address,
    views: &[&'static str],
) -> anyhow::Result<(&'static str, Bytes)> {
    let mut last_error = None;

    for view in views {
        match ledger.call(contract, abi::encode_call(view, &[])).await {
            Ok(output) if !output.is_empty() => return Ok((*view, output)),
            Ok(_) => {
                tracing::debug!(%contract, view, "View returned no data, trying next");
            }
            Err(e) => {
                tracing::debug!(%contract, view, error = %e, "View failed, trying next");
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow::anyhow!("none of {:?} answered on {}", views, contract)))
}

/// Read an address from the first view in `views` that answers.
pub async fn read_address<L: Ledger>(
    ledger: &L,
    contract: Address,
    views: &[&'static str],
) -> anyhow::Result<Address> {
    let (view, output) = call_first(ledger, contract, views).await?;
    abi::decode_address(&output).map_err(|e| e.context(format!("{} on {}", view, contract)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;

    #[tokio::test]
    async fn test_read_address_falls_back() {
        let ledger = MockLedger::new();
        let vault = Address::repeat_byte(0x01);
        let controller = Address::repeat_byte(0x02);

        assert!(read_address(&ledger, vault, CONTROLLER_VIEWS).await.is_err());

        ledger.set_view_address(vault, GET_CONTROLLER, controller);
        assert_eq!(
            read_address(&ledger, vault, CONTROLLER_VIEWS).await.unwrap(),
            controller
        );

        let (view, _) = call_first(&ledger, vault, CONTROLLER_VIEWS).await.unwrap();
        assert_eq!(view, GET_CONTROLLER);
    }

    #[tokio::test]
    async fn test_empty_output_falls_through() {
        let ledger = MockLedger::new();
        let controller = Address::repeat_byte(0x02);
        let token = Address::repeat_byte(0x03);

        ledger.set_view(controller, INDEX_TOKEN, Bytes::new());
        ledger.set_view_address(controller, GET_TOKEN_ADDRESS, token);

        assert_eq!(
            read_address(&ledger, controller, TOKEN_VIEWS).await.unwrap(),
            token
        );
    }
}
