//! Bidirectional wiring of a Vault and its Controller.
//!
//! Each direction is a setter call followed by a read-back of the matching view.
//! A direction has converged when the view reports the expected address. Setters
//! are skipped when the view already reports it, so linking is safe to re-run.

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, TxHash},
};

use crate::{
    OrchestrateError, abi,
    contracts::{self, CONTROLLER_VIEWS, SET_CONTROLLER, SET_VAULT, VAULT},
    ledger::{GasConfig, Ledger, TxRequest},
};

/// One side of the Vault/Controller link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum LinkDirection {
    /// `vault.setController(controller)`
    VaultToController,
    /// `controller.setVault(vault)`
    ControllerToVault,
}

impl LinkDirection {
    fn setter(&self) -> &'static str {
        match self {
            Self::VaultToController => SET_CONTROLLER,
            Self::ControllerToVault => SET_VAULT,
        }
    }

    fn views(&self) -> &'static [&'static str] {
        match self {
            Self::VaultToController => CONTROLLER_VIEWS,
            Self::ControllerToVault => &[VAULT],
        }
    }
}

/// The observed state of one direction after linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionStatus {
    pub direction: LinkDirection,
    pub expected: Address,
    pub observed: Address,
    pub converged: bool,
    /// The setter transaction, or `None` when the value was already in place.
    pub tx_hash: Option<TxHash>,
}

/// Per-direction results of [`LinkageCoordinator::link`].
#[derive(Debug)]
pub struct LinkageReport {
    pub vault: Result<DirectionStatus, OrchestrateError>,
    pub controller: Result<DirectionStatus, OrchestrateError>,
}

impl LinkageReport {
    /// Both directions completed and read back the expected addresses.
    pub fn converged(&self) -> bool {
        let converged = |status: &Result<DirectionStatus, OrchestrateError>| {
            status.as_ref().is_ok_and(|s| s.converged)
        };
        converged(&self.vault) && converged(&self.controller)
    }
}

pub struct LinkageCoordinator<'a, L> {
    ledger: &'a L,
    gas: GasConfig,
}

impl<'a, L: Ledger> LinkageCoordinator<'a, L> {
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

    /// Point `vault` at `controller`.
    pub async fn link_vault(
        &self,
        vault: Address,
        controller: Address,
    ) -> Result<DirectionStatus, OrchestrateError> {
        self.link_direction(LinkDirection::VaultToController, vault, controller)
            .await
    }

    /// Point `controller` at `vault`.
    pub async fn link_controller(
        &self,
        controller: Address,
        vault: Address,
    ) -> Result<DirectionStatus, OrchestrateError> {
        self.link_direction(LinkDirection::ControllerToVault, controller, vault)
            .await
    }

    /// Link both directions. A failure on one side does not prevent the other.
    pub async fn link(&self, vault: Address, controller: Address) -> LinkageReport {
        let vault_status = self.link_vault(vault, controller).await;
        if let Err(e) = &vault_status {
            tracing::warn!(error = %e, "Vault side of the link failed, continuing with controller");
        }

        let controller_status = self.link_controller(controller, vault).await;

        let report = LinkageReport {
            vault: vault_status,
            controller: controller_status,
        };
        tracing::info!(
            vault = %vault,
            controller = %controller,
            converged = report.converged(),
            "Linkage finished"
        );
        report
    }

    async fn link_direction(
        &self,
        direction: LinkDirection,
        target: Address,
        expected: Address,
    ) -> Result<DirectionStatus, OrchestrateError> {
        let setter = direction.setter();
        let call_failed = |call: &'static str, reason: String| OrchestrateError::LinkageCallFailed {
            call,
            target,
            reason,
        };

        match contracts::read_address(self.ledger, target, direction.views()).await {
            Ok(current) if current == expected => {
                tracing::info!(%direction, %target, %expected, "Already linked, skipping setter");
                return Ok(DirectionStatus {
                    direction,
                    expected,
                    observed: current,
                    converged: true,
                    tx_hash: None,
                });
            }
            Ok(current) => {
                tracing::debug!(%direction, %target, %current, "Current link differs");
            }
            Err(e) => {
                tracing::debug!(%direction, %target, error = %e, "Could not read current link");
            }
        }

        let gas_price = self
            .gas
            .resolve_price(self.ledger.min_gas_price())
            .map_err(|reason| call_failed(setter, reason))?;
        let data = abi::encode_call(setter, &[DynSolValue::Address(expected)]);

        tracing::info!(%direction, %target, %expected, "Calling {}", setter);
        let receipt = self
            .ledger
            .submit(TxRequest::call(target, data).gas(self.gas.limit, gas_price))
            .await
            .map_err(|e| call_failed(setter, format!("{:#}", e)))?;

        if !receipt.success {
            return Err(call_failed(setter, receipt.failure_reason()));
        }

        let views = direction.views();
        let observed = contracts::read_address(self.ledger, target, views)
            .await
            .map_err(|e| call_failed(views[0], format!("{:#}", e)))?;

        let converged = observed == expected;
        if converged {
            tracing::info!(%direction, tx_hash = %receipt.tx_hash, "Link confirmed");
        } else {
            tracing::warn!(
                %direction,
                %target,
                %expected,
                %observed,
                "Setter succeeded but the view reports a different address"
            );
        }

        Ok(DirectionStatus {
            direction,
            expected,
            observed,
            converged,
            tx_hash: Some(receipt.tx_hash),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NativeId, contracts::GET_CONTROLLER, ledger::mock::MockLedger};

    fn vault() -> Address {
        "0.0.5001".parse::<NativeId>().unwrap().evm_address()
    }

    fn controller() -> Address {
        "0.0.5002".parse::<NativeId>().unwrap().evm_address()
    }

    fn wired_ledger() -> MockLedger {
        let ledger = MockLedger::new();
        ledger.wire(vault(), SET_CONTROLLER, GET_CONTROLLER);
        ledger.wire(controller(), SET_VAULT, VAULT);
        ledger
    }

    #[tokio::test]
    async fn test_link_converges_both_directions() {
        let ledger = wired_ledger();
        let report = LinkageCoordinator::new(&ledger).link(vault(), controller()).await;

        assert!(report.converged());
        let vault_status = report.vault.unwrap();
        assert_eq!(vault_status.observed, controller());
        assert!(vault_status.tx_hash.is_some());
        assert_eq!(report.controller.unwrap().observed, vault());
    }

    #[tokio::test]
    async fn test_link_skips_setters_when_already_linked() {
        let ledger = MockLedger::new();
        ledger.set_view_address(vault(), contracts::CONTROLLER, controller());
        ledger.set_view_address(controller(), VAULT, vault());

        let report = LinkageCoordinator::new(&ledger).link(vault(), controller()).await;

        assert!(report.converged());
        assert!(ledger.submitted().is_empty());
        assert_eq!(report.vault.unwrap().tx_hash, None);
    }

    #[tokio::test]
    async fn test_mixed_case_addresses_compare_equal() {
        let ledger = MockLedger::new();
        let lower: Address = "0x00000000000000000000000000000000abcdef01".parse().unwrap();
        let upper: Address = "0x00000000000000000000000000000000ABCDEF01".parse().unwrap();
        ledger.set_view_address(vault(), contracts::CONTROLLER, lower);

        let status = LinkageCoordinator::new(&ledger)
            .link_vault(vault(), upper)
            .await
            .unwrap();
        assert!(status.converged);
    }

    #[tokio::test]
    async fn test_mismatch_reports_not_converged() {
        let ledger = MockLedger::new();
        // The setter succeeds but the getter is stuck on another controller.
        let other = Address::repeat_byte(0x77);
        ledger.set_view_address(controller(), VAULT, other);

        let status = LinkageCoordinator::new(&ledger)
            .link_controller(controller(), vault())
            .await
            .unwrap();

        assert!(!status.converged);
        assert_eq!(status.observed, other);
        assert!(status.tx_hash.is_some());
    }

    #[tokio::test]
    async fn test_failed_direction_does_not_block_the_other() {
        let ledger = wired_ledger();
        ledger.revert_on(vault(), SET_CONTROLLER);

        let report = LinkageCoordinator::new(&ledger).link(vault(), controller()).await;

        assert!(!report.converged());
        match report.vault {
            Err(OrchestrateError::LinkageCallFailed { call, target, .. }) => {
                assert_eq!(call, SET_CONTROLLER);
                assert_eq!(target, vault());
            }
            other => panic!("unexpected vault status: {other:?}"),
        }
        assert!(report.controller.unwrap().converged);
    }

    #[tokio::test]
    async fn test_rejected_setter_is_a_call_failure() {
        let ledger = wired_ledger();
        ledger.reject_on(controller(), SET_VAULT);

        let err = LinkageCoordinator::new(&ledger)
            .link_controller(controller(), vault())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestrateError::LinkageCallFailed { call: SET_VAULT, .. }
        ));
    }

    #[tokio::test]
    async fn test_unreadable_view_after_setter_is_a_call_failure() {
        let ledger = MockLedger::new();

        let err = LinkageCoordinator::new(&ledger)
            .link_controller(controller(), vault())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestrateError::LinkageCallFailed { call: VAULT, .. }
        ));
    }
}
