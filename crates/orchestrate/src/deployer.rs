//! Contract deployment from compiled Hardhat artifacts.

use std::path::{Path, PathBuf};

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, Bytes, TxHash},
};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    OrchestrateError, abi,
    ledger::{GasConfig, Ledger, TxRequest},
};

/// The parts of a Hardhat build artifact the deployer needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default)]
    pub contract_name: Option<String>,
    pub bytecode: Bytes,
}

impl Artifact {
    /// Path of the artifact for `contract` under a Hardhat `artifacts` directory.
    pub fn path(artifacts_dir: &Path, contract: &str) -> PathBuf {
        artifacts_dir
            .join("contracts")
            .join(format!("{}.sol", contract))
            .join(format!("{}.json", contract))
    }

    /// Load the artifact of `contract` from `artifacts_dir`.
    pub fn load(artifacts_dir: &Path, contract: &str) -> Result<Self, anyhow::Error> {
        let path = Self::path(artifacts_dir, contract);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let artifact: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        if artifact.bytecode.is_empty() {
            anyhow::bail!(
                "Artifact {} has no bytecode (abstract contract or interface?)",
                path.display()
            );
        }

        Ok(artifact)
    }
}

/// A confirmed contract deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub contract: String,
    pub address: Address,
    pub tx_hash: TxHash,
    pub gas_used: u64,
}

/// Deploys contracts as the ledger's operator.
///
/// Has no persistence side effect; callers merge the result into the record.
pub struct ContractDeployer<'a, L> {
    ledger: &'a L,
}

impl<'a, L: Ledger> ContractDeployer<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    /// Deploy `contract` from its Hardhat artifact under `artifacts_dir`.
    pub async fn deploy_artifact(
        &self,
        artifacts_dir: &Path,
        contract: &str,
        args: &[DynSolValue],
        gas: &GasConfig,
    ) -> Result<Deployment, OrchestrateError> {
        let artifact =
            Artifact::load(artifacts_dir, contract).map_err(|e| OrchestrateError::DeploymentFailed {
                contract: contract.to_string(),
                reason: format!("{:#}", e),
                tx_hash: None,
            })?;

        self.deploy(contract, &artifact.bytecode, args, gas).await
    }

    /// Deploy `bytecode` with ABI-encoded constructor `args` and wait for the receipt.
    pub async fn deploy(
        &self,
        contract: &str,
        bytecode: &Bytes,
        args: &[DynSolValue],
        gas: &GasConfig,
    ) -> Result<Deployment, OrchestrateError> {
        let failed = |reason: String, tx_hash: Option<TxHash>| OrchestrateError::DeploymentFailed {
            contract: contract.to_string(),
            reason,
            tx_hash,
        };

        let gas_price = gas
            .resolve_price(self.ledger.min_gas_price())
            .map_err(|reason| failed(reason, None))?;

        if bytecode.is_empty() {
            return Err(failed("empty bytecode".to_string(), None));
        }

        let mut code = bytecode.to_vec();
        code.extend(abi::encode_params(args));

        tracing::info!(
            contract,
            constructor_args = args.len(),
            gas_limit = gas.limit,
            gas_price = %gas_price,
            "Deploying contract..."
        );

        let receipt = self
            .ledger
            .submit(TxRequest::create(code.into()).gas(gas.limit, gas_price))
            .await
            .map_err(|e| failed(format!("{:#}", e), None))?;

        if !receipt.success {
            return Err(failed(receipt.failure_reason(), Some(receipt.tx_hash)));
        }

        let address = receipt.contract_address.ok_or_else(|| {
            failed(
                "receipt carries no contract address".to_string(),
                Some(receipt.tx_hash),
            )
        })?;

        tracing::info!(
            contract,
            address = %address,
            tx_hash = %receipt.tx_hash,
            gas_used = receipt.gas_used,
            "Contract deployed"
        );

        Ok(Deployment {
            contract: contract.to_string(),
            address,
            tx_hash: receipt.tx_hash,
            gas_used: receipt.gas_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;
    use alloy_core::primitives::U256;
    use tempdir::TempDir;

    fn write_artifact(dir: &Path, contract: &str, bytecode: &str) {
        let path = Artifact::path(dir, contract);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            serde_json::json!({
                "_format": "hh-sol-artifact-1",
                "contractName": contract,
                "abi": [],
                "bytecode": bytecode,
                "deployedBytecode": "0x",
            })
            .to_string(),
        )
        .unwrap();
    }

    #[test]
    fn test_artifact_path_layout() {
        assert_eq!(
            Artifact::path(Path::new("artifacts"), "IndexVault"),
            PathBuf::from("artifacts/contracts/IndexVault.sol/IndexVault.json")
        );
    }

    #[tokio::test]
    async fn test_deploy_artifact_with_constructor_args() {
        let dir = TempDir::new("lynx-artifacts").unwrap();
        write_artifact(dir.path(), "IndexVault", "0x6080604052");

        let ledger = MockLedger::new();
        let admin = Address::repeat_byte(0x0a);
        let deployment = ContractDeployer::new(&ledger)
            .deploy_artifact(
                dir.path(),
                "IndexVault",
                &[DynSolValue::Address(admin)],
                &GasConfig::deploy(),
            )
            .await
            .unwrap();

        assert_eq!(deployment.contract, "IndexVault");
        assert!(!deployment.address.is_zero());

        let submitted = ledger.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].to, None);
        assert_eq!(&submitted[0].data[..5], &[0x60, 0x80, 0x60, 0x40, 0x52]);
        assert_eq!(&submitted[0].data[5..], &abi::address_word(admin));
        assert_eq!(submitted[0].gas_price, ledger.min_gas_price());
    }

    #[tokio::test]
    async fn test_sequential_deployments_get_distinct_addresses() {
        let ledger = MockLedger::new();
        let deployer = ContractDeployer::new(&ledger);
        let code = Bytes::from(vec![0x60, 0x80]);

        let vault = deployer.deploy("IndexVault", &code, &[], &GasConfig::deploy()).await.unwrap();
        let controller = deployer
            .deploy("IndexController", &code, &[], &GasConfig::deploy())
            .await
            .unwrap();

        assert_ne!(vault.address, controller.address);
        assert_ne!(vault.tx_hash, controller.tx_hash);
    }

    #[tokio::test]
    async fn test_gas_price_below_floor_is_rejected_before_submission() {
        let ledger = MockLedger::new();
        let gas = GasConfig::deploy().with_price(Some(U256::from(1u8)));

        let err = ContractDeployer::new(&ledger)
            .deploy("IndexVault", &Bytes::from(vec![0x60]), &[], &gas)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestrateError::DeploymentFailed { tx_hash: None, .. }
        ));
        assert!(ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_missing_artifact_fails() {
        let dir = TempDir::new("lynx-artifacts").unwrap();
        let ledger = MockLedger::new();

        let err = ContractDeployer::new(&ledger)
            .deploy_artifact(dir.path(), "IndexVault", &[], &GasConfig::deploy())
            .await
            .unwrap_err();

        match err {
            OrchestrateError::DeploymentFailed { contract, reason, .. } => {
                assert_eq!(contract, "IndexVault");
                assert!(reason.contains("IndexVault.json"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_bytecode_artifact_fails() {
        let dir = TempDir::new("lynx-artifacts").unwrap();
        write_artifact(dir.path(), "IIndexVault", "0x");

        let ledger = MockLedger::new();
        let err = ContractDeployer::new(&ledger)
            .deploy_artifact(dir.path(), "IIndexVault", &[], &GasConfig::deploy())
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestrateError::DeploymentFailed { .. }));
    }

    #[tokio::test]
    async fn test_rejected_deployment_fails_without_tx_hash() {
        let ledger = MockLedger::new();
        ledger.set_balance(ledger.operator(), U256::ZERO);

        let err = ContractDeployer::new(&ledger)
            .deploy("IndexVault", &Bytes::from(vec![0x60]), &[], &GasConfig::deploy())
            .await
            .unwrap_err();

        match err {
            OrchestrateError::DeploymentFailed { tx_hash, reason, .. } => {
                assert_eq!(tx_hash, None);
                assert!(reason.contains("insufficient funds"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
