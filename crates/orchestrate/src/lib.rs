//! lynx-orchestrate - deployment and mint orchestration for the Lynx index on Hedera.
//!
//! Each step (deploy, link, associate, fund, create the index token, mint) is an
//! independent operation against a [`Ledger`]. Results are merged into a shared
//! [`DeploymentRecord`] so steps can be re-run individually and resumed after a
//! failure.

pub mod abi;
pub mod contracts;
pub mod rpc;

mod address;
pub use address::{NativeId, format_address, native_to_evm_address};

mod error;
pub use error::OrchestrateError;

mod signer;
pub use signer::OperatorKey;

pub mod ledger;
pub use ledger::{GasConfig, Ledger, Receipt, RpcLedger, TxRequest, connect_relay};

pub mod record;
pub use record::{
    DeploymentRecord, EntityRef, FileRecordStore, MemoryRecordStore, RecordPatch, RecordStore,
};

mod config;
pub use config::{
    CONFIG_FILENAME, DEFAULT_ARTIFACTS_DIR, DEFAULT_MIN_GAS_PRICE, DEFAULT_RPC_URL, NetworkConfig,
};

mod deployer;
pub use deployer::{Artifact, ContractDeployer, Deployment};

mod linkage;
pub use linkage::{DirectionStatus, LinkDirection, LinkageCoordinator, LinkageReport};

mod association;
pub use association::{Association, AssociationReport, TokenAssociator};

mod funding;
pub use funding::{Funder, FundingReceipt, format_hbar, parse_hbar};

mod mint;
pub use mint::{
    MintOrchestrator, MintState, MintStep, OutcomeStatus, SubTransaction, TransactionOutcome,
};

mod token;
pub use token::{IndexToken, IndexTokenParams, create_index_token};

mod inspect;
pub use inspect::{ControllerReport, inspect_controller};

