//! Error taxonomy for the orchestration layer.
//!
//! Every variant carries enough context (step, entity, confirmed transaction ids)
//! for the operator to retry only the part that did not complete.

use std::path::PathBuf;

use alloy_core::primitives::{Address, TxHash};

/// Errors surfaced by the orchestration components.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrateError {
    #[error("invalid native identifier '{input}': {reason}")]
    InvalidIdentifierFormat { input: String, reason: String },

    #[error("deployment record not found at {}", .path.display())]
    RecordNotFound { path: PathBuf },

    #[error("deployment of {contract} failed: {reason}")]
    DeploymentFailed {
        contract: String,
        reason: String,
        tx_hash: Option<TxHash>,
    },

    #[error("linkage call {call} on {target} failed: {reason}")]
    LinkageCallFailed {
        call: &'static str,
        target: Address,
        reason: String,
    },

    #[error(
        "associating {failed} with {contract} failed ({} done, {} not attempted): {reason}",
        .succeeded.len(),
        .not_attempted.len()
    )]
    AssociationFailed {
        contract: Address,
        failed: Address,
        succeeded: Vec<Address>,
        not_attempted: Vec<Address>,
        reason: String,
    },

    #[error("funding {target} failed: {reason}")]
    FundingFailed {
        target: Address,
        reason: String,
        tx_hash: Option<TxHash>,
    },

    #[error("index token creation on {controller} failed: {reason}")]
    TokenCreationFailed {
        controller: Address,
        reason: String,
        tx_hash: Option<TxHash>,
    },

    /// Plumbing failures (I/O, serialization, transport) outside a categorized step.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestrateError {
    pub(crate) fn invalid_id(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifierFormat {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
