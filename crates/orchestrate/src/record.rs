//! The deployment record shared by every step.
//!
//! The record is a small JSON document. Each step loads it, performs its work and
//! merges its results back. Writes go through a sibling temporary file followed by
//! a rename so an interrupted step never leaves a truncated document behind.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use alloy_core::primitives::Address;
use anyhow::Context;
use chrono::{DateTime, Utc};
use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::{NativeId, OrchestrateError};

/// The current schema version written into every record.
pub const RECORD_VERSION: u32 = 1;

/// The default location of the record, relative to the working directory.
pub const DEFAULT_RECORD_PATH: &str = "deployments/lynx.json";

/// Persisted state of the deployed Lynx entities.
///
/// For the vault and the controller the native id is authoritative whenever it is
/// known, and the EVM address is recomputed from it. When only the EVM address is
/// known the address is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_id: Option<NativeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_id: Option<NativeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_address: Option<Address>,
    /// The zero address until the index token has been created.
    #[serde(default)]
    pub token_address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minter_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn current_version() -> u32 {
    RECORD_VERSION
}

impl Default for DeploymentRecord {
    fn default() -> Self {
        Self {
            version: RECORD_VERSION,
            vault_id: None,
            vault_address: None,
            controller_id: None,
            controller_address: None,
            token_address: Address::ZERO,
            minter_address: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// How an entity is identified in a [`RecordPatch`].
#[derive(Debug, Clone, PartialEq, Eq, From)]
pub enum EntityRef {
    /// The native id is known; the address is derived from it.
    Native(NativeId),
    /// Only the EVM address is known.
    Evm(Address),
}

impl EntityRef {
    pub fn address(&self) -> Address {
        match self {
            Self::Native(id) => id.evm_address(),
            Self::Evm(address) => *address,
        }
    }
}

/// A partial update merged into the record. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub vault: Option<EntityRef>,
    pub controller: Option<EntityRef>,
    pub token_address: Option<Address>,
    pub minter_address: Option<Address>,
}

impl RecordPatch {
    pub fn vault(mut self, vault: EntityRef) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn controller(mut self, controller: EntityRef) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn token_address(mut self, token: Address) -> Self {
        self.token_address = Some(token);
        self
    }

    pub fn minter_address(mut self, minter: Address) -> Self {
        self.minter_address = Some(minter);
        self
    }
}

impl DeploymentRecord {
    /// The vault address, if known.
    pub fn vault(&self) -> Option<Address> {
        self.vault_address
    }

    /// The controller address, if known.
    pub fn controller(&self) -> Option<Address> {
        self.controller_address
    }

    /// The index token address, or `None` while it is still the zero address.
    pub fn token(&self) -> Option<Address> {
        (!self.token_address.is_zero()).then_some(self.token_address)
    }

    /// Recompute every derived address from its authoritative native id.
    ///
    /// Returns `true` if a stored address had drifted and was corrected.
    pub fn normalize(&mut self) -> bool {
        let vault = derive_address(&self.vault_id, &mut self.vault_address, "vault");
        let controller = derive_address(
            &self.controller_id,
            &mut self.controller_address,
            "controller",
        );
        vault || controller
    }

    /// Shallow-merge `patch` into this record.
    ///
    /// Returns `true` when any field changed; timestamps only move in that case.
    pub fn apply(&mut self, patch: RecordPatch, now: DateTime<Utc>) -> bool {
        let mut changed = self.normalize();

        if let Some(vault) = patch.vault {
            changed |= apply_entity(&mut self.vault_id, &mut self.vault_address, vault);
        }
        if let Some(controller) = patch.controller {
            changed |= apply_entity(
                &mut self.controller_id,
                &mut self.controller_address,
                controller,
            );
        }
        if let Some(token) = patch.token_address {
            changed |= replace(&mut self.token_address, token);
        }
        if let Some(minter) = patch.minter_address {
            changed |= replace(&mut self.minter_address, Some(minter));
        }

        if changed {
            self.created_at.get_or_insert(now);
            self.updated_at = Some(now);
        }

        changed
    }
}

fn derive_address(id: &Option<NativeId>, address: &mut Option<Address>, entity: &str) -> bool {
    let Some(id) = id else {
        return false;
    };

    let derived = id.evm_address();
    if *address == Some(derived) {
        return false;
    }

    if let Some(stale) = address {
        tracing::warn!(
            entity,
            native_id = %id,
            stored = %stale,
            derived = %derived,
            "Stored address drifted from native id, recomputing"
        );
    }
    *address = Some(derived);
    true
}

fn apply_entity(
    id: &mut Option<NativeId>,
    address: &mut Option<Address>,
    entity: EntityRef,
) -> bool {
    match entity {
        EntityRef::Native(new_id) => {
            let derived = new_id.evm_address();
            replace(id, Some(new_id)) | replace(address, Some(derived))
        }
        EntityRef::Evm(new_address) => {
            // A different address means a different entity; its native id is unknown.
            let keeps_id = id.as_ref().is_some_and(|id| id.evm_address() == new_address);
            let id_changed = if keeps_id { false } else { replace(id, None) };
            id_changed | replace(address, Some(new_address))
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

/// Storage backend for the [`DeploymentRecord`].
pub trait RecordStore {
    /// Load the record. Fails with [`OrchestrateError::RecordNotFound`] if none exists.
    fn load(&self) -> Result<DeploymentRecord, OrchestrateError>;

    /// Merge `patch` into the existing record (or a fresh one) and persist the result.
    fn merge(&self, patch: RecordPatch) -> Result<DeploymentRecord, OrchestrateError>;
}

/// A record persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    path: PathBuf,
}

impl FileRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<DeploymentRecord>, OrchestrateError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to read record from {}", self.path.display()))
                    .into());
            }
        };

        let mut record: DeploymentRecord = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse record at {}", self.path.display()))?;

        if record.version > RECORD_VERSION {
            return Err(anyhow::anyhow!(
                "Record at {} has version {}, this tool supports up to {}",
                self.path.display(),
                record.version,
                RECORD_VERSION
            )
            .into());
        }

        record.normalize();
        Ok(Some(record))
    }

    fn write_atomic(&self, record: &DeploymentRecord) -> anyhow::Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create record directory {}", parent.display()))?;

        let file_name = self
            .path
            .file_name()
            .context("Record path must name a file")?
            .to_string_lossy();
        let tmp_path = parent.join(format!(".{}.tmp", file_name));

        let content =
            serde_json::to_string_pretty(record).context("Failed to serialize record")?;

        let mut file = std::fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync {}", tmp_path.display()))?;
        drop(file);

        std::fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to move {} into place at {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;

        tracing::debug!(path = %self.path.display(), "Record written");
        Ok(())
    }
}

impl RecordStore for FileRecordStore {
    fn load(&self) -> Result<DeploymentRecord, OrchestrateError> {
        let record = self.read()?.ok_or_else(|| OrchestrateError::RecordNotFound {
            path: self.path.clone(),
        })?;
        tracing::debug!(path = %self.path.display(), "Record loaded");
        Ok(record)
    }

    fn merge(&self, patch: RecordPatch) -> Result<DeploymentRecord, OrchestrateError> {
        let existing = self.read()?;
        let exists = existing.is_some();
        let mut record = existing.unwrap_or_default();

        let changed = record.apply(patch, Utc::now());
        if changed || !exists {
            self.write_atomic(&record)?;
            tracing::info!(path = %self.path.display(), "Record updated");
        } else {
            tracing::debug!(path = %self.path.display(), "Record unchanged, skipping write");
        }

        Ok(record)
    }
}

/// An in-memory store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    record: Mutex<Option<DeploymentRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: DeploymentRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn load(&self) -> Result<DeploymentRecord, OrchestrateError> {
        let guard = self
            .record
            .lock()
            .map_err(|_| anyhow::anyhow!("Record lock poisoned"))?;
        guard.clone().ok_or_else(|| OrchestrateError::RecordNotFound {
            path: PathBuf::from("<memory>"),
        })
    }

    fn merge(&self, patch: RecordPatch) -> Result<DeploymentRecord, OrchestrateError> {
        let mut guard = self
            .record
            .lock()
            .map_err(|_| anyhow::anyhow!("Record lock poisoned"))?;
        let record = guard.get_or_insert_with(DeploymentRecord::default);
        record.apply(patch, Utc::now());
        Ok(record.clone())
    }
}
