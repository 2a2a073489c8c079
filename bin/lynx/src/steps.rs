//! One function per CLI step. Each loads what it needs, performs its work and
//! merges its results into the record.

use alloy_core::primitives::{Address, U256};
use anyhow::{Context, Result};
use comfy_table::{Table, presets::UTF8_FULL};
use lynx_orchestrate::{
    ContractDeployer, ControllerReport, DeploymentRecord, EntityRef, FileRecordStore, Funder,
    GasConfig, IndexTokenParams, Ledger, LinkageCoordinator, LinkageReport, MintOrchestrator,
    NativeId, NetworkConfig, OperatorKey, OrchestrateError, RecordPatch, RecordStore,
    TokenAssociator, TransactionOutcome, abi::parse_typed_arg, connect_relay, create_index_token,
    format_address, format_hbar, inspect_controller, native_to_evm_address, parse_hbar,
};

use crate::cli::{GasArgs, OperatorArgs, Role};

/// Configuration and record store shared by every step.
pub struct Session<S> {
    pub config: NetworkConfig,
    pub store: S,
}

impl Session<FileRecordStore> {
    /// A session over the record file named in `config`.
    pub fn from_config(config: NetworkConfig) -> Self {
        let store = FileRecordStore::new(config.record_path.clone());
        Self::new(config, store)
    }
}

impl<S: RecordStore> Session<S> {
    pub fn new(config: NetworkConfig, store: S) -> Self {
        Self { config, store }
    }

    /// The record, or an empty one if no step has run yet.
    fn record_or_default(&self) -> Result<DeploymentRecord, OrchestrateError> {
        match self.store.load() {
            Err(OrchestrateError::RecordNotFound { .. }) => Ok(DeploymentRecord::default()),
            other => other,
        }
    }
}

/// Connect to the configured relay as the operator.
pub async fn connect(config: &NetworkConfig, operator: &OperatorArgs) -> Result<impl Ledger> {
    let key = OperatorKey::from_hex(&operator.operator_key).context("Invalid OPERATOR_KEY")?;

    if let Some(id) = &operator.operator_id {
        let id: NativeId = id.parse().context("Invalid OPERATOR_ID")?;
        tracing::info!(operator_id = %id, operator_address = %key.address(), "Operator loaded");
    }

    connect_relay(config.rpc_url()?, key, config.chain_id, config.min_gas_price()).await
}

/// Resolve a CLI target: a recorded role, a native id or an EVM address.
pub fn resolve_entity(input: &str, record: &DeploymentRecord) -> Result<Address> {
    if let Ok(role) = input.parse::<Role>() {
        return recorded(record, role);
    }
    parse_entity(input)
}

/// Parse a native id or an EVM address.
pub fn parse_entity(input: &str) -> Result<Address> {
    if input.starts_with("0x") {
        return input
            .parse::<Address>()
            .with_context(|| format!("'{}' is not a valid EVM address", input));
    }
    Ok(input.parse::<NativeId>()?.evm_address())
}

fn recorded(record: &DeploymentRecord, role: Role) -> Result<Address> {
    let address = match role {
        Role::Vault => record.vault(),
        Role::Controller => record.controller(),
        Role::Minter => record.minter_address,
    };
    address.with_context(|| {
        format!("No {} in the deployment record; deploy or locate it first", role)
    })
}

fn role_patch(role: Role, entity: EntityRef) -> RecordPatch {
    match role {
        Role::Vault => RecordPatch::default().vault(entity),
        Role::Controller => RecordPatch::default().controller(entity),
        Role::Minter => RecordPatch::default().minter_address(entity.address()),
    }
}

pub fn address(id: &str) -> Result<()> {
    println!("{}", native_to_evm_address(id)?);
    Ok(())
}

/// Whether `deploy` would leave an already recorded `role` alone.
pub fn skips_deploy<S: RecordStore>(
    session: &Session<S>,
    role: Role,
    redeploy: bool,
) -> Result<bool> {
    if redeploy {
        return Ok(false);
    }

    let record = session.record_or_default()?;
    match recorded(&record, role) {
        Ok(existing) => {
            tracing::info!(
                %role,
                address = %existing,
                "Already deployed, skipping (use --redeploy to deploy again)"
            );
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

pub async fn deploy<S: RecordStore, L: Ledger>(
    session: &Session<S>,
    ledger: &L,
    role: Role,
    contract: Option<String>,
    args: &[String],
    redeploy: bool,
    gas: &GasArgs,
) -> Result<()> {
    if skips_deploy(session, role, redeploy)? {
        return Ok(());
    }

    let contract = contract.unwrap_or_else(|| role.default_contract().to_string());
    let args = args
        .iter()
        .map(|arg| parse_typed_arg(arg))
        .collect::<Result<Vec<_>>>()
        .context("Invalid constructor argument")?;

    let gas = gas.apply(GasConfig::deploy());
    let deployment = ContractDeployer::new(ledger)
        .deploy_artifact(&session.config.artifacts, &contract, &args, &gas)
        .await?;

    session.store.merge(role_patch(role, deployment.address.into()))?;

    println!("{}", serde_json::to_string_pretty(&deployment)?);
    Ok(())
}

pub fn locate<S: RecordStore>(session: &Session<S>, role: Role, entity: &str) -> Result<()> {
    let entity = if entity.starts_with("0x") {
        EntityRef::Evm(parse_entity(entity)?)
    } else {
        EntityRef::Native(entity.parse()?)
    };

    let record = session.store.merge(role_patch(role, entity))?;
    print_record(&record);
    Ok(())
}

pub async fn link<S: RecordStore, L: Ledger>(
    session: &Session<S>,
    ledger: &L,
    gas: &GasArgs,
) -> Result<()> {
    let record = session.store.load()?;
    let vault = recorded(&record, Role::Vault)?;
    let controller = recorded(&record, Role::Controller)?;

    let report = LinkageCoordinator::new(ledger)
        .with_gas(gas.apply(GasConfig::call()))
        .link(vault, controller)
        .await;
    print_linkage(&report);

    if !report.converged() {
        anyhow::bail!("Vault and controller are not linked in both directions");
    }
    Ok(())
}

pub async fn associate<S: RecordStore, L: Ledger>(
    session: &Session<S>,
    ledger: &L,
    target: &str,
    tokens: &[String],
    gas: &GasArgs,
) -> Result<()> {
    let record = session.record_or_default()?;
    let contract = resolve_entity(target, &record)?;
    let tokens = tokens
        .iter()
        .map(|t| parse_entity(t))
        .collect::<Result<Vec<_>>>()?;

    let report = TokenAssociator::new(ledger)
        .with_gas(gas.apply(GasConfig::call()))
        .associate(contract, &tokens)
        .await?;

    for association in &report.associated {
        println!("{} {}", format_address(&association.token), association.tx_hash);
    }
    Ok(())
}

pub async fn fund<S: RecordStore, L: Ledger>(
    session: &Session<S>,
    ledger: &L,
    target: &str,
    amount: &str,
    gas: &GasArgs,
) -> Result<()> {
    let record = session.record_or_default()?;
    let target = resolve_entity(target, &record)?;
    let amount = parse_hbar(amount)?;

    let receipt = Funder::new(ledger)
        .with_gas(gas.apply(GasConfig::transfer()))
        .fund(target, amount)
        .await?;

    println!(
        "Funded {} with {} HBAR in {}",
        format_address(&receipt.target),
        format_hbar(receipt.amount),
        receipt.tx_hash
    );
    Ok(())
}

pub async fn create_token<S: RecordStore, L: Ledger>(
    session: &Session<S>,
    ledger: &L,
    params: IndexTokenParams,
    fee: &str,
    gas: &GasArgs,
) -> Result<()> {
    let record = session.store.load()?;
    let controller = recorded(&record, Role::Controller)?;
    let fee = parse_hbar(fee)?;

    let gas = gas.apply(GasConfig::deploy());
    let token = create_index_token(ledger, controller, &params, fee, &gas).await?;

    session.store.merge(RecordPatch::default().token_address(token.address))?;

    println!("{}", format_address(&token.address));
    Ok(())
}

pub async fn approve<S: RecordStore, L: Ledger>(
    session: &Session<S>,
    ledger: &L,
    token: &str,
    spender: &str,
    amount: U256,
    gas: &GasArgs,
) -> Result<()> {
    let record = session.store.load()?;
    let token = parse_entity(token)?;
    let spender = resolve_entity(spender, &record)?;
    let controller = recorded(&record, Role::Controller)?;

    let outcome = MintOrchestrator::new(ledger, token, controller)
        .with_gas(gas.apply(GasConfig::call()))
        .approve_token(spender, amount)
        .await;

    report_outcome(&outcome)
}

pub async fn mint<S: RecordStore, L: Ledger>(
    session: &Session<S>,
    ledger: &L,
    amount: U256,
    gas: &GasArgs,
) -> Result<()> {
    let record = session.store.load()?;
    let controller = recorded(&record, Role::Controller)?;
    // The deposit token is not involved in a bare mint.
    let token = record.token().unwrap_or(Address::ZERO);

    let outcome = MintOrchestrator::new(ledger, token, controller)
        .with_gas(gas.apply(GasConfig::call()))
        .mint_lynx(amount)
        .await;

    report_outcome(&outcome)
}

pub async fn deposit_and_mint<S: RecordStore, L: Ledger>(
    session: &Session<S>,
    ledger: &L,
    token: &str,
    amount: U256,
    gas: &GasArgs,
) -> Result<()> {
    let record = session.store.load()?;
    let token = parse_entity(token)?;
    let vault = recorded(&record, Role::Vault)?;
    let controller = recorded(&record, Role::Controller)?;

    let outcome = MintOrchestrator::new(ledger, token, controller)
        .with_gas(gas.apply(GasConfig::call()))
        .deposit_and_mint(vault, amount)
        .await;

    report_outcome(&outcome)
}

fn report_outcome(outcome: &TransactionOutcome) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);

    match &outcome.error {
        Some(error) if !outcome.is_success() => anyhow::bail!("{}", error),
        _ => Ok(()),
    }
}

pub async fn inspect<S: RecordStore, L: Ledger>(session: &Session<S>, ledger: &L) -> Result<()> {
    let record = session.store.load()?;
    let controller = recorded(&record, Role::Controller)?;

    let report = inspect_controller(ledger, controller).await;
    print_report(&report);

    if let (Some(linked), Some(vault)) = (report.vault, record.vault()) {
        if linked != vault {
            tracing::warn!(
                controller_vault = %linked,
                record_vault = %vault,
                "Controller points at a different vault than the record"
            );
        }
    }
    Ok(())
}

pub fn record<S: RecordStore>(session: &Session<S>) -> Result<()> {
    let record = session.store.load()?;
    print_record(&record);
    Ok(())
}

fn print_linkage(report: &LinkageReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["direction", "converged", "observed", "transaction"]);

    for status in [&report.vault, &report.controller] {
        match status {
            Ok(status) => table.add_row(vec![
                status.direction.to_string(),
                status.converged.to_string(),
                format_address(&status.observed),
                status
                    .tx_hash
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| "already set".to_string()),
            ]),
            Err(e) => table.add_row(vec![
                "-".to_string(),
                "false".to_string(),
                "-".to_string(),
                e.to_string(),
            ]),
        };
    }
    println!("{table}");
}

fn print_record(record: &DeploymentRecord) {
    let optional = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    let address = |value: Option<Address>| optional(value.map(|a| format_address(&a)));
    let id = |value: &Option<NativeId>| optional(value.as_ref().map(|id| id.to_string()));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["field", "value"]);
    table.add_row(vec!["version".to_string(), record.version.to_string()]);
    table.add_row(vec!["vault id".to_string(), id(&record.vault_id)]);
    table.add_row(vec!["vault address".to_string(), address(record.vault())]);
    table.add_row(vec!["controller id".to_string(), id(&record.controller_id)]);
    table.add_row(vec!["controller address".to_string(), address(record.controller())]);
    table.add_row(vec![
        "token address".to_string(),
        format_address(&record.token_address),
    ]);
    table.add_row(vec!["minter address".to_string(), address(record.minter_address)]);
    table.add_row(vec![
        "created at".to_string(),
        optional(record.created_at.map(|t| t.to_rfc3339())),
    ]);
    table.add_row(vec![
        "updated at".to_string(),
        optional(record.updated_at.map(|t| t.to_rfc3339())),
    ]);
    println!("{table}");
}

fn print_report(report: &ControllerReport) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["view", "value"]);
    for (label, value) in report.rows() {
        table.add_row(vec![label.to_string(), value]);
    }
    println!("{table}");
}
