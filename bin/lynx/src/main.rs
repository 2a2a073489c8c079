//! lynx deploys, wires and mints the Lynx index on Hedera, one step per invocation.

mod cli;
mod steps;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use lynx_orchestrate::{IndexTokenParams, NetworkConfig};
use steps::Session;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    let mut config = NetworkConfig::load(&cli.config)?;
    if let Some(rpc_url) = cli.rpc_url {
        config.rpc_url = rpc_url;
    }
    if let Some(record) = cli.record {
        config.record_path = record;
    }

    let session = Session::from_config(config);

    match cli.command {
        Command::Address { id } => steps::address(&id),
        Command::Deploy {
            role,
            contract,
            args,
            redeploy,
            gas,
            operator,
        } => {
            if steps::skips_deploy(&session, role, redeploy)? {
                return Ok(());
            }
            let ledger = steps::connect(&session.config, &operator).await?;
            steps::deploy(&session, &ledger, role, contract, &args, redeploy, &gas).await
        }
        Command::Locate { role, entity } => steps::locate(&session, role, &entity),
        Command::Link { gas, operator } => {
            let ledger = steps::connect(&session.config, &operator).await?;
            steps::link(&session, &ledger, &gas).await
        }
        Command::Associate {
            target,
            tokens,
            gas,
            operator,
        } => {
            let ledger = steps::connect(&session.config, &operator).await?;
            steps::associate(&session, &ledger, &target, &tokens, &gas).await
        }
        Command::Fund {
            target,
            amount,
            gas,
            operator,
        } => {
            let ledger = steps::connect(&session.config, &operator).await?;
            steps::fund(&session, &ledger, &target, &amount, &gas).await
        }
        Command::CreateToken {
            name,
            symbol,
            memo,
            fee,
            gas,
            operator,
        } => {
            let params = IndexTokenParams { name, symbol, memo };
            let ledger = steps::connect(&session.config, &operator).await?;
            steps::create_token(&session, &ledger, params, &fee, &gas).await
        }
        Command::Approve {
            token,
            spender,
            amount,
            gas,
            operator,
        } => {
            let ledger = steps::connect(&session.config, &operator).await?;
            steps::approve(&session, &ledger, &token, &spender, amount, &gas).await
        }
        Command::Mint {
            amount,
            gas,
            operator,
        } => {
            let ledger = steps::connect(&session.config, &operator).await?;
            steps::mint(&session, &ledger, amount, &gas).await
        }
        Command::DepositAndMint {
            token,
            amount,
            gas,
            operator,
        } => {
            let ledger = steps::connect(&session.config, &operator).await?;
            steps::deposit_and_mint(&session, &ledger, &token, amount, &gas).await
        }
        Command::Inspect { operator } => {
            let ledger = steps::connect(&session.config, &operator).await?;
            steps::inspect(&session, &ledger).await
        }
        Command::Record => steps::record(&session),
    }
}
