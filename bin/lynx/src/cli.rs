use std::path::PathBuf;

use alloy_core::primitives::U256;
use clap::{Args, Parser, Subcommand};
use lynx_orchestrate::{CONFIG_FILENAME, GasConfig};
use tracing::level_filters::LevelFilter;

/// Default attached value for `createIndexToken`, in HBAR.
const DEFAULT_TOKEN_CREATION_FEE: &str = "20";

/// A Lynx contract tracked in the deployment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Role {
    Vault,
    Controller,
    Minter,
}

impl Role {
    /// The Hardhat contract name deployed for this role.
    pub fn default_contract(&self) -> &'static str {
        match self {
            Role::Vault => "IndexVault",
            Role::Controller => "IndexController",
            Role::Minter => "LynxMinter",
        }
    }
}

#[derive(Parser)]
#[command(name = "lynx")]
#[command(
    author,
    version,
    about = "Deploy, wire and mint the Lynx index on Hedera, one step at a time"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "LYNX_VERBOSITY", default_value_t = LevelFilter::INFO, global = true)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file. Missing files are ignored.
    #[arg(
        long,
        alias = "conf",
        env = "LYNX_CONFIG",
        default_value = CONFIG_FILENAME,
        global = true
    )]
    pub config: PathBuf,

    /// Overrides the JSON-RPC relay endpoint from the configuration.
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// Overrides the deployment record location from the configuration.
    #[arg(long, global = true)]
    pub record: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Operator credentials, read once at start.
#[derive(Debug, Clone, Args)]
pub struct OperatorArgs {
    /// The operator account (shard.realm.num). Informational only.
    #[arg(long, env = "OPERATOR_ID")]
    pub operator_id: Option<String>,

    /// The operator's ECDSA private key, raw hex or DER-encoded.
    #[arg(long, env = "OPERATOR_KEY", hide_env_values = true)]
    pub operator_key: String,
}

/// Per-call gas overrides.
#[derive(Debug, Clone, Default, Args)]
pub struct GasArgs {
    /// Gas limit for the transaction(s).
    #[arg(long)]
    pub gas_limit: Option<u64>,

    /// Gas price in weibars. Must not be below the network minimum.
    #[arg(long)]
    pub gas_price: Option<u64>,
}

impl GasArgs {
    pub fn apply(&self, default: GasConfig) -> GasConfig {
        GasConfig {
            limit: self.gas_limit.unwrap_or(default.limit),
            price: self.gas_price.map(U256::from).or(default.price),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the long-zero EVM address of a native identifier.
    Address {
        /// A shard.realm.num identifier.
        id: String,
    },

    /// Deploy a contract from its Hardhat artifact and record its address.
    ///
    /// Skipped when the record already holds the role, unless --redeploy is given.
    Deploy {
        /// vault, controller or minter.
        role: Role,

        /// Contract name in the artifacts directory. Defaults to the role's contract.
        #[arg(long)]
        contract: Option<String>,

        /// Constructor arguments as <type>:<value>, in order (e.g. address:0x…, uint256:10).
        #[arg(long = "arg")]
        args: Vec<String>,

        /// Deploy even if the record already holds this role.
        #[arg(long, env = "LYNX_REDEPLOY", default_value_t = false)]
        redeploy: bool,

        #[command(flatten)]
        gas: GasArgs,

        #[command(flatten)]
        operator: OperatorArgs,
    },

    /// Record an already-deployed contract by native id or EVM address.
    Locate {
        role: Role,

        /// A shard.realm.num identifier or a 0x-prefixed address.
        entity: String,
    },

    /// Link the recorded vault and controller in both directions.
    Link {
        #[command(flatten)]
        gas: GasArgs,

        #[command(flatten)]
        operator: OperatorArgs,
    },

    /// Associate tokens with a contract, one at a time.
    Associate {
        /// A recorded role (vault, controller, minter), native id or address.
        target: String,

        /// Tokens to associate, as native ids or addresses.
        #[arg(required = true)]
        tokens: Vec<String>,

        #[command(flatten)]
        gas: GasArgs,

        #[command(flatten)]
        operator: OperatorArgs,
    },

    /// Send HBAR from the operator to a contract.
    Fund {
        /// A recorded role (vault, controller, minter), native id or address.
        target: String,

        /// Amount in HBAR, e.g. 12.5.
        amount: String,

        #[command(flatten)]
        gas: GasArgs,

        #[command(flatten)]
        operator: OperatorArgs,
    },

    /// Create the index token through the recorded controller.
    CreateToken {
        #[arg(long)]
        name: String,

        #[arg(long)]
        symbol: String,

        #[arg(long, default_value = "")]
        memo: String,

        /// Token-creation fee attached to the call, in HBAR.
        #[arg(long, default_value = DEFAULT_TOKEN_CREATION_FEE)]
        fee: String,

        #[command(flatten)]
        gas: GasArgs,

        #[command(flatten)]
        operator: OperatorArgs,
    },

    /// Approve a spender for a deposit token.
    Approve {
        /// The ERC-20 token to approve, as native id or address.
        #[arg(long)]
        token: String,

        /// A recorded role, native id or address. Defaults to the vault.
        #[arg(long, default_value = "vault")]
        spender: String,

        /// Amount in the token's smallest unit.
        amount: U256,

        #[command(flatten)]
        gas: GasArgs,

        #[command(flatten)]
        operator: OperatorArgs,
    },

    /// Mint index tokens through the recorded controller.
    Mint {
        /// Amount in the index token's smallest unit.
        amount: U256,

        #[command(flatten)]
        gas: GasArgs,

        #[command(flatten)]
        operator: OperatorArgs,
    },

    /// Approve the vault for a deposit token, then mint.
    DepositAndMint {
        /// The ERC-20 deposit token, as native id or address.
        #[arg(long)]
        token: String,

        amount: U256,

        #[command(flatten)]
        gas: GasArgs,

        #[command(flatten)]
        operator: OperatorArgs,
    },

    /// Read the recorded controller's views.
    Inspect {
        #[command(flatten)]
        operator: OperatorArgs,
    },

    /// Print the deployment record.
    Record,
}
