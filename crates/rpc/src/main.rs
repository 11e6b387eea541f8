//! Demobank CLI - Main entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use demobank_core::{Currency, Money};
use demobank_ledger::{AccountKind, AccountStatus, Identity, TransactionKind};
use demobank_rpc::{commands, AppContext};
use demobank_store::StorageConfig;

#[derive(Parser)]
#[command(name = "demobank")]
#[command(about = "Demobank - demo banking ledger", long_about = None)]
struct Cli {
    /// SQLite database path
    #[arg(long, default_value = "./data/demobank.db")]
    db: PathBuf,

    /// Use the volatile in-memory backend instead of SQLite
    #[arg(long)]
    memory: bool,

    /// Load storage configuration from a JSON file (overrides --db/--memory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Acting user id, as authenticated by the session layer
    #[arg(long)]
    user: Option<String>,

    /// Act with the administrator role
    #[arg(long)]
    admin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open an account for the acting user
    OpenAccount {
        /// Account kind (checking, savings)
        #[arg(long, default_value = "checking")]
        kind: AccountKind,
        /// Currency code
        #[arg(long, default_value = "USD")]
        currency: Currency,
    },

    /// Provision an account for any user with a starting balance (admin)
    Provision {
        /// Owning user id
        owner: String,
        /// Opening balance
        #[arg(long, default_value = "0")]
        balance: Money,
        /// Account kind (checking, savings)
        #[arg(long, default_value = "checking")]
        kind: AccountKind,
        /// Currency code
        #[arg(long, default_value = "USD")]
        currency: Currency,
    },

    /// Deposit funds into an account
    Deposit {
        /// Account id
        account: String,
        /// Amount to deposit
        amount: Money,
        /// Optional description
        #[arg(long)]
        description: Option<String>,
    },

    /// Request a withdrawal; an administrator must approve it
    Withdraw {
        /// Account id
        account: String,
        /// Amount to withdraw
        amount: Money,
        /// Optional description
        #[arg(long)]
        description: Option<String>,
    },

    /// Approve a pending transaction (admin)
    Approve {
        /// Transaction id
        transaction: String,
        /// Optional display date override
        #[arg(long)]
        date: Option<String>,
    },

    /// Reject a pending transaction (admin)
    Reject {
        /// Transaction id
        transaction: String,
    },

    /// Insert a completed, possibly backdated entry (admin)
    AdminEntry {
        /// Account id
        account: String,
        /// Entry kind (deposit, withdrawal, transfer)
        kind: TransactionKind,
        /// Amount
        amount: Money,
        /// Display date for the entry
        #[arg(long)]
        date: String,
        /// Optional description
        #[arg(long)]
        description: Option<String>,
    },

    /// Set an account balance directly, bypassing the transaction log (admin)
    SetBalance {
        /// Account id
        account: String,
        /// New balance
        balance: Money,
    },

    /// Block new withdrawal requests on an account (admin)
    Freeze {
        /// Account id
        account: String,
    },

    /// Allow withdrawal requests on an account again (admin)
    Unfreeze {
        /// Account id
        account: String,
    },

    /// Change the account lifecycle status (admin)
    SetStatus {
        /// Account id
        account: String,
        /// New status (active, suspended, closed)
        status: AccountStatus,
    },

    /// Overwrite a transaction's display date (admin)
    Redate {
        /// Transaction id
        transaction: String,
        /// New display date text
        date: String,
    },

    /// List the acting user's accounts
    Accounts,

    /// List every account (admin)
    AllAccounts,

    /// Show an account's transaction history, newest display date first
    History {
        /// Account id
        account: String,
        /// Maximum rows
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// List pending transactions across accounts (admin)
    Pending,

    /// List every transaction across accounts (admin)
    AllHistory,

    /// Replay an account's ledger and compare with the stored balance
    Audit {
        /// Account id
        account: String,
    },
}

fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = if let Some(path) = &cli.config {
        StorageConfig::from_file(path)?
    } else if cli.memory {
        StorageConfig::Memory
    } else {
        StorageConfig::Sqlite {
            path: cli.db.clone(),
        }
    };

    // The CLI flags stand in for the session layer: whoever runs the binary
    // is the already-authenticated caller.
    let identity = match (cli.user, cli.admin) {
        (Some(user), true) => Some(Identity::admin(user)),
        (Some(user), false) => Some(Identity::customer(user)),
        (None, true) => Some(Identity::admin("admin")),
        (None, false) => None,
    };

    let ctx = AppContext::new(&config, identity)?;

    match cli.command {
        Commands::OpenAccount { kind, currency } => commands::open_account(&ctx, kind, currency),
        Commands::Provision {
            owner,
            balance,
            kind,
            currency,
        } => commands::provision(&ctx, &owner, kind, currency, balance),
        Commands::Deposit {
            account,
            amount,
            description,
        } => commands::deposit(&ctx, &account, amount, description),
        Commands::Withdraw {
            account,
            amount,
            description,
        } => commands::withdraw(&ctx, &account, amount, description),
        Commands::Approve { transaction, date } => commands::approve(&ctx, &transaction, date),
        Commands::Reject { transaction } => commands::reject(&ctx, &transaction),
        Commands::AdminEntry {
            account,
            kind,
            amount,
            date,
            description,
        } => commands::admin_entry(&ctx, &account, kind, amount, description, date),
        Commands::SetBalance { account, balance } => commands::set_balance(&ctx, &account, balance),
        Commands::Freeze { account } => commands::set_withdrawals(&ctx, &account, false),
        Commands::Unfreeze { account } => commands::set_withdrawals(&ctx, &account, true),
        Commands::SetStatus { account, status } => commands::set_status(&ctx, &account, status),
        Commands::Redate { transaction, date } => commands::redate(&ctx, &transaction, date),
        Commands::Accounts => commands::accounts(&ctx),
        Commands::AllAccounts => commands::all_accounts(&ctx),
        Commands::History { account, limit } => commands::history(&ctx, &account, limit),
        Commands::Pending => commands::pending(&ctx),
        Commands::AllHistory => commands::all_history(&ctx),
        Commands::Audit { account } => commands::audit(&ctx, &account),
    }
}
