//! Command-line entry point for spl-issuer

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solana_sdk::signature::Signer;
use spl_issuer::config::IssuerConfig;
use spl_issuer::error::TokenError;
use spl_issuer::issuer::{
    new_run_id, CheckpointStore, Issuer, MemoryCheckpointStore, SqliteCheckpointStore,
};
use spl_issuer::keys::{self, SECRET_KEY_ENV_VAR, SENDER_SECRET_KEY_ENV_VAR};
use spl_issuer::ledger::{LedgerClient, RpcLedger};
use spl_issuer::transfer::TransferService;
use spl_issuer::types::IssuanceReport;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "spl-issuer")]
#[command(about = "Issue and transfer SPL tokens", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the configured token and mint its initial supply
    Create {
        /// Resume an earlier run instead of starting a new one
        #[arg(long)]
        run_id: Option<String>,
        /// Print the operator secret key in the summary
        #[arg(long)]
        reveal_secret: bool,
    },
    /// Transfer tokens from the sender wallet
    Transfer {
        /// Recipient wallet address
        #[arg(long)]
        to: String,
        /// Token mint address
        #[arg(long)]
        mint: String,
        /// Amount in base units
        #[arg(long)]
        amount: u64,
    },
    /// Show a wallet's token balance
    Balance {
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        mint: String,
    },
    /// Show recent transactions for a token account
    History {
        #[arg(long)]
        account: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the off-chain metadata JSON document
    Metadata,
    /// Inspect or clear a stored issuance checkpoint
    Checkpoint {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let config = IssuerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Create {
            run_id,
            reveal_secret,
        } => {
            let run_id = run_id.unwrap_or_else(|| new_run_id(&config.token.metadata.symbol));
            if let Err(e) = create(&config, &run_id, reveal_secret).await {
                eprintln!("Error creating token: {}", e);
                if e.is_insufficient_funds() {
                    eprintln!(
                        "Fund the operator wallet with at least {} lamports and retry",
                        config.min_balance_lamports
                    );
                }
                if config.checkpoint_db.is_some() {
                    eprintln!("Resume this run with --run-id {}", run_id);
                }
                std::process::exit(1);
            }
        }
        Commands::Transfer { to, mint, amount } => {
            let sender_secret = std::env::var(SENDER_SECRET_KEY_ENV_VAR)
                .or_else(|_| std::env::var(SECRET_KEY_ENV_VAR))
                .with_context(|| {
                    format!(
                        "Neither {} nor {} is set",
                        SENDER_SECRET_KEY_ENV_VAR, SECRET_KEY_ENV_VAR
                    )
                })?;
            let service = TransferService::new(connect(&config));
            let signature = service.transfer(&sender_secret, &to, &mint, amount).await?;
            println!("Transaction signature: {}", signature);
        }
        Commands::Balance { wallet, mint } => {
            let service = TransferService::new(connect(&config));
            match service.token_balance(&wallet, &mint).await? {
                Some(balance) => println!("{}", balance),
                None => println!("Balance not reported by the node"),
            }
        }
        Commands::History { account, limit } => {
            let service = TransferService::new(connect(&config));
            let entries = service
                .transaction_history(&account, limit.unwrap_or(config.history_limit))
                .await?;
            for entry in entries {
                let when = entry
                    .block_time
                    .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string());
                println!("{}  slot {}  {}", when, entry.transaction.slot, entry.signature);
            }
        }
        Commands::Metadata => {
            let document = config.token.metadata.offchain_document();
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Commands::Checkpoint { run_id, clear } => {
            let store = SqliteCheckpointStore::from_config(&config).await?;
            if clear {
                store.clear(&run_id).await?;
                println!("Cleared checkpoint {}", run_id);
            } else {
                match store.load(&run_id).await? {
                    Some(checkpoint) => println!("{:#?}", checkpoint),
                    None => println!("No checkpoint for run {}", run_id),
                }
            }
        }
    }

    Ok(())
}

fn connect(config: &IssuerConfig) -> Arc<dyn LedgerClient> {
    info!("Connecting to {}", config.rpc.url);
    Arc::new(RpcLedger::new(&config.rpc))
}

async fn open_checkpoints(config: &IssuerConfig) -> Result<Arc<dyn CheckpointStore>, TokenError> {
    Ok(match &config.checkpoint_db {
        Some(path) => Arc::new(SqliteCheckpointStore::connect(path).await?),
        None => Arc::new(MemoryCheckpointStore::new()),
    })
}

async fn create(config: &IssuerConfig, run_id: &str, reveal_secret: bool) -> Result<(), TokenError> {
    let operator = Arc::new(keys::secret_key_from_env(SECRET_KEY_ENV_VAR)?);
    info!("Operator wallet: {}", operator.pubkey());

    let issuer = Issuer::new(
        connect(config),
        open_checkpoints(config).await?,
        operator.clone(),
        config,
    );
    let report = issuer.issue(run_id).await?;

    print_summary(&report);
    if reveal_secret {
        println!("Operator secret key (hex): {}", keys::encode_secret_key_hex(&operator));
    }
    Ok(())
}

fn print_summary(report: &IssuanceReport) {
    println!("Token creation completed successfully!");
    println!("Please save these addresses:");
    println!("Run ID: {}", report.run_id);
    println!("Mint: {}", report.mint);
    println!("Token Account: {}", report.token_account);
    println!("Metadata: {}", report.metadata);
    println!("Supply: {} base units", report.supply);
    println!("Mint Transaction: {}", report.mint_signature);
    if let Some(signature) = &report.metadata_signature {
        println!("Metadata Transaction: {}", signature);
    }
}
