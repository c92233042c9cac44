//! MicroGig command line client
//!
//! Post, claim, work, and pay small bounty gigs settled on the Stellar
//! test network. Every mutating command walks the same path: build the
//! operation, sign it with the configured keypair, submit the envelope,
//! and poll until the ledger reports a terminal status.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use microgig::deploy::deploy_contract;
use microgig::marketplace::Marketplace;
use microgig::rpc::{HorizonClient, SorobanRpcClient};
use microgig::task::{truncate_address, Category, TaskStatus};
use microgig::tx::EnvelopeBuilder;
use microgig::wallet::{LocalSigner, Signer};
use microgig::{Config, MarketplaceError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "microgig.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Post a new gig to the board
    Post {
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "other")]
        category: String,
        /// Reward in XLM
        #[arg(long)]
        reward: f64,
        /// Optional deadline (unix seconds)
        #[arg(long)]
        deadline: Option<u64>,
    },
    /// Claim an open gig as the configured account
    Claim { gig_id: u64 },
    /// Submit a link to finished work
    SubmitWork { gig_id: u64, link: String },
    /// Pay the winner and record the settlement on the registry
    PickWinner {
        gig_id: u64,
        winner: String,
        /// Payment amount in XLM
        #[arg(long)]
        amount: f64,
    },
    /// Send a one-off native payment
    Pay {
        destination: String,
        /// Amount in XLM
        amount: f64,
    },
    /// Show the task board
    List {
        /// Bypass caches and read from the ledger
        #[arg(long)]
        refresh: bool,
    },
    /// Show recent registry activity
    Events,
    /// Show an account's native balance
    Balance { account: Option<String> },
    /// Fund an account via friendbot
    Fund { account: Option<String> },
    /// Upload and instantiate the gig registry contract
    Deploy { wasm: PathBuf },
    /// Generate a keypair file for the configured wallet path
    Keygen,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(err) = run(args).await {
        if let Some(m) = err.downcast_ref::<MarketplaceError>() {
            eprintln!("✗ {}", m.notification());
        }
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args.config)?;

    match args.command {
        Command::Post {
            title,
            description,
            category,
            reward,
            deadline,
        } => {
            let marketplace = open_marketplace(&config)?;
            info!("📋 posting gig: {title}");
            let (task, receipt) = marketplace
                .post_gig(
                    &title,
                    &description,
                    Category::parse(&category),
                    reward,
                    deadline,
                )
                .await?;
            println!("✅ Gig posted (task {})", task.id);
            println!("   tx: {} (ledger {:?})", receipt.hash, receipt.ledger);
        }
        Command::Claim { gig_id } => {
            let marketplace = open_marketplace(&config)?;
            let receipt = marketplace.claim_gig(gig_id).await?;
            println!("✅ Claimed gig {gig_id}");
            println!("   tx: {}", receipt.hash);
        }
        Command::SubmitWork { gig_id, link } => {
            let marketplace = open_marketplace(&config)?;
            let receipt = marketplace.submit_work(gig_id, &link).await?;
            println!("✅ Work submitted for gig {gig_id}");
            println!("   tx: {}", receipt.hash);
        }
        Command::PickWinner {
            gig_id,
            winner,
            amount,
        } => {
            let marketplace = open_marketplace(&config)?;
            info!("💸 paying {} and recording winner", truncate_address(&winner));
            let payment = marketplace
                .pay_and_pick_winner(gig_id, &winner, amount)
                .await?;
            println!("✅ Winner recorded for gig {gig_id}");
            println!("   payment tx: {}", payment.hash);
        }
        Command::Pay {
            destination,
            amount,
        } => {
            let marketplace = open_marketplace(&config)?;
            let receipt = marketplace.send_payment(&destination, amount).await?;
            println!("✅ Sent {amount} XLM to {}", truncate_address(&destination));
            println!("   tx: {}", receipt.hash);
        }
        Command::List { refresh } => {
            let marketplace = open_marketplace(&config)?;
            let tasks = marketplace.fetch_gigs(refresh).await?;
            if tasks.is_empty() {
                println!("No gigs on the board.");
            }
            for task in tasks {
                let worker = task
                    .worker_address
                    .as_deref()
                    .map(truncate_address)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "#{:<6} [{:<9}] {:>10.2} XLM  {}  (poster {}, worker {})",
                    task.id,
                    status_label(task.status),
                    task.reward,
                    task.title,
                    truncate_address(&task.poster_address),
                    worker,
                );
                for submission in &task.submissions {
                    println!(
                        "        ↳ {} submitted {}",
                        truncate_address(&submission.worker),
                        submission.link
                    );
                }
            }
        }
        Command::Events => {
            let marketplace = open_marketplace(&config)?;
            let feed = marketplace.activity_feed().await?;
            if feed.is_empty() {
                println!("No recent activity.");
            }
            for event in feed {
                println!(
                    "[{}] ledger {} {}: {}",
                    event.ledger_closed_at, event.ledger, event.topic, event.data
                );
            }
        }
        Command::Balance { account } => {
            let marketplace = open_marketplace(&config)?;
            let balance = marketplace.balance(account.as_deref()).await?;
            println!("{balance} XLM");
        }
        Command::Fund { account } => {
            let marketplace = open_marketplace(&config)?;
            let outcome = marketplace.fund(account.as_deref()).await?;
            println!("✅ Funding outcome: {outcome:?}");
        }
        Command::Deploy { wasm } => {
            let code = std::fs::read(&wasm)
                .with_context(|| format!("failed to read wasm from {}", wasm.display()))?;
            info!("📦 deploying {} byte contract", code.len());

            let rpc =
                SorobanRpcClient::new(config.network.rpc_url.clone(), config.request_timeout())?;
            let horizon = HorizonClient::new(
                config.network.horizon_url.clone(),
                config.network.friendbot_url.clone(),
                config.request_timeout(),
            )?;
            let builder =
                EnvelopeBuilder::new(config.network.base_fee, config.network.tx_timeout_secs);

            let outcome = deploy_contract(
                &rpc,
                &horizon,
                &builder,
                &config.submission_config(),
                &config.network.network_passphrase,
                &code,
            )
            .await?;

            println!("✅ Contract deployed");
            println!("   contract id: {}", outcome.contract_id);
            println!("   wasm hash:   {}", outcome.wasm_hash);
            println!("   deployer:    {}", outcome.deployer);
            println!("   seed:        {}", outcome.secret_seed);
            println!();
            println!("Set [contract] contract_id in {} to use it.", args.config);
        }
        Command::Keygen => {
            let path = &config.wallet.keypair_path;
            if std::path::Path::new(path).exists() {
                anyhow::bail!("keypair file {path} already exists, refusing to overwrite");
            }
            let signer = LocalSigner::random(&config.network.network_passphrase);
            std::fs::write(path, signer.secret_seed())
                .with_context(|| format!("failed to write {path}"))?;
            println!("✅ Wrote keypair to {path}");
            println!("   address: {}", signer.address());
            println!("   Fund it with: microgig fund");
        }
    }

    Ok(())
}

fn open_marketplace(config: &Config) -> Result<Marketplace> {
    let signer = LocalSigner::from_file(
        &config.wallet.keypair_path,
        &config.network.network_passphrase,
    )
    .context("failed to load wallet keypair (run `microgig keygen` first)")?;
    info!("🔑 acting as {}", truncate_address(&signer.address()));
    Ok(Marketplace::from_config(config, Arc::new(signer))?)
}

fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Open => "open",
        TaskStatus::Assigned => "assigned",
        TaskStatus::Completed => "completed",
        TaskStatus::Unknown => "unknown",
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "microgig=debug,info"
    } else {
        "microgig=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("failed to load config from {path}"))
    } else {
        warn!("config file '{path}' not found, using testnet defaults");
        Ok(Config::default())
    }
}
