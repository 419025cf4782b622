use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use claimdrop_config::{ClaimdropConfig, ConfigLoader};
use claimdrop_ops::{BatchEntry, ClaimOrchestrator, ClaimSubmitter, JobUpdateHandler};
use claimdrop_poller::{StatusPoller, WatchOutcome};
use claimdrop_relay::{Relay, RelayClient};
use claimdrop_store::{ListJobsQuery, MemoryStore, ResultStore};
use claimdrop_types::{ChainTarget, ClaimJob};

mod render;

use render::ChainLabels;

#[derive(Parser)]
#[command(name = "claimdrop")]
#[command(about = "Submit token claims through a transaction relay and follow them on-chain", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, value_name = "FILE", default_value = "config/claimdrop.toml")]
    config: PathBuf,

    #[arg(long, env = "CLAIMDROP_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Claim tokens to one address and follow every chain to a final status
    Claim {
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Decimal token amount
        #[arg(long)]
        amount: String,
        /// Target chain id; repeat for several. Defaults to every configured chain.
        #[arg(long = "chain", value_name = "CHAIN_ID")]
        chains: Vec<u64>,
    },
    /// Claim for every entry of a JSON file of `{"toAddress", "amount"}` objects
    Batch {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        #[arg(long = "chain", value_name = "CHAIN_ID")]
        chains: Vec<u64>,
    },
    /// Check a queued claim once
    Status {
        queue_id: String,
        /// Chain used for the explorer link when the relay does not report one
        #[arg(long)]
        chain: Option<u64>,
    },
    /// Create a relay backend wallet
    CreateWallet {
        #[arg(long, default_value = "smart:local")]
        kind: String,
        /// Also write the wallet as JSON to this file
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Validate the configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(&cli.log_level)?;

    let config = load_config(&cli)?;
    match cli.command {
        Commands::Claim { to, amount, chains } => claim(&config, &to, &amount, &chains).await,
        Commands::Batch { file, chains } => batch(&config, &file, &chains).await,
        Commands::Status { queue_id, chain } => status(&config, &queue_id, chain).await,
        Commands::CreateWallet { kind, out } => create_wallet(&config, &kind, out).await,
        Commands::Validate => validate(&config),
    }
}

fn load_config(cli: &Cli) -> Result<ClaimdropConfig> {
    info!("Loading configuration from: {:?}", cli.config);
    ConfigLoader::new()
        .with_file(&cli.config)
        .load()
        .context("Failed to load configuration")
}

fn relay_client(config: &ClaimdropConfig) -> RelayClient {
    RelayClient::new(
        &config.relay.url,
        &config.relay.access_token,
        config.relay.request_timeout_ms,
    )
}

fn orchestrator(config: &ClaimdropConfig, targets: &[ChainTarget]) -> Result<ClaimOrchestrator> {
    let relay: Arc<dyn Relay> = Arc::new(relay_client(config));
    let limits = config.amount_limits().context("Invalid amount limits")?;
    let labels = ChainLabels::from_targets(targets);
    let printer: JobUpdateHandler = Box::new(move |job: &ClaimJob| {
        println!("{}", render::job_line(job, &labels));
    });

    Ok(ClaimOrchestrator::new(
        ClaimSubmitter::new(relay.clone(), limits),
        StatusPoller::new(relay).with_targets(targets),
        Arc::new(MemoryStore::new()),
        config.watch_options(),
        Some(printer),
    ))
}

async fn claim(config: &ClaimdropConfig, to: &str, amount: &str, chains: &[u64]) -> Result<()> {
    let targets = config.select_targets(chains)?;
    let orchestrator = orchestrator(config, &targets)?;

    let jobs = orchestrator
        .claim(to, amount, &targets)
        .await
        .context("Claim was not submitted")?;
    info!(jobs = jobs.len(), "Following claims until they settle");

    follow(&orchestrator).await?;
    summarize(&orchestrator).await
}

async fn batch(config: &ClaimdropConfig, file: &Path, chains: &[u64]) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read batch file {:?}", file))?;
    let entries: Vec<BatchEntry> =
        serde_json::from_str(&content).context("Batch file must be a JSON array of claims")?;
    if entries.is_empty() {
        bail!("Batch file {:?} has no entries", file);
    }

    let targets = config.select_targets(chains)?;
    let orchestrator = orchestrator(config, &targets)?;
    let results = orchestrator.claim_batch(&entries, &targets).await?;
    for (entry, result) in entries.iter().zip(&results) {
        if let Err(e) = result {
            warn!(destination = %entry.destination, amount = %entry.amount, error = %e, "Batch entry skipped");
        }
    }

    follow(&orchestrator).await?;
    summarize(&orchestrator).await
}

/// Wait for every watch to end; Ctrl+C or SIGTERM cancels them.
async fn follow(orchestrator: &ClaimOrchestrator) -> Result<()> {
    let idle = orchestrator.wait_idle();
    tokio::pin!(idle);

    let outcomes = tokio::select! {
        outcomes = &mut idle => outcomes,
        _ = setup_shutdown_signal() => {
            info!("Shutdown signal received, cancelling watches...");
            orchestrator.shutdown();
            idle.await
        }
    };

    let cancelled = outcomes
        .iter()
        .filter(|o| matches!(o, WatchOutcome::Cancelled))
        .count();
    if cancelled > 0 {
        warn!(cancelled, "Some claims were left unfinished");
    }
    Ok(())
}

async fn summarize(orchestrator: &ClaimOrchestrator) -> Result<()> {
    let page = orchestrator
        .store()
        .list_jobs(&ListJobsQuery::default())
        .await?;
    let (mined, failed, open) = render::tally(&page.items);
    println!("{} mined, {} failed, {} unfinished", mined, failed, open);
    if failed > 0 || open > 0 {
        bail!("{} of {} claims did not complete", failed + open, page.total);
    }
    Ok(())
}

async fn status(config: &ClaimdropConfig, queue_id: &str, chain: Option<u64>) -> Result<()> {
    let targets = config.chain_targets()?;
    let poller = StatusPoller::new(Arc::new(relay_client(config))).with_targets(&targets);
    let observation = match chain {
        Some(chain_id) => poller.poll_status_on(queue_id, chain_id).await,
        None => poller.poll_status(queue_id).await,
    }
    .context("Status lookup failed")?;
    println!("{}", render::observation_line(queue_id, &observation));
    Ok(())
}

async fn create_wallet(config: &ClaimdropConfig, kind: &str, out: Option<PathBuf>) -> Result<()> {
    let wallet = relay_client(config)
        .create_backend_wallet(kind)
        .await
        .context("Failed to create backend wallet")?;
    println!("{}", wallet.wallet_address);

    if let Some(path) = out {
        let json = serde_json::to_string_pretty(&wallet)?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
        info!("Wallet written to {:?}", path);
    }
    Ok(())
}

fn validate(config: &ClaimdropConfig) -> Result<()> {
    info!("Configuration is valid");
    info!("Relay: {}", config.relay.url);
    for target in config.chain_targets()? {
        info!(
            "  Chain {} ({}): contract {}, wallet {}",
            target.chain_id,
            target.display_name(),
            target.contract_address,
            target.backend_wallet
        );
    }
    let options = config.watch_options();
    info!(
        "Polling every {:?}, giving up after {:?}",
        options.interval, options.timeout
    );
    Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
