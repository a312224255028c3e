//! DPOS daemon: entry point for running a chain database node.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use dpos_ledger::GenesisConfig;
use dpos_node::{
    init_logging, parse_signing_keys, BlockProducer, ChainDatabase, ChainMetrics, NodeConfig,
    ShutdownController,
};
use dpos_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment, Migrator};
use dpos_types::{Clock, NetworkId, SystemClock};

#[derive(Parser)]
#[command(name = "dpos-daemon", about = "DPOS chain database daemon")]
struct Cli {
    /// Network whose chain parameters to use: "live", "test", or "dev".
    /// When a config file is provided, defaults to the file's network value.
    #[arg(long, env = "DPOS_NETWORK")]
    network: Option<NetworkId>,

    /// Data directory for the LMDB environment.
    #[arg(long, env = "DPOS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Genesis JSON, required when the data directory is fresh.
    #[arg(long, env = "DPOS_GENESIS")]
    genesis: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "DPOS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print Prometheus metrics on shutdown.
    #[arg(long, env = "DPOS_ENABLE_METRICS")]
    metrics: bool,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Open the chain and run until SIGINT/SIGTERM, producing blocks for
    /// configured delegate keys.
    Run,
    /// Print the head, forks, delegates and an audit of the stored chain.
    Info {
        /// Number of top-ranked delegates to list.
        #[arg(long, default_value_t = 10)]
        delegates: u32,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)?,
        None => NodeConfig::default(),
    };
    if let Some(network) = cli.network {
        config.network = network;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(genesis) = &cli.genesis {
        config.genesis_file = Some(genesis.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.enable_metrics |= cli.metrics;
    Ok(config)
}

fn open_chain(config: &NodeConfig, clock: Arc<dyn Clock>) -> anyhow::Result<ChainDatabase> {
    let Some(genesis_path) = &config.genesis_file else {
        bail!("no genesis file configured (--genesis or genesis_file)");
    };
    let genesis = GenesisConfig::from_json_file(genesis_path)?;
    let params = config.params();
    params.validate().map_err(anyhow::Error::msg)?;

    check_data_dir(&config.data_dir).map_err(anyhow::Error::msg)?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;
    let env = LmdbEnvironment::open(&config.data_dir, config.map_size)?;
    Migrator::run(&env)?;
    let report = check_integrity(env.env())?;
    if !report.is_healthy() {
        bail!("LMDB integrity check failed: {}", report.errors.join("; "));
    }
    tracing::info!(
        databases = report.databases_checked,
        entries = report.total_entries,
        "storage opened"
    );

    let metrics = Arc::new(ChainMetrics::new()?);
    Ok(ChainDatabase::open(
        Arc::new(env),
        &genesis,
        params,
        clock,
        metrics,
    )?)
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let chain = open_chain(&config, Arc::clone(&clock))?;
    tracing::info!(
        network = config.network.as_str(),
        chain_id = %chain.chain_id(),
        head = chain.get_head_block_number().await,
        "chain database running"
    );

    let shutdown = Arc::new(ShutdownController::new());
    let producer = if config.producer.enabled {
        let keys = parse_signing_keys(&config.producer.signing_keys)?;
        let public: Vec<_> = keys.iter().map(|k| k.public).collect();
        let delegates = chain.delegates_for_keys(&public).await;
        if delegates.is_empty() {
            tracing::warn!("no configured signing key belongs to a registered delegate");
        }
        let producer = BlockProducer::new(chain.clone(), keys, Arc::clone(&clock));
        Some(tokio::spawn(producer.run(shutdown.subscribe())))
    } else {
        None
    };

    shutdown.wait_for_signal().await?;
    if let Some(handle) = producer {
        handle.await.context("producer task")?;
    }

    if config.enable_metrics {
        println!("{}", chain.metrics().encode_text()?);
    }
    tracing::info!(head = chain.get_head_block_number().await, "daemon exited cleanly");
    Ok(())
}

async fn info(config: NodeConfig, delegates: u32) -> anyhow::Result<()> {
    let chain = open_chain(&config, Arc::new(SystemClock))?;
    let head = chain.get_head_block_number().await;
    println!("chain id:   {}", chain.chain_id());
    println!("head:       #{} {}", head, chain.get_head_block_id().await);
    if let Some(summary) = chain.get_block_summary(head).await? {
        println!(
            "head block: {} by {} ({} transactions, fees {})",
            summary.timestamp, summary.signer, summary.transaction_count, summary.fees
        );
    }

    let forks = chain.list_forks().await;
    println!("forks:      {} heights", forks.len());
    for (num, entries) in &forks {
        println!("  #{}: {} blocks", num, entries.len());
    }

    println!("delegates by votes:");
    for (rank, account) in chain.list_active_delegates(0, delegates).await.iter().enumerate() {
        let votes = account
            .delegate_info
            .as_ref()
            .map(|d| d.votes_for.to_string())
            .unwrap_or_default();
        println!("  {:>3}. {} ({}) votes {}", rank + 1, account.name, account.id, votes);
    }

    let audit = chain.audit_state().await;
    if audit.is_clean() {
        println!("audit:      clean ({} assets)", audit.assets_checked);
    } else {
        println!("audit:      {:?}", audit);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format()?, &config.log_level);

    match cli.command {
        Command::Run => run(config).await,
        Command::Info { delegates } => info(config, delegates).await,
    }
}
