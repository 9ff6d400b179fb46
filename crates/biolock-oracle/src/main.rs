//! Biolock Authentication Oracle: entry point.
//!
//! Starts the oracle with configuration from a TOML file or defaults.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use biolock_crypto::{write_key_pair_pem, OracleKeyPair, PemFileKeyStore};
use biolock_ledger::HttpLedgerGateway;
use biolock_matcher::GreedyMatcher;
use biolock_oracle::api::start_api_server;
use biolock_oracle::{AuthenticationOracle, OracleConfig, OracleSettings, OracleState, RocksJournal};

/// Biolock Authentication Oracle
#[derive(Parser, Debug)]
#[command(name = "biolock-oracle", version, about = "Biolock Authentication Oracle")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "biolock-oracle.toml")]
    config: PathBuf,

    /// Override the API port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the first block to process (0 replays the full history).
    #[arg(long)]
    from_block: Option<u64>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Generate a default config file and RSA key pair, then exit.
    #[arg(long)]
    init: bool,
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_files(args: &Args, config: &OracleConfig) -> anyhow::Result<()> {
    config.save(&args.config)?;
    tracing::info!(path = %args.config.display(), "wrote default config");

    let keys = &config.keys;
    if keys.private_key_path.exists() {
        tracing::warn!(
            path = %keys.private_key_path.display(),
            "private key already exists, leaving key pair untouched"
        );
        return Ok(());
    }
    let pair = OracleKeyPair::generate(keys.rsa_bits)?;
    write_key_pair_pem(&pair, &keys.public_key_path, &keys.private_key_path)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = OracleConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(from_block) = args.from_block {
        config.oracle.from_block = from_block;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }

    init_tracing(&config.logging.level, &config.logging.format);

    if args.init {
        return init_files(&args, &config);
    }

    tracing::info!("Biolock oracle v{}", env!("CARGO_PKG_VERSION"));

    // The oracle cannot operate without its key pair.
    let keys = PemFileKeyStore::load(&config.keys.public_key_path, &config.keys.private_key_path)
        .context("failed to load oracle key pair")?;
    let matcher = GreedyMatcher::with_distance_threshold(config.oracle.distance_threshold)?;
    let journal = RocksJournal::open(&config.journal_path())?;
    let gateway = HttpLedgerGateway::with_timeout(
        config.ledger.gateway_url.clone(),
        config.ledger.request_timeout(),
    )?;
    let account = config.account()?;

    let (request_tx, request_rx) = AuthenticationOracle::channel(config.oracle.channel_capacity);
    let state = Arc::new(OracleState::new(account, request_tx));

    let settings = OracleSettings {
        account,
        from_block: config.oracle.from_block,
        retry: config.submission.retry_policy(),
        drain_timeout: config.submission.drain_timeout(),
    };
    let mut oracle = AuthenticationOracle::new(
        settings,
        Arc::new(keys),
        Arc::new(matcher),
        Arc::new(gateway),
        Arc::new(journal),
        state.clone(),
    );

    let api_addr = config.api_addr()?;
    let api_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = start_api_server(api_addr, api_state).await {
            tracing::error!(error = %e, "API server error");
        }
    });

    // Set up graceful shutdown on SIGINT
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received shutdown signal");
    };

    tokio::select! {
        _ = oracle.run(request_rx) => {}
        _ = shutdown => {
            tracing::info!("initiating graceful shutdown");
        }
    }

    let aborted = oracle.drain(config.submission.drain_timeout()).await;
    tracing::info!(aborted, snapshot = ?state.snapshot(), "Biolock oracle exited");
    Ok(())
}
