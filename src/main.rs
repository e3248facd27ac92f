//! ARBSCAN: prediction-market snapshot arbitrage scanner
//!
//! Entry point. Loads configuration, initialises structured logging,
//! prepares the credential pool, then runs one analysis pass over the
//! selected snapshot.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use arbscan::config::AppConfig;
use arbscan::credentials::{CredentialPool, LoadedFrom};
use arbscan::data;
use arbscan::engine::Pipeline;
use arbscan::llm::{self, Dispatcher, Provider};
use arbscan::platforms::polymarket::GammaClient;

#[derive(Debug, Parser)]
#[command(name = "arbscan", version, about = "Scan a market snapshot for arbitrage and validate it")]
struct Cli {
    /// Reasoning provider. Overrides `[llm].provider`.
    #[arg(long, value_enum)]
    model: Option<Provider>,

    /// Path to the TOML config file. Defaults apply when it is missing.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Analyse this snapshot directory instead of the latest one.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Probe every raw credential even if a working-key cache exists.
    #[arg(long)]
    revalidate_keys: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    let mut cfg = AppConfig::load_or_default(&cli.config)?;
    if let Some(provider) = cli.model {
        cfg.llm.provider = provider;
    }

    info!(
        provider = %cfg.llm.provider,
        data_dir = %cfg.paths.data_dir.display(),
        threshold = %cfg.detection.threshold,
        "ARBSCAN starting up"
    );

    // -- Locate input ------------------------------------------------------

    let snapshot = match &cli.snapshot {
        Some(path) => data::explicit_snapshot(path)?,
        None => data::latest_snapshot(&cfg.paths.data_dir)
            .context("No snapshot available to analyse")?,
    };

    // -- Credentials -------------------------------------------------------

    let reasoner = llm::build_reasoner(cfg.llm.provider, &cfg.llm)?;

    let pool = match CredentialPool::load(&cfg.paths.keys_file, &cfg.paths.working_keys_file) {
        Ok(pool) => pool,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Failed to load credentials, continuing without any");
            CredentialPool::from_tokens(Vec::new())
        }
    };

    if cli.revalidate_keys || pool.loaded_from() == LoadedFrom::RawList {
        pool.validate_all(reasoner.as_ref()).await;
    }

    let working = pool.working_count();
    if working == 0 {
        warn!("No working credentials. Every candidate will be inconclusive");
    }

    let llm_limit = cfg.concurrency.llm_limit(working);
    info!(working, llm_limit, model = %reasoner.primary_model(), "Credential pool ready");

    // -- Run ---------------------------------------------------------------

    let dispatcher = Arc::new(Dispatcher::new(
        reasoner,
        Arc::new(pool),
        cfg.retry.policy(),
        llm_limit,
    ));
    let source = Arc::new(GammaClient::new(&cfg.polymarket)?);

    let pipeline = Pipeline::new(&cfg.detection, cfg.concurrency.clone(), dispatcher, source);
    let report = pipeline.run(&snapshot, &cfg.paths.results_dir).await?;

    for file in report.files.iter().filter(|f| f.confirmed > 0) {
        info!(
            category = %file.category,
            confirmed = file.confirmed,
            rejected = file.rejected,
            inconclusive = file.inconclusive,
            "Category summary"
        );
    }
    info!(
        run_id = %report.run_id,
        results = %report.results_dir.display(),
        confirmed = report.total_confirmed(),
        "ARBSCAN finished"
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("arbscan=info"));

    if std::env::var("ARBSCAN_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
