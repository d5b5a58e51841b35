//! opportunity-scout CLI: `scan` discovers listings, `score` rates them,
//! `config` shows the scoring configuration in effect.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use opportunity_scout::dedup::JsonFileSeenStore;
use opportunity_scout::events::JsonlEventLog;
use opportunity_scout::ingest::{config as sources, providers, Scanner};
use opportunity_scout::metrics::Metrics;
use opportunity_scout::publish::{score_pending, DiscoveryPublisher, ScorePublisher};
use opportunity_scout::scoring::config as scoring_config;
use opportunity_scout::{Discovery, DiscoverySummary, ScoringEngine, ScoringHandle};

#[derive(Parser)]
#[command(name = "opportunity-scout", version)]
#[command(about = "Discover remote AI/ML job listings and score them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan all enabled sources and publish newly discovered listings
    Scan {
        /// Sources config (default: $SOURCES_CONFIG_PATH or config/sources.toml)
        #[arg(long)]
        sources: Option<PathBuf>,
        /// Discovery event stream to append to
        #[arg(long, default_value = "data/events.jsonl")]
        out: PathBuf,
        /// Seen-set shared across runs
        #[arg(long, default_value = "data/seen_listings.json")]
        seen: PathBuf,
        /// Write a Prometheus textfile snapshot here when done
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },

    /// Score the OpportunityDiscovered events in a JSONL file
    Score {
        events_file: PathBuf,
        /// Scoring config (default: $SCORING_CONFIG_PATH or config/scoring.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output stream (default: scored_<timestamp>.jsonl next to the input)
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },

    /// Validate and print the scoring configuration
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Logs go to stderr so stdout stays a clean report.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ingest=info,dedup=info,scoring=info,opportunity_scout=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scan {
            sources,
            out,
            seen,
            metrics_out,
        } => {
            let metrics = metrics_out.as_ref().map(|_| Metrics::init()).transpose()?;
            let summary = scan(sources.as_deref(), &out, &seen).await?;
            print_scan_summary(&summary);
            if let (Some(m), Some(p)) = (metrics, metrics_out) {
                m.write_snapshot(&p)?;
            }
        }
        Commands::Score {
            events_file,
            config,
            output,
            metrics_out,
        } => {
            let metrics = metrics_out.as_ref().map(|_| Metrics::init()).transpose()?;
            score(&events_file, config.as_deref(), output)?;
            if let (Some(m), Some(p)) = (metrics, metrics_out) {
                m.write_snapshot(&p)?;
            }
        }
        Commands::Config { config } => show_config(config.as_deref())?,
    }
    Ok(())
}

async fn scan(sources_path: Option<&Path>, out: &Path, seen: &Path) -> Result<DiscoverySummary> {
    let cfg = match sources_path {
        Some(p) => sources::load_sources_from(p)?,
        None => sources::load_sources_default()?,
    };
    let client = providers::http_client()?;
    let adapters = providers::build_adapters(&cfg, &client);
    if adapters.is_empty() {
        tracing::warn!(target: "ingest", "no sources enabled");
    }
    let scanner = Scanner::new(adapters).with_settings(&cfg.scan);

    let store = JsonFileSeenStore::open(seen)?;
    let log = Arc::new(JsonlEventLog::new(out));
    let discovery = Discovery::new(scanner, Box::new(store), DiscoveryPublisher::new(log));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::warn!("shutdown signal received, cancelling scan");
        on_signal.cancel();
    });

    discovery.run(&cancel).await
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_scan_summary(s: &DiscoverySummary) {
    println!("Scan finished at {}", s.timestamp.to_rfc3339());
    println!(
        "Sources: {} succeeded, {} failed",
        s.report.succeeded(),
        s.report.failed()
    );
    for src in &s.report.sources {
        println!("  {:<20} {}", src.source, src.outcome.describe(src.listings));
    }
    println!("Fetched:          {}", s.total_fetched);
    println!("After dedup:      {}", s.after_dedup);
    println!("New listings:     {}", s.new_listings);
    println!("Events published: {}", s.events_published);
    if s.anomalies > 0 {
        println!("Dedup anomalies:  {}", s.anomalies);
    }
    if s.report.is_degraded() {
        println!("WARNING: no source succeeded");
    }
}

fn default_score_output(input: &Path) -> PathBuf {
    let name = format!("scored_{}.jsonl", chrono::Utc::now().format("%Y%m%d_%H%M%S"));
    match input.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

fn load_engine(explicit: Option<&Path>) -> Result<(ScoringEngine, Option<PathBuf>)> {
    let (cfg, path) = scoring_config::load(explicit)?;
    Ok((ScoringEngine::new(cfg)?, path))
}

fn score(input: &Path, config: Option<&Path>, output: Option<PathBuf>) -> Result<()> {
    // Config errors stop us before reading any input.
    let (engine, _) = load_engine(config)?;
    let handle = ScoringHandle::new(engine);

    if !input.exists() {
        anyhow::bail!("events file {} does not exist", input.display());
    }
    let input_log = JsonlEventLog::new(input);
    let output = output.unwrap_or_else(|| default_score_output(input));
    let publisher = ScorePublisher::new(Arc::new(JsonlEventLog::new(&output)));

    let run = score_pending(&input_log, 0, &handle, &publisher)
        .with_context(|| format!("scoring {}", input.display()))?;

    for (listing, s) in &run.results {
        match &s.rejection_reason {
            Some(reason) => println!(
                "  0.0  {} / {}  (rejected: {reason})",
                listing.company, listing.role
            ),
            None => println!("{:>5.1}  {} / {}", s.score, listing.company, listing.role),
        }
    }
    println!();
    println!("accepted: {}", run.accepted());
    println!("rejected: {}", run.rejected());
    println!("total:    {}", run.total());
    if run.skipped > 0 {
        println!("skipped:  {}", run.skipped);
    }
    if run.total() > 0 {
        println!("Results written to {}", output.display());
    }
    Ok(())
}

fn show_config(explicit: Option<&Path>) -> Result<()> {
    let (engine, path) = load_engine(explicit)?;
    let cfg = engine.config();
    match path {
        Some(p) => println!("Scoring config: {}", p.display()),
        None => println!("Scoring config: built-in defaults"),
    }

    println!("\nWeights:");
    for dim in scoring_config::DIMENSIONS {
        println!("  {:<16} {:.2}", dim, cfg.weights.get(dim).unwrap_or_default());
    }
    println!("  {:<16} {:.2}", "(sum)", cfg.weights.sum());

    println!("\nHard filters:");
    println!("  require_remote   {}", cfg.hard_filters.require_remote);
    println!(
        "  salary_floor     {:.0} {}",
        cfg.hard_filters.salary_floor, cfg.salary.reference_currency
    );

    println!("\nLexicons:");
    println!(
        "  ai_ml            {} keywords (high {}, medium {}, low {})",
        cfg.ai_ml.keyword_count(),
        cfg.ai_ml.high.len(),
        cfg.ai_ml.medium.len(),
        cfg.ai_ml.low.len()
    );
    println!("  fintech          {} keywords", cfg.fintech.keywords.len());
    Ok(())
}
