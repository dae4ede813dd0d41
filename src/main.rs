//! Teleburn CLI
//!
//! Thin operator surface over the library: derive keyless addresses, hash
//! and verify inscription content, and rehearse a full teleburn flow.
//! Signing and broadcasting stay out of this tool.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use teleburn::config::Config;
use teleburn::content::ContentResolver;
use teleburn::derivation::{Deriver, InscriptionId};
use teleburn::dry_run::{DryRunOrchestrator, RehearsalRequest};
use teleburn::immutability::ImmutabilityTracker;
use teleburn::metrics::metrics;
use teleburn::rpc_manager::{ChainRpc, RpcPool};
use teleburn::tx_builder::{FeeTier, TxBuilder};
use teleburn::{ContentHash, Pubkey};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics to stderr after the command
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive the keyless teleburn address for one or more inscriptions
    Derive {
        #[arg(required = true)]
        inscriptions: Vec<InscriptionId>,
    },

    /// Fetch inscription content and print its SHA-256
    Hash { inscription: InscriptionId },

    /// Re-fetch content and compare against an expected SHA-256
    Verify {
        inscription: InscriptionId,
        sha256: ContentHash,
    },

    /// Build, decode and simulate seal + retire without signing
    DryRun {
        #[arg(long)]
        mint: Pubkey,

        /// Token holder; signs the retire step
        #[arg(long)]
        owner: Pubkey,

        #[arg(long)]
        inscription: InscriptionId,

        /// Signs seal and pointer update; enables the pointer step
        #[arg(long)]
        update_authority: Option<Pubkey>,

        /// Priority fee tier (defaults to [fees].default_tier)
        #[arg(long, value_enum)]
        tier: Option<FeeTier>,

        /// Amount to retire in base units (defaults to the full balance)
        #[arg(long)]
        amount: Option<u64>,

        /// Skip content-hash auto-fill
        #[arg(long)]
        content_hash: Option<ContentHash>,

        /// Write the JSON receipt to this path
        #[arg(long)]
        receipt: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    init_logging(args.verbose, args.json_logs || config.monitoring.json_logs)?;
    info!(version = env!("CARGO_PKG_VERSION"), "teleburn starting");

    let outcome = run(args.command, &config).await;

    if args.print_metrics && config.monitoring.enable_metrics {
        eprintln!("{}", metrics().encode()?);
    }
    outcome
}

async fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Derive { inscriptions } => {
            let deriver = Deriver::new(config.derivation.domain());
            for (id, result) in inscriptions.iter().zip(deriver.derive_batch(&inscriptions)) {
                let identity = result.with_context(|| format!("Failed to derive {id}"))?;
                println!("{id}\t{identity}");
            }
            Ok(())
        }

        Command::Hash { inscription } => {
            let resolver = ContentResolver::from_config(&config.content)?;
            let hashed = resolver
                .compute_content_hash(&inscription)
                .await
                .map_err(|e| anyhow::anyhow!("{e}\nremediation: {}", e.remediation()))?;
            println!("{}\t{} bytes\t{}", hashed.hash, hashed.size, hashed.source_name);
            Ok(())
        }

        Command::Verify { inscription, sha256 } => {
            let resolver = Arc::new(ContentResolver::from_config(&config.content)?);
            let tracker = ImmutabilityTracker::new(resolver);
            let result = tracker.verify(&inscription, &sha256).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.unchanged {
                anyhow::bail!("Content for {inscription} does not match {sha256}");
            }
            Ok(())
        }

        Command::DryRun {
            mint,
            owner,
            inscription,
            update_authority,
            tier,
            amount,
            content_hash,
            receipt,
        } => {
            let pool = Arc::new(RpcPool::from_config(&config.rpc)?);
            pool.start_health_checks();
            let content = Arc::new(ContentResolver::from_config(&config.content)?);
            content.start_sweeper();

            let builder = Arc::new(TxBuilder::new(
                Arc::clone(&pool) as Arc<dyn ChainRpc>,
                Arc::clone(&content),
                Deriver::new(config.derivation.domain()),
                config.fees.clone(),
            ));
            let orchestrator = DryRunOrchestrator::new(builder, config.retire.method);

            let mut request = RehearsalRequest::new(mint, owner, inscription);
            request.update_authority = update_authority;
            request.amount = amount;
            request.content_hash = content_hash;
            request.tier = tier.unwrap_or(config.fees.default_tier);

            let report = orchestrator.rehearse(&request).await;

            pool.stop().await;
            content.stop().await;

            let receipt_json = report.receipt().to_json_pretty()?;
            println!("{receipt_json}");
            if let Some(path) = receipt {
                tokio::fs::write(&path, &receipt_json)
                    .await
                    .with_context(|| format!("Failed to write receipt to {}", path.display()))?;
                info!(path = %path.display(), "Receipt written");
            }

            report.ensure_passed().map_err(|e| anyhow::anyhow!("{e}\nremediation: {}", e.remediation()))
        }
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "teleburn=debug,info"
    } else {
        "teleburn=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
        }))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}
