//! escrowctl - escrow transaction CLI
//!
//! Operator client for driving escrow transactions through their lifecycle:
//! initiate, pay, submit work, approve or dispute, and watch for updates.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use escrow_core::EscrowConfig;
use escrow_core::engine::EscrowEngine;
use escrow_core::payment::SvgQrRenderer;
use escrow_core::store::{FsArtifactStore, SqliteTransactionStore};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// escrowctl - escrow transaction CLI
#[derive(Parser, Debug)]
#[command(name = "escrowctl")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the transaction database
    #[arg(long, default_value = "escrow.db")]
    db: PathBuf,

    /// Path to the artifact bucket directory
    #[arg(long, default_value = "escrow-artifacts")]
    artifacts: PathBuf,

    /// Path to an escrow configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Acting user id
    #[arg(long = "as", value_name = "USER_ID")]
    user: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initiate a transaction as the buyer and print the payment code
    Init {
        /// Counterpart user id (the seller)
        seller: String,

        /// Agreed amount
        amount: f64,

        /// Seller's payment address (user@provider)
        payee: String,

        /// Post the transaction is scoped to
        #[arg(long)]
        post: Option<String>,

        /// Description of the requested work
        #[arg(long)]
        description: Option<String>,

        /// Author of the post, for role resolution on a first transaction
        #[arg(long)]
        post_author: Option<String>,

        /// User who initiated the conversation, for role resolution
        #[arg(long)]
        contact_initiator: Option<String>,

        /// Write the rendered payment code SVG to this file
        #[arg(long)]
        code_out: Option<PathBuf>,
    },

    /// Show a transaction
    Show {
        /// Record id
        record_id: String,
    },

    /// Submit proof of payment (buyer)
    Pay {
        /// Record id
        record_id: String,

        /// Path to the proof file (screenshot, receipt)
        proof: PathBuf,
    },

    /// Submit completed work files (seller)
    SubmitWork {
        /// Record id
        record_id: String,

        /// Work files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Preview link for the work
        #[arg(long)]
        preview: Option<String>,
    },

    /// Approve submitted work and release the payment (buyer)
    Approve {
        /// Record id
        record_id: String,

        /// Feedback for the seller
        #[arg(long)]
        feedback: Option<String>,
    },

    /// File a dispute against submitted work (buyer)
    Dispute {
        /// Record id
        record_id: String,

        /// Why the work is being disputed
        reason: String,
    },

    /// Cancel a transaction (either party)
    Cancel {
        /// Record id
        record_id: String,
    },

    /// Poll a transaction for updates until it reaches a terminal status
    Watch {
        /// Record id
        record_id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = match &cli.config {
        Some(path) => EscrowConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EscrowConfig::default(),
    };

    let store = SqliteTransactionStore::open(&cli.db)
        .with_context(|| format!("failed to open database at {}", cli.db.display()))?;
    let artifacts = FsArtifactStore::provision(&cli.artifacts)
        .with_context(|| format!("failed to provision bucket at {}", cli.artifacts.display()))?;
    let engine = EscrowEngine::new(
        Box::new(store),
        Box::new(artifacts),
        Box::new(SvgQrRenderer::new()),
        config,
    );

    match cli.command {
        Commands::Init {
            seller,
            amount,
            payee,
            post,
            description,
            post_author,
            contact_initiator,
            code_out,
        } => commands::init(
            &engine,
            &cli.user,
            &seller,
            amount,
            &payee,
            post.as_deref(),
            description.as_deref(),
            post_author,
            contact_initiator,
            code_out.as_deref(),
        ),
        Commands::Show { record_id } => commands::show(&engine, &cli.user, &record_id),
        Commands::Pay { record_id, proof } => commands::pay(&engine, &cli.user, &record_id, &proof),
        Commands::SubmitWork {
            record_id,
            files,
            preview,
        } => commands::submit_work(&engine, &cli.user, &record_id, &files, preview.as_deref()),
        Commands::Approve {
            record_id,
            feedback,
        } => commands::approve(&engine, &cli.user, &record_id, feedback.as_deref()),
        Commands::Dispute { record_id, reason } => {
            commands::dispute(&engine, &cli.user, &record_id, &reason)
        }
        Commands::Cancel { record_id } => commands::cancel(&engine, &cli.user, &record_id),
        Commands::Watch { record_id } => commands::watch(&engine, &cli.user, &record_id),
    }
}
