// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nudgeflow - personalization worker for a coaching app.
//!
//! Runs the background worker and a few operator commands against the queue.

mod admin;
mod worker;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nudgeflow_config::{LogFormat, NudgeflowConfig, ServiceConfig};

/// Nudgeflow - personalization worker for a coaching app.
#[derive(Parser, Debug)]
#[command(name = "nudgeflow", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the background worker until SIGINT or SIGTERM.
    Worker,
    /// Print job counts by status.
    Stats {
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },
    /// List jobs that failed with no attempts left.
    Failed {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },
    /// Move a failed job with attempts left back to pending.
    Requeue {
        /// Job id.
        id: String,
    },
    /// Purge expired nudges, old completed jobs, and stale rate-limit windows.
    Sweep,
    /// Validate configuration and exit.
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => nudgeflow_config::load_and_validate_path(path),
        None => nudgeflow_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            nudgeflow_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let Some(command) = cli.command else {
        println!("nudgeflow: use --help for available commands");
        return;
    };

    if matches!(command, Commands::CheckConfig) {
        print!("{}", admin::describe_config(&config));
        return;
    }

    init_tracing(&config.service);

    if let Err(e) = run(command, &config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &NudgeflowConfig) -> Result<(), nudgeflow_core::NudgeflowError> {
    if let Commands::Worker = command {
        return worker::run_worker(config).await;
    }

    let db = nudgeflow_storage::Database::open(&config.storage.database_path, config.storage.wal_mode).await?;
    let mut out = std::io::stdout().lock();
    let result = match command {
        Commands::Stats { json } => admin::stats(&db, json, &mut out).await,
        Commands::Failed { limit, json } => admin::failed(&db, limit, json, &mut out).await,
        Commands::Requeue { id } => admin::requeue(&db, &id, &mut out).await,
        Commands::Sweep => admin::sweep(&db, config.queue.retention_days, &mut out).await,
        Commands::Worker | Commands::CheckConfig => Ok(()),
    };
    db.close().await?;
    result
}

/// Directive covering every nudgeflow crate at `level`, everything else at warn.
fn default_directive(level: &str) -> String {
    const TARGETS: [&str; 8] = [
        "nudgeflow",
        "nudgeflow_core",
        "nudgeflow_storage",
        "nudgeflow_memory",
        "nudgeflow_context",
        "nudgeflow_nudge",
        "nudgeflow_openai",
        "nudgeflow_worker",
    ];
    let mut directive: Vec<String> = TARGETS.iter().map(|t| format!("{t}={level}")).collect();
    directive.push("warn".to_string());
    directive.join(",")
}

fn init_tracing(service: &ServiceConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&service.log_level)));

    match service.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(false)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(false)
            .init(),
    }
}
