//! pnpm-sync - mirror injected workspace dependencies into the pnpm store
//!
//! Usage:
//!   pnpm-sync prepare --lockfile pnpm-lock.yaml --store node_modules/.pnpm
//!   pnpm-sync copy                # run from the package that was rebuilt
//!   pnpm-sync --verbose copy

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pnpm_sync_core::copy::{ManifestFileLister, SyncExecutor};
use pnpm_sync_core::events::{Severity, SyncEvent};
use pnpm_sync_core::plan_format_version;
use pnpm_sync_core::prepare::{PrepareOptions, SyncPreparer};

#[derive(Parser)]
#[command(name = "pnpm-sync")]
#[command(about = "Mirror injected workspace dependencies into the pnpm store", version)]
struct Cli {
    /// Emit verbose progress events
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Regenerate .pnpm-sync.json plans from a pnpm-lock.yaml
    Prepare {
        /// Path to the pnpm-lock.yaml file
        #[arg(long, default_value = "pnpm-lock.yaml")]
        lockfile: PathBuf,

        /// Path to the .pnpm store folder
        #[arg(long, default_value = "node_modules/.pnpm")]
        store: PathBuf,

        /// Identifier recorded on generated entries; a re-run with the same
        /// id replaces only its own earlier entries
        #[arg(long)]
        lockfile_id: Option<String>,

        /// Installed pnpm version (inferred from the lockfile when omitted)
        #[arg(long)]
        pnpm_version: Option<semver::Version>,
    },

    /// Reconcile store install folders against a package's build output
    Copy {
        /// Path to the .pnpm-sync.json plan document
        #[arg(long, default_value = "node_modules/.pnpm-sync.json")]
        plan: PathBuf,

        /// Maximum number of concurrent file operations
        #[arg(long, default_value_t = 10)]
        concurrency: usize,
    },
}

/// Forwards core events to tracing and remembers whether any warning or
/// error was seen, so the process can exit non-zero even when no error was
/// thrown.
struct EventRecorder {
    verbose: bool,
    saw_problem: AtomicBool,
}

impl EventRecorder {
    fn new(verbose: bool) -> Self {
        Self {
            verbose,
            saw_problem: AtomicBool::new(false),
        }
    }

    fn record(&self, event: &SyncEvent) {
        let severity = event.severity();
        match severity {
            Severity::Error => tracing::error!(kind = event.kind(), "{}", event.message()),
            Severity::Warning => tracing::warn!(kind = event.kind(), "{}", event.message()),
            Severity::Info => tracing::info!(kind = event.kind(), "{}", event.message()),
            Severity::Verbose => {
                if self.verbose {
                    tracing::debug!(kind = event.kind(), "{}", event.message());
                }
            }
        }
        if severity >= Severity::Warning {
            self.saw_problem.store(true, Ordering::Relaxed);
        }
    }

    fn saw_problem(&self) -> bool {
        self.saw_problem.load(Ordering::Relaxed)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pnpm_sync_core=debug,pnpm_sync_cli=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let recorder = EventRecorder::new(cli.verbose);

    match run(cli.command, &recorder).await {
        Ok(()) if !recorder.saw_problem() => ExitCode::SUCCESS,
        Ok(()) => ExitCode::FAILURE,
        Err(error) => {
            tracing::error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, recorder: &EventRecorder) -> Result<()> {
    match command {
        Commands::Prepare {
            lockfile,
            store,
            lockfile_id,
            pnpm_version,
        } => {
            let preparer = SyncPreparer::new(plan_format_version());
            preparer.prepare(
                &PrepareOptions {
                    lockfile_path: lockfile,
                    store_path: store,
                    lockfile_id,
                    pnpm_version,
                },
                &|event| recorder.record(event),
            )?;
        }
        Commands::Copy { plan, concurrency } => {
            let executor = SyncExecutor::new(plan_format_version()).with_concurrency(concurrency);
            executor
                .execute(&plan, &ManifestFileLister, &|event| recorder.record(event))
                .await?;
        }
    }
    Ok(())
}
