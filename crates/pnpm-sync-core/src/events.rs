//! Structured log events emitted by the prepare and copy operations.
//!
//! The core never writes to a logger directly. Operations receive a callback
//! and report progress through [`SyncEvent`] values; the caller decides how
//! to render them and whether warning/error events affect the exit status.
//! Error-level events do not abort the operation that emitted them.

use std::path::PathBuf;
use std::time::Duration;

/// Severity attached to a [`SyncEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Verbose,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Verbose => "verbose",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// One progress or diagnostic event, tagged by kind with per-kind fields.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    PrepareStarting {
        lockfile_path: PathBuf,
        store_path: PathBuf,
    },
    PrepareWritingPlan {
        plan_path: PathBuf,
        project_folder: PathBuf,
    },
    /// An existing plan carried a different format version and is replaced
    /// instead of merged.
    PrepareReplacingPlan {
        plan_path: PathBuf,
        actual_version: String,
        expected_version: String,
    },
    PrepareFinishing {
        lockfile_path: PathBuf,
        plan_count: usize,
        elapsed: Duration,
    },
    /// The lockfile schema version is not one this tool knows how to encode
    /// store paths for. Resolution for that lockfile is skipped.
    LockfileVersionUnsupported {
        lockfile_path: PathBuf,
        lockfile_version: String,
    },
    /// The installed pnpm version has no registered path-encoding scheme.
    PnpmVersionUnsupported {
        pnpm_version: String,
        lockfile_version: String,
    },
    CopyStarting {
        plan_path: PathBuf,
    },
    /// No plan document exists; there is nothing to sync.
    PlanMissing {
        plan_path: PathBuf,
    },
    CopyFinishing {
        plan_path: PathBuf,
        source_path: PathBuf,
        file_count: usize,
        elapsed: Duration,
    },
}

impl SyncEvent {
    /// Stable kind identifier, usable as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::PrepareStarting { .. } => "prepare-starting",
            SyncEvent::PrepareWritingPlan { .. } => "prepare-writing-plan",
            SyncEvent::PrepareReplacingPlan { .. } => "prepare-replacing-plan",
            SyncEvent::PrepareFinishing { .. } => "prepare-finishing",
            SyncEvent::LockfileVersionUnsupported { .. } => "lockfile-version-unsupported",
            SyncEvent::PnpmVersionUnsupported { .. } => "pnpm-version-unsupported",
            SyncEvent::CopyStarting { .. } => "copy-starting",
            SyncEvent::PlanMissing { .. } => "copy-plan-missing",
            SyncEvent::CopyFinishing { .. } => "copy-finishing",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            SyncEvent::PrepareStarting { .. }
            | SyncEvent::PrepareWritingPlan { .. }
            | SyncEvent::PrepareReplacingPlan { .. }
            | SyncEvent::CopyStarting { .. } => Severity::Verbose,
            SyncEvent::PrepareFinishing { .. } | SyncEvent::CopyFinishing { .. } => Severity::Info,
            SyncEvent::PlanMissing { .. } => Severity::Warning,
            SyncEvent::LockfileVersionUnsupported { .. }
            | SyncEvent::PnpmVersionUnsupported { .. } => Severity::Error,
        }
    }

    /// Human-readable rendering of the event.
    pub fn message(&self) -> String {
        match self {
            SyncEvent::PrepareStarting {
                lockfile_path,
                store_path,
            } => format!(
                "Preparing sync plans for {} (store: {})",
                lockfile_path.display(),
                store_path.display()
            ),
            SyncEvent::PrepareWritingPlan {
                plan_path,
                project_folder,
            } => format!(
                "Writing {} for {}",
                plan_path.display(),
                project_folder.display()
            ),
            SyncEvent::PrepareReplacingPlan {
                plan_path,
                actual_version,
                expected_version,
            } => format!(
                "The sync plan {} was generated by version {} (expected {}); replacing it",
                plan_path.display(),
                actual_version,
                expected_version
            ),
            SyncEvent::PrepareFinishing {
                lockfile_path,
                plan_count,
                elapsed,
            } => format!(
                "Regenerated {} sync plan(s) for {} in {}ms",
                plan_count,
                lockfile_path.display(),
                elapsed.as_millis()
            ),
            SyncEvent::LockfileVersionUnsupported {
                lockfile_path,
                lockfile_version,
            } => format!(
                "Unsupported lockfile version {} in {}; skipping sync plan generation",
                lockfile_version,
                lockfile_path.display()
            ),
            SyncEvent::PnpmVersionUnsupported {
                pnpm_version,
                lockfile_version,
            } => format!(
                "No store path encoding for pnpm {pnpm_version} with lockfile version \
                 {lockfile_version}; skipping sync plan generation"
            ),
            SyncEvent::CopyStarting { plan_path } => {
                format!("Syncing {}", plan_path.display())
            }
            SyncEvent::PlanMissing { plan_path } => format!(
                "No sync plan found at {}; nothing to sync",
                plan_path.display()
            ),
            SyncEvent::CopyFinishing {
                plan_path: _,
                source_path,
                file_count,
                elapsed,
            } => format!(
                "Synced {} file(s) from {} in {}ms",
                file_count,
                source_path.display(),
                elapsed.as_millis()
            ),
        }
    }
}

/// Callback the operations report [`SyncEvent`]s through.
pub type LogCallback<'a> = dyn Fn(&SyncEvent) + 'a;
