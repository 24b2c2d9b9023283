//! Plan execution: hard-link reconciliation of target folders.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;

use crate::concurrency::for_each_concurrent;
use crate::copy::inventory::{SyncItem, collect_target_inventory};
use crate::copy::lister::PackageFileLister;
use crate::events::{LogCallback, SyncEvent};
use crate::fs::paths::lexical_normalize;
use crate::plan::SyncPlan;

const DEFAULT_CONCURRENCY: usize = 10;

/// Result of one plan execution.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Number of files in the source package's declared set.
    pub file_count: usize,
    pub elapsed: Duration,
}

/// Executes one sync plan.
///
/// Concurrent runs against the same plan are not coordinated; callers
/// needing that must serialize per source package externally.
#[derive(Debug, Clone)]
pub struct SyncExecutor {
    plan_version: String,
    concurrency: usize,
}

impl SyncExecutor {
    /// `plan_version` must match the `version` field of any plan this
    /// executor is asked to run; stale plans are refused outright.
    pub fn new(plan_version: impl Into<String>) -> Self {
        Self {
            plan_version: plan_version.into(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Reconcile every target folder in the plan at `plan_path` against the
    /// source package's declared file set.
    ///
    /// A missing plan is not an error: there is nothing to sync. A plan
    /// written by a different release is refused before any file operation,
    /// because its target paths may follow an encoding this release would
    /// derive differently.
    pub async fn execute(
        &self,
        plan_path: &Path,
        lister: &dyn PackageFileLister,
        log: &LogCallback<'_>,
    ) -> anyhow::Result<SyncOutcome> {
        let started = Instant::now();

        let contents = match std::fs::read_to_string(plan_path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                log(&SyncEvent::PlanMissing {
                    plan_path: plan_path.to_path_buf(),
                });
                return Ok(SyncOutcome {
                    file_count: 0,
                    elapsed: started.elapsed(),
                });
            }
            Err(error) => {
                return Err(error).with_context(|| {
                    format!("Failed to read sync plan: {}", plan_path.display())
                });
            }
        };
        let plan: SyncPlan = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse sync plan: {}", plan_path.display()))?;

        if plan.version != self.plan_version {
            anyhow::bail!(
                "The sync plan {} is outdated; regenerate it and try again \
                 (expected version {}, found {})",
                plan_path.display(),
                self.plan_version,
                if plan.version.is_empty() {
                    "none"
                } else {
                    plan.version.as_str()
                }
            );
        }

        log(&SyncEvent::CopyStarting {
            plan_path: plan_path.to_path_buf(),
        });

        let plan_folder = plan_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Sync plan path has no parent: {}", plan_path.display()))?;
        let source_path =
            lexical_normalize(&plan_folder.join(&plan.postbuild_injected_copy.source_folder));

        let files = lister
            .list_files(&source_path)
            .with_context(|| format!("Failed to list package files: {}", source_path.display()))?;

        let target_folders: Vec<PathBuf> = plan
            .postbuild_injected_copy
            .target_folders
            .iter()
            .map(|entry| lexical_normalize(&plan_folder.join(&entry.folder_path)))
            .collect();

        // Everything currently inside a target starts out marked for
        // deletion; reconciliation erases what it confirms.
        let mut pending: HashMap<PathBuf, SyncItem> = HashMap::new();
        for target_folder in &target_folders {
            if target_folder.exists() {
                collect_target_inventory(target_folder, &mut pending)?;
            }
        }
        let pending = Arc::new(Mutex::new(pending));

        let mut work = Vec::with_capacity(files.len() * target_folders.len());
        for file in &files {
            let source_file = source_path.join(file);
            for target_folder in &target_folders {
                work.push((source_file.clone(), target_folder.join(file)));
            }
        }

        for_each_concurrent(work, self.concurrency, |(source_file, destination)| {
            let pending = Arc::clone(&pending);
            async move { reconcile_file(&source_file, &destination, &pending).await }
        })
        .await?;

        let pending = std::mem::take(
            &mut *pending
                .lock()
                .map_err(|_| anyhow::anyhow!("pending-deletion lock poisoned"))?,
        );
        delete_orphans(pending)?;

        let outcome = SyncOutcome {
            file_count: files.len(),
            elapsed: started.elapsed(),
        };
        log(&SyncEvent::CopyFinishing {
            plan_path: plan_path.to_path_buf(),
            source_path,
            file_count: outcome.file_count,
            elapsed: outcome.elapsed,
        });
        Ok(outcome)
    }
}

/// Bring one destination path in sync with its source file.
///
/// A destination hard-linked to the same inode is already current and costs
/// no I/O; anything else is replaced by a fresh link.
async fn reconcile_file(
    source_file: &Path,
    destination: &Path,
    pending: &Mutex<HashMap<PathBuf, SyncItem>>,
) -> anyhow::Result<()> {
    let existing = pending
        .lock()
        .map_err(|_| anyhow::anyhow!("pending-deletion lock poisoned"))?
        .remove(destination);

    match existing {
        None => {
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
            link_file(source_file, destination).await?;
        }
        Some(item) if item.is_directory => {
            // A directory sits where the source ships a file.
            tokio::fs::remove_dir_all(destination).await.with_context(|| {
                format!("Failed to remove directory: {}", destination.display())
            })?;
            link_file(source_file, destination).await?;
        }
        Some(_) => {
            let source_meta = tokio::fs::metadata(source_file).await.with_context(|| {
                format!("Failed to stat source file: {}", source_file.display())
            })?;
            let destination_meta = tokio::fs::metadata(destination).await.with_context(|| {
                format!("Failed to stat target file: {}", destination.display())
            })?;

            let in_sync = match (file_identity(&source_meta), file_identity(&destination_meta)) {
                (Some(source_id), Some(destination_id)) => source_id == destination_id,
                _ => false,
            };
            if !in_sync {
                tokio::fs::remove_file(destination).await.with_context(|| {
                    format!("Failed to remove stale file: {}", destination.display())
                })?;
                link_file(source_file, destination).await?;
            }
        }
    }
    Ok(())
}

async fn link_file(source_file: &Path, destination: &Path) -> anyhow::Result<()> {
    tokio::fs::hard_link(source_file, destination)
        .await
        .with_context(|| {
            format!(
                "Failed to hard link {} -> {}",
                source_file.display(),
                destination.display()
            )
        })
}

/// Delete everything still marked pending: files first, then directories
/// that ended up empty. A directory still holding entries (for example
/// files this release does not manage) is left for a later run.
fn delete_orphans(pending: HashMap<PathBuf, SyncItem>) -> anyhow::Result<()> {
    let mut orphaned_directories = Vec::new();
    for (path, item) in pending {
        if item.is_file {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => {
                    return Err(error).with_context(|| {
                        format!("Failed to remove orphaned file: {}", path.display())
                    });
                }
            }
        } else {
            orphaned_directories.push(path);
        }
    }

    // Deepest first, so children are swept before their parents.
    orphaned_directories.sort_by_key(|path| std::cmp::Reverse(path.components().count()));
    for directory in orphaned_directories {
        let is_empty = match std::fs::read_dir(&directory) {
            Ok(mut entries) => entries.next().is_none(),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
            Err(error) => {
                return Err(error).with_context(|| {
                    format!("Failed to read directory: {}", directory.display())
                });
            }
        };
        if is_empty {
            std::fs::remove_dir(&directory).with_context(|| {
                format!("Failed to remove orphaned directory: {}", directory.display())
            })?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn file_identity(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_identity(_metadata: &std::fs::Metadata) -> Option<u64> {
    // std exposes no stable file identity on this platform; treating every
    // existing file as stale keeps the result correct at the cost of one
    // unlink+link per file.
    None
}
