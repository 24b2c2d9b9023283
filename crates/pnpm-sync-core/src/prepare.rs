//! Sync plan preparation.
//!
//! Ties the lockfile reader, the dependency resolver, and the plan store
//! together into the `prepare` operation: one pass over a lockfile that
//! rewrites the sync plan of every injected source package.

use std::path::PathBuf;
use std::time::Instant;

use crate::events::{LogCallback, SyncEvent};
use crate::lockfile::{ReadLockfileOptions, read_wanted_lockfile};
use crate::plan::PlanStore;
use crate::resolve::{
    EncodingScheme, ResolveContext, infer_pnpm_major, resolve_injected_dependencies,
};

#[derive(Debug, Clone)]
pub struct PrepareOptions {
    /// Path to `pnpm-lock.yaml`.
    pub lockfile_path: PathBuf,
    /// Path to the store folder (conventionally `node_modules/.pnpm`).
    pub store_path: PathBuf,
    /// Identifier recorded on every generated target entry; see
    /// [`PlanStore::update_sync_plan`].
    pub lockfile_id: Option<String>,
    /// Installed pnpm version. Inferred from the lockfile schema version
    /// when absent.
    pub pnpm_version: Option<semver::Version>,
}

/// Runs the prepare phase.
#[derive(Debug, Clone)]
pub struct SyncPreparer {
    plan_version: String,
}

impl SyncPreparer {
    /// `plan_version` is stamped into every plan document written.
    pub fn new(plan_version: impl Into<String>) -> Self {
        Self {
            plan_version: plan_version.into(),
        }
    }

    /// Regenerate the sync plans for every injected dependency recorded in
    /// the lockfile. Returns the number of plan documents written.
    ///
    /// A lockfile or pnpm version without a registered store path encoding
    /// is reported through an error-level event and skipped (returns
    /// `Ok(0)`), so callers iterating several lockfiles can continue with
    /// the rest. Missing input paths and inconsistent lockfile graphs are
    /// errors.
    pub fn prepare(
        &self,
        options: &PrepareOptions,
        log: &LogCallback<'_>,
    ) -> anyhow::Result<usize> {
        let started = Instant::now();

        let lockfile_path = std::path::absolute(&options.lockfile_path)?;
        let store_path = std::path::absolute(&options.store_path)?;

        if !lockfile_path.is_file() {
            anyhow::bail!("lockfile not found: {}", lockfile_path.display());
        }
        if !store_path.is_dir() {
            anyhow::bail!("store folder not found: {}", store_path.display());
        }

        log(&SyncEvent::PrepareStarting {
            lockfile_path: lockfile_path.clone(),
            store_path: store_path.clone(),
        });

        let lockfile = read_wanted_lockfile(
            &lockfile_path,
            &ReadLockfileOptions {
                ignore_incompatible: true,
            },
        )?;

        let pnpm_major = match &options.pnpm_version {
            Some(version) => version.major,
            None => match infer_pnpm_major(&lockfile.lockfile_version) {
                Some(major) => major,
                None => {
                    log(&SyncEvent::LockfileVersionUnsupported {
                        lockfile_path,
                        lockfile_version: lockfile.lockfile_version.clone(),
                    });
                    return Ok(0);
                }
            },
        };

        let scheme = match EncodingScheme::select(pnpm_major, &lockfile.lockfile_version) {
            Some(scheme) => scheme,
            None => {
                log(&SyncEvent::PnpmVersionUnsupported {
                    pnpm_version: options
                        .pnpm_version
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| pnpm_major.to_string()),
                    lockfile_version: lockfile.lockfile_version.clone(),
                });
                return Ok(0);
            }
        };

        let lockfile_folder = lockfile_path.parent().ok_or_else(|| {
            anyhow::anyhow!("lockfile path has no parent: {}", lockfile_path.display())
        })?;
        let resolved = resolve_injected_dependencies(
            &lockfile,
            &ResolveContext {
                lockfile_folder,
                store_path: &store_path,
                scheme,
            },
        )?;

        let plan_store = PlanStore::new(self.plan_version.as_str());
        let mut plan_count = 0;
        for (source_folder, targets) in &resolved {
            if targets.is_empty() {
                continue;
            }
            plan_store.update_sync_plan(
                source_folder,
                targets,
                options.lockfile_id.as_deref(),
                log,
            )?;
            plan_count += 1;
        }

        log(&SyncEvent::PrepareFinishing {
            lockfile_path,
            plan_count,
            elapsed: started.elapsed(),
        });
        Ok(plan_count)
    }
}
