//! Plan document persistence with merge semantics.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::events::{LogCallback, SyncEvent};
use crate::fs::paths::{ensure_folder, relative_path, to_posix_string};
use crate::plan::types::{SyncPlan, TargetFolderEntry};

pub const PLAN_FILE_NAME: &str = ".pnpm-sync.json";

/// Reads, merges, and writes `.pnpm-sync.json` documents.
///
/// Not safe for concurrent writers to the same document: the read-merge-write
/// cycle is a plain full-file rewrite and callers must serialize per source
/// package.
#[derive(Debug, Clone)]
pub struct PlanStore {
    plan_version: String,
}

impl PlanStore {
    /// `plan_version` is stamped into every written document and gates
    /// merging with existing ones.
    pub fn new(plan_version: impl Into<String>) -> Self {
        Self {
            plan_version: plan_version.into(),
        }
    }

    /// Conventional plan location for a source package folder.
    pub fn plan_path(source_project_folder: &Path) -> PathBuf {
        source_project_folder.join("node_modules").join(PLAN_FILE_NAME)
    }

    /// Write or merge the plan for one source package.
    ///
    /// An existing version-compatible document is merged: entries already
    /// present (by `folderPath`) are left untouched, new ones are appended.
    /// When `lockfile_id` is given, entries carrying that id are replaced
    /// wholesale by the newly computed set first, so a resolver re-run
    /// supersedes its own earlier contribution without disturbing entries
    /// owned by other callers. A document written by a different release is
    /// discarded and rebuilt.
    pub fn update_sync_plan(
        &self,
        source_project_folder: &Path,
        target_folders: &BTreeSet<PathBuf>,
        lockfile_id: Option<&str>,
        log: &LogCallback<'_>,
    ) -> anyhow::Result<PathBuf> {
        let plan_folder = source_project_folder.join("node_modules");
        let plan_path = plan_folder.join(PLAN_FILE_NAME);
        ensure_folder(&plan_folder)?;

        let source_folder = to_posix_string(&relative_path(&plan_folder, source_project_folder));
        let mut plan = match self.load_compatible(&plan_path, log)? {
            Some(existing) => existing,
            None => SyncPlan::new(self.plan_version.as_str(), source_folder),
        };

        if let Some(id) = lockfile_id {
            plan.postbuild_injected_copy
                .target_folders
                .retain(|entry| entry.lockfile_id.as_deref() != Some(id));
        }

        let known_folders: HashSet<String> = plan
            .postbuild_injected_copy
            .target_folders
            .iter()
            .map(|entry| entry.folder_path.clone())
            .collect();

        for target in target_folders {
            let folder_path = to_posix_string(&relative_path(&plan_folder, target));
            if known_folders.contains(&folder_path) {
                continue;
            }
            plan.postbuild_injected_copy
                .target_folders
                .push(TargetFolderEntry {
                    folder_path,
                    lockfile_id: lockfile_id.map(str::to_string),
                });
        }

        log(&SyncEvent::PrepareWritingPlan {
            plan_path: plan_path.clone(),
            project_folder: source_project_folder.to_path_buf(),
        });
        self.write(&plan_path, &plan)?;
        Ok(plan_path)
    }

    /// Load the existing document when it is present and carries the
    /// current version; anything else (absent, unparsable legacy shape, or
    /// a different version) yields `None` and a fresh start.
    fn load_compatible(
        &self,
        plan_path: &Path,
        log: &LogCallback<'_>,
    ) -> anyhow::Result<Option<SyncPlan>> {
        let contents = match fs::read_to_string(plan_path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error).with_context(|| {
                    format!("Failed to read sync plan: {}", plan_path.display())
                });
            }
        };

        let existing: Option<SyncPlan> = serde_json::from_str(&contents).ok();
        let actual_version = existing
            .as_ref()
            .map(|plan| plan.version.clone())
            .unwrap_or_default();

        if actual_version == self.plan_version {
            return Ok(existing);
        }

        log(&SyncEvent::PrepareReplacingPlan {
            plan_path: plan_path.to_path_buf(),
            actual_version,
            expected_version: self.plan_version.clone(),
        });
        Ok(None)
    }

    /// Full-file rewrite through a tmp file + rename.
    fn write(&self, plan_path: &Path, plan: &SyncPlan) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(plan).context("Failed to serialize sync plan")?;

        let tmp_path = plan_path.with_extension(format!("json.tmp.{}", std::process::id()));
        fs::write(&tmp_path, bytes)
            .with_context(|| format!("Failed to write tmp sync plan: {}", tmp_path.display()))?;

        // Replace semantics on Windows require removing the target first.
        if plan_path.exists() {
            fs::remove_file(plan_path).with_context(|| {
                format!("Failed to remove existing sync plan: {}", plan_path.display())
            })?;
        }
        fs::rename(&tmp_path, plan_path)
            .with_context(|| format!("Failed to rename tmp sync plan: {}", tmp_path.display()))?;

        tracing::debug!(
            plan = %plan_path.display(),
            targets = plan.postbuild_injected_copy.target_folders.len(),
            "wrote sync plan"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn drop_event(_: &SyncEvent) {}

    fn targets(paths: &[&Path]) -> BTreeSet<PathBuf> {
        paths.iter().map(|p| p.to_path_buf()).collect()
    }

    fn read_plan(path: &Path) -> SyncPlan {
        let contents = fs::read_to_string(path).expect("plan should exist");
        serde_json::from_str(&contents).expect("plan should parse")
    }

    #[test]
    fn test_creates_fresh_plan() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let project = tmp.path().join("packages/lib1");
        fs::create_dir_all(&project).expect("create_dir_all should succeed");
        let target = tmp
            .path()
            .join("node_modules/.pnpm/file+packages+lib1/node_modules/lib1");

        let store = PlanStore::new("0.1.0");
        let plan_path = store
            .update_sync_plan(&project, &targets(&[&target]), None, &drop_event)
            .expect("update should succeed");

        let plan = read_plan(&plan_path);
        assert_eq!(plan.version, "0.1.0");
        assert_eq!(plan.postbuild_injected_copy.source_folder, "..");
        assert_eq!(plan.postbuild_injected_copy.target_folders.len(), 1);
        assert_eq!(
            plan.postbuild_injected_copy.target_folders[0].folder_path,
            "../../../node_modules/.pnpm/file+packages+lib1/node_modules/lib1"
        );
    }

    #[test]
    fn test_update_is_idempotent() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let project = tmp.path().join("lib1");
        fs::create_dir_all(&project).expect("create_dir_all should succeed");
        let target = tmp.path().join(".pnpm/file+lib1/node_modules/lib1");

        let store = PlanStore::new("0.1.0");
        let plan_path = store
            .update_sync_plan(&project, &targets(&[&target]), None, &drop_event)
            .expect("first update should succeed");
        let first = fs::read(&plan_path).expect("read should succeed");

        store
            .update_sync_plan(&project, &targets(&[&target]), None, &drop_event)
            .expect("second update should succeed");
        let second = fs::read(&plan_path).expect("read should succeed");

        assert_eq!(first, second, "re-running must not duplicate entries");
    }

    #[test]
    fn test_merge_preserves_existing_entries() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let project = tmp.path().join("lib1");
        fs::create_dir_all(&project).expect("create_dir_all should succeed");
        let target_a = tmp.path().join(".pnpm/a/node_modules/lib1");
        let target_b = tmp.path().join(".pnpm/b/node_modules/lib1");

        let store = PlanStore::new("0.1.0");
        store
            .update_sync_plan(&project, &targets(&[&target_a]), None, &drop_event)
            .expect("update should succeed");
        let plan_path = store
            .update_sync_plan(&project, &targets(&[&target_b]), None, &drop_event)
            .expect("update should succeed");

        let plan = read_plan(&plan_path);
        let folders: Vec<&str> = plan
            .postbuild_injected_copy
            .target_folders
            .iter()
            .map(|entry| entry.folder_path.as_str())
            .collect();
        assert_eq!(folders.len(), 2);
        assert!(folders[0].ends_with(".pnpm/a/node_modules/lib1"));
        assert!(folders[1].ends_with(".pnpm/b/node_modules/lib1"));
    }

    #[test]
    fn test_lockfile_id_replaces_own_entries_only() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let project = tmp.path().join("lib1");
        fs::create_dir_all(&project).expect("create_dir_all should succeed");
        let target_a = tmp.path().join(".pnpm/a/node_modules/lib1");
        let target_b = tmp.path().join(".pnpm/b/node_modules/lib1");
        let target_c = tmp.path().join(".pnpm/c/node_modules/lib1");

        let store = PlanStore::new("0.1.0");
        store
            .update_sync_plan(
                &project,
                &targets(&[&target_a, &target_b]),
                Some("workspace-a"),
                &drop_event,
            )
            .expect("update should succeed");
        store
            .update_sync_plan(&project, &targets(&[&target_c]), Some("workspace-b"), &drop_event)
            .expect("update should succeed");

        // Re-run for workspace-a with a reduced set: b disappears, c stays.
        let plan_path = store
            .update_sync_plan(&project, &targets(&[&target_a]), Some("workspace-a"), &drop_event)
            .expect("update should succeed");

        let plan = read_plan(&plan_path);
        let folders: Vec<(String, Option<String>)> = plan
            .postbuild_injected_copy
            .target_folders
            .iter()
            .map(|entry| (entry.folder_path.clone(), entry.lockfile_id.clone()))
            .collect();
        assert_eq!(folders.len(), 2);
        assert!(folders.iter().any(|(path, id)| path
            .ends_with(".pnpm/c/node_modules/lib1")
            && id.as_deref() == Some("workspace-b")));
        assert!(folders.iter().any(|(path, id)| path
            .ends_with(".pnpm/a/node_modules/lib1")
            && id.as_deref() == Some("workspace-a")));
    }

    #[test]
    fn test_version_mismatch_discards_existing_document() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let project = tmp.path().join("lib1");
        let plan_folder = project.join("node_modules");
        fs::create_dir_all(&plan_folder).expect("create_dir_all should succeed");
        fs::write(
            plan_folder.join(PLAN_FILE_NAME),
            r#"{
  "version": "outdated-version",
  "postbuildInjectedCopy": {
    "sourceFolder": "..",
    "targetFolders": [{"folderPath": "../../.pnpm/stale/node_modules/lib1"}]
  }
}"#,
        )
        .expect("write should succeed");

        let target = tmp.path().join(".pnpm/fresh/node_modules/lib1");
        let replaced = std::cell::RefCell::new(Vec::new());
        let store = PlanStore::new("0.1.0");
        let plan_path = store
            .update_sync_plan(&project, &targets(&[&target]), None, &|event| {
                if let SyncEvent::PrepareReplacingPlan { actual_version, .. } = event {
                    replaced.borrow_mut().push(actual_version.clone());
                }
            })
            .expect("update should succeed");

        assert_eq!(replaced.into_inner(), vec!["outdated-version".to_string()]);
        let plan = read_plan(&plan_path);
        assert_eq!(plan.version, "0.1.0");
        assert_eq!(plan.postbuild_injected_copy.target_folders.len(), 1);
        assert!(
            plan.postbuild_injected_copy.target_folders[0]
                .folder_path
                .ends_with("fresh/node_modules/lib1")
        );
    }

    #[test]
    fn test_unparsable_legacy_document_is_replaced() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let project = tmp.path().join("lib1");
        let plan_folder = project.join("node_modules");
        fs::create_dir_all(&plan_folder).expect("create_dir_all should succeed");
        fs::write(plan_folder.join(PLAN_FILE_NAME), "not json").expect("write should succeed");

        let target = tmp.path().join(".pnpm/a/node_modules/lib1");
        let store = PlanStore::new("0.1.0");
        let plan_path = store
            .update_sync_plan(&project, &targets(&[&target]), None, &drop_event)
            .expect("update should succeed");

        let plan = read_plan(&plan_path);
        assert_eq!(plan.version, "0.1.0");
    }

    #[test]
    fn test_folder_paths_use_forward_slashes() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let project = tmp.path().join("lib1");
        fs::create_dir_all(&project).expect("create_dir_all should succeed");
        let target = tmp.path().join(".pnpm/a/node_modules/lib1");

        let store = PlanStore::new("0.1.0");
        let plan_path = store
            .update_sync_plan(&project, &targets(&[&target]), None, &drop_event)
            .expect("update should succeed");

        let plan = read_plan(&plan_path);
        for entry in &plan.postbuild_injected_copy.target_folders {
            assert!(!entry.folder_path.contains('\\'));
        }
        assert!(!plan.postbuild_injected_copy.source_folder.contains('\\'));
    }
}
