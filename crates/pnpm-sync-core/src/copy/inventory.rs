//! Target folder inventory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

/// pnpm owns this subdirectory inside every install folder (dependency
/// links and `.bin` shims); it is never part of the mirrored file set and
/// must survive reconciliation.
pub const RESERVED_FOLDER_NAME: &str = "node_modules";

/// One entry found under a target folder, keyed by absolute path.
#[derive(Debug, Clone)]
pub struct SyncItem {
    pub absolute_path: PathBuf,
    pub is_directory: bool,
    pub is_file: bool,
}

/// Recursively inventory everything under `target_folder` into `pending`.
///
/// Every entry starts out marked for deletion; reconciliation erases the
/// paths it confirms. The reserved pnpm subdirectory at the target root is
/// skipped entirely.
pub fn collect_target_inventory(
    target_folder: &Path,
    pending: &mut HashMap<PathBuf, SyncItem>,
) -> anyhow::Result<()> {
    collect_recursive(target_folder, true, pending)?;
    tracing::debug!(
        target = %target_folder.display(),
        entries = pending.len(),
        "inventoried target folder"
    );
    Ok(())
}

fn collect_recursive(
    directory: &Path,
    is_root: bool,
    pending: &mut HashMap<PathBuf, SyncItem>,
) -> anyhow::Result<()> {
    let entries = fs::read_dir(directory)
        .with_context(|| format!("Failed to read directory: {}", directory.display()))?;

    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to read dir entry: {}", directory.display()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to stat dir entry: {}", path.display()))?;

        if file_type.is_dir() {
            if is_root && entry.file_name() == RESERVED_FOLDER_NAME {
                continue;
            }
            pending.insert(
                path.clone(),
                SyncItem {
                    absolute_path: path.clone(),
                    is_directory: true,
                    is_file: false,
                },
            );
            collect_recursive(&path, false, pending)?;
        } else {
            pending.insert(
                path.clone(),
                SyncItem {
                    absolute_path: path,
                    is_directory: false,
                    is_file: true,
                },
            );
        }
    }
    Ok(())
}
