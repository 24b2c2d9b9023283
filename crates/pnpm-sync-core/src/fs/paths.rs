//! Path resolution helpers.
//!
//! Plan documents store folders relative to the document's own directory,
//! always with forward slashes, so the same plan works regardless of where
//! the workspace is checked out or which host wrote it.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;

/// Idempotent recursive directory creation.
pub fn ensure_folder(path: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Resolve `.` and `..` components lexically, without touching the
/// filesystem.
///
/// Store paths are derived by joining lockfile-relative `file:` paths onto
/// absolute folders, so the joined result routinely contains `..` segments
/// that must collapse before paths can be compared or relativized.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Keep leading `..` when there is nothing left to pop.
                let last_is_normal = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if last_is_normal {
                    normalized.pop();
                } else {
                    normalized.push(Component::ParentDir);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Compute the relative path from `from_dir` to `to`.
///
/// Both paths must be absolute; the result is purely lexical (no symlink
/// resolution), matching how plan documents are later re-resolved against
/// their own folder.
pub fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from = lexical_normalize(from_dir);
    let to = lexical_normalize(to);

    let from_components: Vec<Component> = from.components().collect();
    let to_components: Vec<Component> = to.components().collect();

    let common = from_components
        .iter()
        .zip(to_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..from_components.len() {
        relative.push("..");
    }
    for component in &to_components[common..] {
        relative.push(component);
    }
    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}

/// Render a path with forward slashes regardless of host separator.
pub fn to_posix_string(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        raw.into_owned()
    } else {
        raw.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
