//! On-disk shape of `.pnpm-sync.json`.

use serde::{Deserialize, Serialize};

/// A persisted sync plan.
///
/// `version` must exactly equal the generating tool's release version;
/// there is no semantic-version comparison. Documents missing the field
/// (a legacy shape) deserialize with an empty version and are treated as
/// incompatible everywhere a current version is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
    #[serde(default)]
    pub version: String,
    pub postbuild_injected_copy: PostbuildInjectedCopy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostbuildInjectedCopy {
    /// Source package folder, relative to the plan document's folder,
    /// POSIX separators.
    pub source_folder: String,
    pub target_folders: Vec<TargetFolderEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetFolderEntry {
    /// Target install folder, relative to the plan document's folder,
    /// POSIX separators. Unique within one plan.
    pub folder_path: String,

    /// Identifier of the resolver run that produced this entry. A re-run
    /// supplying the same id replaces only its own entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockfile_id: Option<String>,
}

impl SyncPlan {
    pub fn new(version: impl Into<String>, source_folder: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            postbuild_injected_copy: PostbuildInjectedCopy {
                source_folder: source_folder.into(),
                target_folders: Vec::new(),
            },
        }
    }
}
