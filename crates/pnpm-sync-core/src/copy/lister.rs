//! Authoritative source file enumeration.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::plan::PLAN_FILE_NAME;

/// Enumerates the file set a package ships, as paths relative to the
/// package folder with forward slashes.
///
/// This is an allow-list of what the package declares, not a raw directory
/// listing; the executor mirrors exactly this set into every target.
pub trait PackageFileLister {
    fn list_files(&self, package_folder: &Path) -> anyhow::Result<Vec<String>>;
}

/// Lister driven by the package manifest.
///
/// When `package.json` declares a `files` allow-list, each entry names a
/// shipped file or directory subtree; the manifest itself and top-level
/// README/LICENSE files are always included, matching what the package
/// manager packs. Without the field, the whole package folder ships minus
/// `node_modules`, `.git`, and the sync plan document.
#[derive(Debug, Default)]
pub struct ManifestFileLister;

impl PackageFileLister for ManifestFileLister {
    fn list_files(&self, package_folder: &Path) -> anyhow::Result<Vec<String>> {
        let manifest_path = package_folder.join("package.json");
        let manifest: serde_json::Value = match fs::read_to_string(&manifest_path) {
            Ok(contents) => serde_json::from_str(&contents).with_context(|| {
                format!("Failed to parse manifest: {}", manifest_path.display())
            })?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                serde_json::Value::Null
            }
            Err(error) => {
                return Err(error).with_context(|| {
                    format!("Failed to read manifest: {}", manifest_path.display())
                });
            }
        };

        let mut files = BTreeSet::new();

        let allow_list = manifest
            .get("files")
            .and_then(|value| value.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.as_str())
                    .map(|entry| entry.trim_start_matches("./").trim_end_matches('/'))
                    .filter(|entry| !entry.is_empty())
                    .collect::<Vec<_>>()
            });

        match allow_list {
            Some(entries) => {
                for entry in entries {
                    let path = package_folder.join(entry);
                    if path.is_dir() {
                        collect_files(&path, entry, &mut files)?;
                    } else if path.is_file() {
                        files.insert(entry.to_string());
                    }
                    // Entries that do not exist on disk are silently skipped,
                    // same as during packing.
                }
                files.insert("package.json".to_string());
                for entry in fs::read_dir(package_folder).with_context(|| {
                    format!("Failed to read directory: {}", package_folder.display())
                })? {
                    let entry = entry?;
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let upper = name.to_ascii_uppercase();
                    if entry.file_type()?.is_file()
                        && (upper.starts_with("README")
                            || upper.starts_with("LICENSE")
                            || upper.starts_with("LICENCE"))
                    {
                        files.insert(name);
                    }
                }
            }
            None => {
                collect_files_filtered(package_folder, "", &mut files)?;
            }
        }

        Ok(files.into_iter().collect())
    }
}

fn collect_files(directory: &Path, prefix: &str, files: &mut BTreeSet<String>) -> anyhow::Result<()> {
    for entry in fs::read_dir(directory)
        .with_context(|| format!("Failed to read directory: {}", directory.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let relative = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        if entry.file_type()?.is_dir() {
            collect_files(&entry.path(), &relative, files)?;
        } else {
            files.insert(relative);
        }
    }
    Ok(())
}

fn collect_files_filtered(
    directory: &Path,
    prefix: &str,
    files: &mut BTreeSet<String>,
) -> anyhow::Result<()> {
    for entry in fs::read_dir(directory)
        .with_context(|| format!("Failed to read directory: {}", directory.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if prefix.is_empty() && (name == "node_modules" || name == ".git") {
            continue;
        }
        if name == PLAN_FILE_NAME {
            continue;
        }
        let relative = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        if entry.file_type()?.is_dir() {
            collect_files_filtered(&entry.path(), &relative, files)?;
        } else {
            files.insert(relative);
        }
    }
    Ok(())
}
