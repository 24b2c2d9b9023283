//! Lockfile reader.

use std::path::{Path, PathBuf};

use crate::lockfile::types::Lockfile;

/// Schema version prefixes this tool can derive store paths for.
pub const SUPPORTED_VERSION_PREFIXES: [&str; 2] = ["6.", "9."];

#[derive(Debug, Clone, Default)]
pub struct ReadLockfileOptions {
    /// Return lockfiles with unrecognized schema versions instead of
    /// erroring; the caller is expected to gate on the version itself and
    /// skip resolution with a diagnostic.
    pub ignore_incompatible: bool,
}

/// Failure modes of [`read_wanted_lockfile`].
///
/// Callers branch on these: an incompatible schema is locally recoverable
/// (log and skip that lockfile), everything else is fatal.
#[derive(Debug, thiserror::Error)]
pub enum LockfileReadError {
    #[error("lockfile not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read lockfile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse lockfile {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unsupported lockfile version {version} in {path}")]
    Incompatible { path: PathBuf, version: String },
}

/// Load and parse a `pnpm-lock.yaml` file.
pub fn read_wanted_lockfile(
    lockfile_path: &Path,
    options: &ReadLockfileOptions,
) -> Result<Lockfile, LockfileReadError> {
    let contents = match std::fs::read_to_string(lockfile_path) {
        Ok(contents) => contents,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            return Err(LockfileReadError::NotFound {
                path: lockfile_path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(LockfileReadError::Io {
                path: lockfile_path.to_path_buf(),
                source,
            });
        }
    };

    let lockfile: Lockfile =
        serde_yaml::from_str(&contents).map_err(|source| LockfileReadError::Malformed {
            path: lockfile_path.to_path_buf(),
            source,
        })?;

    let supported = SUPPORTED_VERSION_PREFIXES
        .iter()
        .any(|prefix| lockfile.lockfile_version.starts_with(prefix));
    if !supported && !options.ignore_incompatible {
        return Err(LockfileReadError::Incompatible {
            path: lockfile_path.to_path_buf(),
            version: lockfile.lockfile_version,
        });
    }

    Ok(lockfile)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_lockfile(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().expect("tempdir should succeed");
        let path = tmp.path().join("pnpm-lock.yaml");
        std::fs::write(&path, contents).expect("write should succeed");
        (tmp, path)
    }

    #[test]
    fn test_read_missing_lockfile() {
        let tmp = tempfile::TempDir::new().expect("tempdir should succeed");
        let result = read_wanted_lockfile(
            &tmp.path().join("pnpm-lock.yaml"),
            &ReadLockfileOptions::default(),
        );
        assert!(matches!(result, Err(LockfileReadError::NotFound { .. })));
    }

    #[test]
    fn test_read_malformed_lockfile() {
        let (_tmp, path) = write_lockfile("importers: [not: a: map");
        let result = read_wanted_lockfile(&path, &ReadLockfileOptions::default());
        assert!(matches!(result, Err(LockfileReadError::Malformed { .. })));
    }

    #[test]
    fn test_incompatible_version_rejected_by_default() {
        let (_tmp, path) = write_lockfile("lockfileVersion: 5.4\n");
        let result = read_wanted_lockfile(&path, &ReadLockfileOptions::default());
        match result {
            Err(LockfileReadError::Incompatible { version, .. }) => assert_eq!(version, "5.4"),
            other => panic!("expected Incompatible, got {other:?}"),
        }
    }

    #[test]
    fn test_incompatible_version_passed_through_when_ignored() {
        let (_tmp, path) = write_lockfile("lockfileVersion: 5.4\n");
        let lockfile = read_wanted_lockfile(
            &path,
            &ReadLockfileOptions {
                ignore_incompatible: true,
            },
        )
        .expect("read should succeed");
        assert_eq!(lockfile.lockfile_version, "5.4");
    }

    #[test]
    fn test_supported_version_parses() {
        let (_tmp, path) = write_lockfile(
            r#"
lockfileVersion: '6.0'
importers:
  packages/app:
    dependencies:
      lib1:
        specifier: file:../lib1
        version: file:../lib1(react@17.0.2)
"#,
        );
        let lockfile = read_wanted_lockfile(&path, &ReadLockfileOptions::default())
            .expect("read should succeed");
        assert_eq!(lockfile.importers.len(), 1);
    }
}
