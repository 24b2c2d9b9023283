//! Read-only model of `pnpm-lock.yaml` and its reader.
//!
//! Loaded fresh per prepare run, consumed by the dependency resolver, and
//! discarded afterward. Nothing here writes the lockfile back.

pub mod reader;
pub mod types;

pub use reader::{LockfileReadError, ReadLockfileOptions, read_wanted_lockfile};
pub use types::{DependencyMeta, Importer, Lockfile, PackageEntry, VersionSpecifier};
