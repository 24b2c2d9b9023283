//! pnpm-sync Core Library
//!
//! Keeps the build output of injected workspace dependencies mirrored into
//! the pnpm store. `prepare` resolves the lockfile graph into per-package
//! sync plans; `copy` reconciles the store install folders named by a plan
//! against the package's current build output using hard-link identity.

pub mod concurrency;
pub mod copy;
pub mod events;
pub mod fs;
pub mod lockfile;
pub mod plan;
pub mod prepare;
pub mod resolve;

/// Version stamped into generated `.pnpm-sync.json` documents.
///
/// Plans written by a different release are treated as fully incompatible:
/// `prepare` regenerates them and `copy` refuses them.
pub fn plan_format_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Re-exports of commonly used types
pub mod prelude {
    // Lockfile model
    pub use crate::lockfile::{
        Importer, Lockfile, LockfileReadError, PackageEntry, ReadLockfileOptions,
        VersionSpecifier, read_wanted_lockfile,
    };

    // Resolution
    pub use crate::resolve::{EncodingScheme, SourceToTargets, resolve_injected_dependencies};

    // Plans
    pub use crate::plan::{PlanStore, PostbuildInjectedCopy, SyncPlan, TargetFolderEntry};

    // Prepare / copy operations
    pub use crate::copy::{ManifestFileLister, PackageFileLister, SyncExecutor, SyncOutcome};
    pub use crate::prepare::{PrepareOptions, SyncPreparer};

    // Events
    pub use crate::events::{Severity, SyncEvent};
}
