//! Sync plan execution.
//!
//! Reconciles every target folder named by a plan against the source
//! package's authoritative file set, reusing hard-link identity to skip
//! files that are already in sync.

pub mod executor;
pub mod inventory;
pub mod lister;

pub use executor::{SyncExecutor, SyncOutcome};
pub use inventory::{SyncItem, collect_target_inventory};
pub use lister::{ManifestFileLister, PackageFileLister};
