//! Sync plan documents and their persistence.
//!
//! One plan per source package, conventionally at
//! `<project>/node_modules/.pnpm-sync.json`, listing every store folder
//! that must mirror the package's build output.

pub mod store;
pub mod types;

pub use store::{PLAN_FILE_NAME, PlanStore};
pub use types::{PostbuildInjectedCopy, SyncPlan, TargetFolderEntry};
