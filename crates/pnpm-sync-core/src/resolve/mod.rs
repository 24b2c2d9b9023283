//! Injected dependency resolution.
//!
//! Walks the lockfile graph for every package consumed through the `file:`
//! protocol and derives the store install folders its build output must be
//! mirrored into.

pub mod resolver;
pub mod store_path;

pub use resolver::{ResolveContext, SourceToTargets, resolve_injected_dependencies};
pub use store_path::{EncodingScheme, infer_pnpm_major};
