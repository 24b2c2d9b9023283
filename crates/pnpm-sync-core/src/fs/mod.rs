//! Filesystem primitives shared across prepare and copy.

pub mod paths;

pub use paths::{ensure_folder, lexical_normalize, relative_path, to_posix_string};
