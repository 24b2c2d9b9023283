//! Store install path derivation.
//!
//! pnpm installs an injected dependency under
//! `<store>/<encoded qualifier>/node_modules/<name>`, where the encoding of
//! the version qualifier changed between pnpm major versions. The derived
//! path must match the store's own encoder exactly or the link target will
//! not exist, so each scheme is pinned to the (pnpm, lockfile schema)
//! combination it was observed with and anything unrecognized is rejected
//! up front.

use std::path::{Path, PathBuf};

pub const FILE_PROTOCOL: &str = "file:";

/// Specifier suffixes that denote packed tarballs rather than injectable
/// package folders.
pub const TARBALL_SUFFIXES: [&str; 3] = [".tar", ".tar.gz", ".tgz"];

/// Longest store folder name pnpm emits before switching to a truncated
/// name with a digest suffix.
const MAX_FOLDER_NAME_LENGTH: usize = 120;
const DIGEST_SUFFIX_LENGTH: usize = 27;

pub fn is_file_protocol(version: &str) -> bool {
    version.starts_with(FILE_PROTOCOL)
}

pub fn is_tarball_reference(version: &str) -> bool {
    let path = version.split('(').next().unwrap_or(version);
    TARBALL_SUFFIXES
        .iter()
        .any(|suffix| path.ends_with(suffix))
}

/// Extract the folder path from a `file:` qualifier, dropping the peer
/// dependency suffix: `file:../lib1(react@17.0.2)` -> `../lib1`.
pub fn file_protocol_path(qualifier: &str) -> &str {
    let without_peers = qualifier.split('(').next().unwrap_or(qualifier);
    without_peers.strip_prefix(FILE_PROTOCOL).unwrap_or(without_peers)
}

/// One store path encoding scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingScheme {
    /// pnpm 8 with lockfile schema 6.x.
    PnpmV8,
    /// pnpm 9 and 10 with lockfile schema 9.x.
    PnpmV9,
}

impl EncodingScheme {
    /// Strategy table mapping a recognized (pnpm major, lockfile schema)
    /// pair to its encoder. Unrecognized combinations return `None` and
    /// must be reported by the caller, never guessed at.
    pub fn select(pnpm_major: u64, lockfile_version: &str) -> Option<Self> {
        match pnpm_major {
            8 if lockfile_version.starts_with("6.") => Some(EncodingScheme::PnpmV8),
            9 | 10 if lockfile_version.starts_with("9.") => Some(EncodingScheme::PnpmV9),
            _ => None,
        }
    }

    /// Encode a version qualifier into the store folder name.
    pub fn encode_qualifier(self, qualifier: &str) -> String {
        match self {
            EncodingScheme::PnpmV8 => encode_v8(qualifier),
            EncodingScheme::PnpmV9 => encode_v9(qualifier),
        }
    }

    /// Absolute install location of `(qualifier, name)` inside the store.
    pub fn store_install_path(
        self,
        store_path: &Path,
        qualifier: &str,
        dependency_name: &str,
    ) -> PathBuf {
        store_path
            .join(self.encode_qualifier(qualifier))
            .join("node_modules")
            .join(dependency_name)
    }
}

/// Infer the pnpm major version that wrote a lockfile when the caller did
/// not supply one explicitly.
pub fn infer_pnpm_major(lockfile_version: &str) -> Option<u64> {
    if lockfile_version.starts_with("6.") {
        Some(8)
    } else if lockfile_version.starts_with("9.") {
        Some(9)
    } else {
        None
    }
}

// pnpm 8: `file:../../libraries/lib1(react@16.0.0)`
//      -> `file+..+..+libraries+lib1_react@16.0.0`
fn encode_v8(qualifier: &str) -> String {
    qualifier
        .chars()
        .filter_map(|c| match c {
            ':' | '/' => Some('+'),
            '(' => Some('_'),
            ')' => None,
            c => Some(c),
        })
        .collect()
}

// pnpm 9/10 `depPathToFilename`: illegal filename characters become `+`,
// peer parentheses collapse to `_` with a single trailing `_` trimmed, and
// names that are too long (or mixed-case outside `file+`) are truncated
// with a digest suffix so the result stays one stable path component.
fn encode_v9(qualifier: &str) -> String {
    let mut name: String = qualifier
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '+',
            c => c,
        })
        .collect();

    if name.contains('(') {
        name = name.replace(")(", "_").replace('(', "_").replace(')', "_");
        if name.ends_with('_') {
            name.pop();
        }
    }

    let mixed_case = name.chars().any(|c| c.is_ascii_uppercase());
    if name.len() > MAX_FOLDER_NAME_LENGTH || (mixed_case && !name.starts_with("file+")) {
        let digest = blake3::hash(name.as_bytes()).to_hex();
        let keep = MAX_FOLDER_NAME_LENGTH - DIGEST_SUFFIX_LENGTH;
        let prefix: String = name.chars().take(keep).collect();
        return format!("{}_{}", prefix, &digest.as_str()[..DIGEST_SUFFIX_LENGTH - 1]);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_protocol_detection() {
        assert!(is_file_protocol("file:../lib1"));
        assert!(!is_file_protocol("17.0.2"));
        assert!(!is_file_protocol("link:../lib1"));
    }

    #[test]
    fn test_tarball_reference_detection() {
        assert!(is_tarball_reference("file:../dist/lib1.tgz"));
        assert!(is_tarball_reference("file:../dist/lib1.tar.gz"));
        assert!(is_tarball_reference("file:../dist/lib1.tar"));
        assert!(!is_tarball_reference("file:../lib1"));
        // The peer suffix is not part of the file path.
        assert!(!is_tarball_reference("file:../lib1(tarball@1.0.0)"));
    }

    #[test]
    fn test_file_protocol_path_strips_peers() {
        assert_eq!(
            file_protocol_path("file:../../libraries/lib1(react@16.0.0)"),
            "../../libraries/lib1"
        );
        assert_eq!(file_protocol_path("file:../lib1"), "../lib1");
    }

    #[test]
    fn test_v8_encoding() {
        let scheme = EncodingScheme::PnpmV8;
        assert_eq!(
            scheme.encode_qualifier("file:../../libraries/lib1(react@16.0.0)"),
            "file+..+..+libraries+lib1_react@16.0.0"
        );
        assert_eq!(scheme.encode_qualifier("file:../lib1"), "file+..+lib1");
    }

    #[test]
    fn test_v9_encoding_matches_v8_for_simple_qualifiers() {
        let qualifier = "file:tests/test-fixtures/sample-lib1(react@17.0.2)";
        assert_eq!(
            EncodingScheme::PnpmV9.encode_qualifier(qualifier),
            "file+tests+test-fixtures+sample-lib1_react@17.0.2"
        );
        assert_eq!(
            EncodingScheme::PnpmV9.encode_qualifier(qualifier),
            EncodingScheme::PnpmV8.encode_qualifier(qualifier)
        );
    }

    #[test]
    fn test_v9_encoding_multiple_peer_groups() {
        assert_eq!(
            EncodingScheme::PnpmV9.encode_qualifier("file:../lib1(react@17.0.2)(redux@4.0.0)"),
            "file+..+lib1_react@17.0.2_redux@4.0.0"
        );
    }

    #[test]
    fn test_v9_encoding_truncates_long_names() {
        let qualifier = format!("file:../{}(react@17.0.2)", "a".repeat(150));
        let encoded = EncodingScheme::PnpmV9.encode_qualifier(&qualifier);
        assert_eq!(encoded.len(), 120);
        assert!(encoded.starts_with("file+..+aaaa"));
        assert!(encoded.contains('_'));
    }

    #[test]
    fn test_scheme_selection_table() {
        assert_eq!(
            EncodingScheme::select(8, "6.0"),
            Some(EncodingScheme::PnpmV8)
        );
        assert_eq!(
            EncodingScheme::select(9, "9.0"),
            Some(EncodingScheme::PnpmV9)
        );
        assert_eq!(
            EncodingScheme::select(10, "9.0"),
            Some(EncodingScheme::PnpmV9)
        );
        // Mismatched or unknown combinations are rejected, not guessed.
        assert_eq!(EncodingScheme::select(8, "9.0"), None);
        assert_eq!(EncodingScheme::select(7, "6.0"), None);
        assert_eq!(EncodingScheme::select(9, "5.4"), None);
    }

    #[test]
    fn test_infer_pnpm_major() {
        assert_eq!(infer_pnpm_major("6.0"), Some(8));
        assert_eq!(infer_pnpm_major("6.1"), Some(8));
        assert_eq!(infer_pnpm_major("9.0"), Some(9));
        assert_eq!(infer_pnpm_major("5.4"), None);
    }

    #[test]
    fn test_store_install_path() {
        let path = EncodingScheme::PnpmV8.store_install_path(
            Path::new("/ws/node_modules/.pnpm"),
            "file:packages/lib1(react@17.0.2)",
            "lib1",
        );
        assert_eq!(
            path,
            Path::new(
                "/ws/node_modules/.pnpm/file+packages+lib1_react@17.0.2/node_modules/lib1"
            )
        );
    }
}
