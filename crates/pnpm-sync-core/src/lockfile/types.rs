//! Lockfile types for the resolved dependency graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

/// Immutable snapshot of a `pnpm-lock.yaml` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    /// Lockfile schema version, e.g. `"6.0"` or `"9.0"`. Older lockfiles
    /// store this as a YAML number; both spellings are accepted.
    #[serde(default, deserialize_with = "version_as_string")]
    pub lockfile_version: String,

    /// Workspace projects, keyed by their folder relative to the lockfile.
    #[serde(default)]
    pub importers: BTreeMap<String, Importer>,

    /// Resolved packages, keyed by version qualifier.
    #[serde(default)]
    pub packages: BTreeMap<String, PackageEntry>,

    /// Schema 9.x moves dependency edges out of `packages` into per-peer
    /// `snapshots` entries keyed by the full qualifier.
    #[serde(default)]
    pub snapshots: BTreeMap<String, PackageEntry>,
}

impl Lockfile {
    /// Look up the dependency edges recorded for a version qualifier.
    ///
    /// Checks `snapshots` first (schema 9.x), then `packages` (schema 6.x).
    pub fn resolution_entry(&self, qualifier: &str) -> Option<&PackageEntry> {
        self.snapshots
            .get(qualifier)
            .or_else(|| self.packages.get(qualifier))
    }
}

/// One workspace project's dependency declarations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Importer {
    #[serde(default)]
    pub dependencies: BTreeMap<String, VersionSpecifier>,

    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, VersionSpecifier>,

    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, VersionSpecifier>,

    /// Per-dependency metadata; `injected: true` marks a workspace link
    /// that pnpm materializes by hard-linking instead of symlinking.
    #[serde(default)]
    pub dependencies_meta: BTreeMap<String, DependencyMeta>,
}

impl Importer {
    /// The three dependency maps injected dependencies may appear in.
    pub fn dependency_maps(&self) -> [&BTreeMap<String, VersionSpecifier>; 3] {
        [
            &self.dependencies,
            &self.dev_dependencies,
            &self.optional_dependencies,
        ]
    }

    pub fn is_meta_injected(&self, name: &str) -> bool {
        self.dependencies_meta
            .get(name)
            .is_some_and(|meta| meta.injected)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DependencyMeta {
    #[serde(default)]
    pub injected: bool,
}

/// A dependency specifier as recorded in an importer.
///
/// Schema 6.x+ records `{ specifier, version }` pairs; older schemas record
/// the resolved version string directly. Both reduce to one version string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VersionSpecifier {
    Version(String),
    Resolved {
        #[serde(default)]
        specifier: Option<String>,
        version: String,
    },
}

impl VersionSpecifier {
    pub fn resolved_version(&self) -> &str {
        match self {
            VersionSpecifier::Version(version) => version,
            VersionSpecifier::Resolved { version, .. } => version,
        }
    }
}

/// A resolved package's dependency edges, used only for the transitive walk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageEntry {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, String>,
}

impl PackageEntry {
    /// All outgoing edges: dependencies then optionalDependencies.
    pub fn edges(&self) -> impl Iterator<Item = (&String, &String)> {
        self.dependencies
            .iter()
            .chain(self.optional_dependencies.iter())
    }
}

fn version_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(f64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(text) => Ok(text),
        // An unquoted `6.0` parses as a whole number; keep the `.0` so the
        // schema prefix stays recognizable.
        Raw::Number(number) if number.fract() == 0.0 => Ok(format!("{number:.1}")),
        Raw::Number(number) => Ok(format!("{number}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_specifier_reduces_to_version() {
        let bare = VersionSpecifier::Version("file:../lib1".to_string());
        assert_eq!(bare.resolved_version(), "file:../lib1");

        let structured = VersionSpecifier::Resolved {
            specifier: Some("workspace:*".to_string()),
            version: "file:../lib1(react@17.0.2)".to_string(),
        };
        assert_eq!(structured.resolved_version(), "file:../lib1(react@17.0.2)");
    }

    #[test]
    fn test_lockfile_version_accepts_number_and_string() {
        let numeric: Lockfile = serde_yaml::from_str("lockfileVersion: 5.4").expect("parse");
        assert_eq!(numeric.lockfile_version, "5.4");

        let text: Lockfile = serde_yaml::from_str("lockfileVersion: '6.0'").expect("parse");
        assert_eq!(text.lockfile_version, "6.0");

        let unquoted: Lockfile = serde_yaml::from_str("lockfileVersion: 6.0").expect("parse");
        assert_eq!(unquoted.lockfile_version, "6.0");
    }

    #[test]
    fn test_resolution_entry_prefers_snapshots() {
        let yaml = r#"
lockfileVersion: '9.0'
packages:
  'file:../lib1':
    dependencies: {}
snapshots:
  'file:../lib1(react@17.0.2)':
    dependencies:
      react: 17.0.2
"#;
        let lockfile: Lockfile = serde_yaml::from_str(yaml).expect("parse");
        let entry = lockfile
            .resolution_entry("file:../lib1(react@17.0.2)")
            .expect("snapshot entry should resolve");
        assert_eq!(entry.dependencies.get("react").map(String::as_str), Some("17.0.2"));
        assert!(lockfile.resolution_entry("file:../lib1").is_some());
    }

    #[test]
    fn test_importer_meta_injected() {
        let yaml = r#"
dependencies:
  lib1:
    specifier: workspace:*
    version: file:../lib1
dependenciesMeta:
  lib1:
    injected: true
"#;
        let importer: Importer = serde_yaml::from_str(yaml).expect("parse");
        assert!(importer.is_meta_injected("lib1"));
        assert!(!importer.is_meta_injected("lib2"));
    }
}
