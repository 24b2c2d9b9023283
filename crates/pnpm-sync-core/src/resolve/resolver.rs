//! Transitive resolution of injected dependencies.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::fs::paths::lexical_normalize;
use crate::lockfile::Lockfile;
use crate::resolve::store_path::{
    EncodingScheme, file_protocol_path, is_file_protocol, is_tarball_reference,
};

/// Absolute source package folder -> absolute store install folders that
/// must mirror it.
pub type SourceToTargets = BTreeMap<PathBuf, BTreeSet<PathBuf>>;

/// Inputs for path derivation.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    /// Folder containing the lockfile; `file:` paths resolve against it.
    pub lockfile_folder: &'a Path,
    /// The store folder (conventionally `node_modules/.pnpm`).
    pub store_path: &'a Path,
    pub scheme: EncodingScheme,
}

/// Find every package consumed as an injected dependency, directly or
/// transitively, and derive its (source, targets) locations.
pub fn resolve_injected_dependencies(
    lockfile: &Lockfile,
    context: &ResolveContext<'_>,
) -> anyhow::Result<SourceToTargets> {
    let injected = collect_injected_set(lockfile)?;

    let mut source_to_targets = SourceToTargets::new();
    for (name, qualifiers) in &injected {
        for qualifier in qualifiers {
            let source_folder =
                lexical_normalize(&context.lockfile_folder.join(file_protocol_path(qualifier)));
            let target =
                context
                    .scheme
                    .store_install_path(context.store_path, qualifier, name);
            source_to_targets
                .entry(source_folder)
                .or_default()
                .insert(target);
        }
    }
    Ok(source_to_targets)
}

/// Dependency name -> set of version qualifiers it is injected under.
///
/// Seeded from every importer's dependency maps, then expanded to the
/// transitive closure over `file:` edges in the package table. The visited
/// set and the worklist are separate structures: a qualifier is enqueued
/// only when its (name, qualifier) pair inserts as new, which bounds the
/// walk on cyclic graphs.
fn collect_injected_set(lockfile: &Lockfile) -> anyhow::Result<BTreeMap<String, BTreeSet<String>>> {
    let mut injected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut worklist: VecDeque<String> = VecDeque::new();

    for importer in lockfile.importers.values() {
        for dependency_map in importer.dependency_maps() {
            for (name, specifier) in dependency_map {
                let version = specifier.resolved_version();
                if !is_file_protocol(version) {
                    continue;
                }
                // Tarball file references are installed by unpacking, not
                // by injection; dependenciesMeta can still opt one in.
                if is_tarball_reference(version) && !importer.is_meta_injected(name) {
                    continue;
                }
                if injected
                    .entry(name.clone())
                    .or_default()
                    .insert(version.to_string())
                {
                    worklist.push_back(version.to_string());
                }
            }
        }
    }

    while let Some(qualifier) = worklist.pop_front() {
        let entry = lockfile.resolution_entry(&qualifier).ok_or_else(|| {
            anyhow::anyhow!(
                "pnpm-lock.yaml is inconsistent: no package entry for '{qualifier}'"
            )
        })?;
        for (name, version) in entry.edges() {
            if !is_file_protocol(version) {
                continue;
            }
            if injected
                .entry(name.clone())
                .or_default()
                .insert(version.clone())
            {
                worklist.push_back(version.clone());
            }
        }
    }

    Ok(injected)
}
