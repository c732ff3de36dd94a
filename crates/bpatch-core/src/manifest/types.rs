//! Manifest and bundle record types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// One bundle entry of a manifest.
///
/// `hash` is the content address (cache key and sandbox file name);
/// `version` only feeds remote URLs and never takes part in equality checks
/// against other manifests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRecord {
    name: String,
    hash: String,
    version: u32,
    size_bytes: u64,
    checksum: String,
    #[serde(default)]
    is_builtin: bool,
    #[serde(default)]
    tags: BTreeSet<String>,
}

impl BundleRecord {
    pub fn new(
        name: impl Into<String>,
        hash: impl Into<String>,
        version: u32,
        size_bytes: u64,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            hash: hash.into(),
            version,
            size_bytes,
            checksum: checksum.into(),
            is_builtin: false,
            tags: BTreeSet::new(),
        }
    }

    /// Mark the record as shipped inside the application package.
    pub fn builtin(mut self, is_builtin: bool) -> Self {
        self.is_builtin = is_builtin;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn is_builtin(&self) -> bool {
        self.is_builtin
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Builtin with no DLC tag: shared by every feature set, always included
    /// in tag-driven downloads.
    pub fn is_pure_builtin(&self) -> bool {
        self.is_builtin && self.tags.is_empty()
    }

    pub fn has_any_tag(&self, wanted: &[String]) -> bool {
        wanted.iter().any(|t| self.tags.contains(t))
    }
}

/// Validation failures while building or decoding a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("duplicate bundle name: {0}")]
    DuplicateBundle(String),
    #[error("asset {asset} maps to unknown bundle {bundle}")]
    UnknownAssetBundle { asset: String, bundle: String },
    #[error("bundle {bundle} depends on unknown bundle {dependency}")]
    UnknownDependency { bundle: String, dependency: String },
    #[error("dependency entry for unknown bundle {0}")]
    UnknownDependencyOwner(String),
    #[error("dependency cycle through bundle {0}")]
    Cycle(String),
}

/// Serialized layout; also the input shape of [`ManifestBuilder`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestWire {
    pub resource_version: u32,
    pub bundles: Vec<BundleRecord>,
    #[serde(default)]
    pub asset_to_bundle: BTreeMap<String, String>,
    #[serde(default)]
    pub bundle_dependencies: BTreeMap<String, Vec<String>>,
}

/// Immutable manifest snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ManifestWire", into = "ManifestWire")]
pub struct Manifest {
    resource_version: u32,
    bundles: Vec<BundleRecord>,
    asset_to_bundle: BTreeMap<String, String>,
    bundle_dependencies: BTreeMap<String, Vec<String>>,
    by_name: HashMap<String, usize>,
}

impl Manifest {
    pub fn builder(resource_version: u32) -> ManifestBuilder {
        ManifestBuilder {
            wire: ManifestWire {
                resource_version,
                ..ManifestWire::default()
            },
        }
    }

    /// An empty manifest at version 0.
    pub fn empty() -> Self {
        Self {
            resource_version: 0,
            bundles: Vec::new(),
            asset_to_bundle: BTreeMap::new(),
            bundle_dependencies: BTreeMap::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn resource_version(&self) -> u32 {
        self.resource_version
    }

    /// Bundles in declaration order.
    pub fn bundles(&self) -> &[BundleRecord] {
        &self.bundles
    }

    pub fn bundle(&self, name: &str) -> Option<&BundleRecord> {
        self.by_name.get(name).map(|&i| &self.bundles[i])
    }

    pub fn bundle_name_for_asset(&self, asset_path: &str) -> Option<&str> {
        self.asset_to_bundle.get(asset_path).map(String::as_str)
    }

    /// Direct dependencies of a bundle, in declared order.
    pub fn dependencies(&self, bundle_name: &str) -> &[String] {
        self.bundle_dependencies
            .get(bundle_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Appends `root` and every bundle reachable from it to `out` (pre-order,
    /// declared dependency order), skipping names already in `visited`.
    /// Sharing `visited` across calls deduplicates diamonds and repeated roots.
    pub fn collect_closure(&self, root: &str, visited: &mut HashSet<String>, out: &mut Vec<String>) {
        let mut stack = vec![root.to_string()];
        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            // Reverse so the first declared dependency is visited first.
            for dep in self.dependencies(&name).iter().rev() {
                if !visited.contains(dep) {
                    stack.push(dep.clone());
                }
            }
            out.push(name);
        }
    }

    /// Every bundle the asset's bundle depends on, transitively, excluding the
    /// asset's own bundle. Empty if the asset is unknown.
    pub fn all_dependencies(&self, asset_path: &str) -> Vec<String> {
        let Some(main) = self.bundle_name_for_asset(asset_path) else {
            return Vec::new();
        };
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.collect_closure(main, &mut visited, &mut out);
        out.retain(|n| n != main);
        out
    }

    /// Sorted union of every tag used in the manifest.
    pub fn builtin_tags(&self) -> Vec<String> {
        let tags: BTreeSet<&String> = self.bundles.iter().flat_map(|b| b.tags.iter()).collect();
        tags.into_iter().cloned().collect()
    }

    /// Total size of all bundles in bytes.
    pub fn total_size(&self) -> u64 {
        self.bundles.iter().map(|b| b.size_bytes).sum()
    }
}

impl From<Manifest> for ManifestWire {
    fn from(m: Manifest) -> Self {
        ManifestWire {
            resource_version: m.resource_version,
            bundles: m.bundles,
            asset_to_bundle: m.asset_to_bundle,
            bundle_dependencies: m.bundle_dependencies,
        }
    }
}

impl TryFrom<ManifestWire> for Manifest {
    type Error = ManifestError;

    fn try_from(wire: ManifestWire) -> Result<Self, Self::Error> {
        let mut by_name = HashMap::with_capacity(wire.bundles.len());
        for (i, b) in wire.bundles.iter().enumerate() {
            if by_name.insert(b.name.clone(), i).is_some() {
                return Err(ManifestError::DuplicateBundle(b.name.clone()));
            }
        }
        for (asset, bundle) in &wire.asset_to_bundle {
            if !by_name.contains_key(bundle) {
                return Err(ManifestError::UnknownAssetBundle {
                    asset: asset.clone(),
                    bundle: bundle.clone(),
                });
            }
        }
        for (owner, deps) in &wire.bundle_dependencies {
            if !by_name.contains_key(owner) {
                return Err(ManifestError::UnknownDependencyOwner(owner.clone()));
            }
            if let Some(dep) = deps.iter().find(|d| !by_name.contains_key(*d)) {
                return Err(ManifestError::UnknownDependency {
                    bundle: owner.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        check_acyclic(&wire.bundle_dependencies)?;

        Ok(Manifest {
            resource_version: wire.resource_version,
            bundles: wire.bundles,
            asset_to_bundle: wire.asset_to_bundle,
            bundle_dependencies: wire.bundle_dependencies,
            by_name,
        })
    }
}

/// Iterative three-colour DFS; diamonds are fine, back edges are not.
fn check_acyclic(deps: &BTreeMap<String, Vec<String>>) -> Result<(), ManifestError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Active,
        Done,
    }
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    for start in deps.keys() {
        if marks.contains_key(start.as_str()) {
            continue;
        }
        // (node, index of next child to visit)
        let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
        marks.insert(start.as_str(), Mark::Active);
        while let Some((node, next)) = stack.last_mut() {
            let children = deps.get(*node).map(Vec::as_slice).unwrap_or(&[]);
            if *next >= children.len() {
                marks.insert(*node, Mark::Done);
                stack.pop();
                continue;
            }
            let child = children[*next].as_str();
            *next += 1;
            match marks.get(child) {
                Some(Mark::Active) => return Err(ManifestError::Cycle(child.to_string())),
                Some(Mark::Done) => {}
                None => {
                    marks.insert(child, Mark::Active);
                    stack.push((child, 0));
                }
            }
        }
    }
    Ok(())
}

/// Collects records and indexes, then validates them into a [`Manifest`].
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    wire: ManifestWire,
}

impl ManifestBuilder {
    pub fn bundle(mut self, record: BundleRecord) -> Self {
        self.wire.bundles.push(record);
        self
    }

    pub fn asset(mut self, asset_path: impl Into<String>, bundle_name: impl Into<String>) -> Self {
        self.wire
            .asset_to_bundle
            .insert(asset_path.into(), bundle_name.into());
        self
    }

    pub fn dependencies<I, S>(mut self, bundle_name: impl Into<String>, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wire
            .bundle_dependencies
            .insert(bundle_name.into(), deps.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Result<Manifest, ManifestError> {
        Manifest::try_from(self.wire)
    }
}
