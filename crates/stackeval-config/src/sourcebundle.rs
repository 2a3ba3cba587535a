//! Frozen, content-addressed source bundles.
//!
//! A source bundle is a directory prepared before evaluation starts. It
//! contains one subdirectory per remote package plus a manifest describing
//! which package lives where and which registry package versions map to
//! which remote package. Evaluation only ever reads from it.
//!
//! # Manifest
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "packages": [
//!     { "source": "git::https://example.com/net.git?ref=v1.2.0", "local": "net-1.2.0" }
//!   ],
//!   "registry": [
//!     {
//!       "source": "example-corp/network/aws",
//!       "versions": {
//!         "1.2.0": { "source": "git::https://example.com/net.git?ref=v1.2.0" }
//!       }
//!     }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use stackeval_foundation::{
    parse_version, FinalSource, ModuleSource, RegistryPackage, RemotePackage, Version, VersionSet,
};
use tracing::debug;

use crate::error::{BundleError, BundleResult};

/// File name of the manifest at the bundle root.
pub const MANIFEST_FILENAME: &str = "bundle-manifest.json";

/// On-disk manifest schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleManifest {
    #[serde(default = "default_format_version")]
    pub format_version: u32,

    /// Remote packages and the bundle subdirectory holding each one.
    #[serde(default)]
    pub packages: Vec<ManifestPackage>,

    /// Registry packages and the remote package behind each version.
    #[serde(default)]
    pub registry: Vec<ManifestRegistryPackage>,
}

fn default_format_version() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPackage {
    pub source: String,
    pub local: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRegistryPackage {
    pub source: String,
    #[serde(default)]
    pub versions: IndexMap<String, ManifestRegistryVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRegistryVersion {
    pub source: String,
}

/// A read-only source bundle.
#[derive(Debug, Clone)]
pub struct SourceBundle {
    root: PathBuf,
    packages: IndexMap<RemotePackage, PathBuf>,
    registry: IndexMap<RegistryPackage, BTreeMap<Version, RemotePackage>>,
}

impl SourceBundle {
    /// Opens the bundle rooted at `root`, reading its manifest.
    pub fn open(root: impl AsRef<Path>) -> BundleResult<Self> {
        let root = root.as_ref();
        let manifest_path = root.join(MANIFEST_FILENAME);
        let content = std::fs::read_to_string(&manifest_path).map_err(|source| BundleError::Io {
            path: manifest_path.clone(),
            source,
        })?;
        let manifest: BundleManifest = serde_json::from_str(&content)?;
        Self::from_manifest(root, manifest)
    }

    /// Builds a bundle from an already-decoded manifest.
    ///
    /// Every address and local directory is validated here, so later
    /// lookups can only fail because something is absent.
    pub fn from_manifest(root: impl Into<PathBuf>, manifest: BundleManifest) -> BundleResult<Self> {
        if manifest.format_version != 1 {
            return Err(BundleError::UnsupportedFormat(manifest.format_version));
        }

        let mut packages = IndexMap::new();
        for pkg in manifest.packages {
            let addr = RemotePackage::parse(&pkg.source)?;
            if !is_safe_relative(&pkg.local) {
                return Err(BundleError::UnsafeLocalDir(pkg.local));
            }
            packages.insert(addr, PathBuf::from(pkg.local));
        }

        let mut registry = IndexMap::new();
        for reg in manifest.registry {
            let addr = RegistryPackage::parse(&reg.source)?;
            let mut versions = BTreeMap::new();
            for (version, meta) in reg.versions {
                versions.insert(parse_version(&version)?, RemotePackage::parse(&meta.source)?);
            }
            registry.insert(addr, versions);
        }

        Ok(Self {
            root: root.into(),
            packages,
            registry,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the published versions of a registry package available in
    /// this bundle, in ascending order. Unknown packages have no versions.
    pub fn registry_package_versions(&self, package: &RegistryPackage) -> BTreeSet<Version> {
        self.registry
            .get(package)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolves a source address to its final form.
    ///
    /// Local and remote addresses are already final. For registry addresses
    /// this selects the newest version in the bundle that is also in
    /// `allowed`, which reproduces the decision made when the bundle was
    /// built.
    pub fn final_source_for(
        &self,
        source: &ModuleSource,
        allowed: &VersionSet,
    ) -> BundleResult<FinalSource> {
        match source {
            ModuleSource::Local(local) => Ok(FinalSource::Local(local.clone())),
            ModuleSource::Remote(remote) => Ok(FinalSource::Remote(remote.clone())),
            ModuleSource::Registry(reg) => {
                if !self.registry.contains_key(reg.package()) {
                    return Err(BundleError::RegistryPackageNotInBundle(reg.package().clone()));
                }
                let available = self.registry_package_versions(reg.package());
                let selected = allowed
                    .newest_in(&available)
                    .ok_or_else(|| BundleError::NoMatchingVersion {
                        package: reg.package().clone(),
                        allowed: allowed.to_string(),
                    })?;
                debug!(
                    package = %reg.package(),
                    %allowed,
                    version = %selected,
                    "selected registry package version"
                );
                Ok(FinalSource::Registry(reg.versioned(selected.clone())))
            }
        }
    }

    /// Returns the directory holding the module at a final source address.
    ///
    /// Failure means the bundle was built from a different resolution
    /// decision than the one just made.
    pub fn local_path_for_source(&self, source: &FinalSource) -> BundleResult<PathBuf> {
        match source {
            FinalSource::Local(local) => Err(BundleError::LocalSourceNotFinal(local.clone())),
            FinalSource::Remote(remote) => {
                let dir = self.package_dir(remote.package())?;
                Ok(join_subpath(dir, remote.subpath()))
            }
            FinalSource::Registry(reg) => {
                let package = reg.source().package();
                let versions = self
                    .registry
                    .get(package)
                    .ok_or_else(|| BundleError::RegistryPackageNotInBundle(package.clone()))?;
                let remote = versions.get(reg.version()).ok_or_else(|| {
                    BundleError::RegistryVersionNotInBundle {
                        package: package.clone(),
                        version: reg.version().clone(),
                    }
                })?;
                let dir = self.package_dir(remote)?;
                Ok(join_subpath(dir, reg.source().subpath()))
            }
        }
    }

    fn package_dir(&self, package: &RemotePackage) -> BundleResult<PathBuf> {
        self.packages
            .get(package)
            .map(|local| self.root.join(local))
            .ok_or_else(|| BundleError::PackageNotInBundle(package.clone()))
    }
}

fn join_subpath(dir: PathBuf, subpath: &str) -> PathBuf {
    if subpath.is_empty() {
        dir
    } else {
        dir.join(subpath)
    }
}

fn is_safe_relative(local: &str) -> bool {
    let path = Path::new(local);
    !local.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
