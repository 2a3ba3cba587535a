//! Module source addresses.
//!
//! A [`ModuleSource`] is what a configuration author writes: a local path,
//! a remote package URL, or a registry package identifier. A
//! [`FinalSource`] is the same address with any version ambiguity removed,
//! which is the only form the source bundle can map to a directory.
//!
//! # Address forms
//!
//! ```text
//! ./network                                   local (relative to the caller)
//! git::https://example.com/net.git//vpc?ref=v1 remote package + sub-path
//! example-corp/network/aws//modules/vpc       registry package + sub-path
//! ```

use crate::error::AddressError;
use semver::Version;
use std::fmt;

/// Hostname assumed for registry addresses with three segments.
pub const DEFAULT_REGISTRY_HOST: &str = "registry.terraform.io";

/// A module source address as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleSource {
    Local(LocalSource),
    Remote(RemoteSource),
    Registry(RegistrySource),
}

/// A module source with version ambiguity resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FinalSource {
    Local(LocalSource),
    Remote(RemoteSource),
    Registry(RegistrySourceFinal),
}

/// A path relative to the calling module's own source location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalSource {
    path: String,
}

/// An exact remote package, such as a git repository URL.
///
/// Any query string (for example `?ref=v1.0.0`) is part of the package
/// identity, since it selects what gets fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemotePackage(String);

/// A directory within a remote package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteSource {
    package: RemotePackage,
    subpath: String,
}

/// A module registry package identifier: `host/namespace/name/system`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryPackage {
    pub host: String,
    pub namespace: String,
    pub name: String,
    pub target_system: String,
}

/// A directory within a registry package, at a not-yet-selected version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrySource {
    package: RegistryPackage,
    subpath: String,
}

/// A registry source at one selected version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrySourceFinal {
    source: RegistrySource,
    version: Version,
}

impl ModuleSource {
    /// Parses a module source address string.
    ///
    /// Strings starting with `./` or `../` are local; strings containing a
    /// forced getter (`git::`) or a URL scheme are remote; anything else must
    /// be a registry address with three or four segments.
    pub fn parse(addr: &str) -> Result<Self, AddressError> {
        let invalid = |reason: &str| AddressError::InvalidModuleSource {
            addr: addr.to_string(),
            reason: reason.to_string(),
        };

        if addr.is_empty() {
            return Err(invalid("source address must not be empty"));
        }
        if addr.starts_with("./") || addr.starts_with("../") {
            return Ok(ModuleSource::Local(LocalSource::parse(addr)));
        }
        if addr.starts_with('/') {
            return Err(invalid(
                "absolute filesystem paths are not allowed; use a relative path starting with \"./\" or \"../\"",
            ));
        }
        if addr.contains("::") || addr.contains("://") {
            return Ok(ModuleSource::Remote(RemoteSource::parse(addr)?));
        }
        Ok(ModuleSource::Registry(RegistrySource::parse(addr)?))
    }

    /// Returns the final form of this address if it needs no version
    /// selection, which is every form except a registry source.
    pub fn as_final(&self) -> Option<FinalSource> {
        match self {
            ModuleSource::Local(local) => Some(FinalSource::Local(local.clone())),
            ModuleSource::Remote(remote) => Some(FinalSource::Remote(remote.clone())),
            ModuleSource::Registry(_) => None,
        }
    }
}

impl FinalSource {
    /// Resolves a local address relative to this one.
    ///
    /// The result stays within the same package as `self`; a relative path
    /// that would climb above the package root is rejected.
    pub fn resolve_relative(&self, local: &LocalSource) -> Result<FinalSource, AddressError> {
        match self {
            FinalSource::Local(base) => Ok(FinalSource::Local(LocalSource {
                path: join_local(&base.path, &local.path),
            })),
            FinalSource::Remote(base) => {
                let subpath = join_subpath(&base.subpath, &local.path).ok_or_else(|| {
                    AddressError::EscapesPackage {
                        path: local.path.clone(),
                        package: base.package.to_string(),
                    }
                })?;
                Ok(FinalSource::Remote(RemoteSource {
                    package: base.package.clone(),
                    subpath,
                }))
            }
            FinalSource::Registry(base) => {
                let subpath = join_subpath(&base.source.subpath, &local.path).ok_or_else(|| {
                    AddressError::EscapesPackage {
                        path: local.path.clone(),
                        package: base.source.package.to_string(),
                    }
                })?;
                Ok(FinalSource::Registry(RegistrySourceFinal {
                    source: RegistrySource {
                        package: base.source.package.clone(),
                        subpath,
                    },
                    version: base.version.clone(),
                }))
            }
        }
    }

    /// The selected version, for registry sources.
    pub fn selected_version(&self) -> Option<&Version> {
        match self {
            FinalSource::Registry(reg) => Some(&reg.version),
            _ => None,
        }
    }
}

impl LocalSource {
    fn parse(addr: &str) -> Self {
        let mut parts: Vec<&str> = Vec::new();
        let mut leading_parents = 0usize;
        for seg in addr.split('/') {
            match seg {
                "" | "." => {}
                ".." => {
                    if parts.pop().is_none() {
                        leading_parents += 1;
                    }
                }
                other => parts.push(other),
            }
        }

        let mut path = if leading_parents == 0 {
            String::from(".")
        } else {
            vec![".."; leading_parents].join("/")
        };
        for part in parts {
            path.push('/');
            path.push_str(part);
        }
        Self { path }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl RemotePackage {
    pub fn parse(url: &str) -> Result<Self, AddressError> {
        if !(url.contains("::") || url.contains("://")) {
            return Err(AddressError::InvalidModuleSource {
                addr: url.to_string(),
                reason: "remote package must be a URL".to_string(),
            });
        }
        Ok(Self(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RemoteSource {
    fn parse(addr: &str) -> Result<Self, AddressError> {
        let (base, query) = match addr.split_once('?') {
            Some((base, query)) => (base, Some(query)),
            None => (addr, None),
        };

        // The sub-path separator is the first "//" after the scheme's "://".
        let search_from = base.find("://").map_or(0, |i| i + 3);
        let (package_base, raw_subpath) = match base[search_from..].find("//") {
            Some(i) => (&base[..search_from + i], &base[search_from + i + 2..]),
            None => (base, ""),
        };

        let subpath = clean_subpath(raw_subpath).ok_or_else(|| AddressError::InvalidModuleSource {
            addr: addr.to_string(),
            reason: "sub-path must not escape the package root".to_string(),
        })?;
        let package = match query {
            Some(query) => format!("{package_base}?{query}"),
            None => package_base.to_string(),
        };

        Ok(Self {
            package: RemotePackage(package),
            subpath,
        })
    }

    pub fn new(package: RemotePackage, subpath: &str) -> Result<Self, AddressError> {
        let subpath = clean_subpath(subpath).ok_or_else(|| AddressError::EscapesPackage {
            path: subpath.to_string(),
            package: package.to_string(),
        })?;
        Ok(Self { package, subpath })
    }

    pub fn package(&self) -> &RemotePackage {
        &self.package
    }

    pub fn subpath(&self) -> &str {
        &self.subpath
    }
}

impl RegistryPackage {
    pub fn parse(addr: &str) -> Result<Self, AddressError> {
        let invalid = |reason: String| AddressError::InvalidModuleSource {
            addr: addr.to_string(),
            reason,
        };

        let segments: Vec<&str> = addr.split('/').collect();
        let (host, rest) = match segments.len() {
            3 => (DEFAULT_REGISTRY_HOST, &segments[..]),
            4 => (segments[0], &segments[1..]),
            n => {
                return Err(invalid(format!(
                    "registry addresses must have three or four segments, but this one has {n}"
                )))
            }
        };

        for seg in std::iter::once(&host).chain(rest.iter()) {
            if seg.is_empty() {
                return Err(invalid("address segments must not be empty".to_string()));
            }
            if !seg
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
            {
                return Err(invalid(format!("segment {seg:?} contains invalid characters")));
            }
        }

        Ok(Self {
            host: host.to_ascii_lowercase(),
            namespace: rest[0].to_string(),
            name: rest[1].to_string(),
            target_system: rest[2].to_string(),
        })
    }
}

impl RegistrySource {
    fn parse(addr: &str) -> Result<Self, AddressError> {
        let (package, raw_subpath) = match addr.split_once("//") {
            Some((package, subpath)) => (package, subpath),
            None => (addr, ""),
        };
        let subpath = clean_subpath(raw_subpath).ok_or_else(|| AddressError::InvalidModuleSource {
            addr: addr.to_string(),
            reason: "sub-path must not escape the package root".to_string(),
        })?;
        Ok(Self {
            package: RegistryPackage::parse(package)?,
            subpath,
        })
    }

    pub fn package(&self) -> &RegistryPackage {
        &self.package
    }

    pub fn subpath(&self) -> &str {
        &self.subpath
    }

    /// Pins this source to one version.
    pub fn versioned(&self, version: Version) -> RegistrySourceFinal {
        RegistrySourceFinal {
            source: self.clone(),
            version,
        }
    }
}

impl RegistrySourceFinal {
    pub fn source(&self) -> &RegistrySource {
        &self.source
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

/// Normalizes a package sub-path, returning `None` if it climbs above the
/// package root.
fn clean_subpath(raw: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for seg in raw.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

fn join_subpath(base: &str, relative: &str) -> Option<String> {
    if base.is_empty() {
        clean_subpath(relative)
    } else {
        clean_subpath(&format!("{base}/{relative}"))
    }
}

fn join_local(base: &str, relative: &str) -> String {
    LocalSource::parse(&format!("{base}/{relative}")).path
}

impl fmt::Display for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleSource::Local(s) => s.fmt(f),
            ModuleSource::Remote(s) => s.fmt(f),
            ModuleSource::Registry(s) => s.fmt(f),
        }
    }
}

impl fmt::Display for FinalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalSource::Local(s) => s.fmt(f),
            FinalSource::Remote(s) => s.fmt(f),
            FinalSource::Registry(s) => s.fmt(f),
        }
    }
}

impl fmt::Display for LocalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Display for RemotePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RemoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subpath.is_empty() {
            return self.package.fmt(f);
        }
        match self.package.0.split_once('?') {
            Some((base, query)) => write!(f, "{base}//{}?{query}", self.subpath),
            None => write!(f, "{}//{}", self.package.0, self.subpath),
        }
    }
}

impl fmt::Display for RegistryPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host != DEFAULT_REGISTRY_HOST {
            write!(f, "{}/", self.host)?;
        }
        write!(f, "{}/{}/{}", self.namespace, self.name, self.target_system)
    }
}

impl fmt::Display for RegistrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.package.fmt(f)?;
        if !self.subpath.is_empty() {
            write!(f, "//{}", self.subpath)?;
        }
        Ok(())
    }
}

impl fmt::Display for RegistrySourceFinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.source, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local_normalizes_path() {
        let src = ModuleSource::parse("./modules/../network/./vpc").unwrap();
        assert_eq!(src.to_string(), "./network/vpc");

        let src = ModuleSource::parse("../../shared").unwrap();
        assert_eq!(src.to_string(), "../../shared");
    }

    #[test]
    fn test_parse_remote_with_subpath_and_query() {
        let src = ModuleSource::parse("git::https://example.com/net.git//modules/vpc?ref=v1.2.0").unwrap();
        let ModuleSource::Remote(remote) = &src else {
            panic!("expected remote source, got {src:?}");
        };
        assert_eq!(remote.package().as_str(), "git::https://example.com/net.git?ref=v1.2.0");
        assert_eq!(remote.subpath(), "modules/vpc");
        assert_eq!(src.to_string(), "git::https://example.com/net.git//modules/vpc?ref=v1.2.0");
    }

    #[test]
    fn test_parse_registry_default_host() {
        let src = ModuleSource::parse("example-corp/network/aws//vpc").unwrap();
        let ModuleSource::Registry(reg) = &src else {
            panic!("expected registry source, got {src:?}");
        };
        assert_eq!(reg.package().host, DEFAULT_REGISTRY_HOST);
        assert_eq!(reg.package().namespace, "example-corp");
        assert_eq!(reg.subpath(), "vpc");
        assert_eq!(src.to_string(), "example-corp/network/aws//vpc");
        assert!(src.as_final().is_none());
    }

    #[test]
    fn test_parse_rejects_bad_addresses() {
        assert!(ModuleSource::parse("").is_err());
        assert!(ModuleSource::parse("/abs/path").is_err());
        assert!(ModuleSource::parse("just-a-name").is_err());
        assert!(ModuleSource::parse("a/b/c/d/e").is_err());
        assert!(ModuleSource::parse("git::https://example.com/x.git//../up").is_err());
    }

    #[test]
    fn test_resolve_relative_within_remote_package() {
        let base = ModuleSource::parse("git::https://example.com/net.git//modules/vpc")
            .unwrap()
            .as_final()
            .unwrap();
        let ModuleSource::Local(local) = ModuleSource::parse("../subnet").unwrap() else {
            unreachable!()
        };
        let resolved = base.resolve_relative(&local).unwrap();
        assert_eq!(resolved.to_string(), "git::https://example.com/net.git//modules/subnet");

        let ModuleSource::Local(escape) = ModuleSource::parse("../../../outside").unwrap() else {
            unreachable!()
        };
        assert!(matches!(
            base.resolve_relative(&escape),
            Err(AddressError::EscapesPackage { .. })
        ));
    }

    #[test]
    fn test_resolve_relative_keeps_registry_version() {
        let ModuleSource::Registry(reg) = ModuleSource::parse("example-corp/network/aws").unwrap() else {
            unreachable!()
        };
        let base = FinalSource::Registry(reg.versioned(Version::new(1, 2, 0)));
        let ModuleSource::Local(local) = ModuleSource::parse("./modules/vpc").unwrap() else {
            unreachable!()
        };
        let resolved = base.resolve_relative(&local).unwrap();
        assert_eq!(resolved.to_string(), "example-corp/network/aws//modules/vpc@1.2.0");
        assert_eq!(resolved.selected_version(), Some(&Version::new(1, 2, 0)));
    }
}
