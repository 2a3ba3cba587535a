//! Source bundle and module file errors.

use std::path::PathBuf;

use stackeval_foundation::{
    AddressError, LocalSource, RegistryPackage, RemotePackage, Version, VersionError,
};
use thiserror::Error;

/// Result type for source bundle operations.
pub type BundleResult<T> = Result<T, BundleError>;

/// Errors that can occur opening or querying a source bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    /// Failed to read the bundle manifest.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid JSON for the expected schema.
    #[error("invalid source bundle manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("unsupported source bundle format version {0}; only version 1 is supported")]
    UnsupportedFormat(u32),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Version(#[from] VersionError),

    /// A manifest entry points outside the bundle directory.
    #[error("package directory {0:?} must be a relative path within the bundle")]
    UnsafeLocalDir(String),

    #[error("source bundle does not include remote package {0}")]
    PackageNotInBundle(RemotePackage),

    #[error("source bundle does not include registry package {0}")]
    RegistryPackageNotInBundle(RegistryPackage),

    #[error("no available version of {package} matches {allowed}")]
    NoMatchingVersion {
        package: RegistryPackage,
        allowed: String,
    },

    #[error("source bundle does not include {package} version {version}")]
    RegistryVersionNotInBundle {
        package: RegistryPackage,
        version: Version,
    },

    #[error("local source {0} must be resolved relative to its caller before lookup")]
    LocalSourceNotFinal(LocalSource),
}

/// Errors that prevent a module file from being read at all.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid module file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
