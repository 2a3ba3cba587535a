//! Errors raised while parsing addresses and version constraints.

use thiserror::Error;

/// Failures parsing or combining source and provider addresses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid module source address {addr:?}: {reason}")]
    InvalidModuleSource { addr: String, reason: String },

    #[error("invalid provider source address {addr:?}: {reason}")]
    InvalidProviderSource { addr: String, reason: String },

    #[error("invalid provider configuration reference {addr:?}: {reason}")]
    InvalidProviderConfig { addr: String, reason: String },

    #[error("relative path {path:?} escapes the root of package {package}")]
    EscapesPackage { path: String, package: String },
}

/// Failures translating version constraint strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid version constraint {constraint:?}: {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    #[error("invalid version {version:?}: {reason}")]
    InvalidVersion { version: String, reason: String },
}
