// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Foundation types for stack component evaluation.
//!
//! This crate holds the value types shared by every other stage:
//! diagnostics, module source addresses, provider addresses and the
//! version-set vocabulary used for registry resolution.

pub mod diagnostics;
pub mod error;
pub mod providers;
pub mod sourceaddrs;
pub mod versions;

pub use diagnostics::{Diagnostic, Diagnostics, Severity, SourcePos, SourceRange, BUG_REPORT_SUFFIX};
pub use error::{AddressError, VersionError};
pub use providers::{LocalProviderConfig, ProviderAddr, ProviderConfigSlot};
pub use sourceaddrs::{
    FinalSource, LocalSource, ModuleSource, RegistryPackage, RegistrySource, RegistrySourceFinal,
    RemotePackage, RemoteSource,
};
pub use versions::{parse_version, version_set_for_constraints, VersionSet};

pub use semver::Version;
