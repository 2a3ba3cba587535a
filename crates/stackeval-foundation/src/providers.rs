//! Provider addresses and provider configuration slots.
//!
//! A provider is identified globally by a [`ProviderAddr`]. Inside a module,
//! configurations for a provider are referred to through a module-local name
//! ([`LocalProviderConfig`]); seen from the caller of a component, the same
//! configuration is a [`ProviderConfigSlot`] (provider type plus alias). The
//! local name never leaves the module it was declared in.

use crate::error::AddressError;
use std::fmt;

/// Hostname assumed for provider addresses that omit one.
pub const DEFAULT_PROVIDER_HOST: &str = "registry.terraform.io";

/// Namespace assumed for providers referenced only by their local name.
pub const DEFAULT_PROVIDER_NAMESPACE: &str = "hashicorp";

/// Fully-qualified provider type: `hostname/namespace/type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderAddr {
    pub hostname: String,
    pub namespace: String,
    pub type_name: String,
}

impl ProviderAddr {
    pub fn new(
        hostname: impl Into<String>,
        namespace: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            namespace: namespace.into(),
            type_name: type_name.into(),
        }
    }

    /// Parses `type`, `namespace/type` or `hostname/namespace/type`.
    pub fn parse(addr: &str) -> Result<Self, AddressError> {
        let invalid = |reason: String| AddressError::InvalidProviderSource {
            addr: addr.to_string(),
            reason,
        };

        let segments: Vec<&str> = addr.split('/').collect();
        for seg in &segments {
            if !is_valid_name(seg) {
                return Err(invalid(format!("{seg:?} is not a valid address segment")));
            }
        }

        let (hostname, namespace, type_name) = match segments.as_slice() {
            [type_name] => (DEFAULT_PROVIDER_HOST, DEFAULT_PROVIDER_NAMESPACE, *type_name),
            [namespace, type_name] => (DEFAULT_PROVIDER_HOST, *namespace, *type_name),
            [hostname, namespace, type_name] => (*hostname, *namespace, *type_name),
            _ => {
                return Err(invalid(format!(
                    "expected at most three segments, found {}",
                    segments.len()
                )))
            }
        };

        Ok(Self::new(
            hostname.to_ascii_lowercase(),
            namespace.to_ascii_lowercase(),
            type_name.to_ascii_lowercase(),
        ))
    }

    /// The provider implied by a bare local name with no explicit
    /// requirement declared.
    pub fn implied(local_name: &str) -> Self {
        Self::new(DEFAULT_PROVIDER_HOST, DEFAULT_PROVIDER_NAMESPACE, local_name)
    }

    /// Short form for messages, omitting the default hostname.
    pub fn for_display(&self) -> String {
        if self.hostname == DEFAULT_PROVIDER_HOST {
            format!("{}/{}", self.namespace, self.type_name)
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for ProviderAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.hostname, self.namespace, self.type_name)
    }
}

/// A provider configuration as seen by the caller of a root module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderConfigSlot {
    pub provider: ProviderAddr,
    pub alias: Option<String>,
}

impl ProviderConfigSlot {
    pub fn new(provider: ProviderAddr, alias: Option<String>) -> Self {
        Self { provider, alias }
    }
}

impl fmt::Display for ProviderConfigSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider[\"{}\"]", self.provider)?;
        if let Some(alias) = &self.alias {
            write!(f, ".{alias}")?;
        }
        Ok(())
    }
}

/// A provider configuration referenced by module-local name, `name` or
/// `name.alias`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalProviderConfig {
    pub local_name: String,
    pub alias: Option<String>,
}

impl LocalProviderConfig {
    pub fn new(local_name: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            local_name: local_name.into(),
            alias,
        }
    }

    pub fn parse(addr: &str) -> Result<Self, AddressError> {
        let invalid = |reason: &str| AddressError::InvalidProviderConfig {
            addr: addr.to_string(),
            reason: reason.to_string(),
        };

        let (name, alias) = match addr.split_once('.') {
            Some((name, alias)) => (name, Some(alias)),
            None => (addr, None),
        };
        if !is_valid_name(name) {
            return Err(invalid("local name must be a valid identifier"));
        }
        if let Some(alias) = alias {
            if !is_valid_name(alias) || alias.contains('.') {
                return Err(invalid("alias must be a valid identifier"));
            }
        }
        Ok(Self::new(name, alias.map(str::to_string)))
    }

    /// Compact form: `aws` or `aws.east`.
    pub fn string_compact(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LocalProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.local_name)?;
        if let Some(alias) = &self.alias {
            write!(f, ".{alias}")?;
        }
        Ok(())
    }
}

fn is_valid_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !s.starts_with(|c: char| c.is_ascii_digit())
}
