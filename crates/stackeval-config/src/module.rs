//! Parsed module declarations.
//!
//! A [`Module`] is the static content of one module directory. It knows
//! nothing about where the directory came from or which other modules it
//! calls beyond the call declarations themselves; linking calls to loaded
//! children is the job of [`crate::tree`].

use std::path::PathBuf;

use indexmap::IndexMap;
use stackeval_foundation::{LocalProviderConfig, ModuleSource, ProviderAddr, SourceRange};

use crate::types::TypeConstraint;

/// One module directory's declarations.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Directory the module was loaded from
    pub source_dir: PathBuf,
    /// Input variables, in declaration order
    pub variables: IndexMap<String, Variable>,
    /// Provider requirements keyed by module-local name
    pub required_providers: IndexMap<String, RequiredProvider>,
    /// Inline provider configuration blocks
    pub provider_configs: IndexMap<LocalProviderConfig, ProviderConfig>,
    /// Calls to child modules, in declaration order
    pub module_calls: IndexMap<String, ModuleCall>,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub description: Option<String>,
    /// Declared type, or [`TypeConstraint::Any`] when omitted
    pub type_constraint: TypeConstraint,
    pub default: Option<serde_json::Value>,
    pub sensitive: bool,
    pub decl_range: SourceRange,
}

#[derive(Debug, Clone)]
pub struct RequiredProvider {
    pub local_name: String,
    pub source: ProviderAddr,
    pub version_constraint: Option<String>,
    /// Additional aliased configurations this module expects to be passed
    pub configuration_aliases: Vec<LocalProviderConfig>,
    pub decl_range: SourceRange,
}

/// An inline `provider` configuration block.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub addr: LocalProviderConfig,
    pub decl_range: SourceRange,
}

#[derive(Debug, Clone)]
pub struct ModuleCall {
    pub name: String,
    pub source: ModuleSource,
    /// Raw version constraint string, for registry sources
    pub version: Option<String>,
    /// Explicit provider configurations passed to the child
    pub providers: Vec<PassedProviderConfig>,
    pub source_range: SourceRange,
    pub decl_range: SourceRange,
}

/// One entry of a module call's `providers` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassedProviderConfig {
    pub in_child: LocalProviderConfig,
    pub in_parent: LocalProviderConfig,
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub type_name: String,
    pub name: String,
    /// Explicit `provider` argument, if any
    pub provider: Option<LocalProviderConfig>,
    pub decl_range: SourceRange,
}

impl Resource {
    /// The provider configuration this resource uses: the explicit one, or
    /// the default configuration of the provider named by its type prefix.
    pub fn provider_config_addr(&self) -> LocalProviderConfig {
        if let Some(explicit) = &self.provider {
            return explicit.clone();
        }
        let implied = self
            .type_name
            .split_once('_')
            .map_or(self.type_name.as_str(), |(prefix, _)| prefix);
        LocalProviderConfig::new(implied, None)
    }
}

impl Module {
    /// Resolves a module-local provider name to its provider type.
    ///
    /// Names without a matching `required_providers` entry fall back to the
    /// implied default-namespace provider of the same name.
    pub fn provider_for_local_name(&self, local_name: &str) -> ProviderAddr {
        self.required_providers
            .get(local_name)
            .map(|rp| rp.source.clone())
            .unwrap_or_else(|| ProviderAddr::implied(local_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(type_name: &str, provider: Option<&str>) -> Resource {
        Resource {
            type_name: type_name.to_string(),
            name: "this".to_string(),
            provider: provider.map(|p| LocalProviderConfig::parse(p).unwrap()),
            decl_range: SourceRange::line("module.yaml", 1),
        }
    }

    #[test]
    fn test_resource_implied_provider() {
        assert_eq!(
            resource("aws_instance", None).provider_config_addr(),
            LocalProviderConfig::new("aws", None)
        );
        assert_eq!(
            resource("random", None).provider_config_addr(),
            LocalProviderConfig::new("random", None)
        );
        assert_eq!(
            resource("aws_instance", Some("aws.east")).provider_config_addr(),
            LocalProviderConfig::new("aws", Some("east".to_string()))
        );
    }

    #[test]
    fn test_provider_for_local_name() {
        let mut module = Module::default();
        module.required_providers.insert(
            "cloud".to_string(),
            RequiredProvider {
                local_name: "cloud".to_string(),
                source: ProviderAddr::parse("example/cloud").unwrap(),
                version_constraint: None,
                configuration_aliases: Vec::new(),
                decl_range: SourceRange::line("module.yaml", 2),
            },
        );
        assert_eq!(module.provider_for_local_name("cloud").namespace, "example");
        assert_eq!(module.provider_for_local_name("aws"), ProviderAddr::implied("aws"));
    }
}
