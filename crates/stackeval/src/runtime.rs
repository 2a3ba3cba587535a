//! Module language runtime interface.

use stackeval_config::ModuleTree;
use stackeval_foundation::Diagnostics;

use crate::error::RuntimeError;
use crate::providers::{ProviderClients, ProviderSchemas};

/// Everything the language runtime is constructed with.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// Schemas for every provider type used in the module tree
    pub schemas: ProviderSchemas,
    /// Names of the provisioners available to resources
    pub provisioners: Vec<String>,
}

/// Constructs language runtimes.
pub trait LanguageRuntimeFactory: Send + Sync {
    fn instantiate(&self, opts: RuntimeOptions) -> Result<Box<dyn LanguageRuntime>, RuntimeError>;
}

/// Semantic validation of a whole module tree.
pub trait LanguageRuntime {
    /// Validates `tree`, using `providers` as the already-started clients
    /// for the tree's root provider configurations.
    fn validate(&self, tree: &ModuleTree, providers: &ProviderClients) -> Diagnostics;
}
