//! Evaluation sessions.

use std::fmt;
use std::sync::Arc;

use stackeval_config::{ModuleParser, SourceBundle, YamlModuleParser};
use stackeval_foundation::ProviderAddr;

use crate::expr::ExpressionEvaluator;
use crate::options::EvalOptions;
use crate::providers::{ProviderType, ProviderTypeRegistry};
use crate::runtime::LanguageRuntimeFactory;

/// Shared collaborators for every component evaluated together.
///
/// The source bundle is frozen for the lifetime of the session; nothing
/// here writes to it.
pub struct EvalSession {
    bundle: Arc<SourceBundle>,
    parser: Arc<dyn ModuleParser>,
    options: EvalOptions,
    providers: Arc<dyn ProviderTypeRegistry>,
    runtime: Arc<dyn LanguageRuntimeFactory>,
    expressions: Arc<dyn ExpressionEvaluator>,
}

impl EvalSession {
    /// Creates a session that parses modules with [`YamlModuleParser`].
    pub fn new(
        bundle: Arc<SourceBundle>,
        options: EvalOptions,
        providers: Arc<dyn ProviderTypeRegistry>,
        runtime: Arc<dyn LanguageRuntimeFactory>,
        expressions: Arc<dyn ExpressionEvaluator>,
    ) -> Self {
        let parser =
            YamlModuleParser::new().with_experiments_allowed(options.allow_language_experiments);
        Self {
            bundle,
            parser: Arc::new(parser),
            options,
            providers,
            runtime,
            expressions,
        }
    }

    /// Replaces the module parser.
    pub fn with_parser(mut self, parser: Arc<dyn ModuleParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn source_bundle(&self) -> &SourceBundle {
        &self.bundle
    }

    pub fn module_parser(&self) -> &dyn ModuleParser {
        self.parser.as_ref()
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    pub fn provider_type(&self, addr: &ProviderAddr) -> Option<Arc<dyn ProviderType>> {
        self.providers.provider_type(addr)
    }

    pub fn runtime_factory(&self) -> &dyn LanguageRuntimeFactory {
        self.runtime.as_ref()
    }

    pub fn expression_evaluator(&self) -> &dyn ExpressionEvaluator {
        self.expressions.as_ref()
    }
}

impl fmt::Debug for EvalSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalSession")
            .field("bundle", &self.bundle.root())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
