//! Component declarations.

use std::fmt;

use indexmap::IndexMap;
use stackeval_foundation::{FinalSource, LocalProviderConfig, ModuleSource, SourceRange};

/// Address of a component block within the stack configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentAddr {
    /// Names of the embedded stacks leading to the declaring stack
    pub stack: Vec<String>,
    pub name: String,
}

impl ComponentAddr {
    /// A component declared in the root stack.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            stack: Vec::new(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ComponentAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stack in &self.stack {
            write!(f, "stack.{stack}.")?;
        }
        write!(f, "component.{}", self.name)
    }
}

/// An unevaluated expression from the stack configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub text: String,
    pub range: SourceRange,
}

impl Expression {
    pub fn new(text: impl Into<String>, range: SourceRange) -> Self {
        Self {
            text: text.into(),
            range,
        }
    }
}

/// A `component` block as loaded from the stack configuration.
#[derive(Debug, Clone)]
pub struct ComponentDeclaration {
    pub addr: ComponentAddr,
    /// Source address as written
    pub source: ModuleSource,
    /// Source address after version selection. The stack configuration
    /// loader fills this in; a declaration without one cannot be evaluated.
    pub final_source: Option<FinalSource>,
    pub version_constraint: Option<String>,
    /// The `inputs` argument
    pub inputs: Option<Expression>,
    /// The `providers` argument, keyed by the provider configuration name
    /// as the stack knows it
    pub provider_configs: IndexMap<LocalProviderConfig, Expression>,
    pub for_each: Option<Expression>,
    pub source_range: SourceRange,
    pub decl_range: SourceRange,
}

impl ComponentDeclaration {
    /// A declaration for a component whose source needs no version
    /// selection, with no arguments set.
    pub fn new(addr: ComponentAddr, source: ModuleSource, decl_range: SourceRange) -> Self {
        Self {
            addr,
            final_source: source.as_final(),
            source,
            version_constraint: None,
            inputs: None,
            provider_configs: IndexMap::new(),
            for_each: None,
            source_range: decl_range.clone(),
            decl_range,
        }
    }

    pub fn with_final_source(mut self, source: FinalSource) -> Self {
        self.final_source = Some(source);
        self
    }

    pub fn with_inputs(mut self, inputs: Expression) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn with_provider(mut self, name: LocalProviderConfig, value: Expression) -> Self {
        self.provider_configs.insert(name, value);
        self
    }

    pub fn with_for_each(mut self, for_each: Expression) -> Self {
        self.for_each = Some(for_each);
        self
    }
}
