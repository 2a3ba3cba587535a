// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Evaluation of stack components.
//!
//! A stack declares components, each of which wraps a tree of modules
//! loaded from a frozen source bundle. This crate evaluates one component
//! declaration at a time:
//!
//! - [`ComponentConfig`] derives the module tree, the inputs type and the
//!   required provider slots, each memoized in a [`Once`] cell
//! - [`ComponentConfig::validate`] runs the full validation sequence
//!   against the external collaborators held by an [`EvalSession`]
//!
//! Collaborators outside this crate (provider plugins, the expression
//! evaluator, the module language runtime and the enclosing stack) are
//! reached only through the traits in [`providers`], [`expr`], [`runtime`]
//! and [`stack`].

pub mod component;
pub mod context;
pub mod error;
pub mod expr;
pub mod once;
pub mod options;
pub mod phase;
pub mod providers;
pub mod runtime;
pub mod session;
pub mod stack;

pub use component::{
    ComponentAddr, ComponentConfig, ComponentDeclaration, Expression, InputsType, PlannedChange,
    ProviderSlots,
};
pub use context::EvalContext;
pub use error::{OnceError, OptionsError, ProviderError, RuntimeError};
pub use expr::{ExpressionEvaluator, ExpressionScope, Reference, Referenceable, RepetitionData, Value};
pub use once::{do_once_with_diags, Once, OnceId};
pub use options::EvalOptions;
pub use phase::{EvalPhase, PerPhase};
pub use providers::{
    ProviderClient, ProviderClients, ProviderSchema, ProviderSchemas, ProviderType,
    ProviderTypeRegistry,
};
pub use runtime::{LanguageRuntime, LanguageRuntimeFactory, RuntimeOptions};
pub use session::EvalSession;
pub use stack::StackConfig;
