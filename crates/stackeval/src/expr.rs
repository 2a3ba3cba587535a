//! Expression evaluation interfaces.
//!
//! Expressions in a stack configuration (component inputs, provider
//! assignments, `for_each`) are evaluated by an external evaluator. This
//! module defines the values it produces and the scope through which it
//! resolves references back into the evaluation.

use std::fmt;
use std::sync::Arc;

use stackeval_config::TypeConstraint;
use stackeval_foundation::{Diagnostics, SourceRange};

use crate::component::{ComponentDeclaration, InputsType};
use crate::context::EvalContext;
use crate::phase::EvalPhase;

/// A value produced by expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Known(serde_json::Value),
    /// A value that will only be known later, of the given type
    Unknown(TypeConstraint),
}

impl Value {
    /// An unknown value of unknown type.
    pub fn dynamic() -> Self {
        Value::Unknown(TypeConstraint::Any)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Value::Known(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Known(v) => write!(f, "{v}"),
            Value::Unknown(ty) => write!(f, "(unknown {ty})"),
        }
    }
}

/// A reference to a named object in the stack configuration, such as
/// `var.region` or `provider.aws.east`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub target: String,
    pub range: SourceRange,
}

impl Reference {
    pub fn new(target: impl Into<String>, range: SourceRange) -> Self {
        Self {
            target: target.into(),
            range,
        }
    }
}

/// `each.key` and `each.value` for expressions inside a repeated block.
/// Both are `None` outside a `for_each` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepetitionData {
    pub each_key: Option<Value>,
    pub each_value: Option<Value>,
}

/// Something an expression can refer to.
pub trait Referenceable: Send + Sync {
    fn expr_reference_value(&self, ctx: &EvalContext, phase: EvalPhase) -> Value;
}

/// Resolves references made by expressions evaluated in some scope.
pub trait ExpressionScope {
    fn resolve_expression_reference(
        &self,
        ctx: &EvalContext,
        reference: &Reference,
    ) -> (Option<Arc<dyn Referenceable>>, Diagnostics);
}

/// Evaluates the expressions of a component declaration.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluates the component's `inputs` argument against `inputs`,
    /// applying its defaults.
    fn evaluate_input_variables(
        &self,
        ctx: &EvalContext,
        inputs: &InputsType,
        decl: &ComponentDeclaration,
        phase: EvalPhase,
        scope: &dyn ExpressionScope,
    ) -> (Value, Diagnostics);
}
