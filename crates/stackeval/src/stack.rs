//! The stack configuration that declares components.

use std::sync::Arc;

use stackeval_foundation::{Diagnostics, ProviderAddr};

use crate::context::EvalContext;
use crate::expr::{Reference, Referenceable, RepetitionData};

/// The enclosing stack configuration, as seen by its components.
pub trait StackConfig: Send + Sync {
    /// The local name the stack uses for a provider type, if the stack
    /// declares that provider at all.
    fn provider_local_name(&self, provider: &ProviderAddr) -> Option<String>;

    /// Resolves a reference made from within the stack configuration.
    fn resolve_expression_reference(
        &self,
        ctx: &EvalContext,
        reference: &Reference,
        repetition: &RepetitionData,
    ) -> (Option<Arc<dyn Referenceable>>, Diagnostics);
}
