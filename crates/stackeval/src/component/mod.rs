//! Component configurations.
//!
//! A [`ComponentConfig`] is one `component` block of a stack configuration,
//! evaluated without regard to how many instances it will have. Everything
//! it derives (the module tree, the inputs type, the provider slots and
//! the results of each check) is memoized in a [`Once`] cell, so any
//! number of concurrent callers share one computation and see the same
//! diagnostics.

mod declaration;
mod inputs;
mod pipeline;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use stackeval_config::{load_tree, validate_tree_for_components, ModuleTree, TypeConstraint};
use stackeval_foundation::{
    Diagnostic, Diagnostics, FinalSource, LocalProviderConfig, ProviderConfigSlot,
};
use tracing::debug;

pub use declaration::{ComponentAddr, ComponentDeclaration, Expression};
pub use inputs::InputsType;
pub use pipeline::PlannedChange;

use crate::context::EvalContext;
use crate::expr::{ExpressionScope, Reference, Referenceable, RepetitionData, Value};
use crate::once::{do_once_with_diags, Once};
use crate::phase::{EvalPhase, PerPhase};
use crate::session::EvalSession;
use crate::stack::StackConfig;

/// Provider configuration slots, in first-seen order.
pub type ProviderSlots = IndexSet<ProviderConfigSlot>;

/// A component declaration together with its memoized derivations.
pub struct ComponentConfig {
    session: Arc<EvalSession>,
    stack: Arc<dyn StackConfig>,
    decl: ComponentDeclaration,
    root_source: FinalSource,

    module_tree: Once<Option<Arc<ModuleTree>>>,
    inputs_type: Once<InputsType>,
    required_providers: Once<ProviderSlots>,
    providers_checked: PerPhase<ProviderSlots>,
    inputs_checked: PerPhase<()>,
    validated: PerPhase<()>,
}

impl ComponentConfig {
    /// # Panics
    ///
    /// Panics if the declaration has no final source address, which means
    /// the stack configuration was loaded without resolving its sources.
    pub fn new(
        session: Arc<EvalSession>,
        stack: Arc<dyn StackConfig>,
        decl: ComponentDeclaration,
    ) -> Self {
        let Some(root_source) = decl.final_source.clone() else {
            panic!("configuration for {} lacks a final source address", decl.addr);
        };
        let name = decl.addr.to_string();
        Self {
            session,
            stack,
            root_source,
            module_tree: Once::new(format!("{name} module tree")),
            inputs_type: Once::new(format!("{name} inputs type")),
            required_providers: Once::new(format!("{name} required providers")),
            providers_checked: PerPhase::new(&format!("{name} provider check")),
            inputs_checked: PerPhase::new(&format!("{name} input check")),
            validated: PerPhase::new(&format!("{name} validation")),
            decl,
        }
    }

    pub fn addr(&self) -> &ComponentAddr {
        &self.decl.addr
    }

    pub fn declaration(&self) -> &ComponentDeclaration {
        &self.decl
    }

    pub fn stack_config(&self) -> &dyn StackConfig {
        self.stack.as_ref()
    }

    /// The component's module tree, or `None` if it failed to load.
    pub fn module_tree(&self, ctx: &EvalContext) -> Option<Arc<ModuleTree>> {
        self.check_module_tree(ctx).0
    }

    /// Loads the module tree and checks it against the component module
    /// rules.
    ///
    /// The tree is `None` if any module failed to load. A tree that loaded
    /// but breaks a component rule is still returned, with the errors.
    pub fn check_module_tree(&self, ctx: &EvalContext) -> (Option<Arc<ModuleTree>>, Diagnostics) {
        do_once_with_diags(&self.module_tree, ctx, |_| {
            let session = &self.session;
            let (tree, mut diags) = load_tree(
                session.source_bundle(),
                session.module_parser(),
                &self.root_source,
                self.decl.source_range.clone(),
            );
            let tree = match tree {
                Some(tree) if !diags.has_errors() => tree,
                _ => return (None, diags),
            };
            diags.append(validate_tree_for_components(&tree));
            (Some(Arc::new(tree)), diags)
        })
    }

    /// The object type the component's `inputs` value must conform to.
    ///
    /// Unknown when the module tree could not be loaded. Load failures are
    /// reported by [`Self::check_module_tree`], not here.
    pub fn inputs_type(&self, ctx: &EvalContext) -> (InputsType, Diagnostics) {
        do_once_with_diags(&self.inputs_type, ctx, |ctx| {
            let inputs = match self.module_tree(ctx) {
                Some(tree) => InputsType::for_module(&tree.module),
                None => InputsType::unknown(),
            };
            (inputs, Diagnostics::new())
        })
    }

    /// Checks the component's `inputs` argument against its inputs type.
    pub fn check_input_variable_values(&self, ctx: &EvalContext, phase: EvalPhase) -> Diagnostics {
        let (_, diags) = do_once_with_diags(self.inputs_checked.get(phase), ctx, |ctx| {
            let (inputs, mut diags) = self.inputs_type(ctx);
            if inputs.is_unknown() {
                return ((), diags);
            }
            let evaluator = self.session.expression_evaluator();
            let (_, more) = evaluator.evaluate_input_variables(ctx, &inputs, &self.decl, phase, self);
            diags.append(more);
            ((), diags)
        });
        diags
    }

    /// Provider configuration slots the root module needs from the stack.
    ///
    /// Empty when the module tree could not be loaded.
    pub fn required_provider_instances(&self, ctx: &EvalContext) -> (ProviderSlots, Diagnostics) {
        do_once_with_diags(&self.required_providers, ctx, |ctx| {
            let slots = self
                .module_tree(ctx)
                .map(|tree| tree.effective_required_provider_configs())
                .unwrap_or_default();
            (slots, Diagnostics::new())
        })
    }

    /// Checks that the component's `providers` argument assigns every
    /// required slot, returning the slots that are assigned.
    ///
    /// A slot matches an assignment only when the stack's local name for
    /// the slot's provider type, plus the slot's alias, is a key of the
    /// `providers` argument. Assignments under a different local name are
    /// not matched even when the provider types agree.
    pub fn check_providers(&self, ctx: &EvalContext, phase: EvalPhase) -> (ProviderSlots, Diagnostics) {
        do_once_with_diags(self.providers_checked.get(phase), ctx, |ctx| {
            let (needed, mut diags) = self.required_provider_instances(ctx);
            let mut matched = ProviderSlots::new();

            for slot in needed {
                let provider = slot.provider.for_display();
                let Some(local_name) = self.stack.provider_local_name(&slot.provider) else {
                    diags.push(
                        Diagnostic::error(
                            "Component requires undeclared provider",
                            format!(
                                "The root module for {} requires a configuration for provider {provider:?}, which isn't declared as a dependency of this stack configuration.\n\nDeclare this provider in the stack's required_providers block, and then assign a configuration for that provider in this component's \"providers\" argument.",
                                self.decl.addr
                            ),
                        )
                        .with_subject(self.decl.decl_range.clone()),
                    );
                    continue;
                };

                let local = LocalProviderConfig::new(local_name, slot.alias.clone());
                if !self.decl.provider_configs.contains_key(&local) {
                    diags.push(
                        Diagnostic::error(
                            "Missing required provider configuration",
                            format!(
                                "The root module for {} requires a provider configuration named {:?} for provider {provider:?}, which is not assigned in the component's \"providers\" argument.",
                                self.decl.addr,
                                local.string_compact()
                            ),
                        )
                        .with_subject(self.decl.decl_range.clone()),
                    );
                    continue;
                }

                matched.insert(slot);
            }

            debug!(component = %self.decl.addr, %phase, matched = matched.len(), "checked provider assignments");
            (matched, diags)
        })
    }
}

impl ExpressionScope for ComponentConfig {
    /// Resolves references in the component's own arguments. Inside a
    /// `for_each` component, `each.key` and `each.value` are unknown,
    /// since the instances are not yet known.
    fn resolve_expression_reference(
        &self,
        ctx: &EvalContext,
        reference: &Reference,
    ) -> (Option<Arc<dyn Referenceable>>, Diagnostics) {
        let mut repetition = RepetitionData::default();
        if self.decl.for_each.is_some() {
            repetition.each_key = Some(Value::Unknown(TypeConstraint::String));
            repetition.each_value = Some(Value::dynamic());
        }
        self.stack.resolve_expression_reference(ctx, reference, &repetition)
    }
}

impl Referenceable for ComponentConfig {
    /// Component results are never known from the configuration alone.
    fn expr_reference_value(&self, _ctx: &EvalContext, _phase: EvalPhase) -> Value {
        Value::dynamic()
    }
}

impl fmt::Debug for ComponentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentConfig")
            .field("addr", &self.decl.addr)
            .field("root_source", &self.root_source)
            .finish_non_exhaustive()
    }
}
