//! Component validation.
//!
//! Validation runs as a fixed sequence of steps. Some steps stop the
//! sequence when they fail, because the later steps would only produce
//! confusing follow-on errors without them:
//!
//! 1. Load the module tree (stops if the tree is unavailable)
//! 2. Check input variable values (never stops)
//! 3. Check provider assignments (stops on errors)
//! 4. Fetch schemas for every provider type in the tree (stops on errors)
//! 5. Instantiate the language runtime and start provider clients
//! 6. Validate the tree with the runtime
//!
//! Provider clients started in step 5 are closed before validation
//! returns, on every path.

use stackeval_config::ModuleTree;
use stackeval_foundation::{Diagnostic, Diagnostics};
use tracing::{debug, info, instrument};

use super::{ComponentAddr, ComponentConfig};
use crate::context::EvalContext;
use crate::once::do_once_with_diags;
use crate::phase::EvalPhase;
use crate::providers::{ProviderClients, ProviderSchemas};
use crate::runtime::RuntimeOptions;

/// A change to remote objects that applying a plan would make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    pub component: ComponentAddr,
    pub description: String,
}

impl ComponentConfig {
    /// Validates the component, returning every diagnostic found.
    pub fn validate(&self, ctx: &EvalContext) -> Diagnostics {
        self.check_valid(ctx, EvalPhase::Validate)
    }

    /// Validates the component for planning. The configuration itself
    /// contributes no planned changes, only diagnostics.
    pub fn plan_changes(&self, ctx: &EvalContext) -> (Vec<PlannedChange>, Diagnostics) {
        (Vec::new(), self.check_valid(ctx, EvalPhase::Plan))
    }

    #[instrument(skip_all, fields(component = %self.decl.addr, %phase))]
    fn check_valid(&self, ctx: &EvalContext, phase: EvalPhase) -> Diagnostics {
        let (_, diags) = do_once_with_diags(self.validated.get(phase), ctx, |ctx| {
            ((), self.run_validation(ctx, phase))
        });
        diags
    }

    fn run_validation(&self, ctx: &EvalContext, phase: EvalPhase) -> Diagnostics {
        let mut diags = Diagnostics::new();

        let (tree, more) = self.check_module_tree(ctx);
        diags.append(more);
        let Some(tree) = tree else {
            debug!("module tree unavailable");
            return diags;
        };

        // Invalid inputs don't prevent validating the modules themselves.
        diags.append(self.check_input_variable_values(ctx, phase));

        let (_, provider_diags) = self.check_providers(ctx, phase);
        let providers_failed = provider_diags.has_errors();
        diags.append(provider_diags);
        if providers_failed {
            debug!("provider assignments invalid");
            return diags;
        }

        let (schemas, schema_diags) = self.needed_provider_schemas(&tree);
        let schemas_failed = schema_diags.has_errors();
        diags.append(schema_diags);
        if schemas_failed {
            debug!("provider schemas unavailable");
            return diags;
        }

        let opts = RuntimeOptions {
            schemas,
            provisioners: self.session.options().provisioners.clone(),
        };
        let runtime = match self.session.runtime_factory().instantiate(opts) {
            Ok(runtime) => runtime,
            Err(err) => {
                diags.push(Diagnostic::internal(
                    "Failed to instantiate module runtime",
                    format!("Could not load the module language runtime: {err}."),
                ));
                return diags;
            }
        };

        let (clients, valid) = self.needed_provider_clients(ctx, phase);
        if !valid {
            diags.push(
                Diagnostic::error(
                    "Cannot validate component",
                    format!(
                        "Cannot validate {} because its provider configuration assignments are invalid.",
                        self.decl.addr
                    ),
                )
                .with_subject(self.decl.decl_range.clone()),
            );
            return diags;
        }

        diags.append(runtime.validate(&tree, &clients));
        drop(clients);

        info!(
            diagnostics = diags.len(),
            errors = diags.has_errors(),
            "component validated"
        );
        diags
    }

    /// Fetches the schema of every provider type used in the tree.
    ///
    /// Provider types missing from the registry are skipped here; they
    /// are reported when clients are started.
    fn needed_provider_schemas(&self, tree: &ModuleTree) -> (ProviderSchemas, Diagnostics) {
        let mut schemas = ProviderSchemas::new();
        let mut diags = Diagnostics::new();

        for addr in tree.provider_types() {
            let Some(provider) = self.session.provider_type(&addr) else {
                continue;
            };
            match provider.schema() {
                Ok(schema) => {
                    schemas.insert(addr, schema);
                }
                Err(err) => diags.push(
                    Diagnostic::error(
                        "Provider initialization error",
                        format!("Failed to fetch the provider schema for {addr}: {err}."),
                    )
                    .with_subject(self.decl.decl_range.clone()),
                ),
            }
        }
        (schemas, diags)
    }

    /// Starts an unconfigured client for every assigned provider slot.
    ///
    /// The flag is false if any slot's provider is not installed or its
    /// client failed to start. The clients that did start are returned
    /// either way, so dropping the set closes them.
    fn needed_provider_clients(&self, ctx: &EvalContext, phase: EvalPhase) -> (ProviderClients, bool) {
        let mut clients = ProviderClients::new();
        let mut valid = true;

        let (slots, _) = self.check_providers(ctx, phase);
        for slot in slots {
            let Some(provider) = self.session.provider_type(&slot.provider) else {
                debug!(%slot, "provider type not installed");
                valid = false;
                continue;
            };
            match provider.unconfigured_client() {
                Ok(client) => clients.insert(slot, client),
                Err(err) => {
                    debug!(%slot, error = %err, "failed to start provider client");
                    valid = false;
                }
            }
        }
        (clients, valid)
    }
}
