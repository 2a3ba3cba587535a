//! Static rules for modules used as stack components.

use stackeval_foundation::{Diagnostic, Diagnostics};

use crate::tree::ModuleTree;

const INLINE_PROVIDER: &str = "Inline provider configuration not allowed";

/// Checks every module in the tree against the component module rules.
///
/// Components receive all provider configurations from the stack that
/// calls them, so no module in the tree may configure a provider inline.
/// The root module gets advice on moving the block to the component's
/// `providers` argument; a nested module is assumed to be shared and the
/// advice is to pick a compatible module instead.
pub fn validate_tree_for_components(tree: &ModuleTree) -> Diagnostics {
    let mut diags = Diagnostics::new();
    for node in tree.walk() {
        for pc in node.module.provider_configs.values() {
            let detail = if node.path.is_root() {
                "A module used as a stack component must have all of its provider configurations passed from the stack configuration, using the \"providers\" argument within the component configuration block.".to_string()
            } else {
                format!(
                    "{} is not compatible with stack components, because it declares an inline provider configuration for {:?}.\n\nTo be used in a component, a module must instead accept provider configurations from its caller. Select a compatible module.",
                    node.path, pc.addr.string_compact()
                )
            };
            diags.push(Diagnostic::error(INLINE_PROVIDER, detail).with_subject(pc.decl_range.clone()));
        }
    }
    diags
}
