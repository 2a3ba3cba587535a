//! Provider requirements of a module tree.

use indexmap::IndexSet;
use stackeval_foundation::{LocalProviderConfig, ProviderAddr, ProviderConfigSlot};

use crate::module::Module;
use crate::tree::ModuleTree;

impl ModuleTree {
    /// Provider configuration slots this module needs from its caller.
    ///
    /// This covers configurations the module declares (configuration
    /// aliases and inline blocks), those referenced by its resources,
    /// those it passes to child module calls, and default configurations
    /// that children without an explicit `providers` mapping inherit
    /// implicitly. Slots are returned in first-seen order.
    pub fn effective_required_provider_configs(&self) -> IndexSet<ProviderConfigSlot> {
        let module = &self.module;
        let mut slots = IndexSet::new();

        for rp in module.required_providers.values() {
            for alias in &rp.configuration_aliases {
                slots.insert(slot(module, alias));
            }
        }
        for addr in module.provider_configs.keys() {
            slots.insert(slot(module, addr));
        }
        for resource in &module.resources {
            slots.insert(slot(module, &resource.provider_config_addr()));
        }

        for (name, call) in &module.module_calls {
            if !call.providers.is_empty() {
                for passed in &call.providers {
                    slots.insert(slot(module, &passed.in_parent));
                }
                continue;
            }
            let Some(child) = self.child(name) else {
                continue;
            };
            // Without a mapping only default configurations pass through,
            // and they keep their provider type.
            slots.extend(
                child
                    .effective_required_provider_configs()
                    .into_iter()
                    .filter(|s| s.alias.is_none()),
            );
        }

        slots
    }

    /// Every provider type used anywhere in the tree, in first-seen order.
    ///
    /// Covers every way a module can name a provider, so it is a superset
    /// of the types behind [`Self::effective_required_provider_configs`].
    pub fn provider_types(&self) -> IndexSet<ProviderAddr> {
        let mut types = IndexSet::new();
        for node in self.walk() {
            let module = &node.module;
            let by_name =
                |addr: &LocalProviderConfig| module.provider_for_local_name(&addr.local_name);
            types.extend(module.required_providers.values().map(|rp| rp.source.clone()));
            types.extend(module.provider_configs.keys().map(by_name));
            types.extend(
                module
                    .resources
                    .iter()
                    .map(|r| by_name(&r.provider_config_addr())),
            );
            types.extend(
                module
                    .module_calls
                    .values()
                    .flat_map(|call| call.providers.iter())
                    .map(|passed| by_name(&passed.in_parent)),
            );
        }
        types
    }
}

fn slot(module: &Module, addr: &LocalProviderConfig) -> ProviderConfigSlot {
    ProviderConfigSlot::new(
        module.provider_for_local_name(&addr.local_name),
        addr.alias.clone(),
    )
}
