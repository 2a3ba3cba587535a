//! Provider plugin interfaces.

use std::sync::Arc;

use indexmap::IndexMap;
use stackeval_config::ObjectType;
use stackeval_foundation::{ProviderAddr, ProviderConfigSlot};
use tracing::{trace, warn};

use crate::error::ProviderError;

/// The configuration and resource schemas a provider plugin reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderSchema {
    pub provider: ObjectType,
    pub resource_types: IndexMap<String, ObjectType>,
}

/// Provider schemas keyed by provider type.
pub type ProviderSchemas = IndexMap<ProviderAddr, ProviderSchema>;

/// A running provider plugin instance.
pub trait ProviderClient: Send {
    fn close(&mut self) -> Result<(), ProviderError>;
}

/// A provider plugin that is installed and available.
pub trait ProviderType: Send + Sync {
    fn schema(&self) -> Result<ProviderSchema, ProviderError>;

    /// Starts a client that has not been configured, which is enough for
    /// validation.
    fn unconfigured_client(&self) -> Result<Box<dyn ProviderClient>, ProviderError>;
}

/// Looks up installed provider plugins.
pub trait ProviderTypeRegistry: Send + Sync {
    fn provider_type(&self, addr: &ProviderAddr) -> Option<Arc<dyn ProviderType>>;
}

/// Provider clients owned by one validation run.
///
/// Every client is closed when the set is dropped, whichever way the run
/// ends. Close failures are logged and otherwise ignored.
#[derive(Default)]
pub struct ProviderClients {
    clients: IndexMap<ProviderConfigSlot, Box<dyn ProviderClient>>,
}

impl ProviderClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: ProviderConfigSlot, client: Box<dyn ProviderClient>) {
        if let Some(mut replaced) = self.clients.insert(slot.clone(), client) {
            close_client(&slot, replaced.as_mut());
        }
    }

    pub fn get(&self, slot: &ProviderConfigSlot) -> Option<&dyn ProviderClient> {
        self.clients.get(slot).map(|c| c.as_ref())
    }

    pub fn slots(&self) -> impl Iterator<Item = &ProviderConfigSlot> {
        self.clients.keys()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Drop for ProviderClients {
    fn drop(&mut self) {
        for (slot, client) in self.clients.iter_mut() {
            close_client(slot, client.as_mut());
        }
    }
}

fn close_client(slot: &ProviderConfigSlot, client: &mut dyn ProviderClient) {
    match client.close() {
        Ok(()) => trace!(%slot, "closed provider client"),
        Err(err) => warn!(%slot, error = %err, "failed to close provider client"),
    }
}
