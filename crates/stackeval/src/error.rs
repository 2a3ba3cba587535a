//! Evaluation errors

use stackeval_foundation::Diagnostic;
use thiserror::Error;

use crate::once::OnceId;

/// Failures of a memoized computation itself, as opposed to failures the
/// computation reports through its diagnostics.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OnceError {
    /// The computation was requested again from within its own producer.
    #[error("{name} (cell {id}) depends on its own result")]
    SelfReference { id: OnceId, name: String },

    /// The producer panicked, so no result will ever be available.
    #[error("{name} (cell {id}) failed while it was being computed")]
    Poisoned { id: OnceId, name: String },
}

impl OnceError {
    /// Converts the failure into the diagnostic reported to callers.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            OnceError::SelfReference { .. } => Diagnostic::internal(
                "Self-referential evaluation",
                format!("Evaluation stopped because {self}."),
            ),
            OnceError::Poisoned { .. } => {
                Diagnostic::internal("Evaluation failed", format!("Evaluation stopped because {self}."))
            }
        }
    }
}

/// Errors from a provider plugin.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to start provider plugin: {0}")]
    Startup(String),

    #[error("failed to fetch provider schema: {0}")]
    Schema(String),

    #[error("failed to close provider client: {0}")]
    Close(String),
}

/// Errors constructing the module language runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid runtime options: {0}")]
    InvalidOptions(String),

    #[error("unknown provisioner {0:?}")]
    UnknownProvisioner(String),
}

/// Errors that can occur when loading evaluation options.
#[derive(Debug, Error)]
pub enum OptionsError {
    /// Failed to read the options file.
    #[error("failed to read options file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the options YAML.
    #[error("failed to parse options YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("invalid apiVersion: expected 'stackeval/v1', got '{0}'")]
    InvalidApiVersion(String),

    #[error("invalid kind: expected 'EvalOptions', got '{0}'")]
    InvalidKind(String),
}
