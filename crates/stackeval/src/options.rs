//! Evaluation options.
//!
//! ```yaml
//! apiVersion: stackeval/v1
//! kind: EvalOptions
//! allowLanguageExperiments: false
//! provisioners: [local-exec, file]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::OptionsError;

/// Result type for options loading.
pub type OptionsResult<T> = Result<T, OptionsError>;

/// Session-wide settings that affect how components are evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalOptions {
    /// API version for compatibility checking.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Kind must be "EvalOptions".
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Whether modules may opt in to experimental language features.
    #[serde(default)]
    pub allow_language_experiments: bool,

    /// Provisioners made available to the language runtime.
    #[serde(default)]
    pub provisioners: Vec<String>,
}

fn default_api_version() -> String {
    "stackeval/v1".to_string()
}

fn default_kind() -> String {
    "EvalOptions".to_string()
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            allow_language_experiments: false,
            provisioners: Vec::new(),
        }
    }
}

impl EvalOptions {
    /// Load options from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> OptionsResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse options from a YAML string.
    pub fn from_yaml(yaml: &str) -> OptionsResult<Self> {
        let options: EvalOptions = serde_yaml::from_str(yaml)?;
        options.validate_schema()?;
        Ok(options)
    }

    pub fn with_language_experiments(mut self, allowed: bool) -> Self {
        self.allow_language_experiments = allowed;
        self
    }

    pub fn with_provisioner(mut self, name: impl Into<String>) -> Self {
        self.provisioners.push(name.into());
        self
    }

    fn validate_schema(&self) -> OptionsResult<()> {
        if self.api_version != "stackeval/v1" {
            return Err(OptionsError::InvalidApiVersion(self.api_version.clone()));
        }
        if self.kind != "EvalOptions" {
            return Err(OptionsError::InvalidKind(self.kind.clone()));
        }
        Ok(())
    }
}
