//! Module directory parsing.
//!
//! The tree loader talks to module directories only through the
//! [`ModuleParser`] trait. [`YamlModuleParser`] is the implementation used
//! with real source bundles: each module directory holds a `module.yaml`
//! file describing its declarations.
//!
//! # Module file
//!
//! ```yaml
//! variables:
//!   region:
//!     type: string
//!     default: us-east-1
//! required_providers:
//!   aws:
//!     source: hashicorp/aws
//!     configuration_aliases: [aws.east]
//! modules:
//!   vpc:
//!     source: example-corp/network/aws//vpc
//!     version: "~> 1.0"
//!     providers:
//!       aws: aws.east
//! resources:
//!   - type: aws_instance
//!     name: web
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use stackeval_foundation::{
    version_set_for_constraints, Diagnostic, Diagnostics, LocalProviderConfig, ModuleSource,
    ProviderAddr, SourceRange,
};
use tracing::debug;

use crate::error::ParseError;
use crate::module::{
    Module, ModuleCall, PassedProviderConfig, ProviderConfig, RequiredProvider, Resource, Variable,
};
use crate::types::TypeConstraint;

/// File that marks a directory as a module.
pub const MODULE_FILENAME: &str = "module.yaml";

/// Reads module declarations from a directory.
pub trait ModuleParser: Send + Sync {
    /// Returns true if `dir` contains a loadable module.
    fn is_module_dir(&self, dir: &Path) -> bool;

    /// Parses the module in `dir`.
    ///
    /// Returns `None` when nothing could be decoded at all. A returned
    /// module may still be accompanied by error diagnostics describing
    /// declarations that were skipped.
    fn load_module_dir(&self, dir: &Path) -> (Option<Module>, Diagnostics);
}

/// [`ModuleParser`] for directories containing a `module.yaml` file.
#[derive(Debug, Clone, Default)]
pub struct YamlModuleParser {
    allow_experiments: bool,
}

impl YamlModuleParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows the `experiments` key in module files.
    pub fn with_experiments_allowed(mut self, allowed: bool) -> Self {
        self.allow_experiments = allowed;
        self
    }

    fn read(&self, path: &Path) -> Result<(String, RawModule), ParseError> {
        let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: Option<RawModule> = if content.trim().is_empty() {
            None
        } else {
            serde_yaml::from_str(&content).map_err(|source| ParseError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };
        Ok((content, raw.unwrap_or_default()))
    }
}

impl ModuleParser for YamlModuleParser {
    fn is_module_dir(&self, dir: &Path) -> bool {
        dir.join(MODULE_FILENAME).is_file()
    }

    fn load_module_dir(&self, dir: &Path) -> (Option<Module>, Diagnostics) {
        let path = dir.join(MODULE_FILENAME);
        let filename = path.display().to_string();

        let (content, raw) = match self.read(&path) {
            Ok(read) => read,
            Err(err) => {
                let subject = match &err {
                    ParseError::Yaml { source, .. } => source
                        .location()
                        .map(|loc| SourceRange::line(filename.clone(), loc.line() as u32)),
                    ParseError::Io { .. } => None,
                };
                let diag = Diagnostic::error("Failed to read module", format!("{err}."))
                    .with_subject(subject);
                return (None, diag.into());
            }
        };

        debug!(dir = %dir.display(), "parsing module directory");
        let lines = LineIndex::new(filename, &content);
        let mut decoder = Decoder {
            lines: &lines,
            diags: Diagnostics::new(),
        };

        if !raw.experiments.is_empty() && !self.allow_experiments {
            decoder.diags.push(
                Diagnostic::error(
                    "Module uses experimental features",
                    "Experimental language features are not enabled for this evaluation, so this module cannot be used.",
                )
                .with_subject(lines.range(&["experiments"])),
            );
        }

        let module = decoder.decode(dir.to_path_buf(), raw);
        (Some(module), decoder.diags)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModule {
    #[serde(default)]
    experiments: Vec<String>,
    #[serde(default)]
    variables: IndexMap<String, RawVariable>,
    #[serde(default)]
    required_providers: IndexMap<String, RawRequiredProvider>,
    #[serde(default)]
    providers: IndexMap<String, serde_yaml::Value>,
    #[serde(default)]
    modules: IndexMap<String, RawModuleCall>,
    #[serde(default)]
    resources: Vec<RawResource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVariable {
    #[serde(rename = "type")]
    type_expr: Option<String>,
    default: Option<serde_json::Value>,
    #[serde(default)]
    sensitive: bool,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRequiredProvider {
    source: Option<String>,
    version: Option<String>,
    #[serde(default)]
    configuration_aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModuleCall {
    source: String,
    version: Option<String>,
    #[serde(default)]
    providers: IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawResource {
    #[serde(rename = "type")]
    type_name: String,
    name: String,
    provider: Option<String>,
}

struct Decoder<'a> {
    lines: &'a LineIndex<'a>,
    diags: Diagnostics,
}

impl Decoder<'_> {
    fn decode(&mut self, source_dir: PathBuf, raw: RawModule) -> Module {
        let mut module = Module {
            source_dir,
            ..Module::default()
        };

        for (name, var) in raw.variables {
            let decl_range = self.lines.range(&["variables", &name]);
            let type_constraint = match var.type_expr.as_deref() {
                None => TypeConstraint::Any,
                Some(expr) => TypeConstraint::parse(expr).unwrap_or_else(|reason| {
                    self.diags.push(
                        Diagnostic::error(
                            "Invalid type specification",
                            format!("The type of variable {name:?} is invalid: {reason}."),
                        )
                        .with_subject(self.lines.range(&["variables", &name, "type"])),
                    );
                    TypeConstraint::Any
                }),
            };
            module.variables.insert(
                name.clone(),
                Variable {
                    name,
                    description: var.description,
                    type_constraint,
                    default: var.default,
                    sensitive: var.sensitive,
                    decl_range,
                },
            );
        }

        for (local_name, rp) in raw.required_providers {
            let decl_range = self.lines.range(&["required_providers", &local_name]);
            let source = match rp.source.as_deref() {
                None => ProviderAddr::implied(&local_name),
                Some(addr) => match ProviderAddr::parse(addr) {
                    Ok(addr) => addr,
                    Err(err) => {
                        self.diags.push(
                            Diagnostic::error("Invalid provider source address", format!("{err}."))
                                .with_subject(decl_range),
                        );
                        continue;
                    }
                },
            };

            let mut configuration_aliases = Vec::new();
            for alias in &rp.configuration_aliases {
                match LocalProviderConfig::parse(alias) {
                    Ok(addr) if addr.local_name == local_name && addr.alias.is_some() => {
                        configuration_aliases.push(addr)
                    }
                    _ => self.diags.push(
                        Diagnostic::error(
                            "Invalid configuration_aliases value",
                            format!(
                                "Configuration aliases for provider {local_name:?} must be written as \"{local_name}.<alias>\", not {alias:?}."
                            ),
                        )
                        .with_subject(decl_range.clone()),
                    ),
                }
            }

            module.required_providers.insert(
                local_name.clone(),
                RequiredProvider {
                    local_name,
                    source,
                    version_constraint: rp.version,
                    configuration_aliases,
                    decl_range,
                },
            );
        }

        for key in raw.providers.keys() {
            let decl_range = self.lines.range(&["providers", key]);
            match LocalProviderConfig::parse(key) {
                Ok(addr) => {
                    module
                        .provider_configs
                        .insert(addr.clone(), ProviderConfig { addr, decl_range });
                }
                Err(err) => self.diags.push(
                    Diagnostic::error("Invalid provider configuration name", format!("{err}."))
                        .with_subject(decl_range),
                ),
            }
        }

        for (name, call) in raw.modules {
            if let Some(decoded) = self.decode_call(name, call) {
                module.module_calls.insert(decoded.name.clone(), decoded);
            }
        }

        for (index, res) in raw.resources.into_iter().enumerate() {
            let decl_range = self.lines.item_range("resources", index);
            let provider = match res.provider.as_deref().map(LocalProviderConfig::parse) {
                None => None,
                Some(Ok(addr)) => Some(addr),
                Some(Err(err)) => {
                    self.diags.push(
                        Diagnostic::error("Invalid provider reference", format!("{err}."))
                            .with_subject(decl_range),
                    );
                    continue;
                }
            };
            module.resources.push(Resource {
                type_name: res.type_name,
                name: res.name,
                provider,
                decl_range,
            });
        }

        module
    }

    fn decode_call(&mut self, name: String, call: RawModuleCall) -> Option<ModuleCall> {
        let decl_range = self.lines.range(&["modules", &name]);
        let source_range = self.lines.range(&["modules", &name, "source"]);

        let source = match ModuleSource::parse(&call.source) {
            Ok(source) => source,
            Err(err) => {
                self.diags.push(
                    Diagnostic::error("Invalid module source address", format!("{err}."))
                        .with_subject(source_range),
                );
                return None;
            }
        };

        if let Some(version) = &call.version {
            let version_range = self.lines.range(&["modules", &name, "version"]);
            if !matches!(source, ModuleSource::Registry(_)) {
                self.diags.push(
                    Diagnostic::error(
                        "Invalid version constraint",
                        "Version constraints are supported only for module registry sources. Remote and local sources are already pinned to one package.",
                    )
                    .with_subject(version_range),
                );
                return None;
            }
            if let Err(err) = version_set_for_constraints(version) {
                self.diags.push(
                    Diagnostic::error("Invalid version constraint", format!("{err}."))
                        .with_subject(version_range),
                );
                return None;
            }
        }

        let mut providers = Vec::new();
        for (in_child, in_parent) in &call.providers {
            match (LocalProviderConfig::parse(in_child), LocalProviderConfig::parse(in_parent)) {
                (Ok(in_child), Ok(in_parent)) => {
                    providers.push(PassedProviderConfig { in_child, in_parent })
                }
                (Err(err), _) | (_, Err(err)) => self.diags.push(
                    Diagnostic::error("Invalid providers mapping", format!("{err}."))
                        .with_subject(self.lines.range(&["modules", &name, "providers"])),
                ),
            }
        }

        Some(ModuleCall {
            name,
            source,
            version: call.version,
            providers,
            source_range,
            decl_range,
        })
    }
}

/// Locates declaration lines in a module file.
///
/// The YAML decoder does not report positions for decoded values, so
/// ranges are recovered by walking keys by indentation. A key that cannot
/// be found is attributed to the first line of the file.
struct LineIndex<'a> {
    filename: String,
    lines: Vec<&'a str>,
}

impl<'a> LineIndex<'a> {
    fn new(filename: String, content: &'a str) -> Self {
        Self {
            filename,
            lines: content.lines().collect(),
        }
    }

    fn range(&self, path: &[&str]) -> SourceRange {
        self.to_range(self.find(path))
    }

    fn item_range(&self, section: &str, index: usize) -> SourceRange {
        self.to_range(self.find_item(section, index))
    }

    fn to_range(&self, line: Option<usize>) -> SourceRange {
        SourceRange::line(self.filename.clone(), line.map_or(1, |l| l as u32 + 1))
    }

    fn find(&self, path: &[&str]) -> Option<usize> {
        let mut start = 0;
        let mut parent_indent: Option<usize> = None;
        let mut found = None;

        for key in path {
            found = None;
            let mut child_indent = None;
            for (i, line) in self.lines.iter().enumerate().skip(start) {
                if !is_content(line) {
                    continue;
                }
                let ind = indent(line);
                if parent_indent.is_some_and(|p| ind <= p) {
                    break;
                }
                if ind != *child_indent.get_or_insert(ind) {
                    continue;
                }
                if key_matches(line.trim_start(), key) {
                    found = Some(i);
                    parent_indent = Some(ind);
                    start = i + 1;
                    break;
                }
            }
            found?;
        }
        found
    }

    fn find_item(&self, section: &str, index: usize) -> Option<usize> {
        let section_line = self.find(&[section])?;
        let parent = indent(self.lines[section_line]);
        let mut item_indent = None;
        let mut seen = 0;

        for (i, line) in self.lines.iter().enumerate().skip(section_line + 1) {
            if !is_content(line) {
                continue;
            }
            let ind = indent(line);
            let is_item = line.trim_start().starts_with('-');
            if ind < parent || (ind == parent && !is_item) {
                break;
            }
            if is_item && ind == *item_indent.get_or_insert(ind) {
                if seen == index {
                    return Some(i);
                }
                seen += 1;
            }
        }
        None
    }
}

fn is_content(line: &str) -> bool {
    let trimmed = line.trim_start();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

fn indent(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn key_matches(trimmed: &str, key: &str) -> bool {
    [key.to_string(), format!("\"{key}\""), format!("'{key}'")]
        .iter()
        .any(|candidate| {
            trimmed
                .strip_prefix(candidate.as_str())
                .is_some_and(|rest| rest.starts_with(':'))
        })
}
