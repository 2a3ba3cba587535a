//! Module tree loading.
//!
//! A component's configuration is a tree of modules: the root module named
//! by the component's source address, plus every module reachable through
//! module calls. [`load_tree`] builds that tree from a [`SourceBundle`].
//!
//! Children are located through the [`ModuleWalker`] capability, so the
//! recursion in [`build_tree`] is independent of where modules come from.
//! [`SourceBundleWalker`] is the walker used for real bundles.
//!
//! # Diagnostics order
//!
//! Diagnostics are concatenated depth-first in call declaration order: a
//! child's own load diagnostics come before those of its descendants, and
//! all of them come before the next sibling's. A failed child leaves an
//! empty slot in its parent and does not stop its siblings from loading.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use stackeval_foundation::{
    version_set_for_constraints, Diagnostic, Diagnostics, FinalSource, ModuleSource, SourceRange,
    Version, VersionSet,
};
use tracing::{debug, trace};

use crate::error::BundleResult;
use crate::module::Module;
use crate::parser::ModuleParser;
use crate::sourcebundle::SourceBundle;

/// Summary used for every failure to locate or read a module.
const LOAD_FAILED: &str = "Can't load module for component";

/// Path of a module call from the root module, e.g. `module.net.module.vpc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("root module");
        }
        for (i, name) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "module.{name}")?;
        }
        Ok(())
    }
}

/// One loaded module and its children.
#[derive(Debug, Clone)]
pub struct ModuleTree {
    pub path: ModulePath,
    /// Final source address this module was loaded from
    pub source: FinalSource,
    /// Selected version, for modules loaded from a registry package
    pub version: Option<Version>,
    pub module: Arc<Module>,
    /// One slot per module call, keyed by call name in declaration order
    pub children: IndexMap<String, ModuleChild>,
}

/// The outcome of loading one module call.
#[derive(Debug, Clone)]
pub struct ModuleChild {
    /// `None` when the child could not be loaded
    pub node: Option<ModuleTree>,
    /// Diagnostics from loading this child itself, not its descendants
    pub diagnostics: Diagnostics,
}

impl ModuleChild {
    pub fn is_failed(&self) -> bool {
        self.node.is_none()
    }
}

impl ModuleTree {
    /// Returns the loaded child for a call name.
    pub fn child(&self, name: &str) -> Option<&ModuleTree> {
        self.children.get(name).and_then(|c| c.node.as_ref())
    }

    /// Looks up a loaded descendant by path.
    pub fn descendant(&self, path: &ModulePath) -> Option<&ModuleTree> {
        path.segments()
            .iter()
            .try_fold(self, |node, name| node.child(name))
    }

    /// Iterates over every loaded module in depth-first, declaration order,
    /// starting with this one.
    pub fn walk(&self) -> impl Iterator<Item = &ModuleTree> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.values().rev().filter_map(|c| c.node.as_ref()));
            Some(node)
        })
    }
}

/// A request to load the module behind one module call.
#[derive(Debug)]
pub struct ModuleRequest<'a> {
    pub name: &'a str,
    /// Path the child will have in the tree
    pub path: &'a ModulePath,
    pub source: &'a ModuleSource,
    pub version_constraint: Option<&'a str>,
    /// Final source of the calling module, for resolving local sources
    pub parent_source: &'a FinalSource,
    pub source_range: &'a SourceRange,
}

/// A module located and parsed by a [`ModuleWalker`].
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub module: Module,
    pub source: FinalSource,
    pub version: Option<Version>,
}

/// Locates and parses the module behind a module call.
pub trait ModuleWalker {
    fn load_child(&self, req: &ModuleRequest<'_>) -> (Option<LoadedModule>, Diagnostics);
}

/// Builds the tree below an already-loaded root module.
pub fn build_tree(root: LoadedModule, walker: &dyn ModuleWalker) -> (ModuleTree, Diagnostics) {
    let mut diags = Diagnostics::new();
    let mut ancestors = Vec::new();
    let tree = build_node(root, ModulePath::root(), &mut ancestors, walker, &mut diags);
    (tree, diags)
}

fn build_node(
    loaded: LoadedModule,
    path: ModulePath,
    ancestors: &mut Vec<FinalSource>,
    walker: &dyn ModuleWalker,
    diags: &mut Diagnostics,
) -> ModuleTree {
    let module = Arc::new(loaded.module);
    ancestors.push(loaded.source.clone());

    let mut children = IndexMap::new();
    for call in module.module_calls.values() {
        let child_path = path.child(&call.name);
        let req = ModuleRequest {
            name: &call.name,
            path: &child_path,
            source: &call.source,
            version_constraint: call.version.as_deref(),
            parent_source: &loaded.source,
            source_range: &call.source_range,
        };
        let (child, mut child_diags) = walker.load_child(&req);

        let child = match child {
            Some(child) if ancestors.contains(&child.source) => {
                child_diags.push(
                    Diagnostic::error(
                        "Module call cycle",
                        format!(
                            "{child_path} calls {}, which is already being loaded by one of its ancestors. Module calls must not form a cycle.",
                            child.source
                        ),
                    )
                    .with_subject(call.source_range.clone()),
                );
                None
            }
            other => other,
        };

        diags.extend(child_diags.iter().cloned());
        let node = child.map(|child| build_node(child, child_path.clone(), ancestors, walker, diags));
        if node.is_none() {
            debug!(module = %child_path, "module call left unloaded");
        }
        children.insert(
            call.name.clone(),
            ModuleChild {
                node,
                diagnostics: child_diags,
            },
        );
    }

    ancestors.pop();
    ModuleTree {
        path,
        source: loaded.source,
        version: loaded.version,
        module,
        children,
    }
}

/// [`ModuleWalker`] that reads every module from one source bundle.
pub struct SourceBundleWalker<'a> {
    bundle: &'a SourceBundle,
    parser: &'a dyn ModuleParser,
}

impl<'a> SourceBundleWalker<'a> {
    pub fn new(bundle: &'a SourceBundle, parser: &'a dyn ModuleParser) -> Self {
        Self { bundle, parser }
    }

    /// Makes the same selection the bundle builder made for this call.
    fn final_source(&self, req: &ModuleRequest<'_>) -> BundleResult<FinalSource> {
        match req.source {
            ModuleSource::Local(local) => Ok(req.parent_source.resolve_relative(local)?),
            other => {
                let allowed = match req.version_constraint {
                    Some(constraint) => version_set_for_constraints(constraint)?,
                    None => VersionSet::released(),
                };
                self.bundle.final_source_for(other, &allowed)
            }
        }
    }
}

impl ModuleWalker for SourceBundleWalker<'_> {
    fn load_child(&self, req: &ModuleRequest<'_>) -> (Option<LoadedModule>, Diagnostics) {
        let subject = req.source_range.clone();
        let source = match self.final_source(req) {
            Ok(source) => source,
            Err(err) => {
                let diag = Diagnostic::error(LOAD_FAILED, format!("Invalid source address: {err}."))
                    .with_subject(subject);
                return (None, diag.into());
            }
        };

        let dir = match self.bundle.local_path_for_source(&source) {
            Ok(dir) => dir,
            Err(err) => {
                let diag = Diagnostic::error(
                    LOAD_FAILED,
                    format!(
                        "Failed to load this component's module {}: {err}. The source bundle should already contain every module it was built with, so this should not happen.",
                        req.path
                    ),
                )
                .with_subject(subject);
                return (None, diag.into());
            }
        };

        let (module, diags) = parse_module_dir(self.parser, &dir, &source, subject);
        let version = source.selected_version().cloned();
        let loaded = module.map(|module| LoadedModule {
            module,
            source,
            version,
        });
        (loaded, diags)
    }
}

fn parse_module_dir(
    parser: &dyn ModuleParser,
    dir: &Path,
    source: &FinalSource,
    subject: SourceRange,
) -> (Option<Module>, Diagnostics) {
    if !parser.is_module_dir(dir) {
        let diag = Diagnostic::error(
            LOAD_FAILED,
            format!("The source location {source} does not contain a module."),
        )
        .with_subject(subject);
        return (None, diag.into());
    }
    trace!(%source, dir = %dir.display(), "loading module directory");
    parser.load_module_dir(dir)
}

/// Loads the complete module tree rooted at `root_source`.
///
/// `subject` is the range of the source address that named the root
/// module, used for diagnostics about the root itself. Returns `None` if
/// the root module cannot be loaded or has errors; otherwise returns the
/// tree, which may contain failed child slots.
pub fn load_tree(
    bundle: &SourceBundle,
    parser: &dyn ModuleParser,
    root_source: &FinalSource,
    subject: SourceRange,
) -> (Option<ModuleTree>, Diagnostics) {
    let dir = match bundle.local_path_for_source(root_source) {
        Ok(dir) => dir,
        Err(err) => {
            let diag = Diagnostic::error(
                LOAD_FAILED,
                format!("Failed to load this component's root module: {err}."),
            )
            .with_subject(subject);
            return (None, diag.into());
        }
    };

    let (module, mut diags) = parse_module_dir(parser, &dir, root_source, subject);
    let module = match module {
        Some(module) if !diags.has_errors() => module,
        _ => return (None, diags),
    };

    let root = LoadedModule {
        module,
        source: root_source.clone(),
        version: root_source.selected_version().cloned(),
    };
    let walker = SourceBundleWalker::new(bundle, parser);
    let (tree, tree_diags) = build_tree(root, &walker);
    diags.append(tree_diags);

    debug!(
        %root_source,
        modules = tree.walk().count(),
        errors = diags.has_errors(),
        "loaded module tree"
    );
    (Some(tree), diags)
}
