// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Static configuration for stack components.
//!
//! Everything here reads from a frozen [`SourceBundle`]:
//!
//! - [`sourcebundle`] maps source addresses to bundle directories and
//!   selects registry package versions
//! - [`parser`] reads one module directory into a [`Module`]
//! - [`tree`] follows module calls to build a [`ModuleTree`]
//! - [`rules`] and [`requirements`] derive facts about a loaded tree

pub mod error;
pub mod module;
pub mod parser;
pub mod requirements;
pub mod rules;
pub mod sourcebundle;
pub mod tree;
pub mod types;

pub use error::{BundleError, BundleResult, ParseError};
pub use module::{
    Module, ModuleCall, PassedProviderConfig, ProviderConfig, RequiredProvider, Resource, Variable,
};
pub use parser::{ModuleParser, YamlModuleParser, MODULE_FILENAME};
pub use rules::validate_tree_for_components;
pub use sourcebundle::{BundleManifest, SourceBundle, MANIFEST_FILENAME};
pub use tree::{
    build_tree, load_tree, LoadedModule, ModuleChild, ModulePath, ModuleRequest, ModuleTree,
    ModuleWalker, SourceBundleWalker,
};
pub use types::{ObjectType, TypeConstraint};
