//! The input object type of a component.

use indexmap::IndexMap;
use stackeval_config::{Module, ObjectType, TypeConstraint};

/// The type the caller's `inputs` value must conform to, plus the default
/// values applied for omitted attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct InputsType {
    pub ty: TypeConstraint,
    pub defaults: IndexMap<String, serde_json::Value>,
}

impl InputsType {
    /// The type of a component whose module tree could not be loaded.
    pub fn unknown() -> Self {
        Self {
            ty: TypeConstraint::Unknown,
            defaults: IndexMap::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.ty.is_unknown()
    }

    /// Folds a root module's variables into one object type. Variables
    /// with a default become optional attributes.
    pub fn for_module(module: &Module) -> Self {
        let mut object = ObjectType::default();
        let mut defaults = IndexMap::new();
        for (name, var) in &module.variables {
            object.attributes.insert(name.clone(), var.type_constraint.clone());
            if let Some(default) = &var.default {
                object.optional.insert(name.clone());
                defaults.insert(name.clone(), default.clone());
            }
        }
        Self {
            ty: TypeConstraint::Object(object),
            defaults,
        }
    }
}

impl Default for InputsType {
    fn default() -> Self {
        Self::unknown()
    }
}
