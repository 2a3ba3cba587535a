//! Type constraints for input variables.
//!
//! Variable declarations carry a type constraint written as a small type
//! expression, for example `list(string)` or
//! `object({ name = string, port = optional(number) })`. This module parses
//! those expressions into [`TypeConstraint`] values.

use std::fmt;

use indexmap::{IndexMap, IndexSet};

/// A type that a value must conform to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeConstraint {
    /// Any value is accepted
    Any,
    String,
    Number,
    Bool,
    List(Box<TypeConstraint>),
    Set(Box<TypeConstraint>),
    Map(Box<TypeConstraint>),
    Object(ObjectType),
    /// The type could not be determined; consumers treat it as "cannot
    /// proceed, already reported"
    Unknown,
}

/// An object type with named attributes, some of which may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectType {
    pub attributes: IndexMap<String, TypeConstraint>,
    pub optional: IndexSet<String>,
}

impl ObjectType {
    pub fn is_optional(&self, name: &str) -> bool {
        self.optional.contains(name)
    }
}

impl TypeConstraint {
    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeConstraint::Unknown)
    }

    /// Parses a type expression.
    pub fn parse(expr: &str) -> Result<Self, String> {
        let mut parser = TypeParser { src: expr, pos: 0 };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != expr.len() {
            return Err(format!(
                "unexpected {:?} after type expression",
                &expr[parser.pos..]
            ));
        }
        Ok(ty)
    }
}

struct TypeParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn ident(&mut self) -> Result<&'a str, String> {
        self.skip_ws();
        let src: &'a str = self.src;
        let rest = &src[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(format!("expected a type name at {:?}", rest));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn expect(&mut self, ch: char) -> Result<(), String> {
        self.skip_ws();
        if self.src[self.pos..].starts_with(ch) {
            self.pos += ch.len_utf8();
            Ok(())
        } else {
            Err(format!("expected {ch:?} at {:?}", &self.src[self.pos..]))
        }
    }

    fn peek(&mut self, ch: char) -> bool {
        self.skip_ws();
        self.src[self.pos..].starts_with(ch)
    }

    fn parse_type(&mut self) -> Result<TypeConstraint, String> {
        let name = self.ident()?;
        match name {
            "any" => Ok(TypeConstraint::Any),
            "string" => Ok(TypeConstraint::String),
            "number" => Ok(TypeConstraint::Number),
            "bool" => Ok(TypeConstraint::Bool),
            "list" | "set" | "map" => {
                self.expect('(')?;
                let elem = Box::new(self.parse_type()?);
                self.expect(')')?;
                Ok(match name {
                    "list" => TypeConstraint::List(elem),
                    "set" => TypeConstraint::Set(elem),
                    _ => TypeConstraint::Map(elem),
                })
            }
            "object" => {
                self.expect('(')?;
                self.expect('{')?;
                let mut obj = ObjectType::default();
                while !self.peek('}') {
                    let attr = self.ident()?.to_string();
                    self.expect('=')?;
                    let (ty, optional) = self.parse_attr_type()?;
                    if optional {
                        obj.optional.insert(attr.clone());
                    }
                    obj.attributes.insert(attr, ty);
                    if !self.peek('}') {
                        self.expect(',')?;
                    }
                }
                self.expect('}')?;
                self.expect(')')?;
                Ok(TypeConstraint::Object(obj))
            }
            "optional" => Err("optional(...) is only allowed for object attributes".to_string()),
            other => Err(format!("unknown type {other:?}")),
        }
    }

    fn parse_attr_type(&mut self) -> Result<(TypeConstraint, bool), String> {
        let start = self.pos;
        if self.ident()? == "optional" {
            self.expect('(')?;
            let ty = self.parse_type()?;
            self.expect(')')?;
            return Ok((ty, true));
        }
        self.pos = start;
        Ok((self.parse_type()?, false))
    }
}

impl fmt::Display for TypeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeConstraint::Any => f.write_str("any"),
            TypeConstraint::String => f.write_str("string"),
            TypeConstraint::Number => f.write_str("number"),
            TypeConstraint::Bool => f.write_str("bool"),
            TypeConstraint::List(t) => write!(f, "list({t})"),
            TypeConstraint::Set(t) => write!(f, "set({t})"),
            TypeConstraint::Map(t) => write!(f, "map({t})"),
            TypeConstraint::Object(obj) => {
                f.write_str("object({")?;
                for (i, (name, ty)) in obj.attributes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if obj.is_optional(name) {
                        write!(f, "{name} = optional({ty})")?;
                    } else {
                        write!(f, "{name} = {ty}")?;
                    }
                }
                f.write_str("})")
            }
            TypeConstraint::Unknown => f.write_str("unknown"),
        }
    }
}
