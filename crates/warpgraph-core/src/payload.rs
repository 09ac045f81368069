//! Opaque per-node payloads and the runtime type tags used for kind
//! validation, literal lifting, and typeclass dispatch.

use indexmap::IndexMap;
use std::hash::{Hash, Hasher};

/// A leaf payload: the `out` field of a `NodeEntry`. Used by literals,
/// input slots, state-cell references, the selector of `core/access`, and
/// the string parts of a template.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Payload {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Box<str>),
    Selector(Selector),
    List(Vec<Payload>),
}

impl Eq for Payload {}

// `Payload` carries `f64` for numeric literals, which has no total order by
// IEEE-754 rules; content-addressing only needs *some* deterministic,
// injective-enough hash over the bit pattern, not a faithful `PartialEq`.
impl Hash for Payload {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Payload::Null => {}
            Payload::Bool(b) => b.hash(state),
            Payload::Int(i) => i.hash(state),
            Payload::Float(f) => f.to_bits().hash(state),
            Payload::Str(s) => s.hash(state),
            Payload::Selector(sel) => sel.hash(state),
            Payload::List(items) => items.hash(state),
        }
    }
}

impl Payload {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Payload::Null => TypeTag::prim("null"),
            Payload::Bool(_) => TypeTag::prim("boolean"),
            Payload::Int(_) | Payload::Float(_) => TypeTag::prim("number"),
            Payload::Str(_) => TypeTag::prim("string"),
            Payload::Selector(_) => TypeTag::prim("selector"),
            Payload::List(_) => TypeTag::Unknown,
        }
    }
}

/// The selector carried by a `core/access` node: a record field name or an
/// array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Selector {
    Field(Box<str>),
    Index(usize),
}

/// A runtime type tag: the declared output type of a `CExpr`/kind, used to
/// validate elaboration against a `KindSpec` and to resolve typeclass
/// dispatch. Plugins mint their own primitive tags (`"number"`, `"string"`,
/// ...); the kernel only interprets the `Record`/`Array`/`Unknown` shapes,
/// needed by the accessor overlay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TypeTag {
    Prim(Box<str>),
    Record(IndexMap<Box<str>, TypeTag>),
    Array(Box<TypeTag>),
    /// No declared shape; accessor overlay and dispatch fall back to
    /// whatever ambient schema (if any) the embedder supplies.
    Unknown,
}

impl TypeTag {
    pub fn prim(name: &str) -> Self {
        TypeTag::Prim(name.into())
    }

    pub fn field(&self, name: &str) -> Option<&TypeTag> {
        match self {
            TypeTag::Record(fields) => fields.get(name),
            _ => None,
        }
    }

    pub fn element(&self) -> Option<&TypeTag> {
        match self {
            TypeTag::Array(elem) => Some(elem),
            _ => None,
        }
    }
}
