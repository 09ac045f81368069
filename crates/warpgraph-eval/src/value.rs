//! Runtime values produced by folding an `NExpr`.
//!
//! Distinct from [`warpgraph_core::Payload`]: a `Payload` is what a leaf
//! node carries at rest in the adjacency map (construction-time data); a
//! `Value` is what a handler computes and hands back up the fold trampoline
//! (run-time data, which also needs lists, records, and handler-defined
//! opaque results a plugin like `openai`/`stripe` would return).

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use warpgraph_core::Payload;

/// A value flowing through `fold`. Cheap to clone (everything beyond the
/// primitives is `Rc`-backed) since memoization clones a value into the
/// cache on every non-volatile completion.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Record(Rc<IndexMap<Box<str>, Value>>),
    /// An escape hatch for plugin-defined result types (an API client's
    /// response, a fiber handle, ...) that don't fit the structural shapes
    /// above. The kernel never inspects the payload; it only moves it.
    Opaque(Rc<dyn Any>),
}

impl Value {
    pub fn record(fields: impl IntoIterator<Item = (&'static str, Value)>) -> Value {
        Value::Record(Rc::new(fields.into_iter().map(|(k, v)| (k.into(), v)).collect()))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Record(_) | Value::Opaque(_) => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Payload> for Value {
    /// Lifts a leaf node's construction-time payload into a runtime value;
    /// this is what every literal handler does on entry.
    fn from(p: &Payload) -> Value {
        match p {
            Payload::Null => Value::Null,
            Payload::Bool(b) => Value::Bool(*b),
            Payload::Int(i) => Value::Int(*i),
            Payload::Float(f) => Value::Float(*f),
            Payload::Str(s) => Value::Str(Rc::from(s.as_ref())),
            Payload::Selector(sel) => Value::Str(Rc::from(format!("{sel:?}").as_str())),
            Payload::List(items) => Value::List(Rc::new(items.iter().map(Value::from).collect())),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Record(fields) => f.debug_map().entries(fields.iter()).finish(),
            Value::Opaque(_) => write!(f, "<opaque>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }
}
