//! Construction-time expressions: content-addressed, immutable, and cheap
//! to share by `Rc` clone.

use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ids::ContentId;
use crate::payload::{Payload, Selector, TypeTag};
use crate::registry::KindTag;

/// A construction-time argument: another expression, a raw literal to be
/// lifted during elaboration, or an array/record of such arguments (used
/// to build tuple-/record-shaped nodes).
#[derive(Debug, Clone)]
pub enum CArg {
    Expr(CExpr),
    Lit(Payload),
    Array(Vec<CArg>),
    Record(IndexMap<Box<str>, CArg>),
}

impl Hash for CArg {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CArg::Expr(e) => e.id().hash(state),
            CArg::Lit(p) => p.hash(state),
            CArg::Array(items) => items.hash(state),
            CArg::Record(fields) => {
                for (k, v) in fields {
                    k.hash(state);
                    v.hash(state);
                }
            }
        }
    }
}

impl From<CExpr> for CArg {
    fn from(e: CExpr) -> Self {
        CArg::Expr(e)
    }
}

impl From<i64> for CArg {
    fn from(v: i64) -> Self {
        CArg::Lit(Payload::Int(v))
    }
}

impl From<f64> for CArg {
    fn from(v: f64) -> Self {
        CArg::Lit(Payload::Float(v))
    }
}

impl From<bool> for CArg {
    fn from(v: bool) -> Self {
        CArg::Lit(Payload::Bool(v))
    }
}

impl From<&str> for CArg {
    fn from(v: &str) -> Self {
        CArg::Lit(Payload::Str(v.into()))
    }
}

#[derive(Debug)]
struct CExprNode {
    id: ContentId,
    kind: KindTag,
    args: Vec<CArg>,
    output: TypeTag,
}

/// A content-addressed construction-time expression.
///
/// `CExpr` is immutable after creation and cheap to clone (an `Rc` bump):
/// identical `(kind, args)` always produce the same [`ContentId`], so a
/// subtree built twice collapses to one adjacency entry once [`crate::elaborate::app`]
/// normalizes it, giving identical subterms a single adjacency entry.
///
/// Equality/dedup is by content id alone; this implementation does not
/// additionally verify deep structural equality on hash collision, the
/// same trade-off ordinary hash-consing schemes make.
#[derive(Debug, Clone)]
pub struct CExpr(Rc<CExprNode>);

impl CExpr {
    /// Build a new expression. `args.len()` and shape are the caller's
    /// responsibility (a constructor-returning plugin function); final
    /// arity/type validation happens in `app`.
    pub fn new(kind: impl Into<KindTag>, args: Vec<CArg>, output: TypeTag) -> Self {
        let kind = kind.into();
        let id = ContentId::of(&HashInput { kind: &kind, args: &args });
        CExpr(Rc::new(CExprNode {
            id,
            kind,
            args,
            output,
        }))
    }

    pub fn id(&self) -> ContentId {
        self.0.id
    }

    pub fn kind(&self) -> &str {
        &self.0.kind
    }

    pub fn args(&self) -> &[CArg] {
        &self.0.args
    }

    pub fn output_type(&self) -> &TypeTag {
        &self.0.output
    }

    /// Accessor overlay: `expr.field("x")` lowers to a `core/access` CExpr
    /// with args `[parent, selector]`, typed by the field's declared
    /// output. Fails if the declared output isn't record-shaped or doesn't
    /// have this field, the construction-time analogue of a
    /// host type error.
    pub fn field(&self, name: &str) -> Result<CExpr, AccessError> {
        let field_ty = self
            .output_type()
            .field(name)
            .cloned()
            .ok_or_else(|| AccessError::NoSuchField {
                field: name.into(),
                output: self.output_type().clone(),
            })?;
        Ok(CExpr::new(
            "core/access",
            vec![
                CArg::Expr(self.clone()),
                CArg::Lit(Payload::Selector(Selector::Field(name.into()))),
            ],
            field_ty,
        ))
    }

    /// Accessor overlay for array indexing: `expr[i]`.
    pub fn index(&self, i: usize) -> Result<CExpr, AccessError> {
        let elem_ty = self
            .output_type()
            .element()
            .cloned()
            .ok_or_else(|| AccessError::NotIndexable {
                output: self.output_type().clone(),
            })?;
        Ok(CExpr::new(
            "core/access",
            vec![
                CArg::Expr(self.clone()),
                CArg::Lit(Payload::Selector(Selector::Index(i))),
            ],
            elem_ty,
        ))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("no field `{field}` on a value of type {output:?}")]
    NoSuchField { field: Box<str>, output: TypeTag },
    #[error("value of type {output:?} is not indexable")]
    NotIndexable { output: TypeTag },
}

struct HashInput<'a> {
    kind: &'a str,
    args: &'a [CArg],
}

impl Hash for HashInput<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        for arg in self.args {
            arg.hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(n: i64) -> CExpr {
        CExpr::new("core/literal", vec![CArg::Lit(Payload::Int(n))], TypeTag::prim("number"))
    }

    #[test]
    fn identical_subterms_share_an_id() {
        let a = lit(3);
        let b = lit(3);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn distinct_subterms_differ() {
        let a = lit(3);
        let b = lit(4);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn composite_sharing_propagates() {
        let three = lit(3);
        let add_a = CExpr::new(
            "num/add",
            vec![CArg::from(three.clone()), CArg::from(three.clone())],
            TypeTag::prim("number"),
        );
        let add_b = CExpr::new(
            "num/add",
            vec![CArg::from(lit(3)), CArg::from(lit(3))],
            TypeTag::prim("number"),
        );
        assert_eq!(add_a.id(), add_b.id());
    }

    #[test]
    fn field_access_requires_record_output() {
        let n = lit(3);
        assert!(n.field("x").is_err());

        let mut fields = indexmap::IndexMap::new();
        fields.insert("x".into(), TypeTag::prim("number"));
        let rec = CExpr::new("core/record", vec![], TypeTag::Record(fields));
        let accessed = rec.field("x").unwrap();
        assert_eq!(accessed.kind(), "core/access");
        assert_eq!(*accessed.output_type(), TypeTag::prim("number"));
    }
}
