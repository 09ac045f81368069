//! The elaborator: `app(cexpr) -> NExpr`.
//!
//! Implemented as an explicit-stack post-order DFS rather than native Rust
//! recursion, so elaboration itself does not reintroduce the stack-depth
//! fragility the fold trampoline is built to avoid.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::cexpr::{CArg, CExpr};
use crate::graph::{Children, NExpr, NodeEntry};
use crate::ids::{ContentId, IdGen, NodeId};
use crate::payload::{Payload, TypeTag};
use crate::registry::{InputsSpec, KindTag, Registry, Shape};

#[derive(Debug, thiserror::Error)]
pub enum ElaborateError {
    #[error("unknown kind `{0}`")]
    UnknownKind(KindTag),
    #[error("kind `{kind}` expected {expected} operand(s), got {got}")]
    ArityMismatch {
        kind: KindTag,
        expected: usize,
        got: usize,
    },
    #[error("kind `{kind}` operand {position}: expected {expected:?}, got {got:?}")]
    TypeMismatch {
        kind: KindTag,
        position: usize,
        expected: TypeTag,
        got: TypeTag,
    },
    #[error("no plugin declares a lift for literal {0:?}")]
    UnliftableLiteral(Payload),
}

/// Positions of a node's arguments after shape resolution, still carrying
/// the original `CArg`s so both the child-discovery pass (`Enter`) and the
/// entry-building pass (`Exit`) agree on ordering.
enum Positions<'a> {
    Ordered(Vec<&'a CArg>),
    Named(Vec<(&'a str, &'a CArg)>),
}

fn resolve_positions<'a>(e: &'a CExpr, shape: Shape) -> Result<Positions<'a>, ElaborateError> {
    match shape {
        Shape::List | Shape::Tuple => {
            let mut out = Vec::with_capacity(e.args().len());
            for arg in e.args() {
                match arg {
                    CArg::Expr(_) | CArg::Lit(_) => out.push(arg),
                    CArg::Array(_) | CArg::Record(_) => {
                        return Err(ElaborateError::TypeMismatch {
                            kind: e.kind().into(),
                            position: out.len(),
                            expected: TypeTag::Unknown,
                            got: TypeTag::Unknown,
                        });
                    }
                }
            }
            Ok(Positions::Ordered(out))
        }
        Shape::Record => {
            if e.args().len() != 1 {
                return Err(ElaborateError::ArityMismatch {
                    kind: e.kind().into(),
                    expected: 1,
                    got: e.args().len(),
                });
            }
            match &e.args()[0] {
                CArg::Record(fields) => Ok(Positions::Named(
                    fields.iter().map(|(k, v)| (k.as_ref(), v)).collect(),
                )),
                _ => Err(ElaborateError::TypeMismatch {
                    kind: e.kind().into(),
                    position: 0,
                    expected: TypeTag::Record(Default::default()),
                    got: TypeTag::Unknown,
                }),
            }
        }
    }
}

fn arg_output_type(arg: &CArg) -> TypeTag {
    match arg {
        CArg::Expr(e) => e.output_type().clone(),
        CArg::Lit(p) => p.type_tag(),
        CArg::Array(_) | CArg::Record(_) => TypeTag::Unknown,
    }
}

fn validate_inputs(kind: &str, spec: &InputsSpec, types: &[TypeTag]) -> Result<(), ElaborateError> {
    match spec {
        InputsSpec::Fixed(expected) => {
            if expected.len() != types.len() {
                return Err(ElaborateError::ArityMismatch {
                    kind: kind.into(),
                    expected: expected.len(),
                    got: types.len(),
                });
            }
            for (i, (want, got)) in expected.iter().zip(types).enumerate() {
                if want != got && *want != TypeTag::Unknown {
                    return Err(ElaborateError::TypeMismatch {
                        kind: kind.into(),
                        position: i,
                        expected: want.clone(),
                        got: got.clone(),
                    });
                }
            }
            Ok(())
        }
        InputsSpec::Variadic(want) => {
            for (i, got) in types.iter().enumerate() {
                if want != got && *want != TypeTag::Unknown {
                    return Err(ElaborateError::TypeMismatch {
                        kind: kind.into(),
                        position: i,
                        expected: want.clone(),
                        got: got.clone(),
                    });
                }
            }
            Ok(())
        }
        InputsSpec::Any => Ok(()),
    }
}

struct ElabCtx<'r, 'g> {
    registry: &'r Registry,
    visited: HashMap<ContentId, NodeId>,
    adj: &'g mut IndexMap<NodeId, NodeEntry>,
    idgen: &'g mut IdGen,
}

impl<'r, 'g> ElabCtx<'r, 'g> {
    fn lift_literal(&mut self, payload: &Payload) -> Result<NodeId, ElaborateError> {
        let TypeTag::Prim(type_name) = payload.type_tag() else {
            return Err(ElaborateError::UnliftableLiteral(payload.clone()));
        };
        let lift_kind = self
            .registry
            .lift_kind(&type_name)
            .ok_or_else(|| ElaborateError::UnliftableLiteral(payload.clone()))?
            .clone();

        let cid = ContentId::of(&(&*lift_kind, payload));
        if let Some(id) = self.visited.get(&cid) {
            return Ok(id.clone());
        }
        let id = self.idgen.next_id();
        self.adj
            .insert(id.clone(), NodeEntry::leaf(lift_kind, Some(payload.clone())));
        self.visited.insert(cid, id.clone());
        Ok(id)
    }

    /// Resolve a single argument to its already-elaborated `NodeId`.
    /// `CArg::Expr` children must already be in `visited` by the time this
    /// runs (the Enter/Exit stack discipline below guarantees it); literal
    /// args are lifted on demand.
    fn resolve_arg(&mut self, arg: &CArg) -> Result<NodeId, ElaborateError> {
        match arg {
            CArg::Expr(e) => Ok(self
                .visited
                .get(&e.id())
                .cloned()
                .expect("child elaborated before parent (post-order invariant)")),
            CArg::Lit(p) => self.lift_literal(p),
            CArg::Array(_) | CArg::Record(_) => unreachable!("rejected by resolve_positions"),
        }
    }

    fn direct_children(&self, e: &CExpr) -> Result<Vec<CExpr>, ElaborateError> {
        let shape = self.registry.shape_of(e.kind());
        let positions = resolve_positions(e, shape)?;
        let args: Vec<&CArg> = match positions {
            Positions::Ordered(args) => args,
            Positions::Named(fields) => fields.into_iter().map(|(_, v)| v).collect(),
        };
        Ok(args
            .into_iter()
            .filter_map(|a| match a {
                CArg::Expr(child) => Some(child.clone()),
                _ => None,
            })
            .collect())
    }

    fn build_entry(&mut self, e: &CExpr) -> Result<NodeEntry, ElaborateError> {
        let shape = self.registry.shape_of(e.kind());
        let positions = resolve_positions(e, shape)?;

        let spec = self.registry.kind_spec(e.kind());

        let children = match positions {
            Positions::Ordered(args) => {
                if let Some(spec) = spec {
                    let types: Vec<TypeTag> = args.iter().map(|a| arg_output_type(a)).collect();
                    validate_inputs(e.kind(), &spec.inputs, &types)?;
                }
                let ids = args
                    .into_iter()
                    .map(|a| self.resolve_arg(a))
                    .collect::<Result<Vec<_>, _>>()?;
                if shape == Shape::Tuple {
                    Children::Tuple(ids)
                } else {
                    Children::List(ids)
                }
            }
            Positions::Named(fields) => {
                if let Some(spec) = spec {
                    let types: Vec<TypeTag> = fields.iter().map(|(_, a)| arg_output_type(a)).collect();
                    validate_inputs(e.kind(), &spec.inputs, &types)?;
                }
                let mut map = IndexMap::new();
                for (name, arg) in fields {
                    let id = self.resolve_arg(arg)?;
                    map.insert(name.into(), id);
                }
                Children::Record(map)
            }
        };

        // Leaf payload: carried by kinds whose own construction args embed
        // an opaque value directly (literals, access selectors) rather than
        // structural children. Surfaced only for leaf-shaped kinds (no
        // children) that carried a literal/selector argument; anything else
        // leaves `out` unset.
        let out = if children.is_empty() {
            e.args().iter().find_map(|a| match a {
                CArg::Lit(p) => Some(p.clone()),
                _ => None,
            })
        } else {
            None
        };

        Ok(NodeEntry::new(e.kind(), children, out))
    }

    fn elaborate(&mut self, root: &CExpr) -> Result<NodeId, ElaborateError> {
        enum Frame {
            Enter(CExpr),
            Exit(CExpr),
        }

        let mut stack = vec![Frame::Enter(root.clone())];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(e) => {
                    if self.visited.contains_key(&e.id()) {
                        continue;
                    }
                    if !self.registry.known_kind(e.kind()) {
                        return Err(ElaborateError::UnknownKind(e.kind().into()));
                    }
                    stack.push(Frame::Exit(e.clone()));
                    for child in self.direct_children(&e)? {
                        stack.push(Frame::Enter(child));
                    }
                }
                Frame::Exit(e) => {
                    if self.visited.contains_key(&e.id()) {
                        continue;
                    }
                    let entry = self.build_entry(&e)?;
                    let id = self.idgen.next_id();
                    self.adj.insert(id.clone(), entry);
                    self.visited.insert(e.id(), id);
                }
            }
        }
        Ok(self
            .visited
            .get(&root.id())
            .cloned()
            .expect("root elaborated by the loop above"))
    }
}

/// Walk a `CExpr` root, performing post-order DFS: allocate sequential ids,
/// validate kinds/arity/types against the registry, lift raw literals, and
/// emit a fully normalized `NExpr`.
pub fn app(root: &CExpr, registry: &Registry) -> Result<NExpr, ElaborateError> {
    let mut adj = IndexMap::new();
    let mut idgen = IdGen::new();
    let root_id = elaborate_into(&mut adj, &mut idgen, registry, root)?;
    Ok(NExpr {
        root: root_id,
        adj,
        counter: idgen,
    })
}

/// Elaborate `root` against an already-populated adjacency map and id
/// generator, continuing its sequence rather than starting fresh. `app`
/// is just this called against a blank map. Structural sharing is only
/// tracked among `root`'s own descendants in this call, not against
/// whatever the workspace already contains.
fn elaborate_into(
    adj: &mut IndexMap<NodeId, NodeEntry>,
    idgen: &mut IdGen,
    registry: &Registry,
    root: &CExpr,
) -> Result<NodeId, ElaborateError> {
    let mut ctx = ElabCtx {
        registry,
        visited: HashMap::new(),
        adj,
        idgen,
    };
    ctx.elaborate(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{KindSpec, Plugin};

    struct NumPlugin;
    impl Plugin for NumPlugin {
        fn name(&self) -> &'static str {
            "num"
        }
        fn kinds(&self) -> Vec<(KindTag, KindSpec)> {
            let num = TypeTag::prim("number");
            vec![
                ("num/literal".into(), KindSpec::new(InputsSpec::Any, num.clone())),
                (
                    "num/add".into(),
                    KindSpec::new(InputsSpec::Fixed(vec![num.clone(), num.clone()]), num.clone()),
                ),
                (
                    "num/mul".into(),
                    KindSpec::new(InputsSpec::Fixed(vec![num.clone(), num.clone()]), num),
                ),
            ]
        }
        fn lifts(&self) -> Vec<(&'static str, KindTag)> {
            vec![("number", "num/literal".into())]
        }
    }

    fn registry() -> Registry {
        Registry::compose(&[&NumPlugin]).unwrap()
    }

    fn lit(n: i64) -> CExpr {
        CExpr::new(
            "num/literal",
            vec![CArg::Lit(Payload::Int(n))],
            TypeTag::prim("number"),
        )
    }

    fn add(a: CExpr, b: CExpr) -> CExpr {
        CExpr::new("num/add", vec![a.into(), b.into()], TypeTag::prim("number"))
    }

    fn mul(a: CExpr, b: CExpr) -> CExpr {
        CExpr::new("num/mul", vec![a.into(), b.into()], TypeTag::prim("number"))
    }

    #[test]
    fn arithmetic_sharing_scenario() {
        // mul(add(lit 3, lit 4), lit 5): 5 distinct adjacency entries.
        let reg = registry();
        let expr = mul(add(lit(3), lit(4)), lit(5));
        let n = app(&expr, &reg).unwrap();
        assert_eq!(n.adj.len(), 5);
    }

    #[test]
    fn dag_sharing_scenario() {
        // add(lit 3, lit 3): 2 entries, both children the same id.
        let reg = registry();
        let expr = add(lit(3), lit(3));
        let n = app(&expr, &reg).unwrap();
        assert_eq!(n.adj.len(), 2);
        let root = n.root_entry();
        match &root.children {
            Children::List(ids) => {
                assert_eq!(ids.len(), 2);
                assert_eq!(ids[0], ids[1]);
            }
            _ => panic!("expected list children"),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let reg = registry();
        let bogus = CExpr::new("bogus/op", vec![], TypeTag::prim("number"));
        let err = app(&bogus, &reg).unwrap_err();
        assert!(matches!(err, ElaborateError::UnknownKind(_)));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let reg = registry();
        let bad = CExpr::new("num/add", vec![lit(1).into()], TypeTag::prim("number"));
        let err = app(&bad, &reg).unwrap_err();
        assert!(matches!(err, ElaborateError::ArityMismatch { .. }));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        struct StrPlugin;
        impl Plugin for StrPlugin {
            fn name(&self) -> &'static str {
                "str"
            }
            fn kinds(&self) -> Vec<(KindTag, KindSpec)> {
                vec![(
                    "str/literal".into(),
                    KindSpec::new(InputsSpec::Any, TypeTag::prim("string")),
                )]
            }
        }
        let reg = Registry::compose(&[&NumPlugin, &StrPlugin]).unwrap();
        let s = CExpr::new(
            "str/literal",
            vec![CArg::Lit(Payload::Str("x".into()))],
            TypeTag::prim("string"),
        );
        let bad = add(s, lit(1));
        let err = app(&bad, &reg).unwrap_err();
        assert!(matches!(err, ElaborateError::TypeMismatch { .. }));
    }
}
