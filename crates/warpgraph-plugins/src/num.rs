//! Arithmetic over `number` (integers and floats share one runtime type, the
//! way a dynamically-typed embedded DSL usually treats them): literals,
//! `add`/`sub`/`mul`/`div`/`neg`, comparison, and the `eq`/`ord`/`semiring`/
//! `show` typeclass implementations for `"number"`.

use std::collections::HashMap;
use std::rc::Rc;

use warpgraph_core::{
    CArg, CExpr, InputsSpec, KindSpec, KindTag, NodeEntry, NodeId, Payload, Plugin, TraitImpl, TypeTag,
};
use warpgraph_eval::{Coroutine, DefaultHandlers, FnCoroutine, FoldCtx, Handler, Resumed, Step, Value};

fn number() -> TypeTag {
    TypeTag::prim("number")
}

fn boolean() -> TypeTag {
    TypeTag::prim("boolean")
}

pub struct NumPlugin;

impl Plugin for NumPlugin {
    fn name(&self) -> &'static str {
        "num"
    }

    fn kinds(&self) -> Vec<(KindTag, KindSpec)> {
        let n = number();
        let b = boolean();
        vec![
            ("num/literal".into(), KindSpec::new(InputsSpec::Any, n.clone())),
            ("num/add".into(), KindSpec::new(InputsSpec::Fixed(vec![n.clone(), n.clone()]), n.clone())),
            ("num/sub".into(), KindSpec::new(InputsSpec::Fixed(vec![n.clone(), n.clone()]), n.clone())),
            ("num/mul".into(), KindSpec::new(InputsSpec::Fixed(vec![n.clone(), n.clone()]), n.clone())),
            ("num/div".into(), KindSpec::new(InputsSpec::Fixed(vec![n.clone(), n.clone()]), n.clone())),
            ("num/neg".into(), KindSpec::new(InputsSpec::Fixed(vec![n.clone()]), n.clone())),
            ("num/eq".into(), KindSpec::new(InputsSpec::Fixed(vec![n.clone(), n.clone()]), b.clone())),
            ("num/lt".into(), KindSpec::new(InputsSpec::Fixed(vec![n.clone(), n.clone()]), b)),
            ("num/show".into(), KindSpec::new(InputsSpec::Fixed(vec![n]), TypeTag::prim("string"))),
        ]
    }

    fn lifts(&self) -> Vec<(&'static str, KindTag)> {
        vec![("number", "num/literal".into())]
    }

    fn traits(&self) -> Vec<TraitImpl> {
        let eq = trait_impl("eq", number(), &[("eq", "num/eq")]);
        let ord = trait_impl("ord", number(), &[("lt", "num/lt")]);
        let semiring = trait_impl("semiring", number(), &[("add", "num/add"), ("mul", "num/mul")]);
        let show = trait_impl("show", number(), &[("show", "num/show")]);
        // Minimal stubs: one primitive impl apiece, just enough to exercise
        // dispatch across every named typeclass without a full leaf-plugin
        // surface for each.
        let semigroup = trait_impl("semigroup", number(), &[("concat", "num/add")]);
        let monoid = trait_impl("monoid", number(), &[("concat", "num/add")]);
        let bounded = trait_impl("bounded", number(), &[("top", "num/literal"), ("bottom", "num/literal")]);
        vec![eq, ord, semiring, show, semigroup, monoid, bounded]
    }
}

fn trait_impl(trait_name: &'static str, type_tag: TypeTag, ops: &[(&'static str, &str)]) -> TraitImpl {
    let mut node_kinds = HashMap::new();
    for (op, kind) in ops {
        node_kinds.insert(*op, KindTag::from(*kind));
    }
    TraitImpl { trait_name, type_tag, node_kinds }
}

/// Either exactly `i64` or exactly `f64`; arithmetic stays integral unless a
/// float operand forces it to widen, mirroring how most dynamically-typed
/// languages treat the two.
enum Num {
    Int(i64),
    Float(f64),
}

fn as_num(v: &Value) -> Result<Num, Value> {
    match v {
        Value::Int(i) => Ok(Num::Int(*i)),
        Value::Float(f) => Ok(Num::Float(*f)),
        other => Err(Value::Str(Rc::from(format!("expected a number, got {other:?}")))),
    }
}

fn binary(a: Value, b: Value, int_op: fn(i64, i64) -> Option<i64>, float_op: fn(f64, f64) -> f64) -> Result<Value, Value> {
    match (as_num(&a)?, as_num(&b)?) {
        (Num::Int(x), Num::Int(y)) => match int_op(x, y) {
            Some(v) => Ok(Value::Int(v)),
            None => Err(Value::Str(Rc::from("division by zero"))),
        },
        (x, y) => {
            let fx = match x {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            };
            let fy = match y {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            };
            Ok(Value::Float(float_op(fx, fy)))
        }
    }
}

/// A two-child handler that waits for both operands, then resolves with a
/// pure function of the pair — the shape every `num/*` binary op shares.
struct BinaryOp(fn(Value, Value) -> Result<Value, Value>);

impl Handler for BinaryOp {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let f = self.0;
        let mut left: Option<Value> = None;
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            let v = resumed.into_value()?;
            match &left {
                None if v.is_none() => Ok(Step::Yield(0)),
                None => {
                    left = v;
                    Ok(Step::Yield(1))
                }
                Some(l) => f(l.clone(), v.expect("second yield always resumes with a value")).map(Step::Return),
            }
        }))
    }
}

struct UnaryOp(fn(Value) -> Result<Value, Value>);

impl Handler for UnaryOp {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let f = self.0;
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            let v = resumed.into_value()?;
            match v {
                None => Ok(Step::Yield(0)),
                Some(v) => f(v).map(Step::Return),
            }
        }))
    }
}

struct LiteralHandler;

impl Handler for LiteralHandler {
    fn start(&self, _id: &NodeId, entry: &NodeEntry) -> Box<dyn Coroutine> {
        let v = Value::from(entry.out.as_ref().expect("num/literal always carries a payload"));
        Box::new(FnCoroutine(move |_: Resumed, _: &FoldCtx| Ok(Step::Return(v.clone()))))
    }
}

fn add(a: Value, b: Value) -> Result<Value, Value> {
    binary(a, b, |x, y| x.checked_add(y), |x, y| x + y)
}
fn sub(a: Value, b: Value) -> Result<Value, Value> {
    binary(a, b, |x, y| x.checked_sub(y), |x, y| x - y)
}
fn mul(a: Value, b: Value) -> Result<Value, Value> {
    binary(a, b, |x, y| x.checked_mul(y), |x, y| x * y)
}
fn div(a: Value, b: Value) -> Result<Value, Value> {
    binary(a, b, |x, y| if y == 0 { None } else { Some(x / y) }, |x, y| x / y)
}
fn eq(a: Value, b: Value) -> Result<Value, Value> {
    let (x, y) = (as_num(&a)?, as_num(&b)?);
    Ok(Value::Bool(num_as_f64(x) == num_as_f64(y)))
}
fn lt(a: Value, b: Value) -> Result<Value, Value> {
    let (x, y) = (as_num(&a)?, as_num(&b)?);
    if let (Num::Int(x), Num::Int(y)) = (&x, &y) {
        return Ok(Value::Bool(x < y));
    }
    Ok(Value::Bool(num_as_f64(x) < num_as_f64(y)))
}
fn num_as_f64(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    }
}
fn neg(a: Value) -> Result<Value, Value> {
    match as_num(&a)? {
        Num::Int(i) => Ok(Value::Int(-i)),
        Num::Float(f) => Ok(Value::Float(-f)),
    }
}
fn show(a: Value) -> Result<Value, Value> {
    match a {
        Value::Int(i) => Ok(Value::Str(Rc::from(i.to_string()))),
        Value::Float(f) => Ok(Value::Str(Rc::from(f.to_string()))),
        other => Err(Value::Str(Rc::from(format!("expected a number, got {other:?}")))),
    }
}

impl DefaultHandlers for NumPlugin {
    fn name(&self) -> &'static str {
        "num"
    }

    fn node_kinds(&self) -> Vec<KindTag> {
        Plugin::kinds(self).into_iter().map(|(k, _)| k).collect()
    }

    fn default_interpreter(&self) -> Vec<(KindTag, Box<dyn Handler>)> {
        vec![
            ("num/literal".into(), Box::new(LiteralHandler)),
            ("num/add".into(), Box::new(BinaryOp(add))),
            ("num/sub".into(), Box::new(BinaryOp(sub))),
            ("num/mul".into(), Box::new(BinaryOp(mul))),
            ("num/div".into(), Box::new(BinaryOp(div))),
            ("num/eq".into(), Box::new(BinaryOp(eq))),
            ("num/lt".into(), Box::new(BinaryOp(lt))),
            ("num/neg".into(), Box::new(UnaryOp(neg))),
            ("num/show".into(), Box::new(UnaryOp(show))),
        ]
    }
}

/// User-facing constructors — the `ctors` a plugin contributes.
pub fn literal(n: i64) -> CExpr {
    CExpr::new("num/literal", vec![CArg::Lit(Payload::Int(n))], number())
}

pub fn literal_f(n: f64) -> CExpr {
    CExpr::new("num/literal", vec![CArg::Lit(Payload::Float(n))], number())
}

pub fn add_ctor(a: CExpr, b: CExpr) -> CExpr {
    CExpr::new("num/add", vec![a.into(), b.into()], number())
}

pub fn sub_ctor(a: CExpr, b: CExpr) -> CExpr {
    CExpr::new("num/sub", vec![a.into(), b.into()], number())
}

pub fn mul_ctor(a: CExpr, b: CExpr) -> CExpr {
    CExpr::new("num/mul", vec![a.into(), b.into()], number())
}

pub fn div_ctor(a: CExpr, b: CExpr) -> CExpr {
    CExpr::new("num/div", vec![a.into(), b.into()], number())
}

pub fn neg_ctor(a: CExpr) -> CExpr {
    CExpr::new("num/neg", vec![a.into()], number())
}

pub fn eq_ctor(a: CExpr, b: CExpr) -> CExpr {
    CExpr::new("num/eq", vec![a.into(), b.into()], boolean())
}

pub fn lt_ctor(a: CExpr, b: CExpr) -> CExpr {
    CExpr::new("num/lt", vec![a.into(), b.into()], boolean())
}

pub fn show_ctor(a: CExpr) -> CExpr {
    CExpr::new("num/show", vec![a.into()], TypeTag::prim("string"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpgraph_core::{app, Registry};
    use warpgraph_eval::{defaults, fold, FoldOptions};

    fn registry() -> Registry {
        Registry::compose(&[&NumPlugin]).unwrap()
    }

    fn interpreter() -> warpgraph_eval::Interpreter {
        defaults(&[&NumPlugin], Default::default()).unwrap()
    }

    #[test]
    fn arithmetic_sharing_scenario() {
        let reg = registry();
        let expr = mul_ctor(add_ctor(literal(3), literal(4)), literal(5));
        let n = app(&expr, &reg).unwrap();
        assert_eq!(n.adj.len(), 5);
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Int(35));
    }

    #[test]
    fn dag_sharing_runs_shared_literal_once() {
        let reg = registry();
        let expr = add_ctor(literal(3), literal(3));
        let n = app(&expr, &reg).unwrap();
        assert_eq!(n.adj.len(), 2);
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Int(6));
    }

    #[test]
    fn division_by_zero_throws() {
        let reg = registry();
        let n = app(&div_ctor(literal(1), literal(0)), &reg).unwrap();
        let err = fold(&n, &interpreter(), &FoldOptions::default()).unwrap_err();
        match err {
            warpgraph_eval::FoldError::Handler(Value::Str(s)) => assert_eq!(&*s, "division by zero"),
            other => panic!("expected a handler-thrown division-by-zero, got {other:?}"),
        }
    }

    #[test]
    fn float_widening_on_mixed_operands() {
        let reg = registry();
        let n = app(&add_ctor(literal(1), literal_f(1.5)), &reg).unwrap();
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Float(2.5));
    }

    #[test]
    fn replace_add_with_sub_then_fold() {
        use warpgraph_core::predicate::by_kind;
        use warpgraph_core::transform::{commit, open, replace_where};

        let reg = registry();
        let n = app(&add_ctor(literal(10), literal(3)), &reg).unwrap();
        let mut d = open(n);
        // the node's operands (10, 3) are untouched -- only its kind changes
        replace_where(&mut d, &by_kind("num/add"), "num/sub");
        let committed = commit(d).unwrap();
        let v = fold(&committed, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Int(7));
    }

    #[test]
    fn pipe_composition_replaces_then_retunes_literals() {
        use warpgraph_core::predicate::by_kind;
        use warpgraph_core::transform::{commit, map_where, open, pipe, replace_where, CommitError, DirtyExpr};
        use warpgraph_core::Payload;

        let n = app(&mul_ctor(add_ctor(literal(3), literal(4)), literal(5)), &registry()).unwrap();
        let mut d = open(n);
        let transform = pipe(vec![
            Box::new(|d: &mut DirtyExpr| -> Result<(), CommitError> {
                replace_where(d, &by_kind("num/add"), "num/sub");
                Ok(())
            }),
            Box::new(|d: &mut DirtyExpr| -> Result<(), CommitError> {
                map_where(d, &by_kind("num/literal"), |entry| {
                    let mut tripled = entry.clone();
                    if let Some(Payload::Int(v)) = tripled.out {
                        tripled.out = Some(Payload::Int(v * 3));
                    }
                    tripled
                });
                Ok(())
            }),
        ]);
        transform(&mut d).unwrap();
        let committed = commit(d).unwrap();
        let v = fold(&committed, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Int(-45));
    }
}
