//! Structural and control-flow primitives with no type of their own:
//! tuples, records, field/index access, and closures (`core/lambda`,
//! `core/lambda_param`, `core/apply`).
//!
//! `core/access` nodes are minted by [`warpgraph_core::CExpr::field`]/
//! [`warpgraph_core::CExpr::index`] rather than a constructor exported from
//! here; this plugin only supplies the kind declarations and default
//! handlers those calls end up elaborating against.

use std::rc::Rc;

use warpgraph_core::{
    CArg, CExpr, Children, InputsSpec, KindSpec, KindTag, NodeEntry, NodeId, Payload, Plugin, Selector, TypeTag,
};
use warpgraph_eval::{Coroutine, DefaultHandlers, FnCoroutine, FoldCtx, Handler, Resumed, Step, Value};

use indexmap::IndexMap;

pub struct CorePlugin;

impl Plugin for CorePlugin {
    fn name(&self) -> &'static str {
        "core"
    }

    fn kinds(&self) -> Vec<(KindTag, KindSpec)> {
        vec![
            ("core/selector".into(), KindSpec::new(InputsSpec::Any, TypeTag::prim("selector"))),
            ("core/access".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
            ("core/tuple".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
            ("core/record".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
            ("core/lambda_param".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
            ("core/lambda".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
            ("core/apply".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
        ]
    }

    fn shapes(&self) -> Vec<(KindTag, warpgraph_core::Shape)> {
        vec![
            ("core/tuple".into(), warpgraph_core::Shape::Tuple),
            ("core/record".into(), warpgraph_core::Shape::Record),
        ]
    }

    fn lifts(&self) -> Vec<(&'static str, KindTag)> {
        vec![("selector", "core/selector".into())]
    }
}

/// A closure value: the `core/lambda` node that produced it only records
/// which of its own two children is the parameter and which is the body;
/// `core/apply`'s default handler reads both back out of this to drive beta
/// reduction via [`Step::YieldScopedNode`].
#[derive(Clone)]
pub struct LambdaVal {
    pub param: NodeId,
    pub body: NodeId,
}

pub fn as_lambda(v: &Value) -> Result<LambdaVal, Value> {
    match v {
        Value::Opaque(rc) => rc
            .downcast_ref::<LambdaVal>()
            .cloned()
            .ok_or_else(|| Value::Str(Rc::from("expected a lambda value"))),
        other => Err(Value::Str(Rc::from(format!("expected a lambda value, got {other:?}")))),
    }
}

struct SelectorHandler;

impl Handler for SelectorHandler {
    fn start(&self, _id: &NodeId, entry: &NodeEntry) -> Box<dyn Coroutine> {
        let sel = match &entry.out {
            Some(Payload::Selector(sel)) => sel.clone(),
            _ => unreachable!("core/selector always carries a Selector payload"),
        };
        Box::new(FnCoroutine(move |_: Resumed, _: &FoldCtx| {
            Ok(Step::Return(Value::Opaque(Rc::new(sel.clone()))))
        }))
    }
}

fn as_selector(v: &Value) -> Result<Selector, Value> {
    match v {
        Value::Opaque(rc) => rc
            .downcast_ref::<Selector>()
            .cloned()
            .ok_or_else(|| Value::Str(Rc::from("expected a selector value"))),
        other => Err(Value::Str(Rc::from(format!("expected a selector value, got {other:?}")))),
    }
}

struct AccessHandler;

impl Handler for AccessHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let mut parent: Option<Value> = None;
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            let v = resumed.into_value()?;
            match &parent {
                None if v.is_none() => Ok(Step::Yield(0)),
                None => {
                    parent = v;
                    Ok(Step::Yield(1))
                }
                Some(p) => {
                    let sel = as_selector(&v.expect("selector operand always resumes with a value"))?;
                    match (&sel, p) {
                        (Selector::Field(name), Value::Record(fields)) => fields
                            .get(name.as_ref())
                            .cloned()
                            .map(Step::Return)
                            .ok_or_else(|| Value::Str(Rc::from(format!("no field `{name}`")))),
                        (Selector::Index(i), Value::List(items)) => items
                            .get(*i)
                            .cloned()
                            .map(Step::Return)
                            .ok_or_else(|| Value::Str(Rc::from(format!("index {i} out of bounds")))),
                        _ => Err(Value::Str(Rc::from("selector does not match accessed value's shape"))),
                    }
                }
            }
        }))
    }
}

struct TupleHandler;

impl Handler for TupleHandler {
    fn start(&self, _id: &NodeId, entry: &NodeEntry) -> Box<dyn Coroutine> {
        let n = entry.children.len();
        let mut values: Vec<Value> = Vec::with_capacity(n);
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            if let Some(v) = resumed.into_value()? {
                values.push(v);
            }
            if values.len() == n {
                Ok(Step::Return(Value::List(Rc::new(values.clone()))))
            } else {
                Ok(Step::Yield(values.len()))
            }
        }))
    }
}

struct RecordHandler;

impl Handler for RecordHandler {
    fn start(&self, _id: &NodeId, entry: &NodeEntry) -> Box<dyn Coroutine> {
        let keys: Vec<Box<str>> = match &entry.children {
            Children::Record(fields) => fields.keys().cloned().collect(),
            _ => Vec::new(),
        };
        let n = keys.len();
        let mut values: Vec<Value> = Vec::with_capacity(n);
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            if let Some(v) = resumed.into_value()? {
                values.push(v);
            }
            if values.len() == n {
                let map: IndexMap<Box<str>, Value> = keys.iter().cloned().zip(values.iter().cloned()).collect();
                Ok(Step::Return(Value::Record(Rc::new(map))))
            } else {
                Ok(Step::Yield(values.len()))
            }
        }))
    }
}

struct LambdaParamHandler;

impl Handler for LambdaParamHandler {
    fn start(&self, id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let id = id.clone();
        Box::new(FnCoroutine(move |_: Resumed, ctx: &FoldCtx| match ctx.lookup(&id) {
            Some(v) => Ok(Step::Return(v.clone())),
            None => Err(Value::Str(Rc::from(format!("unbound lambda parameter `{id}`")))),
        }))
    }
}

/// Never yields: a closure's value is just its own (param, body) ids,
/// captured directly from `entry.children` without evaluating either.
struct LambdaHandler;

impl Handler for LambdaHandler {
    fn start(&self, _id: &NodeId, entry: &NodeEntry) -> Box<dyn Coroutine> {
        let (param, body) = match &entry.children {
            Children::List(ids) if ids.len() == 2 => (ids[0].clone(), ids[1].clone()),
            _ => unreachable!("core/lambda always has exactly [param, body] children"),
        };
        Box::new(FnCoroutine(move |_: Resumed, _: &FoldCtx| {
            Ok(Step::Return(Value::Opaque(Rc::new(LambdaVal {
                param: param.clone(),
                body: body.clone(),
            }))))
        }))
    }
}

/// Evaluates its own two children (the lambda, the argument), then jumps to
/// the lambda's body with the parameter bound for the duration — the
/// beta-reduction step [`Step::YieldScopedNode`] exists to express.
struct ApplyHandler;

impl Handler for ApplyHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let mut lambda_val: Option<LambdaVal> = None;
        let mut applied = false;
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            let v = resumed.into_value()?;
            if lambda_val.is_none() {
                return match v {
                    None => Ok(Step::Yield(0)),
                    Some(lv) => {
                        lambda_val = Some(as_lambda(&lv)?);
                        Ok(Step::Yield(1))
                    }
                };
            }
            if !applied {
                let arg = v.expect("argument operand always resumes with a value");
                let lv = lambda_val.clone().expect("lambda resolved before argument");
                applied = true;
                return Ok(Step::YieldScopedNode {
                    id: lv.body,
                    bindings: vec![(lv.param, arg)],
                });
            }
            Ok(Step::Return(v.expect("lambda body always resumes with a value")))
        }))
    }
}

impl DefaultHandlers for CorePlugin {
    fn name(&self) -> &'static str {
        "core"
    }

    fn node_kinds(&self) -> Vec<KindTag> {
        Plugin::kinds(self).into_iter().map(|(k, _)| k).collect()
    }

    fn default_interpreter(&self) -> Vec<(KindTag, Box<dyn Handler>)> {
        vec![
            ("core/selector".into(), Box::new(SelectorHandler)),
            ("core/access".into(), Box::new(AccessHandler)),
            ("core/tuple".into(), Box::new(TupleHandler)),
            ("core/record".into(), Box::new(RecordHandler)),
            ("core/lambda_param".into(), Box::new(LambdaParamHandler)),
            ("core/lambda".into(), Box::new(LambdaHandler)),
            ("core/apply".into(), Box::new(ApplyHandler)),
        ]
    }
}

pub fn lambda_param_ctor(name: &str) -> CExpr {
    CExpr::new("core/lambda_param", vec![CArg::Lit(Payload::Str(name.into()))], TypeTag::Unknown)
}

pub fn lambda_ctor(param: CExpr, body: CExpr) -> CExpr {
    CExpr::new("core/lambda", vec![param.into(), body.into()], TypeTag::Unknown)
}

pub fn apply_ctor(lambda: CExpr, arg: CExpr) -> CExpr {
    CExpr::new("core/apply", vec![lambda.into(), arg.into()], TypeTag::Unknown)
}

pub fn tuple_ctor(items: Vec<CExpr>) -> CExpr {
    CExpr::new("core/tuple", items.into_iter().map(CArg::from).collect(), TypeTag::Unknown)
}

pub fn record_ctor(fields: Vec<(&str, CExpr)>) -> CExpr {
    let mut map = IndexMap::new();
    for (k, v) in fields {
        map.insert(k.into(), CArg::from(v));
    }
    CExpr::new("core/record", vec![CArg::Record(map)], TypeTag::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::{literal as num_literal, NumPlugin};
    use warpgraph_core::{app, Registry};
    use warpgraph_eval::{defaults, fold, FoldOptions};

    fn registry() -> Registry {
        Registry::compose(&[&CorePlugin, &NumPlugin]).unwrap()
    }

    fn interpreter() -> warpgraph_eval::Interpreter {
        defaults(&[&CorePlugin, &NumPlugin], Default::default()).unwrap()
    }

    #[test]
    fn identity_lambda_applies_to_its_argument() {
        let reg = registry();
        let param = lambda_param_ctor("x");
        let lambda = lambda_ctor(param.clone(), param);
        let expr = apply_ctor(lambda, num_literal(7));
        let n = app(&expr, &reg).unwrap();
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Int(7));
    }

    #[test]
    fn nested_lambda_shadowing_resolves_to_innermost_binding() {
        let reg = registry();
        let x = lambda_param_ctor("x");
        let inner = lambda_ctor(x.clone(), x.clone());
        let outer_body = apply_ctor(inner, num_literal(99));
        let outer = lambda_ctor(x, outer_body);
        let expr = apply_ctor(outer, num_literal(1));
        let n = app(&expr, &reg).unwrap();
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Int(99));
    }

    #[test]
    fn tuple_and_field_access_round_trip() {
        let reg = registry();
        let rec = record_ctor(vec![("a", num_literal(1)), ("b", num_literal(2))]);
        let rec_ty = TypeTag::Record({
            let mut fields = IndexMap::new();
            fields.insert("a".into(), TypeTag::prim("number"));
            fields.insert("b".into(), TypeTag::prim("number"));
            fields
        });
        let typed = CExpr::new("core/record", rec.args().to_vec(), rec_ty);
        let access = typed.field("b").unwrap();
        let n = app(&access, &reg).unwrap();
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Int(2));
    }
}
