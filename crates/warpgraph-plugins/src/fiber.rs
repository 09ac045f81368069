//! Concurrency shapes without a real scheduler: `par_map` runs a lambda over
//! a list item by item (sequentially — there is no thread pool here, just
//! the trampoline revisiting the lambda body once per element), and
//! `timeout` evaluates its body unconditionally, ignoring the deadline.

use std::rc::Rc;

use warpgraph_core::{CExpr, InputsSpec, KindSpec, KindTag, NodeEntry, NodeId, Plugin, TypeTag};
use warpgraph_eval::{Coroutine, DefaultHandlers, FnCoroutine, FoldCtx, Handler, Resumed, Step, Value};

use crate::core::as_lambda;

pub struct FiberPlugin;

impl Plugin for FiberPlugin {
    fn name(&self) -> &'static str {
        "fiber"
    }

    fn kinds(&self) -> Vec<(KindTag, KindSpec)> {
        vec![
            ("fiber/par_map".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
            ("fiber/timeout".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
        ]
    }
}

fn as_list(v: &Value) -> Result<Rc<Vec<Value>>, Value> {
    match v {
        Value::List(items) => Ok(items.clone()),
        other => Err(Value::Str(Rc::from(format!("expected a list, got {other:?}")))),
    }
}

/// `par_map(list, lambda)`: resolves the list and the lambda, then folds the
/// lambda body once per element, threading each result back through the
/// trampoline rather than recursing.
struct ParMapHandler;

impl Handler for ParMapHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let mut list: Option<Rc<Vec<Value>>> = None;
        let mut lambda: Option<crate::core::LambdaVal> = None;
        let mut results: Vec<Value> = Vec::new();
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            let v = resumed.into_value()?;
            if list.is_none() {
                return match v {
                    None => Ok(Step::Yield(0)),
                    Some(val) => {
                        list = Some(as_list(&val)?);
                        Ok(Step::Yield(1))
                    }
                };
            }
            if lambda.is_none() {
                lambda = Some(as_lambda(&v.expect("lambda operand always resumes with a value"))?);
            } else {
                results.push(v.expect("mapped item always resumes with a value"));
            }
            let items = list.as_ref().expect("list resolved before the lambda");
            let lv = lambda.as_ref().expect("lambda resolved just above or on a prior resume");
            if results.len() == items.len() {
                Ok(Step::Return(Value::List(Rc::new(results.clone()))))
            } else {
                let item = items[results.len()].clone();
                Ok(Step::YieldScopedNode { id: lv.body.clone(), bindings: vec![(lv.param.clone(), item)] })
            }
        }))
    }
}

/// `timeout(duration, body)`: the duration is evaluated and discarded —
/// there is no scheduler here to actually race it against the body.
struct TimeoutHandler;

impl Handler for TimeoutHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let mut past_duration = false;
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            let v = resumed.into_value()?;
            if !past_duration {
                return match v {
                    None => Ok(Step::Yield(0)),
                    Some(_) => {
                        past_duration = true;
                        Ok(Step::Yield(1))
                    }
                };
            }
            Ok(Step::Return(v.expect("body always resumes with a value")))
        }))
    }
}

impl DefaultHandlers for FiberPlugin {
    fn name(&self) -> &'static str {
        "fiber"
    }

    fn node_kinds(&self) -> Vec<KindTag> {
        Plugin::kinds(self).into_iter().map(|(k, _)| k).collect()
    }

    fn default_interpreter(&self) -> Vec<(KindTag, Box<dyn Handler>)> {
        vec![
            ("fiber/par_map".into(), Box::new(ParMapHandler)),
            ("fiber/timeout".into(), Box::new(TimeoutHandler)),
        ]
    }
}

pub fn par_map_ctor(list: CExpr, lambda: CExpr, element: TypeTag) -> CExpr {
    CExpr::new("fiber/par_map", vec![list.into(), lambda.into()], TypeTag::Array(Box::new(element)))
}

pub fn timeout_ctor(duration: CExpr, body: CExpr, output: TypeTag) -> CExpr {
    CExpr::new("fiber/timeout", vec![duration.into(), body.into()], output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{lambda_ctor, lambda_param_ctor, tuple_ctor, CorePlugin};
    use crate::num::{add_ctor, literal as num_literal, NumPlugin};
    use warpgraph_core::{app, Registry};
    use warpgraph_eval::{defaults, fold, FoldOptions};

    fn registry() -> Registry {
        Registry::compose(&[&FiberPlugin, &CorePlugin, &NumPlugin]).unwrap()
    }

    fn interpreter() -> warpgraph_eval::Interpreter {
        defaults(&[&FiberPlugin, &CorePlugin, &NumPlugin], Default::default()).unwrap()
    }

    #[test]
    fn par_map_doubles_every_element() {
        let reg = registry();
        let param = lambda_param_ctor("x");
        let doubled = add_ctor(param.clone(), param.clone());
        let lambda = lambda_ctor(param, doubled);
        let list = tuple_ctor(vec![num_literal(1), num_literal(2), num_literal(3)]);
        let expr = par_map_ctor(list, lambda, TypeTag::prim("number"));
        let n = app(&expr, &reg).unwrap();
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::List(std::rc::Rc::new(vec![Value::Int(2), Value::Int(4), Value::Int(6)])));
    }

    #[test]
    fn par_map_over_empty_list_is_empty() {
        let reg = registry();
        let param = lambda_param_ctor("x");
        let lambda = lambda_ctor(param.clone(), param);
        let list = tuple_ctor(vec![]);
        let expr = par_map_ctor(list, lambda, TypeTag::Unknown);
        let n = app(&expr, &reg).unwrap();
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::List(std::rc::Rc::new(vec![])));
    }

    #[test]
    fn timeout_ignores_its_deadline() {
        let reg = registry();
        let expr = timeout_ctor(num_literal(1000), num_literal(42), TypeTag::prim("number"));
        let n = app(&expr, &reg).unwrap();
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Int(42));
    }
}
