//! Exceptions as thrown [`Value`]s: `fail`, `try`/`attempt` recovery,
//! conditional `guard`, and `settle` (evaluate every child regardless of
//! individual failure, partitioning the results).

use std::rc::Rc;

use indexmap::IndexMap;
use warpgraph_core::{CArg, CExpr, InputsSpec, KindSpec, KindTag, NodeEntry, NodeId, Plugin, TypeTag};
use warpgraph_eval::{Coroutine, DefaultHandlers, FnCoroutine, FoldCtx, Handler, Resumed, Step, Value};

pub struct ErrorPlugin;

impl Plugin for ErrorPlugin {
    fn name(&self) -> &'static str {
        "error"
    }

    fn kinds(&self) -> Vec<(KindTag, KindSpec)> {
        vec![
            ("error/fail".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
            ("error/try".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
            ("error/attempt".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
            ("error/guard".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
            ("error/settle".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
        ]
    }
}

/// Evaluates its one child, then throws whatever it resolved to. If the
/// child itself threw, that's propagated unchanged rather than re-thrown.
struct FailHandler;

impl Handler for FailHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let mut started = false;
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            if !started {
                started = true;
                return Ok(Step::Yield(0));
            }
            let v = resumed.into_value()?;
            Err(v.expect("fail's child always resumes with a value"))
        }))
    }
}

#[derive(Clone, Copy, PartialEq)]
enum TryStage {
    AwaitBody,
    AwaitFallback,
}

/// `try(body, fallback)`: runs `fallback` only if `body` throws, and lets a
/// failure in `fallback` itself propagate.
struct TryHandler;

impl Handler for TryHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let mut stage = TryStage::AwaitBody;
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| match stage {
            TryStage::AwaitBody => match resumed {
                Resumed::Start => Ok(Step::Yield(0)),
                Resumed::Value(v) => Ok(Step::Return(v)),
                Resumed::Thrown(_) => {
                    stage = TryStage::AwaitFallback;
                    Ok(Step::Yield(1))
                }
            },
            TryStage::AwaitFallback => {
                let v = resumed.into_value()?;
                Ok(Step::Return(v))
            }
        }))
    }
}

/// `attempt(body)`: never rethrows, reifying success or failure as
/// `{ok, value, err}`.
struct AttemptHandler;

impl Handler for AttemptHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let mut started = false;
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            if !started {
                started = true;
                return Ok(Step::Yield(0));
            }
            match resumed {
                Resumed::Value(v) => Ok(Step::Return(Value::record([
                    ("ok", Value::Bool(true)),
                    ("value", v),
                    ("err", Value::Null),
                ]))),
                Resumed::Thrown(e) => Ok(Step::Return(Value::record([
                    ("ok", Value::Bool(false)),
                    ("value", Value::Null),
                    ("err", e),
                ]))),
                Resumed::Start => unreachable!("attempt only resumes after its one yield"),
            }
        }))
    }
}

/// `guard(cond, message)`: throws `message` if `cond` is falsy, otherwise
/// returns null without evaluating `message` at all.
struct GuardHandler;

impl Handler for GuardHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let mut cond_checked = false;
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            let v = resumed.into_value()?;
            if !cond_checked {
                return match v {
                    None => Ok(Step::Yield(0)),
                    Some(cond) => {
                        cond_checked = true;
                        if cond.is_truthy() {
                            Ok(Step::Return(Value::Null))
                        } else {
                            Ok(Step::Yield(1))
                        }
                    }
                };
            }
            Err(v.expect("guard message always resumes with a value"))
        }))
    }
}

/// `settle(items...)`: evaluates every child regardless of individual
/// failure, partitioning into `{fulfilled, rejected}`.
struct SettleHandler;

impl Handler for SettleHandler {
    fn start(&self, _id: &NodeId, entry: &NodeEntry) -> Box<dyn Coroutine> {
        let n = entry.children.len();
        let mut fulfilled: Vec<Value> = Vec::new();
        let mut rejected: Vec<Value> = Vec::new();
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            match resumed {
                Resumed::Start => {}
                Resumed::Value(v) => fulfilled.push(v),
                Resumed::Thrown(v) => rejected.push(v),
            }
            let received = fulfilled.len() + rejected.len();
            if received == n {
                Ok(Step::Return(Value::record([
                    ("fulfilled", Value::List(Rc::new(fulfilled.clone()))),
                    ("rejected", Value::List(Rc::new(rejected.clone()))),
                ])))
            } else {
                Ok(Step::Yield(received))
            }
        }))
    }
}

impl DefaultHandlers for ErrorPlugin {
    fn name(&self) -> &'static str {
        "error"
    }

    fn node_kinds(&self) -> Vec<KindTag> {
        Plugin::kinds(self).into_iter().map(|(k, _)| k).collect()
    }

    fn default_interpreter(&self) -> Vec<(KindTag, Box<dyn Handler>)> {
        vec![
            ("error/fail".into(), Box::new(FailHandler)),
            ("error/try".into(), Box::new(TryHandler)),
            ("error/attempt".into(), Box::new(AttemptHandler)),
            ("error/guard".into(), Box::new(GuardHandler)),
            ("error/settle".into(), Box::new(SettleHandler)),
        ]
    }
}

pub fn fail_ctor(value: CExpr) -> CExpr {
    CExpr::new("error/fail", vec![value.into()], TypeTag::Unknown)
}

pub fn try_ctor(body: CExpr, fallback: CExpr, output: TypeTag) -> CExpr {
    CExpr::new("error/try", vec![body.into(), fallback.into()], output)
}

pub fn attempt_ctor(body: CExpr) -> CExpr {
    let mut fields = IndexMap::new();
    fields.insert("ok".into(), TypeTag::prim("boolean"));
    fields.insert("value".into(), TypeTag::Unknown);
    fields.insert("err".into(), TypeTag::Unknown);
    CExpr::new("error/attempt", vec![body.into()], TypeTag::Record(fields))
}

pub fn guard_ctor(cond: CExpr, message: CExpr) -> CExpr {
    CExpr::new("error/guard", vec![cond.into(), message.into()], TypeTag::Unknown)
}

pub fn settle_ctor(items: Vec<CExpr>) -> CExpr {
    let mut fields = IndexMap::new();
    fields.insert("fulfilled".into(), TypeTag::Array(Box::new(TypeTag::Unknown)));
    fields.insert("rejected".into(), TypeTag::Array(Box::new(TypeTag::Unknown)));
    CExpr::new("error/settle", items.into_iter().map(CArg::from).collect(), TypeTag::Record(fields))
}
