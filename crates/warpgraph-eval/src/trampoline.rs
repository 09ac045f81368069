//! The fold trampoline: a stack-safe, memoizing evaluator driven by
//! per-kind [`Coroutine`] handlers.
//!
//! Implemented as an explicit frame stack rather than native recursion, the
//! same discipline `warpgraph-core`'s elaborator uses for its own
//! post-order walk: a handler's "call a child" is a push, its "return" is a
//! pop, and the whole evaluation is driven by one `loop` with no recursive
//! Rust call in sight. This is what makes folding an arbitrarily deep DAG
//! stack-safe, tested below to depth 12,000.

use std::collections::{HashMap, HashSet};

use warpgraph_core::{KindTag, NExpr, NodeId};

use crate::error::FoldError;
use crate::handler::{Environment, FoldCtx, Interpreter, Resumed, Step};
use crate::trace::{NoopTracer, Tracer};
use crate::value::Value;

/// What the trampoline is about to resume the new top-of-stack frame with:
/// nothing yet, a child's returned value, or a child's thrown value (fed
/// back in as [`Resumed::Thrown`] rather than aborting, so a catching
/// handler gets a chance to intercept it).
enum Pending {
    None,
    Value(Value),
    Thrown(Value),
}

impl Pending {
    fn take(&mut self) -> Resumed {
        match std::mem::replace(self, Pending::None) {
            Pending::None => Resumed::Start,
            Pending::Value(v) => Resumed::Value(v),
            Pending::Thrown(v) => Resumed::Thrown(v),
        }
    }
}

/// Volatile-kind set and defensive execution limit for one `fold` call.
///
/// `max_steps` guards against a runaway custom handler rather than a
/// well-formed program; it's an explicit step counter in the same spirit as
/// an interpreter's fuel limit.
pub struct FoldOptions {
    pub volatile_kinds: HashSet<KindTag>,
    pub max_steps: Option<u64>,
}

/// `core/lambda_param` and `st/get` bypass memoization by default.
const DEFAULT_VOLATILE_KINDS: &[&str] = &["core/lambda_param", "st/get"];

/// Generous enough that no well-formed program built from this kernel's
/// reference plugins should ever hit it.
const DEFAULT_MAX_STEPS: u64 = 1_000_000;

impl Default for FoldOptions {
    fn default() -> Self {
        FoldOptions {
            volatile_kinds: DEFAULT_VOLATILE_KINDS.iter().map(|s| KindTag::from(*s)).collect(),
            max_steps: Some(DEFAULT_MAX_STEPS),
        }
    }
}

impl FoldOptions {
    /// Extend the default volatile-kind set with additional kinds a plugin
    /// or embedder wants to force to bypass memoization.
    pub fn with_extra_volatile(mut self, kinds: impl IntoIterator<Item = KindTag>) -> Self {
        self.volatile_kinds.extend(kinds);
        self
    }

    pub fn without_fuel(mut self) -> Self {
        self.max_steps = None;
        self
    }
}

struct Frame {
    id: NodeId,
    kind: KindTag,
    co: Box<dyn crate::handler::Coroutine>,
    /// Number of scope bindings pushed to reach this frame, popped again
    /// when this frame completes.
    scope_pushed: usize,
    /// Set once any child this frame consumed resolved to a tainted value;
    /// makes this node tainted too when it completes, even if its own kind
    /// isn't in `volatile_kinds`.
    saw_tainted_child: bool,
}

/// Evaluate `expr` against `interpreter`, with a [`NoopTracer`].
pub fn fold(expr: &NExpr, interpreter: &Interpreter, options: &FoldOptions) -> Result<Value, FoldError> {
    fold_with_tracer(expr, interpreter, options, &mut NoopTracer)
}

/// Evaluate `expr`, reporting every trampoline transition to `tracer`.
pub fn fold_with_tracer(
    expr: &NExpr,
    interpreter: &Interpreter,
    options: &FoldOptions,
    tracer: &mut dyn Tracer,
) -> Result<Value, FoldError> {
    let env = Environment::new();
    let mut memo: HashMap<NodeId, Value> = HashMap::new();
    let mut tainted: HashSet<NodeId> = HashSet::new();
    let mut scope: Vec<(NodeId, Value)> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut pending = Pending::None;
    let mut steps: u64 = 0;

    request_child(
        expr,
        interpreter,
        options,
        tracer,
        &mut stack,
        &mut memo,
        &tainted,
        expr.root.clone(),
        0,
        &mut pending,
    )?;

    loop {
        if stack.is_empty() {
            return match pending {
                Pending::Value(v) => Ok(v),
                Pending::Thrown(v) => Err(FoldError::Handler(v)),
                Pending::None => Err(FoldError::RootNotEvaluated(expr.root.clone())),
            };
        }

        steps += 1;
        if let Some(max) = options.max_steps {
            if steps > max {
                return Err(FoldError::FuelExhausted);
            }
        }

        let top = stack.last_mut().expect("checked non-empty above");
        let ctx = FoldCtx::new(&scope, &env, expr);
        let resumed = pending.take();
        let result = top.co.resume(resumed, &ctx);

        let step = match result {
            Ok(step) => step,
            Err(thrown) => {
                let frame = stack.pop().expect("top was just borrowed");
                for _ in 0..frame.scope_pushed {
                    scope.pop();
                }
                // Thrown values are never memoized: the node didn't
                // successfully produce one, so a later request for the same
                // id just re-runs it.
                pending = Pending::Thrown(thrown);
                continue;
            }
        };

        match step {
            Step::Return(value) => {
                let frame = stack.pop().expect("top was just borrowed");
                tracer.trace_return(&frame.id, &value);
                for _ in 0..frame.scope_pushed {
                    scope.pop();
                }
                let is_volatile = options.volatile_kinds.contains(frame.kind.as_ref());
                let becomes_tainted = is_volatile || frame.saw_tainted_child;
                if becomes_tainted {
                    tainted.insert(frame.id.clone());
                    tracer.trace_taint(&frame.id);
                } else {
                    memo.insert(frame.id.clone(), value.clone());
                }
                if let Some(parent) = stack.last_mut() {
                    if becomes_tainted {
                        parent.saw_tainted_child = true;
                    }
                }
                pending = Pending::Value(value);
            }
            Step::Yield(i) => {
                let id = top.id.clone();
                let kind = top.kind.clone();
                let child_id = child_at(expr, &id, &kind, i)?;
                tracer.trace_yield(&id, i, false);
                request_child(
                    expr,
                    interpreter,
                    options,
                    tracer,
                    &mut stack,
                    &mut memo,
                    &tainted,
                    child_id,
                    0,
                    &mut pending,
                )?;
            }
            Step::YieldScoped { child_index, bindings } => {
                let id = top.id.clone();
                let kind = top.kind.clone();
                let child_id = child_at(expr, &id, &kind, child_index)?;
                tracer.trace_yield(&id, child_index, true);
                let n = bindings.len();
                scope.extend(bindings);
                request_child(
                    expr,
                    interpreter,
                    options,
                    tracer,
                    &mut stack,
                    &mut memo,
                    &tainted,
                    child_id,
                    n,
                    &mut pending,
                )?;
            }
            Step::YieldNode(id_to_eval) => {
                let id = top.id.clone();
                tracer.trace_yield(&id, 0, false);
                request_child(
                    expr,
                    interpreter,
                    options,
                    tracer,
                    &mut stack,
                    &mut memo,
                    &tainted,
                    id_to_eval,
                    0,
                    &mut pending,
                )?;
            }
            Step::YieldScopedNode { id: id_to_eval, bindings } => {
                let id = top.id.clone();
                tracer.trace_yield(&id, 0, true);
                let n = bindings.len();
                scope.extend(bindings);
                request_child(
                    expr,
                    interpreter,
                    options,
                    tracer,
                    &mut stack,
                    &mut memo,
                    &tainted,
                    id_to_eval,
                    n,
                    &mut pending,
                )?;
            }
        }
    }
}

fn child_at(expr: &NExpr, id: &NodeId, kind: &KindTag, index: usize) -> Result<NodeId, FoldError> {
    let entry = expr.get(id).expect("frame id is always a live adjacency key");
    entry
        .children
        .nth(index)
        .cloned()
        .ok_or_else(|| FoldError::BadChildIndex {
            id: id.clone(),
            kind: kind.clone(),
            index,
        })
}

/// Resolve a requested child: a memo hit delivers its cached value directly
/// into `pending` without pushing a frame; a volatile or tainted id has its
/// memo entry dropped and is re-evaluated; anything else starts a fresh
/// [`Coroutine`] and pushes a new frame for the trampoline to drive.
#[allow(clippy::too_many_arguments)]
fn request_child(
    expr: &NExpr,
    interpreter: &Interpreter,
    options: &FoldOptions,
    tracer: &mut dyn Tracer,
    stack: &mut Vec<Frame>,
    memo: &mut HashMap<NodeId, Value>,
    tainted: &HashSet<NodeId>,
    child_id: NodeId,
    scope_pushed: usize,
    pending: &mut Pending,
) -> Result<(), FoldError> {
    let entry = expr
        .get(&child_id)
        .ok_or_else(|| FoldError::MissingNode(child_id.clone()))?;
    let is_volatile = options.volatile_kinds.contains(entry.kind.as_ref());
    let is_tainted = tainted.contains(&child_id);

    if !is_volatile && !is_tainted {
        if let Some(cached) = memo.get(&child_id) {
            tracer.trace_memo_hit(&child_id);
            *pending = Pending::Value(cached.clone());
            return Ok(());
        }
    } else {
        memo.remove(&child_id);
    }

    let handler = interpreter
        .get(&entry.kind)
        .ok_or_else(|| FoldError::UnknownHandler(entry.kind.clone()))?;
    tracer.trace_start(&child_id, &entry.kind);
    let co = handler.start(&child_id, entry);
    stack.push(Frame {
        id: child_id,
        kind: entry.kind.clone(),
        co,
        scope_pushed,
        saw_tainted_child: false,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Coroutine, FnCoroutine, Resumed};
    use warpgraph_core::{CArg, CExpr, InputsSpec, KindSpec, Plugin, Registry, TypeTag};

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
            ]
        }
        fn lifts(&self) -> Vec<(&'static str, KindTag)> {
            vec![("number", "num/literal".into())]
        }
    }

    fn lit(n: i64) -> CExpr {
        CExpr::new(
            "num/literal",
            vec![CArg::Lit(warpgraph_core::Payload::Int(n))],
            TypeTag::prim("number"),
        )
    }

    fn add(a: CExpr, b: CExpr) -> CExpr {
        CExpr::new("num/add", vec![a.into(), b.into()], TypeTag::prim("number"))
    }

    struct LiteralHandler;
    impl crate::handler::Handler for LiteralHandler {
        fn start(&self, _id: &NodeId, entry: &warpgraph_core::NodeEntry) -> Box<dyn Coroutine> {
            let v = Value::from(entry.out.as_ref().expect("literal always carries a payload"));
            Box::new(FnCoroutine(move |_: Resumed, _: &FoldCtx| Ok(Step::Return(v.clone()))))
        }
    }

    fn interpreter() -> Interpreter {
        let mut interp = Interpreter::new();
        interp.insert("num/literal", Box::new(LiteralHandler));
        interp
    }

    #[test]
    fn literal_folds_to_its_value() {
        let reg = Registry::compose(&[&NumPlugin]).unwrap();
        let n = warpgraph_core::app(&lit(42), &reg).unwrap();
        let interp = interpreter();
        let v = fold(&n, &interp, &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Int(42));
    }

    #[test]
    fn shared_literal_handler_runs_once() {
        use std::cell::Cell;
        use std::rc::Rc;

        let reg = Registry::compose(&[&NumPlugin]).unwrap();
        let n = warpgraph_core::app(&add(lit(3), lit(3)), &reg).unwrap();

        let calls = Rc::new(Cell::new(0u32));
        struct CountingAdd;
        impl crate::handler::Handler for CountingAdd {
            fn start(&self, _id: &NodeId, _entry: &warpgraph_core::NodeEntry) -> Box<dyn Coroutine> {
                let mut got_left: Option<Value> = None;
                Box::new(FnCoroutine(move |input: Resumed, _: &FoldCtx| {
                    let input = input.into_value()?;
                    match got_left {
                        None if input.is_none() => Ok(Step::Yield(0)),
                        None => {
                            got_left = input;
                            Ok(Step::Yield(1))
                        }
                        Some(ref l) => {
                            let left = l.as_int().unwrap();
                            let right = input.unwrap().as_int().unwrap();
                            Ok(Step::Return(Value::Int(left + right)))
                        }
                    }
                }))
            }
        }
        struct CountingLiteral {
            calls: Rc<Cell<u32>>,
        }
        impl crate::handler::Handler for CountingLiteral {
            fn start(&self, _id: &NodeId, entry: &warpgraph_core::NodeEntry) -> Box<dyn Coroutine> {
                self.calls.set(self.calls.get() + 1);
                let v = Value::from(entry.out.as_ref().unwrap());
                Box::new(FnCoroutine(move |_: Resumed, _: &FoldCtx| Ok(Step::Return(v.clone()))))
            }
        }

        let mut interp = Interpreter::new();
        interp.insert("num/add", Box::new(CountingAdd));
        interp.insert("num/literal", Box::new(CountingLiteral { calls: calls.clone() }));

        let v = fold(&n, &interp, &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Int(6));
        assert_eq!(calls.get(), 1, "literal handler should run exactly once (shared child memoized)");
    }

    #[test]
    fn folds_a_deeply_nested_chain_without_overflowing_the_host_stack() {
        struct AddHandler;
        impl crate::handler::Handler for AddHandler {
            fn start(&self, _id: &NodeId, _entry: &warpgraph_core::NodeEntry) -> Box<dyn Coroutine> {
                let mut left: Option<Value> = None;
                Box::new(FnCoroutine(move |input: Resumed, _: &FoldCtx| {
                    let input = input.into_value()?;
                    match left {
                        None if input.is_none() => Ok(Step::Yield(0)),
                        None => {
                            left = input;
                            Ok(Step::Yield(1))
                        }
                        Some(ref l) => Ok(Step::Return(Value::Int(l.as_int().unwrap() + input.unwrap().as_int().unwrap()))),
                    }
                }))
            }
        }

        const DEPTH: i64 = 12_000;
        let mut expr = lit(0);
        for _ in 0..DEPTH {
            expr = add(expr, lit(1));
        }
        let reg = Registry::compose(&[&NumPlugin]).unwrap();
        let n = warpgraph_core::app(&expr, &reg).unwrap();

        let mut interp = Interpreter::new();
        interp.insert("num/literal", Box::new(LiteralHandler));
        interp.insert("num/add", Box::new(AddHandler));

        let v = fold(&n, &interp, &FoldOptions::default().without_fuel()).unwrap();
        assert_eq!(v, Value::Int(DEPTH));
    }

    #[test]
    fn unknown_handler_surfaces_as_fold_error() {
        let reg = Registry::compose(&[&NumPlugin]).unwrap();
        let n = warpgraph_core::app(&lit(1), &reg).unwrap();
        let interp = Interpreter::new();
        let err = fold(&n, &interp, &FoldOptions::default()).unwrap_err();
        assert!(matches!(err, FoldError::UnknownHandler(_)));
    }
}
