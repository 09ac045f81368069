//! The per-kind coroutine handler protocol the fold trampoline drives.
//!
//! Stable Rust has no first-class generators, so a handler is modeled as an
//! explicit state machine instead: an enum of `Yield(i) | YieldScoped{i,
//! bindings} | Return(value)` with a `resume` step function. `start`
//! manufactures one such state machine per node evaluation; the trampoline
//! resumes it by feeding back the value of whichever child it last asked
//! for.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use warpgraph_core::{KindTag, NExpr, NodeEntry, NodeId};

use crate::value::Value;

/// What a [`Coroutine`] asks the trampoline to do next.
pub enum Step {
    /// Evaluate `children[i]` of my own node and resume me with its value.
    Yield(usize),
    /// Evaluate `children[i]` in a lexical scope enriched with `bindings`
    /// (used by `core/lambda`'s default handler to bind `core/lambda_param`
    /// reads for the duration of the body's evaluation).
    YieldScoped {
        child_index: usize,
        bindings: Vec<(NodeId, Value)>,
    },
    /// Evaluate an arbitrary node elsewhere in the adjacency map, not one of
    /// my own children. Needed by `core/apply`'s default handler: beta
    /// reduction evaluates a `core/lambda`'s *body*, which is a child of the
    /// lambda node, not of the `core/apply` node driving the reduction.
    YieldNode(NodeId),
    /// [`Step::YieldNode`] plus scope bindings, the combination `core/apply`
    /// and `fiber/par_map` actually use: jump to the lambda body and bind its
    /// parameter for the duration.
    YieldScopedNode {
        id: NodeId,
        bindings: Vec<(NodeId, Value)>,
    },
    /// The handler is done; this is the node's computed value.
    Return(Value),
}

/// What a [`Coroutine`] is resumed with: nothing yet (first call), the
/// value of the child it last yielded for, or — if that child's own
/// evaluation threw — the thrown value instead. A coroutine that doesn't
/// care about catching simply propagates the latter with `?` (`Coroutine::
/// resume` returns `Result<Step, Value>`, so `resumed.into_value()?`
/// rethrows unchanged). `error/try`/`error/attempt`/`error/guard`/
/// `error/settle`'s default handlers are exactly the coroutines that match
/// on `Resumed::Thrown` themselves instead.
pub enum Resumed {
    Start,
    Value(Value),
    Thrown(Value),
}

impl Resumed {
    /// `Ok(None)` on `Start`, `Ok(Some(v))` on `Value(v)`, `Err(v)` on
    /// `Thrown(v)` — written so a non-catching handler can just write
    /// `let v = resumed.into_value()?;` and have a re-thrown child
    /// exception propagate as its own.
    pub fn into_value(self) -> Result<Option<Value>, Value> {
        match self {
            Resumed::Start => Ok(None),
            Resumed::Value(v) => Ok(Some(v)),
            Resumed::Thrown(v) => Err(v),
        }
    }
}

/// A restartable, per-evaluation state machine. `resume` is called once to
/// start it (with [`Resumed::Start`]) and once more per yield, fed either
/// the value of the child it last asked for or, if that child threw, the
/// thrown value — still as a resumption, not an abort, so a catching
/// handler (`error/try` and friends) gets a chance to intercept it.
///
/// Errors are the thrown [`Value`] itself, not a Rust error type: the
/// error-handling handlers catch and inspect thrown *values*, so a
/// handler failure has to carry one.
pub trait Coroutine {
    fn resume(&mut self, resumed: Resumed, ctx: &FoldCtx) -> Result<Step, Value>;
}

/// Read-only context a [`Coroutine`] can consult while stepping: the
/// current lexical scope (for `core/lambda_param`) and the per-fold
/// ambient [`Environment`] (for plugins like mutable-state cells that need
/// a store scoped to one `fold` invocation, not to the handler's own
/// lifetime).
pub struct FoldCtx<'a> {
    scope: &'a [(NodeId, Value)],
    env: &'a Environment,
    adj: &'a NExpr,
}

impl<'a> FoldCtx<'a> {
    pub fn new(scope: &'a [(NodeId, Value)], env: &'a Environment, adj: &'a NExpr) -> Self {
        FoldCtx { scope, env, adj }
    }

    /// The innermost binding for `param_id`, if one is in scope. Used by
    /// `core/lambda_param`'s default handler: its own node id *is* the
    /// parameter identity, so it looks itself up here rather than reading
    /// anything from its (empty) children.
    pub fn lookup(&self, param_id: &NodeId) -> Option<&Value> {
        self.scope.iter().rev().find(|(id, _)| id == param_id).map(|(_, v)| v)
    }

    pub fn env(&self) -> &Environment {
        self.env
    }

    /// Read-only structural peek at another node's entry — evaluating
    /// nothing, just inspecting shape. `core/apply`'s default handler uses
    /// this to read a neighboring `core/lambda`'s own children (its
    /// parameter and body ids) without running anything.
    pub fn entry(&self, id: &NodeId) -> Option<&'a NodeEntry> {
        self.adj.get(id)
    }
}

/// Produces a fresh [`Coroutine`] for one evaluation of a node of a given
/// kind. Implementations are typically a plain function pointer or closure
/// wrapped with [`from_fn`].
pub trait Handler {
    fn start(&self, id: &NodeId, entry: &NodeEntry) -> Box<dyn Coroutine>;
}

impl<F> Handler for F
where
    F: Fn(&NodeId, &NodeEntry) -> Box<dyn Coroutine>,
{
    fn start(&self, id: &NodeId, entry: &NodeEntry) -> Box<dyn Coroutine> {
        self(id, entry)
    }
}

/// Wraps a plain step function (`FnMut(Resumed, &FoldCtx) -> Result<Step, Value>`)
/// as a [`Coroutine`], for handlers whose state is small enough to capture
/// directly in a closure rather than defining a named struct.
pub struct FnCoroutine<F>(pub F)
where
    F: FnMut(Resumed, &FoldCtx) -> Result<Step, Value>;

impl<F> Coroutine for FnCoroutine<F>
where
    F: FnMut(Resumed, &FoldCtx) -> Result<Step, Value>,
{
    fn resume(&mut self, resumed: Resumed, ctx: &FoldCtx) -> Result<Step, Value> {
        (self.0)(resumed, ctx)
    }
}

/// Per-`fold`-invocation ambient storage, keyed by type.
///
/// This exists because some default handlers need state that outlives any
/// single node's [`Coroutine`] but must not leak between separate `fold`
/// calls: the mutable-state plugin's store is the motivating case, since
/// each fold must own a fresh key-value store rather than reuse one from a
/// previous evaluation. Modeled as a small type-keyed map the way
/// `http::Extensions`/`task_local!` slots are in the wider ecosystem, since
/// nothing in the kernel itself needs more than that.
#[derive(Default)]
pub struct Environment {
    slots: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get this fold's shared slot of type `T`, creating it with
    /// `T::default()` on first access.
    pub fn slot<T: Any + Default>(&self) -> Rc<T> {
        let mut slots = self.slots.borrow_mut();
        slots
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Rc::new(T::default()) as Rc<dyn Any>)
            .clone()
            .downcast::<T>()
            .expect("slot keyed by TypeId always downcasts to the type that created it")
    }
}

/// A mapping from node kind to [`Handler`], consulted once per node
/// evaluation by the trampoline.
#[derive(Default)]
pub struct Interpreter {
    handlers: HashMap<KindTag, Box<dyn Handler>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: impl Into<KindTag>, handler: Box<dyn Handler>) {
        self.handlers.insert(kind.into(), handler);
    }

    pub fn get(&self, kind: &str) -> Option<&dyn Handler> {
        self.handlers.get(kind).map(|h| h.as_ref())
    }
}
