//! Fold instrumentation: a trait with an inlined-away no-op implementation
//! so instrumentation costs nothing when unused, plus a print implementation
//! for ad hoc debugging. This is the crate's entire logging story — no
//! `log`/`tracing` dependency.

use warpgraph_core::NodeId;

use crate::value::Value;

/// Instrumentation hooks around the fold trampoline's state transitions.
pub trait Tracer {
    /// A handler is about to be started for `id`.
    fn trace_start(&mut self, id: &NodeId, kind: &str);
    /// The handler running for `id` yielded a request for one of its
    /// children (`child_index` is its ordinal position, not the child's own
    /// id, since the tracer may not have it handy).
    fn trace_yield(&mut self, id: &NodeId, child_index: usize, scoped: bool);
    /// `id`'s memoized value was reused without re-running its handler.
    fn trace_memo_hit(&mut self, id: &NodeId);
    /// `id` was marked tainted (volatile itself, or consumed a tainted
    /// child) and will be recomputed on every future request.
    fn trace_taint(&mut self, id: &NodeId);
    /// The handler running for `id` completed with `value`.
    fn trace_return(&mut self, id: &NodeId, value: &Value);
}

/// Optimized away entirely: every method is an inlined empty body, so a
/// `fold` driven with this tracer carries no instrumentation overhead.
pub struct NoopTracer;

impl Tracer for NoopTracer {
    #[inline(always)]
    fn trace_start(&mut self, _id: &NodeId, _kind: &str) {}
    #[inline(always)]
    fn trace_yield(&mut self, _id: &NodeId, _child_index: usize, _scoped: bool) {}
    #[inline(always)]
    fn trace_memo_hit(&mut self, _id: &NodeId) {}
    #[inline(always)]
    fn trace_taint(&mut self, _id: &NodeId) {}
    #[inline(always)]
    fn trace_return(&mut self, _id: &NodeId, _value: &Value) {}
}

/// Prints every trace event to stdout, prefixed by node id. Intended for
/// CLI debugging, not production use.
#[derive(Default)]
pub struct PrintTracer;

impl Tracer for PrintTracer {
    fn trace_start(&mut self, id: &NodeId, kind: &str) {
        println!("start  {id} {kind}");
    }

    fn trace_yield(&mut self, id: &NodeId, child_index: usize, scoped: bool) {
        if scoped {
            println!("yield  {id} -> child[{child_index}] (scoped)");
        } else {
            println!("yield  {id} -> child[{child_index}]");
        }
    }

    fn trace_memo_hit(&mut self, id: &NodeId) {
        println!("memo   {id}");
    }

    fn trace_taint(&mut self, id: &NodeId) {
        println!("taint  {id}");
    }

    fn trace_return(&mut self, id: &NodeId, value: &Value) {
        println!("return {id} = {value:?}");
    }
}
