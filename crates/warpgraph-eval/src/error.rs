//! Errors the fold trampoline itself can raise, distinct from a
//! handler-thrown value (carried in [`FoldError::Handler`], which forwards
//! the thrown [`Value`] unwrapped and unreinterpreted, so handler-thrown
//! exceptions propagate unchanged).

use warpgraph_core::{KindTag, NodeId};

use crate::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum FoldError {
    #[error("no handler registered for kind `{0}`")]
    UnknownHandler(KindTag),
    #[error("node `{0}` was requested but is not present in the adjacency map")]
    MissingNode(NodeId),
    #[error("node `{id}` (kind `{kind}`) yielded child index {index}, beyond its children")]
    BadChildIndex { id: NodeId, kind: KindTag, index: usize },
    #[error("root node `{0}` was never evaluated (trampoline bug)")]
    RootNotEvaluated(NodeId),
    #[error("fold exceeded its execution fuel")]
    FuelExhausted,
    #[error("handler threw: {0:?}")]
    Handler(Value),
}
