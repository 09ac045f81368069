//! The adjacency map and its node entries: the physical representation
//! shared by `NExpr` and `DirtyExpr`.

use indexmap::IndexMap;

use crate::ids::{IdGen, NodeId};
use crate::payload::Payload;
use crate::registry::KindTag;

/// How a single node's children are laid out.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Children {
    /// Plain ordered list, most kinds.
    List(Vec<NodeId>),
    /// Tuple-shaped: a single array of element ids (`core/tuple`, ...).
    Tuple(Vec<NodeId>),
    /// Record-shaped: a single `{field -> id}` mapping.
    Record(IndexMap<Box<str>, NodeId>),
}

impl Children {
    pub fn empty() -> Self {
        Children::List(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Children::List(ids) | Children::Tuple(ids) => ids.is_empty(),
            Children::Record(fields) => fields.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Children::List(ids) | Children::Tuple(ids) => ids.len(),
            Children::Record(fields) => fields.len(),
        }
    }

    /// The id at ordinal position `i`, regardless of shape (record fields
    /// are visited in insertion order). Used by the fold trampoline, which
    /// addresses children by their yielded index.
    pub fn nth(&self, i: usize) -> Option<&NodeId> {
        match self {
            Children::List(ids) | Children::Tuple(ids) => ids.get(i),
            Children::Record(fields) => fields.get_index(i).map(|(_, v)| v),
        }
    }
}

/// Flattens any child shape into the linear set of ids it references, for
/// reachability analysis, dangling-reference checks, and predicate
/// matching (`isLeaf`, `hasChildCount`).
pub fn extract_child_ids(children: &Children) -> Vec<NodeId> {
    match children {
        Children::List(ids) | Children::Tuple(ids) => ids.clone(),
        Children::Record(fields) => fields.values().cloned().collect(),
    }
}

/// One vertex in the DAG.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeEntry {
    pub kind: KindTag,
    pub children: Children,
    pub out: Option<Payload>,
}

impl NodeEntry {
    pub fn new(kind: impl Into<KindTag>, children: Children, out: Option<Payload>) -> Self {
        Self {
            kind: kind.into(),
            children,
            out,
        }
    }

    pub fn leaf(kind: impl Into<KindTag>, out: Option<Payload>) -> Self {
        Self::new(kind, Children::empty(), out)
    }
}

/// An alias entry is metadata: `kind == "@alias"`, one child (the aliased
/// target), keyed under `"@name"` in the adjacency map. Aliases never
/// consume the id generator's sequence and survive `gc`.
pub const ALIAS_KIND: &str = "@alias";

pub fn is_alias_entry(entry: &NodeEntry) -> bool {
    &*entry.kind == ALIAS_KIND
}

/// A normalized expression: root id, adjacency map, and the next-id
/// counter the generator had reached.
///
/// Invariants (checked by [`crate::transform::commit`], assumed to hold
/// for any `NExpr` obtained otherwise):
/// - every id referenced as a child of any entry is a key in `adj`
/// - `counter` has allocated no id already present in `adj`, and will never
///   allocate one as it continues forward
/// - the subgraph rooted at `root` is acyclic (guaranteed by construction:
///   `app`'s post-order DFS can only ever reference already-allocated ids)
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NExpr {
    pub root: NodeId,
    pub adj: IndexMap<NodeId, NodeEntry>,
    pub counter: IdGen,
}

impl NExpr {
    pub fn get(&self, id: &NodeId) -> Option<&NodeEntry> {
        self.adj.get(id)
    }

    pub fn root_entry(&self) -> &NodeEntry {
        self.adj
            .get(&self.root)
            .expect("NExpr invariant: root is always present")
    }
}

/// A mutable workspace view over the same physical representation as
/// `NExpr`. The type distinguishes "validated" (`NExpr`) from
/// "under-construction" (`DirtyExpr`); `dirty()` opens one, `commit()`
/// re-validates and closes it.
#[derive(Debug, Clone)]
pub struct DirtyExpr {
    pub root: NodeId,
    pub adj: IndexMap<NodeId, NodeEntry>,
    pub counter: IdGen,
}

pub fn dirty(expr: NExpr) -> DirtyExpr {
    DirtyExpr {
        root: expr.root,
        adj: expr.adj,
        counter: expr.counter,
    }
}

/// Forward walk from `root`, following ordinary (non-alias) child links,
/// collecting every reachable id. Alias entries are never walked into (an
/// alias's target is reachable only if some ordinary node also reaches it)
/// but `gc` separately always preserves alias keys themselves.
pub fn live_ids(adj: &IndexMap<NodeId, NodeEntry>, root: &NodeId) -> std::collections::HashSet<NodeId> {
    let mut seen = std::collections::HashSet::new();
    let mut stack = vec![root.clone()];
    while let Some(id) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(entry) = adj.get(&id) {
            for child in extract_child_ids(&entry.children) {
                if !seen.contains(&child) {
                    stack.push(child);
                }
            }
        }
    }
    seen
}
