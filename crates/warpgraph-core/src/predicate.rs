//! Structural predicates and selection over a normalized graph.

use indexmap::IndexMap;

use crate::graph::{NExpr, NodeEntry};
use crate::ids::NodeId;

/// A predicate tests one node in context of the whole adjacency map, so
/// combinators can look past the node itself (child counts, descendant
/// shape) without needing their own traversal machinery.
pub struct Predicate(Box<dyn Fn(&IndexMap<NodeId, NodeEntry>, &NodeId) -> bool>);

impl Predicate {
    pub fn new(f: impl Fn(&IndexMap<NodeId, NodeEntry>, &NodeId) -> bool + 'static) -> Self {
        Predicate(Box::new(f))
    }

    pub fn test(&self, adj: &IndexMap<NodeId, NodeEntry>, id: &NodeId) -> bool {
        (self.0)(adj, id)
    }

    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::new(move |adj, id| self.test(adj, id) && other.test(adj, id))
    }

    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::new(move |adj, id| self.test(adj, id) || other.test(adj, id))
    }

    pub fn not(self) -> Predicate {
        Predicate::new(move |adj, id| !self.test(adj, id))
    }
}

/// Exact kind match.
pub fn by_kind(kind: impl Into<Box<str>>) -> Predicate {
    let kind = kind.into();
    Predicate::new(move |adj, id| adj.get(id).map(|e| e.kind == kind).unwrap_or(false))
}

/// Glob match against a kind, where `*` matches any run of characters and
/// every other character is literal. Intended for namespace-wide queries
/// like `"num/*"`.
pub fn by_kind_glob(pattern: impl Into<Box<str>>) -> Predicate {
    let pattern = pattern.into();
    Predicate::new(move |adj, id| {
        adj.get(id)
            .map(|e| glob_match(&pattern, &e.kind))
            .unwrap_or(false)
    })
}

fn glob_match(pattern: &str, text: &str) -> bool {
    fn rec(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => rec(&p[1..], t) || (!t.is_empty() && rec(p, &t[1..])),
            Some(c) => t.first().map(|tc| tc == c).unwrap_or(false) && rec(&p[1..], &t[1..]),
        }
    }
    rec(pattern.as_bytes(), text.as_bytes())
}

pub fn is_leaf() -> Predicate {
    Predicate::new(|adj, id| adj.get(id).map(|e| e.children.is_empty()).unwrap_or(false))
}

pub fn has_child_count(n: usize) -> Predicate {
    Predicate::new(move |adj, id| adj.get(id).map(|e| e.children.len() == n).unwrap_or(false))
}

/// Every node reachable from `root` (aliases included, since selection
/// operates over raw adjacency keys) for which `pred` holds, in adjacency
/// insertion order.
pub fn select_where(expr: &NExpr, pred: &Predicate) -> Vec<NodeId> {
    expr.adj
        .keys()
        .filter(|id| pred.test(&expr.adj, id))
        .cloned()
        .collect()
}

/// Same as [`select_where`] but restricted to ids reachable by ordinary
/// child links from `root` (matches [`crate::graph::live_ids`]'s walk, so
/// unreachable garbage never matches).
pub fn select_reachable(expr: &NExpr, pred: &Predicate) -> Vec<NodeId> {
    let reachable = crate::graph::live_ids(&expr.adj, &expr.root);
    expr.adj
        .keys()
        .filter(|id| reachable.contains(*id) && pred.test(&expr.adj, id))
        .cloned()
        .collect()
}
