//! The transform algebra: mutations over a `DirtyExpr` workspace, closed by
//! `commit` into a revalidated `NExpr`.

use crate::graph::{dirty, extract_child_ids, live_ids, is_alias_entry, Children, DirtyExpr, NExpr, NodeEntry, ALIAS_KIND};
use crate::ids::NodeId;
use crate::predicate::Predicate;
use crate::registry::KindTag;

/// Open a mutable workspace over an already-elaborated expression.
pub fn open(expr: NExpr) -> DirtyExpr {
    dirty(expr)
}

/// Rewrite every matched node's entry in place. `f` may change `kind` and
/// `out` freely; if it changes `children` the caller is responsible for the
/// result still only referencing ids that exist (or will, by the time
/// `commit` runs).
pub fn map_where(expr: &mut DirtyExpr, pred: &Predicate, f: impl Fn(&NodeEntry) -> NodeEntry) {
    let matches: Vec<NodeId> = expr.adj.keys().filter(|id| pred.test(&expr.adj, id)).cloned().collect();
    for id in matches {
        if let Some(entry) = expr.adj.get(&id) {
            let next = f(entry);
            expr.adj.insert(id, next);
        }
    }
}

/// Swap every matched node's `kind` field in place, leaving its id and
/// children untouched. The id stays stable, so any existing reference to a
/// matched node (including a sibling that shares it as a DAG child) keeps
/// pointing at the same entry, just under its new kind.
pub fn replace_where(expr: &mut DirtyExpr, pred: &Predicate, new_kind: impl Into<KindTag>) {
    let new_kind = new_kind.into();
    let matches: Vec<NodeId> = expr.adj.keys().filter(|id| pred.test(&expr.adj, id)).cloned().collect();
    for id in matches {
        if let Some(entry) = expr.adj.get_mut(&id) {
            entry.kind = new_kind.clone();
        }
    }
}

/// Remove every matched node, rewiring its referrers directly onto its
/// `at`-th child (the "splice out a wrapper" operation). Matched nodes with
/// no such child are left untouched.
pub fn splice_where(expr: &mut DirtyExpr, pred: &Predicate, at: usize) {
    let matches: Vec<NodeId> = expr.adj.keys().filter(|id| pred.test(&expr.adj, id)).cloned().collect();
    for old_id in matches {
        let Some(entry) = expr.adj.get(&old_id) else { continue };
        let Some(replacement) = entry.children.nth(at).cloned() else { continue };
        rewire(expr, &old_id, &replacement);
        expr.adj.shift_remove(&old_id);
    }
}

/// Insert a new node `{kind: wrapper_kind, children: [target]}` above every
/// matched node, with a freshly allocated id. Every other reference to the
/// matched id is rewritten onto the new wrapper id — except the wrapper's
/// own child pointer, which still points at the original. The wrapper
/// becomes root iff the matched id was root. Returns the freshly allocated
/// wrapper ids, one per match, in match order.
pub fn wrap_by_name(expr: &mut DirtyExpr, pred: &Predicate, wrapper_kind: impl Into<KindTag>) -> Vec<NodeId> {
    let wrapper_kind = wrapper_kind.into();
    let matches: Vec<NodeId> = expr.adj.keys().filter(|id| pred.test(&expr.adj, id)).cloned().collect();
    let mut wrapper_ids = Vec::with_capacity(matches.len());
    for target_id in matches {
        let new_id = expr.counter.next_id();
        if expr.root == target_id {
            expr.root = new_id.clone();
        }
        for entry in expr.adj.values_mut() {
            entry.children = rewire_children(&entry.children, &target_id, &new_id);
        }
        expr.adj
            .insert(new_id.clone(), NodeEntry::new(wrapper_kind.clone(), Children::List(vec![target_id]), None));
        wrapper_ids.push(new_id);
    }
    wrapper_ids
}

/// Give `target` a durable name: an `@name` entry whose single child is
/// `target`. Aliases are metadata; they never consume the id generator's
/// sequence and `gc` always keeps them.
pub fn name(expr: &mut DirtyExpr, target: &NodeId, alias: &str) {
    let alias_id = NodeId::alias(alias);
    expr.adj
        .insert(alias_id, NodeEntry::new(ALIAS_KIND, Children::List(vec![target.clone()]), None));
}

/// Point every entry (ordinary or alias) that referenced `old` at `new`
/// instead, including `expr.root` itself.
fn rewire(expr: &mut DirtyExpr, old: &NodeId, new: &NodeId) {
    if expr.root == *old {
        expr.root = new.clone();
    }
    for entry in expr.adj.values_mut() {
        entry.children = rewire_children(&entry.children, old, new);
    }
}

fn rewire_children(children: &Children, old: &NodeId, new: &NodeId) -> Children {
    let swap = |id: &NodeId| if id == old { new.clone() } else { id.clone() };
    match children {
        Children::List(ids) => Children::List(ids.iter().map(swap).collect()),
        Children::Tuple(ids) => Children::Tuple(ids.iter().map(swap).collect()),
        Children::Record(fields) => Children::Record(fields.iter().map(|(k, v)| (k.clone(), swap(v))).collect()),
    }
}

/// Drop every entry unreachable from `root`, except alias entries, which
/// always survive regardless of reachability (an alias is itself the
/// reachability root for whatever it names).
pub fn gc(expr: &mut DirtyExpr) {
    let mut reachable = live_ids(&expr.adj, &expr.root);
    for (id, entry) in &expr.adj {
        if is_alias_entry(entry) {
            reachable.insert(id.clone());
            reachable.extend(extract_child_ids(&entry.children));
        }
    }
    expr.adj.retain(|id, _| reachable.contains(id));
}

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("node `{parent}` references `{child}`, which is not in the adjacency map")]
    DanglingChild { parent: NodeId, child: NodeId },
    #[error("root `{0}` is not in the adjacency map")]
    MissingRoot(NodeId),
}

/// Revalidate a workspace and close it back into an `NExpr`. Checks every
/// invariant `NExpr` otherwise assumes: the root exists, and every
/// referenced child (through ordinary or alias entries) exists too.
pub fn commit(expr: DirtyExpr) -> Result<NExpr, CommitError> {
    if !expr.adj.contains_key(&expr.root) {
        return Err(CommitError::MissingRoot(expr.root));
    }
    for (id, entry) in &expr.adj {
        for child in extract_child_ids(&entry.children) {
            if !expr.adj.contains_key(&child) {
                return Err(CommitError::DanglingChild {
                    parent: id.clone(),
                    child,
                });
            }
        }
    }
    Ok(NExpr {
        root: expr.root,
        adj: expr.adj,
        counter: expr.counter,
    })
}

/// Left-to-right composition of fallible workspace transforms, so a
/// sequence of `map_where`/`replace_where`/`splice_where` calls can be built
/// up and applied as one unit.
pub fn pipe(
    steps: Vec<Box<dyn Fn(&mut DirtyExpr) -> Result<(), CommitError>>>,
) -> impl Fn(&mut DirtyExpr) -> Result<(), CommitError> {
    move |expr| {
        for step in &steps {
            step(expr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cexpr::{CArg, CExpr};
    use crate::elaborate::app;
    use crate::payload::{Payload, TypeTag};
    use crate::predicate::by_kind;
    use crate::registry::{InputsSpec, KindSpec, KindTag, Plugin, Registry};

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
                (
                    "num/mul".into(),
                    KindSpec::new(InputsSpec::Fixed(vec![num.clone(), num.clone()]), num),
                ),
            ]
        }
        fn lifts(&self) -> Vec<(&'static str, KindTag)> {
            vec![("number", "num/literal".into())]
        }
    }

    fn lit(n: i64) -> CExpr {
        CExpr::new("num/literal", vec![CArg::Lit(Payload::Int(n))], TypeTag::prim("number"))
    }

    fn add(a: CExpr, b: CExpr) -> CExpr {
        CExpr::new("num/add", vec![a.into(), b.into()], TypeTag::prim("number"))
    }

    fn registry() -> Registry {
        Registry::compose(&[&NumPlugin]).unwrap()
    }

    #[test]
    fn replace_where_swaps_kind_in_place() {
        let reg = registry();
        let n = app(&add(lit(3), lit(4)), &reg).unwrap();
        let before = n.adj.len();
        let root_id = n.root.clone();
        let mut dirty = open(n);
        replace_where(&mut dirty, &by_kind("num/add"), "num/sub");
        let committed = commit(dirty).unwrap();
        // same id, same children, same node count -- only the kind changed
        assert_eq!(committed.adj.len(), before);
        assert_eq!(committed.root, root_id);
        assert_eq!(committed.root_entry().kind.as_ref(), "num/sub");
        match &committed.root_entry().children {
            Children::List(ids) => {
                assert_eq!(committed.get(&ids[0]).unwrap().out, Some(Payload::Int(3)));
                assert_eq!(committed.get(&ids[1]).unwrap().out, Some(Payload::Int(4)));
            }
            _ => panic!("expected list children"),
        }
    }

    #[test]
    fn splice_where_promotes_a_child() {
        let reg = registry();
        let inner = add(lit(1), lit(2));
        let expr = add(inner, lit(3));
        let n = app(&expr, &reg).unwrap();
        let before = n.adj.len();
        let mut dirty = open(n);
        // splice out every `num/add` node in favor of its first operand
        splice_where(&mut dirty, &by_kind("num/add"), 0);
        gc(&mut dirty);
        let committed = commit(dirty).unwrap();
        assert!(committed.adj.len() < before);
        assert_eq!(committed.root_entry().kind.as_ref(), "num/literal");
    }

    #[test]
    fn name_survives_gc_even_if_unreachable() {
        let reg = registry();
        let n = app(&lit(3), &reg).unwrap();
        let mut dirty = open(n);
        let lone = NodeId::new("a");
        name(&mut dirty, &lone, "kept");
        gc(&mut dirty);
        let committed = commit(dirty).unwrap();
        assert!(committed.adj.contains_key(&NodeId::alias("kept")));
    }

    #[test]
    fn wrap_by_name_inserts_a_parent_and_rewires_referrers_but_not_itself() {
        let reg = registry();
        let expr = add(lit(1), lit(2));
        let n = app(&expr, &reg).unwrap();
        let before = n.adj.len();
        let mut dirty = open(n);
        let new_ids = wrap_by_name(&mut dirty, &by_kind("num/literal"), "wrap/mark");
        assert_eq!(new_ids.len(), 2, "both literals matched");
        let committed = commit(dirty).unwrap();
        // two new wrapper nodes, nothing dropped
        assert_eq!(committed.adj.len(), before + 2);
        for wrapper_id in &new_ids {
            let wrapper = committed.get(wrapper_id).unwrap();
            assert_eq!(wrapper.kind.as_ref(), "wrap/mark");
            match &wrapper.children {
                Children::List(ids) => {
                    assert_eq!(ids.len(), 1);
                    assert_eq!(committed.get(&ids[0]).unwrap().kind.as_ref(), "num/literal");
                }
                _ => panic!("expected list children"),
            }
        }
        // the add node's operands now point at the wrappers, not the
        // original literals
        match &committed.root_entry().children {
            Children::List(ids) => {
                for id in ids {
                    assert!(new_ids.contains(id));
                }
            }
            _ => panic!("expected list children"),
        }
    }

    #[test]
    fn wrap_by_name_promotes_root_when_root_is_matched() {
        let reg = registry();
        let n = app(&lit(7), &reg).unwrap();
        let mut dirty = open(n);
        let new_ids = wrap_by_name(&mut dirty, &by_kind("num/literal"), "wrap/mark");
        assert_eq!(new_ids.len(), 1);
        assert_eq!(dirty.root, new_ids[0]);
        let committed = commit(dirty).unwrap();
        assert_eq!(committed.root, new_ids[0]);
        assert_eq!(committed.root_entry().kind.as_ref(), "wrap/mark");
    }

    #[test]
    fn commit_rejects_dangling_children() {
        let reg = registry();
        let n = app(&lit(3), &reg).unwrap();
        let mut dirty = open(n);
        dirty
            .adj
            .insert(NodeId::new("zz"), NodeEntry::new("num/literal", Children::List(vec![NodeId::new("missing")]), None));
        let err = commit(dirty).unwrap_err();
        assert!(matches!(err, CommitError::DanglingChild { .. }));
    }
}
