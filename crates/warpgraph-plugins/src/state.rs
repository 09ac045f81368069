//! Mutable cells scoped to a single fold: `st/get` and `st/set`. Cell names
//! are ordinary [`str`](crate::str) expressions rather than a leaf kind of
//! their own, so a plain [`str::literal`](crate::str::literal) names a cell.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use warpgraph_core::{CExpr, InputsSpec, KindSpec, KindTag, NodeEntry, NodeId, Plugin, TypeTag};
use warpgraph_eval::{Coroutine, DefaultHandlers, FnCoroutine, FoldCtx, Handler, Resumed, Step, Value};

/// Per-fold storage for `st/get`/`st/set`, retrieved from the fold's
/// [`Environment`](warpgraph_eval::Environment) slot for this type.
#[derive(Default)]
pub struct StateStore(RefCell<IndexMap<Box<str>, Value>>);

fn cell_name(v: &Value) -> Result<Rc<str>, Value> {
    match v {
        Value::Str(s) => Ok(s.clone()),
        other => Err(Value::Str(Rc::from(format!("expected a cell name string, got {other:?}")))),
    }
}

pub struct StatePlugin;

impl Plugin for StatePlugin {
    fn name(&self) -> &'static str {
        "st"
    }

    fn kinds(&self) -> Vec<(KindTag, KindSpec)> {
        vec![
            ("st/let".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
            ("st/get".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
            ("st/set".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
            ("st/push".into(), KindSpec::new(InputsSpec::Any, TypeTag::Unknown)),
        ]
    }
}

/// Reads a cell, or null if it was never set. Every read consults the live
/// store rather than a memoized snapshot, which is why this kind must be
/// folded as volatile.
struct GetHandler;

impl Handler for GetHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        Box::new(FnCoroutine(move |resumed: Resumed, ctx: &FoldCtx| match resumed.into_value()? {
            None => Ok(Step::Yield(0)),
            Some(v) => {
                let name = cell_name(&v)?;
                let store = ctx.env().slot::<StateStore>();
                let value = store.0.borrow().get(name.as_ref()).cloned().unwrap_or(Value::Null);
                Ok(Step::Return(value))
            }
        }))
    }
}

/// Binds a cell for the duration of its body, restoring whatever the cell
/// held beforehand (or clearing it) once the body returns. Three children:
/// name, initial value, body.
struct LetHandler;

enum LetStage {
    AwaitName,
    AwaitInit(Rc<str>),
    AwaitBody(Rc<str>, Option<Value>),
}

impl Handler for LetHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let mut stage = LetStage::AwaitName;
        Box::new(FnCoroutine(move |resumed: Resumed, ctx: &FoldCtx| {
            let v = resumed.into_value()?;
            match std::mem::replace(&mut stage, LetStage::AwaitName) {
                LetStage::AwaitName if v.is_none() => {
                    stage = LetStage::AwaitName;
                    Ok(Step::Yield(0))
                }
                LetStage::AwaitName => {
                    let name = cell_name(&v.expect("name always resumes with a value"))?;
                    stage = LetStage::AwaitInit(name);
                    Ok(Step::Yield(1))
                }
                LetStage::AwaitInit(name) => {
                    let init = v.expect("init always resumes with a value");
                    let store = ctx.env().slot::<StateStore>();
                    let previous = store.0.borrow_mut().insert(Box::from(name.as_ref()), init);
                    stage = LetStage::AwaitBody(name, previous);
                    Ok(Step::Yield(2))
                }
                LetStage::AwaitBody(name, previous) => {
                    let result = v.expect("body always resumes with a value");
                    let store = ctx.env().slot::<StateStore>();
                    let mut cells = store.0.borrow_mut();
                    match previous {
                        Some(p) => {
                            cells.insert(Box::from(name.as_ref()), p);
                        }
                        None => {
                            cells.shift_remove(name.as_ref());
                        }
                    }
                    Ok(Step::Return(result))
                }
            }
        }))
    }
}

/// Writes a cell and returns the value written.
struct SetHandler;

impl Handler for SetHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let mut name: Option<Rc<str>> = None;
        Box::new(FnCoroutine(move |resumed: Resumed, ctx: &FoldCtx| {
            let v = resumed.into_value()?;
            match &name {
                None if v.is_none() => Ok(Step::Yield(0)),
                None => {
                    name = Some(cell_name(&v.expect("name always resumes with a value"))?);
                    Ok(Step::Yield(1))
                }
                Some(n) => {
                    let value = v.expect("value always resumes with a value");
                    let store = ctx.env().slot::<StateStore>();
                    store.0.borrow_mut().insert(Box::from(n.as_ref()), value.clone());
                    Ok(Step::Return(value))
                }
            }
        }))
    }
}

/// Appends a value onto a list-valued cell, creating the list if the cell
/// was unset, and returns the updated list.
struct PushHandler;

impl Handler for PushHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let mut name: Option<Rc<str>> = None;
        Box::new(FnCoroutine(move |resumed: Resumed, ctx: &FoldCtx| {
            let v = resumed.into_value()?;
            match &name {
                None if v.is_none() => Ok(Step::Yield(0)),
                None => {
                    name = Some(cell_name(&v.expect("name always resumes with a value"))?);
                    Ok(Step::Yield(1))
                }
                Some(n) => {
                    let item = v.expect("item always resumes with a value");
                    let store = ctx.env().slot::<StateStore>();
                    let mut cells = store.0.borrow_mut();
                    let updated = match cells.get(n.as_ref()) {
                        Some(Value::List(existing)) => {
                            let mut items = (**existing).clone();
                            items.push(item);
                            items
                        }
                        Some(other) => return Err(Value::Str(Rc::from(format!("cell {n} is not a list, found {other:?}")))),
                        None => vec![item],
                    };
                    let updated = Value::List(Rc::new(updated));
                    cells.insert(Box::from(n.as_ref()), updated.clone());
                    Ok(Step::Return(updated))
                }
            }
        }))
    }
}

impl DefaultHandlers for StatePlugin {
    fn name(&self) -> &'static str {
        "st"
    }

    fn node_kinds(&self) -> Vec<KindTag> {
        Plugin::kinds(self).into_iter().map(|(k, _)| k).collect()
    }

    fn default_interpreter(&self) -> Vec<(KindTag, Box<dyn Handler>)> {
        vec![
            ("st/let".into(), Box::new(LetHandler)),
            ("st/get".into(), Box::new(GetHandler)),
            ("st/set".into(), Box::new(SetHandler)),
            ("st/push".into(), Box::new(PushHandler)),
        ]
    }
}

pub fn let_ctor(name: CExpr, init: CExpr, body: CExpr, output: TypeTag) -> CExpr {
    CExpr::new("st/let", vec![name.into(), init.into(), body.into()], output)
}

pub fn get_ctor(name: CExpr, output: TypeTag) -> CExpr {
    CExpr::new("st/get", vec![name.into()], output)
}

pub fn set_ctor(name: CExpr, value: CExpr, output: TypeTag) -> CExpr {
    CExpr::new("st/set", vec![name.into(), value.into()], output)
}

pub fn push_ctor(name: CExpr, item: CExpr, output: TypeTag) -> CExpr {
    CExpr::new("st/push", vec![name.into(), item.into()], output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::{literal as num_literal, NumPlugin};
    use crate::str::{literal as str_literal, StrPlugin};
    use warpgraph_core::{app, Registry};
    use warpgraph_eval::{defaults, fold, FoldOptions};

    fn registry() -> Registry {
        Registry::compose(&[&StatePlugin, &StrPlugin, &NumPlugin]).unwrap()
    }

    fn interpreter() -> warpgraph_eval::Interpreter {
        defaults(&[&StatePlugin, &StrPlugin, &NumPlugin], Default::default()).unwrap()
    }

    #[test]
    fn get_before_any_set_is_null() {
        let reg = registry();
        let n = app(&get_ctor(str_literal("counter"), TypeTag::Unknown), &reg).unwrap();
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Null);
    }

    #[test]
    fn set_returns_the_value_written() {
        let reg = registry();
        let n = app(&set_ctor(str_literal("x"), num_literal(7), TypeTag::prim("number")), &reg).unwrap();
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Int(7));
    }

    #[test]
    fn push_accumulates_onto_a_list_cell() {
        let reg = registry();
        let first = app(&push_ctor(str_literal("log"), num_literal(1), TypeTag::Unknown), &reg).unwrap();
        let v = fold(&first, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::List(Rc::new(vec![Value::Int(1)])));
    }

    #[test]
    fn let_binds_a_cell_for_its_body_then_restores_the_outer_value() {
        use crate::core::{tuple_ctor, CorePlugin};
        let reg = Registry::compose(&[&StatePlugin, &StrPlugin, &NumPlugin, &CorePlugin]).unwrap();
        let interp = defaults(&[&StatePlugin, &StrPlugin, &NumPlugin, &CorePlugin], Default::default()).unwrap();

        // let x := 1 in (x := 2; get x)
        let pair = tuple_ctor(vec![
            set_ctor(str_literal("x"), num_literal(2), TypeTag::prim("number")),
            get_ctor(str_literal("x"), TypeTag::prim("number")),
        ]);
        // `tuple_ctor` declares `Unknown` (tuple elements may be
        // heterogeneous); both elements here are numbers, so retype it as a
        // number array to exercise the accessor overlay's index path, the
        // same retyping trick `core.rs`'s record-access test uses.
        let pair = CExpr::new("core/tuple", pair.args().to_vec(), TypeTag::Array(Box::new(TypeTag::prim("number"))));
        let body = pair.index(1).unwrap();
        let expr = let_ctor(str_literal("x"), num_literal(1), body, TypeTag::prim("number"));
        let n = app(&expr, &reg).unwrap();

        let first = fold(&n, &interp, &FoldOptions::default()).unwrap();
        assert_eq!(first, Value::Int(2));

        // a fresh fold gets a fresh store, so the cell starts unset again
        let second = fold(&n, &interp, &FoldOptions::default()).unwrap();
        assert_eq!(second, Value::Int(2));
    }
}
