//! Strings: literals, `concat`, `len`, and the `eq`/`semigroup`/`monoid`/
//! `show` typeclass implementations for `"string"`.

use std::rc::Rc;

use warpgraph_core::{CArg, CExpr, InputsSpec, KindSpec, KindTag, NodeEntry, NodeId, Payload, Plugin, TraitImpl, TypeTag};
use warpgraph_eval::{Coroutine, DefaultHandlers, FnCoroutine, FoldCtx, Handler, Resumed, Step, Value};

fn string() -> TypeTag {
    TypeTag::prim("string")
}

pub struct StrPlugin;

impl Plugin for StrPlugin {
    fn name(&self) -> &'static str {
        "str"
    }

    fn kinds(&self) -> Vec<(KindTag, KindSpec)> {
        let s = string();
        vec![
            ("str/literal".into(), KindSpec::new(InputsSpec::Any, s.clone())),
            ("str/concat".into(), KindSpec::new(InputsSpec::Fixed(vec![s.clone(), s.clone()]), s.clone())),
            ("str/len".into(), KindSpec::new(InputsSpec::Fixed(vec![s.clone()]), TypeTag::prim("number"))),
            ("str/eq".into(), KindSpec::new(InputsSpec::Fixed(vec![s.clone(), s.clone()]), TypeTag::prim("boolean"))),
            ("str/show".into(), KindSpec::new(InputsSpec::Fixed(vec![s]), TypeTag::prim("string"))),
        ]
    }

    fn lifts(&self) -> Vec<(&'static str, KindTag)> {
        vec![("string", "str/literal".into())]
    }

    fn traits(&self) -> Vec<TraitImpl> {
        let eq = trait_impl("eq", &[("eq", "str/eq")]);
        let semigroup = trait_impl("semigroup", &[("concat", "str/concat")]);
        let monoid = trait_impl("monoid", &[("concat", "str/concat")]);
        let show = trait_impl("show", &[("show", "str/show")]);
        vec![eq, semigroup, monoid, show]
    }
}

fn trait_impl(trait_name: &'static str, ops: &[(&'static str, &str)]) -> TraitImpl {
    let mut node_kinds = std::collections::HashMap::new();
    for (op, kind) in ops {
        node_kinds.insert(*op, KindTag::from(*kind));
    }
    TraitImpl { trait_name, type_tag: string(), node_kinds }
}

struct LiteralHandler;

impl Handler for LiteralHandler {
    fn start(&self, _id: &NodeId, entry: &NodeEntry) -> Box<dyn Coroutine> {
        let v = Value::from(entry.out.as_ref().expect("str/literal always carries a payload"));
        Box::new(FnCoroutine(move |_: Resumed, _: &FoldCtx| Ok(Step::Return(v.clone()))))
    }
}

fn as_str_value(v: &Value) -> Result<Rc<str>, Value> {
    match v {
        Value::Str(s) => Ok(s.clone()),
        other => Err(Value::Str(Rc::from(format!("expected a string, got {other:?}")))),
    }
}

struct ConcatHandler;

impl Handler for ConcatHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let mut left: Option<Rc<str>> = None;
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            let v = resumed.into_value()?;
            match &left {
                None if v.is_none() => Ok(Step::Yield(0)),
                None => {
                    left = Some(as_str_value(&v.expect("first yield always resumes with a value"))?);
                    Ok(Step::Yield(1))
                }
                Some(l) => {
                    let r = as_str_value(&v.expect("second yield always resumes with a value"))?;
                    Ok(Step::Return(Value::Str(Rc::from(format!("{l}{r}")))))
                }
            }
        }))
    }
}

struct LenHandler;

impl Handler for LenHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| match resumed.into_value()? {
            None => Ok(Step::Yield(0)),
            Some(v) => {
                let s = as_str_value(&v)?;
                Ok(Step::Return(Value::Int(s.chars().count() as i64)))
            }
        }))
    }
}

struct EqHandler;

impl Handler for EqHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        let mut left: Option<Rc<str>> = None;
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| {
            let v = resumed.into_value()?;
            match &left {
                None if v.is_none() => Ok(Step::Yield(0)),
                None => {
                    left = Some(as_str_value(&v.expect("first yield always resumes with a value"))?);
                    Ok(Step::Yield(1))
                }
                Some(l) => {
                    let r = as_str_value(&v.expect("second yield always resumes with a value"))?;
                    Ok(Step::Return(Value::Bool(**l == *r)))
                }
            }
        }))
    }
}

struct ShowHandler;

impl Handler for ShowHandler {
    fn start(&self, _id: &NodeId, _entry: &NodeEntry) -> Box<dyn Coroutine> {
        Box::new(FnCoroutine(move |resumed: Resumed, _ctx: &FoldCtx| match resumed.into_value()? {
            None => Ok(Step::Yield(0)),
            Some(v) => {
                let s = as_str_value(&v)?;
                Ok(Step::Return(Value::Str(Rc::from(format!("{s:?}")))))
            }
        }))
    }
}

impl DefaultHandlers for StrPlugin {
    fn name(&self) -> &'static str {
        "str"
    }

    fn node_kinds(&self) -> Vec<KindTag> {
        Plugin::kinds(self).into_iter().map(|(k, _)| k).collect()
    }

    fn default_interpreter(&self) -> Vec<(KindTag, Box<dyn Handler>)> {
        vec![
            ("str/literal".into(), Box::new(LiteralHandler)),
            ("str/concat".into(), Box::new(ConcatHandler)),
            ("str/len".into(), Box::new(LenHandler)),
            ("str/eq".into(), Box::new(EqHandler)),
            ("str/show".into(), Box::new(ShowHandler)),
        ]
    }
}

pub fn literal(s: &str) -> CExpr {
    CExpr::new("str/literal", vec![CArg::Lit(Payload::Str(s.into()))], string())
}

pub fn concat_ctor(a: CExpr, b: CExpr) -> CExpr {
    CExpr::new("str/concat", vec![a.into(), b.into()], string())
}

pub fn len_ctor(a: CExpr) -> CExpr {
    CExpr::new("str/len", vec![a.into()], TypeTag::prim("number"))
}

pub fn eq_ctor(a: CExpr, b: CExpr) -> CExpr {
    CExpr::new("str/eq", vec![a.into(), b.into()], TypeTag::prim("boolean"))
}

pub fn show_ctor(a: CExpr) -> CExpr {
    CExpr::new("str/show", vec![a.into()], string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpgraph_core::{app, Registry};
    use warpgraph_eval::{defaults, fold, FoldOptions};

    fn registry() -> Registry {
        Registry::compose(&[&StrPlugin]).unwrap()
    }

    fn interpreter() -> warpgraph_eval::Interpreter {
        defaults(&[&StrPlugin], Default::default()).unwrap()
    }

    #[test]
    fn concat_joins_operands() {
        let reg = registry();
        let n = app(&concat_ctor(literal("foo"), literal("bar")), &reg).unwrap();
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Str(Rc::from("foobar")));
    }

    #[test]
    fn len_counts_chars_not_bytes() {
        let reg = registry();
        let n = app(&len_ctor(literal("héllo")), &reg).unwrap();
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Int(5));
    }

    #[test]
    fn eq_compares_by_value() {
        let reg = registry();
        let n = app(&eq_ctor(literal("a"), literal("a")), &reg).unwrap();
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Bool(true));
    }
}
