//! `$.add`/`$.eq`-style constructors that resolve a trait operation against
//! a registry instead of naming a concrete plugin kind directly. Thin
//! wrappers over [`warpgraph_eval::dispatch_ctor`]; the interesting part of
//! dispatch lives there, not here.

use warpgraph_core::{CExpr, Registry, TypeTag};
use warpgraph_eval::{dispatch_ctor, DispatchError};

pub fn eq(registry: &Registry, a: CExpr, b: CExpr) -> Result<CExpr, DispatchError> {
    dispatch_ctor(registry, "eq", "eq", vec![a, b], TypeTag::prim("boolean"))
}

pub fn lt(registry: &Registry, a: CExpr, b: CExpr) -> Result<CExpr, DispatchError> {
    dispatch_ctor(registry, "ord", "lt", vec![a, b], TypeTag::prim("boolean"))
}

pub fn add(registry: &Registry, a: CExpr, b: CExpr, output: TypeTag) -> Result<CExpr, DispatchError> {
    dispatch_ctor(registry, "semiring", "add", vec![a, b], output)
}

pub fn mul(registry: &Registry, a: CExpr, b: CExpr, output: TypeTag) -> Result<CExpr, DispatchError> {
    dispatch_ctor(registry, "semiring", "mul", vec![a, b], output)
}

pub fn concat(registry: &Registry, a: CExpr, b: CExpr, output: TypeTag) -> Result<CExpr, DispatchError> {
    dispatch_ctor(registry, "semigroup", "concat", vec![a, b], output)
}

pub fn show(registry: &Registry, a: CExpr) -> Result<CExpr, DispatchError> {
    dispatch_ctor(registry, "show", "show", vec![a], TypeTag::prim("string"))
}

pub fn and(registry: &Registry, a: CExpr, b: CExpr) -> Result<CExpr, DispatchError> {
    dispatch_ctor(registry, "heytingAlgebra", "and", vec![a, b], TypeTag::prim("boolean"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::{literal as num_literal, NumPlugin};
    use crate::str::{literal as str_literal, StrPlugin};
    use warpgraph_core::app;
    use warpgraph_eval::{defaults, fold, FoldOptions, Value};

    fn registry() -> Registry {
        Registry::compose(&[&NumPlugin, &StrPlugin]).unwrap()
    }

    fn interpreter() -> warpgraph_eval::Interpreter {
        defaults(&[&NumPlugin, &StrPlugin], Default::default()).unwrap()
    }

    #[test]
    fn eq_dispatches_by_operand_type() {
        let reg = registry();
        let num_eq = eq(&reg, num_literal(1), num_literal(1)).unwrap();
        assert_eq!(&*num_eq.kind(), "num/eq");
        let str_eq = eq(&reg, str_literal("a"), str_literal("a")).unwrap();
        assert_eq!(&*str_eq.kind(), "str/eq");
    }

    #[test]
    fn add_dispatch_folds_to_the_same_result_as_the_direct_constructor() {
        let reg = registry();
        let expr = add(&reg, num_literal(2), num_literal(3), TypeTag::prim("number")).unwrap();
        let n = app(&expr, &reg).unwrap();
        let v = fold(&n, &interpreter(), &FoldOptions::default()).unwrap();
        assert_eq!(v, Value::Int(5));
    }

    #[test]
    fn concat_dispatches_to_string_semigroup() {
        let reg = registry();
        let expr = concat(&reg, str_literal("foo"), str_literal("bar"), TypeTag::prim("string")).unwrap();
        assert_eq!(&*expr.kind(), "str/concat");
    }
}
