//! Named example programs, each built directly against the plugin
//! constructors rather than any textual syntax — there is no parser here,
//! the embedding API *is* the surface language.

use warpgraph_core::{CExpr, Registry, TypeTag};
use warpgraph_plugins::{bool as boolp, core as corep, dispatch_ctors, error as errorp, fiber, num, state, str as strp};

pub struct Demo {
    pub name: &'static str,
    pub description: &'static str,
    pub build: fn(&Registry) -> CExpr,
}

pub fn all() -> Vec<Demo> {
    vec![
        Demo {
            name: "arithmetic",
            description: "(3 + 4) * 5, built over num/add and num/mul",
            build: |_reg| num::mul_ctor(num::add_ctor(num::literal(3), num::literal(4)), num::literal(5)),
        },
        Demo {
            name: "shared-literal",
            description: "3 + 3 where both operands hash-cons to the same node",
            build: |_reg| num::add_ctor(num::literal(3), num::literal(3)),
        },
        Demo {
            name: "boolean-guard",
            description: "if (2 < 3) then \"yes\" else \"no\"",
            build: |_reg| {
                boolp::if_ctor(
                    num::lt_ctor(num::literal(2), num::literal(3)),
                    strp::literal("yes"),
                    strp::literal("no"),
                    TypeTag::prim("string"),
                )
            },
        },
        Demo {
            name: "string-concat",
            description: "len(\"foo\" + \"bar\")",
            build: |_reg| strp::len_ctor(strp::concat_ctor(strp::literal("foo"), strp::literal("bar"))),
        },
        Demo {
            name: "closure",
            description: "(\\x -> x)(7), the identity lambda applied to 7",
            build: |_reg| {
                let x = corep::lambda_param_ctor("x");
                corep::apply_ctor(corep::lambda_ctor(x.clone(), x), num::literal(7))
            },
        },
        Demo {
            name: "shadowing",
            description: "nested lambdas reusing the parameter name `x`, inner binding wins",
            build: |_reg| {
                let x = corep::lambda_param_ctor("x");
                let inner = corep::lambda_ctor(x.clone(), x.clone());
                let outer_body = corep::apply_ctor(inner, num::literal(99));
                let outer = corep::lambda_ctor(x, outer_body);
                corep::apply_ctor(outer, num::literal(1))
            },
        },
        Demo {
            name: "error-recovery",
            description: "try(fail(1), 2) recovers to 2",
            build: |_reg| errorp::try_ctor(errorp::fail_ctor(num::literal(1)), num::literal(2), TypeTag::prim("number")),
        },
        Demo {
            name: "state-counter",
            description: "set(\"counter\", 1) then get(\"counter\"), sequenced through a tuple",
            build: |_reg| {
                corep::tuple_ctor(vec![
                    state::set_ctor(strp::literal("counter"), num::literal(1), TypeTag::prim("number")),
                    state::get_ctor(strp::literal("counter"), TypeTag::prim("number")),
                ])
            },
        },
        Demo {
            name: "par-map",
            description: "par_map over [1, 2, 3] doubling each element",
            build: |_reg| {
                let x = corep::lambda_param_ctor("x");
                let doubled = num::add_ctor(x.clone(), x.clone());
                let lambda = corep::lambda_ctor(x, doubled);
                let list = corep::tuple_ctor(vec![num::literal(1), num::literal(2), num::literal(3)]);
                fiber::par_map_ctor(list, lambda, TypeTag::prim("number"))
            },
        },
        Demo {
            name: "dispatch-eq",
            description: "$.eq(3, 3) resolved against the registry's `eq` typeclass impls",
            build: |reg| dispatch_ctors::eq(reg, num::literal(3), num::literal(3)).expect("num/eq is always registered for this demo's registry"),
        },
    ]
}

pub fn find(name: &str) -> Option<Demo> {
    all().into_iter().find(|d| d.name == name)
}
