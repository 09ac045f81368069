//! Typeclass dispatch: resolves a trait constructor call (`$.add(a, b)`) to
//! a concrete node kind by inferring the operand type and consulting the
//! registry's [`TraitImpl`] table, at `CExpr` construction time.

use warpgraph_core::{CArg, CExpr, KindTag, Registry, TypeTag};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no trait impl resolves operation `{op}` for type {type_tag:?}")]
    UnresolvedTrait { op: Box<str>, type_tag: TypeTag },
    #[error("ambiguous trait impls resolve operation `{op}`: {candidates:?}")]
    AmbiguousTrait { op: Box<str>, candidates: Vec<TypeTag> },
}

/// Infer the runtime type an operand contributes to dispatch: a literal's
/// primitive type, or a `CExpr`'s own declared output type (which already
/// carries whatever an upstream `core/access`/`core/input` chain resolved
/// against an input schema, since that's baked into the `CExpr` at the
/// point it was built).
fn arg_type(arg: &CExpr) -> TypeTag {
    arg.output_type().clone()
}

/// Resolve `op` (e.g. `"add"`, `"eq"`) under `trait_name` (e.g. `"semiring"`,
/// `"eq"`) against `args`' inferred types, returning the concrete kind to
/// construct. If the registry carries exactly one impl of `trait_name`
/// total, it's selected unconditionally; otherwise dispatch walks every
/// operand in order and infers from the first one that carries a concrete
/// type, so an `Unknown`-typed leading operand doesn't sink dispatch when a
/// later operand still pins down the impl.
pub fn dispatch_kind(registry: &Registry, trait_name: &str, op: &str) -> impl Fn(&[CExpr]) -> Result<KindTag, DispatchError> + '_ {
    move |args: &[CExpr]| {
        let impls: Vec<_> = registry.trait_impls(trait_name).collect();
        let chosen = if impls.len() == 1 {
            impls[0]
        } else {
            let inferred = args
                .iter()
                .map(arg_type)
                .find(|t| *t != TypeTag::Unknown)
                .unwrap_or(TypeTag::Unknown);
            let matches: Vec<_> = impls.iter().filter(|t| t.type_tag == inferred).collect();
            match matches.len() {
                0 => {
                    return Err(DispatchError::UnresolvedTrait {
                        op: op.into(),
                        type_tag: inferred,
                    })
                }
                1 => matches[0],
                _ => {
                    return Err(DispatchError::AmbiguousTrait {
                        op: op.into(),
                        candidates: matches.iter().map(|t| t.type_tag.clone()).collect(),
                    })
                }
            }
        };
        chosen.node_kinds.get(op).cloned().ok_or_else(|| DispatchError::UnresolvedTrait {
            op: op.into(),
            type_tag: chosen.type_tag.clone(),
        })
    }
}

/// Resolve and build the `CExpr` for a typeclass operation in one step: the
/// shape a plugin's `$.add`/`$.eq`-style constructor actually calls.
pub fn dispatch_ctor(
    registry: &Registry,
    trait_name: &str,
    op: &str,
    args: Vec<CExpr>,
    output: TypeTag,
) -> Result<CExpr, DispatchError> {
    let kind = dispatch_kind(registry, trait_name, op)(&args)?;
    Ok(CExpr::new(kind, args.into_iter().map(CArg::from).collect(), output))
}
