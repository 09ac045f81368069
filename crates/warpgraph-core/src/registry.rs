//! The plugin protocol: kinds, shapes, lifts, traits, and the registry
//! the elaborator validates against.

use std::collections::HashMap;

use crate::payload::TypeTag;

/// A namespaced node-kind tag, e.g. `"num/add"`, `"core/literal"`.
///
/// Tags are opaque identifiers; only the plugin owning the namespace
/// assigns meaning to one. Stored as a reference-counted-free `Box<str>`
/// rather than an interned symbol: kinds are typically small in count and
/// compared by value, so interning would add complexity without a
/// measurable win here.
pub type KindTag = Box<str>;

/// How a kind's children are shaped in the adjacency map ("Structural
/// children"). Declared per-kind by a plugin's `shapes` table; absent
/// entries default to `Shape::List`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Plain ordered list of child ids, most kinds.
    List,
    /// A single array of element ids (`core/tuple`, `data/pair`, ...).
    Tuple,
    /// A single `{field -> id}` mapping (`core/record`, `geom/point`, ...).
    Record,
}

/// A kind's declared input arity/types and output type.
#[derive(Debug, Clone)]
pub struct KindSpec {
    pub inputs: InputsSpec,
    pub output: TypeTag,
}

impl KindSpec {
    pub fn new(inputs: InputsSpec, output: TypeTag) -> Self {
        Self { inputs, output }
    }
}

/// The shape of a kind's expected operand types, for elaborator validation.
#[derive(Debug, Clone)]
pub enum InputsSpec {
    /// Exactly this many operands, each with a declared output type.
    Fixed(Vec<TypeTag>),
    /// Any number of operands, each required to have this output type
    /// (tuples/records of homogeneous element type; variadic kinds).
    Variadic(TypeTag),
    /// No structural validation beyond what the `Shape` implies (used by
    /// structural kinds whose operand types vary by construction site,
    /// e.g. `core/record`).
    Any,
}

/// A typeclass implementation contributed by a plugin: for a given
/// runtime type, which concrete node kind realizes which named operation.
#[derive(Debug, Clone)]
pub struct TraitImpl {
    pub trait_name: &'static str,
    pub type_tag: TypeTag,
    /// operation name (e.g. `"add"`, `"eq"`) -> concrete kind (e.g. `"num/add"`)
    pub node_kinds: HashMap<&'static str, KindTag>,
}

/// A bundle of kinds, shapes, lifts, traits, constructors, and default
/// handlers under one namespace.
///
/// `ctors` (user-facing constructors that build `CExpr`s) are deliberately
/// not part of this trait: they are plain Rust functions exported by the
/// plugin crate, not data the kernel needs to inspect. Default handlers are
/// likewise not produced here: they live in `warpgraph-eval`'s
/// `DefaultHandlers` trait, which a plugin crate implements separately,
/// keeping kind data and execution in different crates with no dependency
/// from the former to the latter.
pub trait Plugin {
    fn name(&self) -> &'static str;

    fn kinds(&self) -> Vec<(KindTag, KindSpec)> {
        Vec::new()
    }

    fn shapes(&self) -> Vec<(KindTag, Shape)> {
        Vec::new()
    }

    /// primitive type tag name -> literal kind, used to lift raw values
    /// encountered as construction args.
    fn lifts(&self) -> Vec<(&'static str, KindTag)> {
        Vec::new()
    }

    fn traits(&self) -> Vec<TraitImpl> {
        Vec::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("kind `{0}` declared by more than one plugin")]
    DuplicateKind(KindTag),
}

/// The composed view of every plugin's contract, consulted by the
/// elaborator and the typeclass dispatcher.
#[derive(Debug, Default)]
pub struct Registry {
    kinds: HashMap<KindTag, KindSpec>,
    shapes: HashMap<KindTag, Shape>,
    lifts: HashMap<&'static str, KindTag>,
    traits: Vec<TraitImpl>,
}

impl Registry {
    pub fn compose(plugins: &[&dyn Plugin]) -> Result<Self, RegistryError> {
        let mut reg = Registry::default();
        for plugin in plugins {
            for (kind, spec) in plugin.kinds() {
                if reg.kinds.insert(kind.clone(), spec).is_some() {
                    return Err(RegistryError::DuplicateKind(kind));
                }
            }
            for (kind, shape) in plugin.shapes() {
                reg.shapes.insert(kind, shape);
            }
            for (prim, kind) in plugin.lifts() {
                reg.lifts.insert(prim, kind);
            }
            reg.traits.extend(plugin.traits());
        }
        Ok(reg)
    }

    pub fn kind_spec(&self, kind: &str) -> Option<&KindSpec> {
        self.kinds.get(kind)
    }

    pub fn shape_of(&self, kind: &str) -> Shape {
        self.shapes.get(kind).copied().unwrap_or(Shape::List)
    }

    pub fn lift_kind(&self, prim_type: &str) -> Option<&KindTag> {
        self.lifts.get(prim_type)
    }

    pub fn known_kind(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// All `TraitImpl`s registered for `trait_name`, in plugin-composition
    /// order (used by typeclass dispatch to resolve ambiguity deterministically
    /// when exactly one impl matches the inferred type).
    pub fn trait_impls(&self, trait_name: &str) -> impl Iterator<Item = &TraitImpl> {
        self.traits.iter().filter(move |t| t.trait_name == trait_name)
    }
}
