//! Data model and pure graph algebra for an embeddable, plugin-extensible
//! expression DAG: content-addressed construction, elaboration into a
//! normalized adjacency map, structural selection, and transforms over a
//! mutable workspace.
//!
//! This crate has no notion of evaluation; it only builds and reshapes the
//! graph. Running one lives in a separate crate, kept free of any
//! dependency back onto it.

pub mod cexpr;
pub mod elaborate;
pub mod graph;
pub mod ids;
pub mod payload;
pub mod predicate;
pub mod registry;
pub mod transform;

pub use cexpr::{AccessError, CArg, CExpr};
pub use elaborate::{app, ElaborateError};
pub use graph::{Children, DirtyExpr, NExpr, NodeEntry};
pub use ids::{ContentId, IdGen, NodeId};
pub use payload::{Payload, Selector, TypeTag};
pub use predicate::Predicate;
pub use registry::{InputsSpec, KindSpec, KindTag, Plugin, Registry, RegistryError, Shape, TraitImpl};
pub use transform::{commit, gc, map_where, name, open, pipe, replace_where, splice_where, wrap_by_name, CommitError};
