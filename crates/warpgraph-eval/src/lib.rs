//! The execution half of the warpgraph kernel: the fold trampoline, the
//! per-kind coroutine handler protocol, volatile/taint tracking, the
//! defaults composer, and typeclass dispatch.
//!
//! Deliberately split from `warpgraph-core`: that crate holds the graph
//! data structures and pure transform algebra with no notion of running
//! anything, keeping the data layer free of any dependency on the
//! execution layer.

pub mod compose;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod trace;
pub mod trampoline;
pub mod value;

pub use compose::{defaults, ComposeError, DefaultHandlers};
pub use dispatch::{dispatch_ctor, dispatch_kind, DispatchError};
pub use error::FoldError;
pub use handler::{Coroutine, Environment, FnCoroutine, FoldCtx, Handler, Interpreter, Resumed, Step};
pub use trace::{NoopTracer, PrintTracer, Tracer};
pub use trampoline::{fold, fold_with_tracer, FoldOptions};
pub use value::Value;
