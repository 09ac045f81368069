//! Reference plugin bundle: arithmetic, booleans, strings, structural/
//! control-flow primitives, error handling, mutable state, and fiber-style
//! concurrency shapes, plus typeclass-dispatch constructors over all of it.
//!
//! None of this is privileged — every plugin here is built against the same
//! [`Plugin`](warpgraph_core::Plugin)/[`DefaultHandlers`](warpgraph_eval::DefaultHandlers)
//! seams a third-party plugin would use.

pub mod bool;
pub mod core;
pub mod dispatch_ctors;
pub mod error;
pub mod fiber;
pub mod num;
pub mod state;
pub mod str;

pub use bool::BoolPlugin;
pub use core::CorePlugin;
pub use error::ErrorPlugin;
pub use fiber::FiberPlugin;
pub use num::NumPlugin;
pub use state::StatePlugin;
pub use str::StrPlugin;

use warpgraph_core::Plugin;
use warpgraph_eval::DefaultHandlers;

/// The full reference set, in the order later plugins' handlers should win
/// ties over earlier ones' (they don't overlap in practice, but `core`
/// leads since every other plugin's values flow through it).
pub fn all_plugins() -> Vec<&'static dyn Plugin> {
    vec![&CorePlugin, &NumPlugin, &BoolPlugin, &StrPlugin, &ErrorPlugin, &StatePlugin, &FiberPlugin]
}

pub fn all_defaults() -> Vec<&'static dyn DefaultHandlers> {
    vec![&CorePlugin, &NumPlugin, &BoolPlugin, &StrPlugin, &ErrorPlugin, &StatePlugin, &FiberPlugin]
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpgraph_core::Registry;
    use warpgraph_eval::defaults;
    use std::collections::HashMap;

    #[test]
    fn full_bundle_composes_without_gaps() {
        Registry::compose(&all_plugins()).unwrap();
        defaults(&all_defaults(), HashMap::new()).unwrap();
    }
}
