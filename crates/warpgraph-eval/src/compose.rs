//! The defaults composer: builds a concrete [`Interpreter`] out of each
//! plugin's default handlers, union'd with caller-supplied overrides.

use std::collections::{HashMap, HashSet};

use warpgraph_core::KindTag;

use crate::handler::{Handler, Interpreter};

/// A plugin's contribution to evaluation: which kinds it declares (mirrors
/// `warpgraph_core::Plugin::kinds`' keys, kept separate so `warpgraph-core`
/// never has to know about `Handler`) and, optionally, a default coroutine
/// handler for each.
pub trait DefaultHandlers {
    fn name(&self) -> &'static str;

    /// Every node kind this plugin declares, whether or not it supplies a
    /// default handler for it.
    fn node_kinds(&self) -> Vec<KindTag>;

    /// Default handlers this plugin supplies, if any. A kind present in
    /// [`node_kinds`](Self::node_kinds) but absent here must be covered by
    /// an override passed to [`defaults`], or composition fails.
    fn default_interpreter(&self) -> Vec<(KindTag, Box<dyn Handler>)> {
        Vec::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("plugin `{0}` declares node kinds with no default handler and no override supplied")]
    NoInterpreter(&'static str),
}

/// Compose a concrete [`Interpreter`] from each plugin's defaults, with
/// `overrides` taking precedence. Later plugins in `plugins` win over
/// earlier ones when both declare a default for the same kind; overrides
/// win over every default regardless of declaration order.
pub fn defaults(
    plugins: &[&dyn DefaultHandlers],
    mut overrides: HashMap<KindTag, Box<dyn Handler>>,
) -> Result<Interpreter, ComposeError> {
    let mut interpreter = Interpreter::new();
    for plugin in plugins {
        let mut covered: HashSet<KindTag> = HashSet::new();
        for (kind, handler) in plugin.default_interpreter() {
            covered.insert(kind.clone());
            interpreter.insert(kind, handler);
        }
        for kind in plugin.node_kinds() {
            if !covered.contains(&kind) && !overrides.contains_key(&kind) {
                return Err(ComposeError::NoInterpreter(plugin.name()));
            }
        }
    }
    for (kind, handler) in overrides.drain() {
        interpreter.insert(kind, handler);
    }
    Ok(interpreter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Coroutine, FoldCtx, Step};
    use crate::value::Value;

    struct ConstHandler(i64);
    impl Handler for ConstHandler {
        fn start(&self, _id: &warpgraph_core::NodeId, _entry: &warpgraph_core::NodeEntry) -> Box<dyn Coroutine> {
            let v = self.0;
            Box::new(crate::handler::FnCoroutine(move |_: crate::handler::Resumed, _: &FoldCtx| {
                Ok(Step::Return(Value::Int(v)))
            }))
        }
    }

    struct OnePlugin;
    impl DefaultHandlers for OnePlugin {
        fn name(&self) -> &'static str {
            "one"
        }
        fn node_kinds(&self) -> Vec<KindTag> {
            vec!["one/const".into()]
        }
        fn default_interpreter(&self) -> Vec<(KindTag, Box<dyn Handler>)> {
            vec![("one/const".into(), Box::new(ConstHandler(1)))]
        }
    }

    struct BarePlugin;
    impl DefaultHandlers for BarePlugin {
        fn name(&self) -> &'static str {
            "bare"
        }
        fn node_kinds(&self) -> Vec<KindTag> {
            vec!["bare/needs_override".into()]
        }
    }

    #[test]
    fn defaults_compose_from_plugin() {
        let interp = defaults(&[&OnePlugin], HashMap::new()).unwrap();
        assert!(interp.get("one/const").is_some());
    }

    #[test]
    fn missing_default_without_override_fails() {
        let err = defaults(&[&BarePlugin], HashMap::new()).unwrap_err();
        assert!(matches!(err, ComposeError::NoInterpreter("bare")));
    }

    #[test]
    fn override_satisfies_plugin_with_no_default() {
        let mut overrides: HashMap<KindTag, Box<dyn Handler>> = HashMap::new();
        overrides.insert("bare/needs_override".into(), Box::new(ConstHandler(7)));
        let interp = defaults(&[&BarePlugin], overrides).unwrap();
        assert!(interp.get("bare/needs_override").is_some());
    }

    #[test]
    fn overrides_win_over_plugin_defaults() {
        let mut overrides: HashMap<KindTag, Box<dyn Handler>> = HashMap::new();
        overrides.insert("one/const".into(), Box::new(ConstHandler(99)));
        let interp = defaults(&[&OnePlugin], overrides).unwrap();
        assert!(interp.get("one/const").is_some());
    }
}
