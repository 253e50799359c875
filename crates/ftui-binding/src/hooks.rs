#![forbid(unsafe_code)]

//! Pre-binding validation hooks.
//!
//! Every binder entry point asks the [`HookEvaluator`] before wiring
//! anything. Hooks run in registration order; the first one returning
//! `false` vetoes the binding, the rest are skipped, and a warning names
//! the rejected pair. A veto never raises an error: the caller gets an
//! inert binding.

use std::fmt;
use std::sync::Arc;

use crate::accessor::AccessorCache;
use crate::binder::BindingDirection;
use crate::path::PropertyPath;
use crate::registry::CowCell;
use crate::value::Value;

/// What a hook sees about the binding being created.
pub struct HookContext<'a> {
    pub(crate) source: &'a Value,
    pub(crate) target: &'a Value,
    pub(crate) source_path: Option<&'a PropertyPath>,
    pub(crate) target_path: &'a PropertyPath,
    pub(crate) direction: BindingDirection,
    pub(crate) accessors: &'a AccessorCache,
}

impl<'a> HookContext<'a> {
    /// Describe a binding about to be created.
    ///
    /// The binder builds one per call; hook authors can build their own to
    /// exercise a hook directly.
    #[must_use]
    pub fn new(
        source: &'a Value,
        target: &'a Value,
        source_path: Option<&'a PropertyPath>,
        target_path: &'a PropertyPath,
        direction: BindingDirection,
        accessors: &'a AccessorCache,
    ) -> Self {
        Self {
            source,
            target,
            source_path,
            target_path,
            direction,
            accessors,
        }
    }

    /// The source root object; `Null` for stream-to-target bindings.
    #[must_use]
    pub fn source(&self) -> &'a Value {
        self.source
    }

    /// The target root object.
    #[must_use]
    pub fn target(&self) -> &'a Value {
        self.target
    }

    #[must_use]
    pub fn source_path(&self) -> Option<&'a PropertyPath> {
        self.source_path
    }

    #[must_use]
    pub fn target_path(&self) -> &'a PropertyPath {
        self.target_path
    }

    #[must_use]
    pub fn direction(&self) -> BindingDirection {
        self.direction
    }

    /// Current values along the source path, stopping after a null link.
    #[must_use]
    pub fn current_source_values(&self) -> Vec<Value> {
        match self.source_path {
            Some(path) => self
                .accessors
                .chain_values(&path.root_object(self.source), path)
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Current values along the target path, stopping after a null link.
    #[must_use]
    pub fn current_target_values(&self) -> Vec<Value> {
        self.accessors
            .chain_values(&self.target_path.root_object(self.target), self.target_path)
            .unwrap_or_default()
    }

    fn describe_source(&self) -> String {
        self.source_path
            .map_or_else(|| "<stream>".to_owned(), ToString::to_string)
    }
}

/// A pre-binding validator.
pub trait PropertyBindingHook: Send + Sync {
    /// Return `false` to veto the binding.
    fn execute_hook(&self, context: &HookContext<'_>) -> bool;
}

impl<F> PropertyBindingHook for F
where
    F: Fn(&HookContext<'_>) -> bool + Send + Sync,
{
    fn execute_hook(&self, context: &HookContext<'_>) -> bool {
        self(context)
    }
}

/// Rejects bindings whose target object is null.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTargetHook;

impl PropertyBindingHook for NullTargetHook {
    fn execute_hook(&self, context: &HookContext<'_>) -> bool {
        !context.target().is_null()
    }
}

/// Ordered list of hooks with copy-on-write registration.
#[derive(Default)]
pub struct HookEvaluator {
    hooks: CowCell<Vec<Arc<dyn PropertyBindingHook>>>,
}

impl HookEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, hook: impl PropertyBindingHook + 'static) {
        let count = self.hooks.update(|hooks| {
            hooks.push(Arc::new(hook));
            hooks.len()
        });
        tracing::debug!(count, "registered binding hook");
    }

    /// Run every hook in order; `false` as soon as one vetoes.
    pub fn evaluate(&self, context: &HookContext<'_>) -> bool {
        let hooks = self.hooks.load();
        for hook in hooks.iter() {
            if !hook.execute_hook(context) {
                tracing::warn!(
                    source = %context.describe_source(),
                    target = %context.target_path(),
                    "binding hook rejected binding {} -> {}",
                    context.describe_source(),
                    context.target_path(),
                );
                return false;
            }
        }
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.load().is_empty()
    }
}

impl fmt::Debug for HookEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEvaluator")
            .field("hooks", &self.len())
            .finish()
    }
}
