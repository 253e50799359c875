#![forbid(unsafe_code)]

//! Lifetime management for groups of bindings.

use std::fmt;

use super::stream::Stream;
use super::subscription::{Disposable, Subscription};

/// Collects live bindings and subscriptions for a logical owner (a view,
/// a dialog, a widget tree).
///
/// When the scope is dropped everything it holds is disposed, disconnecting
/// every binding created on the owner's behalf.
///
/// # Usage
///
/// ```ignore
/// let mut scope = BindingScope::new();
/// let count = PathExpr::parse_for::<Counter>("Count")?;
/// let text = PathExpr::parse_for::<Label>("Text")?;
/// scope.hold(engine.binder().one_way_bind(&vm, &count, &view, &text, OneWayOptions::default())?);
/// scope.subscribe(&notifier.changed(), |name| tracing::debug!(%name, "changed"));
/// // Dropping `scope` disposes both.
/// ```
///
/// # Invariants
///
/// 1. Held items are disposed in reverse registration order.
/// 2. After drop or [`clear`](BindingScope::clear), nothing held by this
///    scope delivers values.
/// 3. The scope is reusable after `clear()`.
#[derive(Default)]
pub struct BindingScope {
    held: Vec<Box<dyn Disposable>>,
}

impl BindingScope {
    #[must_use]
    pub fn new() -> Self {
        Self { held: Vec::new() }
    }

    /// Keep `item` alive until the scope is dropped or cleared.
    pub fn hold(&mut self, item: impl Disposable + 'static) -> &mut Self {
        self.held.push(Box::new(item));
        self
    }

    /// Subscribe to `stream` for the lifetime of this scope.
    pub fn subscribe<T: Clone + Send + Sync + 'static>(
        &mut self,
        stream: &Stream<T>,
        on_next: impl Fn(T) + Send + Sync + 'static,
    ) -> &mut Self {
        let sub: Subscription = stream.subscribe(on_next);
        self.hold(sub)
    }

    /// Number of items currently held.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.held.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Dispose everything now; the scope stays usable.
    pub fn clear(&mut self) {
        while let Some(item) = self.held.pop() {
            item.dispose();
        }
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.held.len())
            .finish()
    }
}
