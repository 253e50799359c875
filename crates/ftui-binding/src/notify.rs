#![forbid(unsafe_code)]

//! Change notification hub for host objects.
//!
//! A host object embeds a [`PropertyNotifier`] and returns it from
//! [`Object::notifier`](crate::value::Object::notifier). Setters call
//! [`set_and_raise`](PropertyNotifier::set_and_raise), which performs an
//! equality-gated write and raises the before/after notifications with the
//! property name.
//!
//! Indexer changes are raised under the name `"Item[]"`
//! ([`INDEXER_CHANGED`]).

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::reactive::{Stream, Subject};

/// Notification name raised when any indexed value of an object changes.
pub const INDEXER_CHANGED: &str = "Item[]";

/// Before/after property change notifications for one object.
pub struct PropertyNotifier {
    changing: Subject<Arc<str>>,
    changed: Subject<Arc<str>>,
}

impl Default for PropertyNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            changing: Subject::new(),
            changed: Subject::new(),
        }
    }

    /// Announce that `property` is about to change.
    pub fn raise_property_changing(&self, property: &str) {
        self.changing.on_next(Arc::from(property));
    }

    /// Announce that `property` has changed.
    pub fn raise_property_changed(&self, property: &str) {
        self.changed.on_next(Arc::from(property));
    }

    /// Names of properties about to change.
    #[must_use]
    pub fn changing(&self) -> Stream<Arc<str>> {
        self.changing.stream()
    }

    /// Names of properties that changed.
    #[must_use]
    pub fn changed(&self) -> Stream<Arc<str>> {
        self.changed.stream()
    }

    /// Write `value` into `slot` unless it is already equal, raising the
    /// changing/changed pair around the write.
    ///
    /// Notifications are raised outside the slot lock so observers may read
    /// the property. Returns whether a write happened.
    pub fn set_and_raise<V: PartialEq>(&self, slot: &RwLock<V>, value: V, property: &str) -> bool {
        if *slot.read() == value {
            return false;
        }
        self.raise_property_changing(property);
        {
            let mut guard = slot.write();
            if *guard == value {
                return false;
            }
            *guard = value;
        }
        self.raise_property_changed(property);
        true
    }

    /// Number of live observers across both timings.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.changing.observer_count() + self.changed.observer_count()
    }
}

impl fmt::Debug for PropertyNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyNotifier")
            .field("observers", &self.observer_count())
            .finish()
    }
}
