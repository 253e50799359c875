#![forbid(unsafe_code)]

//! Property-change observation.
//!
//! Host objects differ in how they announce changes, so observation is a
//! pluggable strategy: each [`ObservableForProperty`] scores an
//! `(object, property)` pair and the highest positive score wins (ties go
//! to the strategy registered last).
//!
//! | Adapter | Affinity | Objects |
//! |---------|----------|---------|
//! | [`NotifyingObservation`] | 5 | objects exposing a [`PropertyNotifier`](crate::notify::PropertyNotifier) |
//! | [`StaticObservation`] | 1 | anything; only the initial value is seen |
//!
//! [`ObservationService::when_any_value`] observes a whole path: every link
//! is watched, and when a link is replaced the observation re-anchors on
//! the new object.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::accessor::AccessorCache;
use crate::error::{BindError, Result};
use crate::path::{PathSegment, PropertyPath};
use crate::reactive::Stream;
use crate::registry::SnapshotRegistry;
use crate::value::{ObjectRef, TypeInfo, Value, object_type};

/// Emitted by an observation strategy when a property changes.
#[derive(Clone)]
pub struct ObservedChange {
    pub sender: ObjectRef,
    pub property: Arc<str>,
}

impl fmt::Debug for ObservedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedChange")
            .field("sender", &object_type(&self.sender))
            .field("property", &self.property)
            .finish()
    }
}

/// Turns "this property on this object changed" into a stream.
pub trait ObservableForProperty: Send + Sync {
    /// How well this strategy handles `property` on `object`; zero or less
    /// declines.
    fn affinity(&self, object: &ObjectRef, property: &str, before_change: bool) -> i32;

    /// Stream of changes. With `before_change` the stream fires before the
    /// value changes; a strategy that cannot do that returns an empty
    /// stream.
    fn observe(
        &self,
        object: &ObjectRef,
        property: &str,
        before_change: bool,
    ) -> Stream<ObservedChange>;
}

/// Observation through the object's [`PropertyNotifier`](crate::notify::PropertyNotifier).
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyingObservation;

impl ObservableForProperty for NotifyingObservation {
    fn affinity(&self, object: &ObjectRef, _property: &str, _before_change: bool) -> i32 {
        if object.notifier().is_some() { 5 } else { 0 }
    }

    fn observe(
        &self,
        object: &ObjectRef,
        property: &str,
        before_change: bool,
    ) -> Stream<ObservedChange> {
        let Some(notifier) = object.notifier() else {
            return Stream::empty();
        };
        let names = if before_change {
            notifier.changing()
        } else {
            notifier.changed()
        };
        let sender = Arc::clone(object);
        let wanted: Arc<str> = Arc::from(property);
        names.filter_map(move |name| {
            (name == wanted).then(|| ObservedChange {
                sender: Arc::clone(&sender),
                property: Arc::clone(&wanted),
            })
        })
    }
}

/// Last-resort observation for objects that never announce changes.
///
/// Emits nothing, so bindings see only the value read at subscription.
/// Warns once per type and property.
#[derive(Default)]
pub struct StaticObservation {
    warn: bool,
    warned: Mutex<HashSet<(TypeInfo, String)>>,
}

impl StaticObservation {
    #[must_use]
    pub fn new(warn: bool) -> Self {
        Self {
            warn,
            warned: Mutex::new(HashSet::new()),
        }
    }
}

impl fmt::Debug for StaticObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticObservation")
            .field("warn", &self.warn)
            .finish()
    }
}

impl ObservableForProperty for StaticObservation {
    fn affinity(&self, _object: &ObjectRef, _property: &str, _before_change: bool) -> i32 {
        1
    }

    fn observe(
        &self,
        object: &ObjectRef,
        property: &str,
        _before_change: bool,
    ) -> Stream<ObservedChange> {
        let owner = object_type(object);
        if self.warn && self.warned.lock().insert((owner, property.to_owned())) {
            tracing::warn!(
                type_name = owner.name(),
                property,
                "property does not raise change notifications; binding will only see its initial value"
            );
        }
        Stream::never()
    }
}

/// Selects observation strategies and observes whole paths.
///
/// Cloning shares the adapter registry and accessor cache.
#[derive(Clone)]
pub struct ObservationService {
    adapters: Arc<SnapshotRegistry<(), dyn ObservableForProperty>>,
    accessors: Arc<AccessorCache>,
}

impl ObservationService {
    #[must_use]
    pub fn new(accessors: Arc<AccessorCache>) -> Self {
        Self {
            adapters: Arc::new(SnapshotRegistry::new("observation-adapters")),
            accessors,
        }
    }

    /// Register the notifying and static adapters.
    pub fn install_defaults(&self, warn_on_unobservable: bool) {
        self.register(StaticObservation::new(warn_on_unobservable));
        self.register(NotifyingObservation);
    }

    pub fn register(&self, adapter: impl ObservableForProperty + 'static) {
        self.adapters.register((), Arc::new(adapter));
    }

    #[must_use]
    pub fn adapters(&self) -> Vec<Arc<dyn ObservableForProperty>> {
        self.adapters.get_all()
    }

    /// Change stream for `property` on `object` from the best adapter.
    pub fn notify_for_property(
        &self,
        object: &ObjectRef,
        property: &str,
        before_change: bool,
    ) -> Result<Stream<ObservedChange>> {
        let adapter = self
            .adapters
            .select(&(), |a| a.affinity(object, property, before_change))
            .ok_or_else(|| BindError::NoObservationAdapter {
                owner: object_type(object).name(),
                property: property.to_owned(),
            })?;
        Ok(adapter.observe(object, property, before_change))
    }

    /// Current value of `segment` on `host`, then its value after every
    /// change. `None` while the host is null.
    fn observe_segment(
        &self,
        host: Option<Value>,
        segment: &PathSegment,
        before_change: bool,
    ) -> Stream<Option<Value>> {
        let Some(Value::Object(object)) = host else {
            return Stream::just(None);
        };
        let getter = match self.accessors.getter_for(segment.member()) {
            Ok(getter) => getter,
            Err(error) => return Stream::fail(error),
        };
        let changes =
            match self.notify_for_property(&object, &segment.notification_name(), before_change) {
                Ok(changes) => changes,
                Err(error) => return Stream::fail(error),
            };
        let host = Value::Object(object);
        let args: Arc<[Value]> = Arc::from(segment.args());
        changes
            .map(|_| ())
            .start_with(())
            .try_map(move |()| getter.get(&host, &args).map(Some))
    }

    /// Observe every link of `path` from `root`.
    ///
    /// Emits `None` while an intermediate link is null, `Some(value)`
    /// otherwise (a null leaf is `Some(Value::Null)`). Consecutive equal
    /// values are suppressed.
    pub fn when_any(
        &self,
        root: &Value,
        path: &PropertyPath,
        before_change: bool,
    ) -> Stream<Option<Value>> {
        let mut stream = Stream::just(Some(root.clone()));
        for segment in path.segments() {
            let service = self.clone();
            let segment = segment.clone();
            stream = stream
                .map(move |host| service.observe_segment(host, &segment, before_change))
                .switch();
        }
        stream.distinct_until_changed()
    }

    /// Observe the value at the end of `path`; a null link reads as
    /// `Value::Null`.
    pub fn when_any_value(&self, root: &Value, path: &PropertyPath) -> Stream<Value> {
        self.when_any(root, path, false)
            .map(Option::unwrap_or_default)
            .distinct_until_changed()
    }
}

impl fmt::Debug for ObservationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationService")
            .field("adapters", &self.adapters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::PropertyNotifier;
    use crate::path::{PathExpr, PathResolver};
    use crate::reflect::{TypeDescriptor, TypeRegistry};
    use crate::value::Object;
    use parking_lot::RwLock;

    #[derive(Default)]
    struct Person {
        notifier: PropertyNotifier,
        name: RwLock<String>,
    }
    impl Object for Person {
        fn notifier(&self) -> Option<&PropertyNotifier> {
            Some(&self.notifier)
        }
    }
    impl Person {
        fn set_name(&self, name: &str) {
            self.notifier
                .set_and_raise(&self.name, name.to_owned(), "Name");
        }
    }

    #[derive(Default)]
    struct Team {
        notifier: PropertyNotifier,
        lead: RwLock<Option<Arc<Person>>>,
    }
    impl Object for Team {
        fn notifier(&self) -> Option<&PropertyNotifier> {
            Some(&self.notifier)
        }
    }
    impl Team {
        fn set_lead(&self, lead: Option<Arc<Person>>) {
            let changed = {
                let mut slot = self.lead.write();
                let same = match (&*slot, &lead) {
                    (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                    (None, None) => true,
                    _ => false,
                };
                *slot = lead;
                !same
            };
            if changed {
                self.notifier.raise_property_changed("Lead");
            }
        }
    }

    #[derive(Default)]
    struct Plain {
        size: RwLock<u32>,
    }
    impl Object for Plain {}

    fn setup() -> (ObservationService, TypeRegistry) {
        let types = TypeRegistry::new();
        types.register(
            TypeDescriptor::builder::<Person>()
                .property("Name", |p: &Person| p.name.read().clone(), |p, v: String| p.set_name(&v))
                .build(),
        );
        types.register(
            TypeDescriptor::builder::<Team>()
                .object("Lead", |t: &Team| t.lead.read().clone(), |t, v| t.set_lead(v))
                .build(),
        );
        types.register(
            TypeDescriptor::builder::<Plain>()
                .property("Size", |p: &Plain| *p.size.read(), |p, v| *p.size.write() = v)
                .build(),
        );
        let service = ObservationService::new(Arc::new(AccessorCache::new()));
        service.install_defaults(true);
        (service, types)
    }

    fn resolve<T: Object>(types: &TypeRegistry, text: &str) -> PropertyPath {
        PathResolver::new(types)
            .resolve(&PathExpr::parse_for::<T>(text).unwrap())
            .unwrap()
    }

    fn record(stream: &Stream<Value>) -> (Arc<Mutex<Vec<Value>>>, crate::reactive::Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let sub = stream.subscribe(move |v| s.lock().push(v));
        (seen, sub)
    }

    fn text(s: &str) -> Value {
        Value::new(s.to_owned())
    }

    #[test]
    fn notifying_adapter_wins_for_notifying_objects() {
        let (service, _) = setup();
        let person: ObjectRef = Arc::new(Person::default());
        let plain: ObjectRef = Arc::new(Plain::default());
        let pick = |object: &ObjectRef| {
            service
                .adapters()
                .iter()
                .map(|a| a.affinity(object, "X", false))
                .max()
        };
        assert_eq!(pick(&person), Some(5));
        assert_eq!(pick(&plain), Some(1));
    }

    #[test]
    fn no_adapter_is_an_error() {
        let service = ObservationService::new(Arc::new(AccessorCache::new()));
        let plain: ObjectRef = Arc::new(Plain::default());
        assert!(matches!(
            service.notify_for_property(&plain, "Size", false),
            Err(BindError::NoObservationAdapter { .. })
        ));
    }

    #[test]
    fn follows_chain_and_reanchors() {
        let (service, types) = setup();
        let team = Arc::new(Team::default());
        let path = resolve::<Team>(&types, "Lead.Name");
        let team_value = Value::object(Arc::clone(&team));
        let (seen, _sub) = record(&service.when_any_value(&team_value, &path));
        assert_eq!(*seen.lock(), vec![Value::Null], "null link reads as null");

        let alice = Arc::new(Person::default());
        alice.set_name("alice");
        team.set_lead(Some(Arc::clone(&alice)));
        alice.set_name("alicia");

        let bob = Arc::new(Person::default());
        bob.set_name("bob");
        team.set_lead(Some(Arc::clone(&bob)));
        alice.set_name("ignored");
        bob.set_name("robert");

        assert_eq!(
            *seen.lock(),
            vec![Value::Null, text("alice"), text("alicia"), text("bob"), text("robert")]
        );
        assert_eq!(alice.notifier.observer_count(), 0, "old link released");
    }

    #[test]
    fn when_any_distinguishes_null_link_from_null_leaf() {
        let (service, types) = setup();
        let team = Arc::new(Team::default());
        let root = Value::object(Arc::clone(&team));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = service
            .when_any(&root, &resolve::<Team>(&types, "Lead.Name"), false)
            .subscribe(move |v| s.lock().push(v));
        let _lead = service
            .when_any(&root, &resolve::<Team>(&types, "Lead"), false)
            .subscribe({
                let s = Arc::clone(&seen);
                move |v| s.lock().push(v)
            });
        assert_eq!(*seen.lock(), vec![None, Some(Value::Null)]);
    }

    #[test]
    fn static_objects_emit_initial_value_only() {
        let (service, types) = setup();
        let plain = Arc::new(Plain::default());
        *plain.size.write() = 4;
        let size = resolve::<Plain>(&types, "Size");
        let plain_value = Value::object(Arc::clone(&plain));
        let (seen, _sub) = record(&service.when_any_value(&plain_value, &size));
        *plain.size.write() = 9;
        assert_eq!(*seen.lock(), vec![Value::new(4_u32)]);
    }

    #[test]
    fn before_change_sees_old_value() {
        let (service, types) = setup();
        let person = Arc::new(Person::default());
        person.set_name("old");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = service
            .when_any(&Value::object(Arc::clone(&person)), &resolve::<Person>(&types, "Name"), true)
            .subscribe(move |v| s.lock().push(v));
        person.set_name("new");
        assert_eq!(*seen.lock(), vec![Some(text("old"))]);
    }
}
