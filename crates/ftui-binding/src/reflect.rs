#![forbid(unsafe_code)]

//! Explicit member registration for host types.
//!
//! Rust has no runtime reflection, so every bindable type registers a
//! [`TypeDescriptor`] listing its members as typed accessor closures. The
//! [`TypeRegistry`] maps a runtime [`TypeInfo`] to that descriptor; paths
//! are resolved against it.
//!
//! ```ignore
//! let descriptor = TypeDescriptor::builder::<Counter>()
//!     .property("Count", |c: &Counter| *c.count.read(), |c, v| c.set_count(v))
//!     .read_only("Doubled", |c: &Counter| *c.count.read() * 2)
//!     .object("Child", |c: &Counter| c.child.read().clone(), |c, v| c.set_child(v))
//!     .build();
//! registry.register(descriptor);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{BindError, Result};
use crate::registry::CowCell;
use crate::value::{Data, Object, ObjectRef, TypeInfo, Value, downcast_object, object_type};

/// Member name used for indexers.
pub const INDEXER_NAME: &str = "Item";

/// Reads a member: `(host, index arguments) -> value`.
pub type GetterFn = Arc<dyn Fn(&ObjectRef, &[Value]) -> Result<Value> + Send + Sync>;

/// Writes a member: `(host, value, index arguments)`.
pub type SetterFn = Arc<dyn Fn(&ObjectRef, Value, &[Value]) -> Result<()> + Send + Sync>;

/// One bindable member of a host type.
pub struct MemberInfo {
    owner: TypeInfo,
    name: Arc<str>,
    value_type: TypeInfo,
    arity: usize,
    getter: Option<GetterFn>,
    setter: Option<SetterFn>,
}

impl MemberInfo {
    #[must_use]
    pub fn owner(&self) -> TypeInfo {
        self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type of the member's value.
    #[must_use]
    pub fn value_type(&self) -> TypeInfo {
        self.value_type
    }

    /// Number of index arguments; zero for plain properties.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    #[must_use]
    pub fn is_indexer(&self) -> bool {
        self.arity > 0
    }

    #[must_use]
    pub fn can_read(&self) -> bool {
        self.getter.is_some()
    }

    #[must_use]
    pub fn can_write(&self) -> bool {
        self.setter.is_some()
    }

    pub(crate) fn getter(&self) -> Option<&GetterFn> {
        self.getter.as_ref()
    }

    pub(crate) fn setter(&self) -> Option<&SetterFn> {
        self.setter.as_ref()
    }

    /// Name used in change notifications for this member.
    #[must_use]
    pub fn notification_name(&self) -> String {
        if self.is_indexer() {
            format!("{}[]", self.name)
        } else {
            self.name.to_string()
        }
    }
}

impl fmt::Debug for MemberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInfo")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("arity", &self.arity)
            .field("readable", &self.can_read())
            .field("writable", &self.can_write())
            .finish()
    }
}

/// The bindable surface of one host type.
pub struct TypeDescriptor {
    info: TypeInfo,
    members: HashMap<Arc<str>, Arc<MemberInfo>>,
}

impl TypeDescriptor {
    /// Start describing `T`.
    #[must_use]
    pub fn builder<T: Object>() -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder {
            info: TypeInfo::of::<T>(),
            members: HashMap::new(),
            _owner: std::marker::PhantomData,
        }
    }

    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.info
    }

    #[must_use]
    pub fn member(&self, name: &str) -> Option<&Arc<MemberInfo>> {
        self.members.get(name)
    }

    pub fn members(&self) -> impl Iterator<Item = &Arc<MemberInfo>> {
        self.members.values()
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.members.keys().map(|k| &**k).collect();
        names.sort_unstable();
        f.debug_struct("TypeDescriptor")
            .field("type", &self.info)
            .field("members", &names)
            .finish()
    }
}

fn host<T: Object>(object: &ObjectRef) -> Result<&T> {
    downcast_object::<T>(object).ok_or_else(|| BindError::TypeMismatch {
        expected: std::any::type_name::<T>(),
        actual: object_type(object).name().to_owned(),
    })
}

fn data_arg<V: Data + Clone>(value: &Value) -> Result<V> {
    value.get::<V>().ok_or_else(|| BindError::TypeMismatch {
        expected: std::any::type_name::<V>(),
        actual: value.type_name().to_owned(),
    })
}

fn object_arg<C: Object>(value: &Value) -> Result<Option<Arc<C>>> {
    match value {
        Value::Null => Ok(None),
        other => other
            .object_as::<C>()
            .map(Some)
            .ok_or_else(|| BindError::TypeMismatch {
                expected: std::any::type_name::<C>(),
                actual: other.type_name().to_owned(),
            }),
    }
}

fn index_arg<K: Data + Clone>(args: &[Value]) -> Result<K> {
    match args {
        [key] => data_arg::<K>(key),
        _ => Err(BindError::InvalidOperation(format!(
            "indexer expects 1 argument, got {}",
            args.len()
        ))),
    }
}

/// Builder returned by [`TypeDescriptor::builder`].
pub struct TypeDescriptorBuilder<T> {
    info: TypeInfo,
    members: HashMap<Arc<str>, Arc<MemberInfo>>,
    _owner: std::marker::PhantomData<fn() -> T>,
}

impl<T: Object> TypeDescriptorBuilder<T> {
    fn push(
        mut self,
        name: &str,
        value_type: TypeInfo,
        arity: usize,
        getter: Option<GetterFn>,
        setter: Option<SetterFn>,
    ) -> Self {
        let name: Arc<str> = Arc::from(name);
        let member = MemberInfo {
            owner: self.info,
            name: Arc::clone(&name),
            value_type,
            arity,
            getter,
            setter,
        };
        self.members.insert(name, Arc::new(member));
        self
    }

    fn data_getter<V: Data + Clone>(get: impl Fn(&T) -> V + Send + Sync + 'static) -> GetterFn {
        Arc::new(move |object: &ObjectRef, _: &[Value]| Ok(Value::new(get(host::<T>(object)?))))
    }

    fn object_getter<C: Object>(
        get: impl Fn(&T) -> Option<Arc<C>> + Send + Sync + 'static,
    ) -> GetterFn {
        Arc::new(move |object: &ObjectRef, _: &[Value]| {
            Ok(Value::from_option(get(host::<T>(object)?)))
        })
    }

    /// A readable and writable data property.
    pub fn property<V: Data + Clone + Default>(
        self,
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&T, V) + Send + Sync + 'static,
    ) -> Self {
        let setter: SetterFn = Arc::new(move |object: &ObjectRef, value: Value, _: &[Value]| {
            set(host::<T>(object)?, data_arg::<V>(&value)?);
            Ok(())
        });
        self.push(
            name,
            TypeInfo::data::<V>(),
            0,
            Some(Self::data_getter(get)),
            Some(setter),
        )
    }

    /// A data property whose setter may refuse a value.
    pub fn validated_property<V: Data + Clone + Default>(
        self,
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&T, V) -> std::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        let member: Arc<str> = Arc::from(name);
        let setter: SetterFn = Arc::new(move |object: &ObjectRef, value: Value, _: &[Value]| {
            set(host::<T>(object)?, data_arg::<V>(&value)?).map_err(|message| {
                BindError::SetterFailed {
                    member: member.to_string(),
                    message,
                }
            })
        });
        self.push(
            name,
            TypeInfo::data::<V>(),
            0,
            Some(Self::data_getter(get)),
            Some(setter),
        )
    }

    /// A data property without a setter.
    pub fn read_only<V: Data + Clone + Default>(
        self,
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Self {
        self.push(
            name,
            TypeInfo::data::<V>(),
            0,
            Some(Self::data_getter(get)),
            None,
        )
    }

    /// A data property without a public getter.
    pub fn write_only<V: Data + Clone + Default>(
        self,
        name: &str,
        set: impl Fn(&T, V) + Send + Sync + 'static,
    ) -> Self {
        let setter: SetterFn = Arc::new(move |object: &ObjectRef, value: Value, _: &[Value]| {
            set(host::<T>(object)?, data_arg::<V>(&value)?);
            Ok(())
        });
        self.push(name, TypeInfo::data::<V>(), 0, None, Some(setter))
    }

    /// A property holding an optional object of concrete type `C`.
    pub fn object<C: Object>(
        self,
        name: &str,
        get: impl Fn(&T) -> Option<Arc<C>> + Send + Sync + 'static,
        set: impl Fn(&T, Option<Arc<C>>) + Send + Sync + 'static,
    ) -> Self {
        let setter: SetterFn = Arc::new(move |object: &ObjectRef, value: Value, _: &[Value]| {
            set(host::<T>(object)?, object_arg::<C>(&value)?);
            Ok(())
        });
        self.push(
            name,
            TypeInfo::of::<C>(),
            0,
            Some(Self::object_getter(get)),
            Some(setter),
        )
    }

    /// A read-only property holding an optional object of type `C`.
    pub fn read_only_object<C: Object>(
        self,
        name: &str,
        get: impl Fn(&T) -> Option<Arc<C>> + Send + Sync + 'static,
    ) -> Self {
        self.push(
            name,
            TypeInfo::of::<C>(),
            0,
            Some(Self::object_getter(get)),
            None,
        )
    }

    /// A property holding any object, typed only as `dyn Object`.
    ///
    /// Typical for a view's `ViewModel` slot, which accepts view-models of
    /// several types.
    pub fn any_object(
        self,
        name: &str,
        get: impl Fn(&T) -> Option<ObjectRef> + Send + Sync + 'static,
        set: impl Fn(&T, Option<ObjectRef>) + Send + Sync + 'static,
    ) -> Self {
        let getter: GetterFn = Arc::new(move |object: &ObjectRef, _: &[Value]| {
            Ok(get(host::<T>(object)?).map_or(Value::Null, Value::Object))
        });
        let setter: SetterFn = Arc::new(move |object: &ObjectRef, value: Value, _: &[Value]| {
            let slot = match value {
                Value::Null => None,
                Value::Object(inner) => Some(inner),
                Value::Data(data) => {
                    return Err(BindError::TypeMismatch {
                        expected: "object",
                        actual: Value::Data(data).type_name().to_owned(),
                    });
                }
            };
            set(host::<T>(object)?, slot);
            Ok(())
        });
        self.push(
            name,
            TypeInfo::of::<dyn Object>(),
            0,
            Some(getter),
            Some(setter),
        )
    }

    /// A single-key indexer registered as [`INDEXER_NAME`].
    pub fn indexer<K: Data + Clone, V: Data + Clone + Default>(
        self,
        get: impl Fn(&T, &K) -> V + Send + Sync + 'static,
        set: impl Fn(&T, K, V) + Send + Sync + 'static,
    ) -> Self {
        let getter: GetterFn = Arc::new(move |object: &ObjectRef, args: &[Value]| {
            let key = index_arg::<K>(args)?;
            Ok(Value::new(get(host::<T>(object)?, &key)))
        });
        let setter: SetterFn = Arc::new(move |object: &ObjectRef, value: Value, args: &[Value]| {
            let key = index_arg::<K>(args)?;
            set(host::<T>(object)?, key, data_arg::<V>(&value)?);
            Ok(())
        });
        self.push(
            INDEXER_NAME,
            TypeInfo::data::<V>(),
            1,
            Some(getter),
            Some(setter),
        )
    }

    /// A single-key indexer without a setter.
    pub fn read_only_indexer<K: Data + Clone, V: Data + Clone + Default>(
        self,
        get: impl Fn(&T, &K) -> V + Send + Sync + 'static,
    ) -> Self {
        let getter: GetterFn = Arc::new(move |object: &ObjectRef, args: &[Value]| {
            let key = index_arg::<K>(args)?;
            Ok(Value::new(get(host::<T>(object)?, &key)))
        });
        self.push(INDEXER_NAME, TypeInfo::data::<V>(), 1, Some(getter), None)
    }

    #[must_use]
    pub fn build(self) -> TypeDescriptor {
        TypeDescriptor {
            info: self.info,
            members: self.members,
        }
    }
}

/// Runtime type → descriptor map with lock-free lookups.
pub struct TypeRegistry {
    types: CowCell<HashMap<TypeInfo, Arc<TypeDescriptor>>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: CowCell::new(HashMap::new()),
        }
    }

    /// Register (or replace) the descriptor for its type.
    pub fn register(&self, descriptor: TypeDescriptor) {
        let info = descriptor.type_info();
        let replaced = self
            .types
            .update(|types| types.insert(info, Arc::new(descriptor)).is_some());
        tracing::debug!(type_name = info.name(), replaced, "registered type descriptor");
    }

    #[must_use]
    pub fn descriptor(&self, info: TypeInfo) -> Option<Arc<TypeDescriptor>> {
        self.types.load().get(&info).cloned()
    }

    /// Look up `name` on `owner`.
    #[must_use]
    pub fn member(&self, owner: TypeInfo, name: &str) -> Option<Arc<MemberInfo>> {
        self.types
            .load()
            .get(&owner)
            .and_then(|descriptor| descriptor.member(name).cloned())
    }

    #[must_use]
    pub fn contains(&self, info: TypeInfo) -> bool {
        self.types.load().contains_key(&info)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.load().is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::RwLock;

    #[derive(Default)]
    struct Gauge {
        level: RwLock<i32>,
        cells: RwLock<Vec<String>>,
    }
    impl Object for Gauge {}

    struct Stranger;
    impl Object for Stranger {}

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::builder::<Gauge>()
            .validated_property(
                "Level",
                |g: &Gauge| *g.level.read(),
                |g, v| {
                    if v < 0 {
                        return Err(format!("{v} is negative"));
                    }
                    *g.level.write() = v;
                    Ok(())
                },
            )
            .read_only("Doubled", |g: &Gauge| *g.level.read() * 2)
            .indexer(
                |g: &Gauge, i: &i64| {
                    g.cells
                        .read()
                        .get(*i as usize)
                        .cloned()
                        .unwrap_or_default()
                },
                |g, i, v| {
                    let mut cells = g.cells.write();
                    let i = i as usize;
                    if cells.len() <= i {
                        cells.resize(i + 1, String::new());
                    }
                    cells[i] = v;
                },
            )
            .build()
    }

    #[test]
    fn property_get_and_set() {
        let member = descriptor().member("Level").cloned().unwrap();
        let gauge: ObjectRef = Arc::new(Gauge::default());
        (member.setter().unwrap())(&gauge, Value::new(4_i32), &[]).unwrap();
        let got = (member.getter().unwrap())(&gauge, &[]).unwrap();
        assert_eq!(got, Value::new(4_i32));
        assert_eq!(member.value_type(), TypeInfo::of::<i32>());
    }

    #[test]
    fn validated_setter_reports_failure() {
        let member = descriptor().member("Level").cloned().unwrap();
        let gauge: ObjectRef = Arc::new(Gauge::default());
        let err = (member.setter().unwrap())(&gauge, Value::new(-1_i32), &[]).unwrap_err();
        assert_eq!(
            err,
            BindError::SetterFailed {
                member: "Level".into(),
                message: "-1 is negative".into()
            }
        );
    }

    #[test]
    fn wrong_host_or_value_type_is_a_mismatch() {
        let member = descriptor().member("Level").cloned().unwrap();
        let stranger: ObjectRef = Arc::new(Stranger);
        let err = (member.getter().unwrap())(&stranger, &[]).unwrap_err();
        assert!(matches!(err, BindError::TypeMismatch { .. }));

        let gauge: ObjectRef = Arc::new(Gauge::default());
        let err = (member.setter().unwrap())(&gauge, Value::new("x".to_string()), &[]).unwrap_err();
        assert!(matches!(err, BindError::TypeMismatch { .. }));
    }

    #[test]
    fn indexer_uses_item_name_and_arguments() {
        let descriptor = descriptor();
        let member = descriptor.member(INDEXER_NAME).cloned().unwrap();
        assert_eq!(member.arity(), 1);
        assert_eq!(member.notification_name(), "Item[]");

        let gauge: ObjectRef = Arc::new(Gauge::default());
        let args = [Value::new(2_i64)];
        (member.setter().unwrap())(&gauge, Value::new("c".to_string()), &args).unwrap();
        let got = (member.getter().unwrap())(&gauge, &args).unwrap();
        assert_eq!(got.get::<String>().as_deref(), Some("c"));
        assert!((member.getter().unwrap())(&gauge, &[]).is_err());
    }

    #[test]
    fn read_only_object_reads_the_child() {
        struct Rack {
            gauge: Option<Arc<Gauge>>,
        }
        impl Object for Rack {}

        let descriptor = TypeDescriptor::builder::<Rack>()
            .read_only_object("Gauge", |r: &Rack| r.gauge.clone())
            .build();
        let member = descriptor.member("Gauge").cloned().unwrap();
        assert!(member.can_read());
        assert!(!member.can_write());
        assert_eq!(member.value_type(), TypeInfo::of::<Gauge>());

        let gauge = Arc::new(Gauge::default());
        let rack: ObjectRef = Arc::new(Rack {
            gauge: Some(Arc::clone(&gauge)),
        });
        let got = (member.getter().unwrap())(&rack, &[]).unwrap();
        assert!(got.same_ref(&Value::object(gauge)));

        let empty: ObjectRef = Arc::new(Rack { gauge: None });
        assert!((member.getter().unwrap())(&empty, &[]).unwrap().is_null());
    }

    #[test]
    fn registry_lookup() {
        let registry = TypeRegistry::new();
        registry.register(descriptor());
        let doubled = registry
            .member(TypeInfo::of::<Gauge>(), "Doubled")
            .unwrap();
        assert!(doubled.can_read());
        assert!(!doubled.can_write());
        assert!(registry.member(TypeInfo::of::<Gauge>(), "Missing").is_none());
        assert!(registry.member(TypeInfo::of::<Stranger>(), "Level").is_none());
    }
}
