#![forbid(unsafe_code)]

//! Dynamic values flowing through bindings.
//!
//! Bindings are wired at runtime between members whose types are only known
//! through the [`TypeRegistry`](crate::reflect::TypeRegistry), so every value
//! crossing a binding is carried as a [`Value`]:
//!
//! - [`Value::Null`]: the absence of an object (a null host or null leaf).
//! - [`Value::Data`]: a plain value compared with `PartialEq`.
//! - [`Value::Object`]: a shared host object compared by reference.
//!
//! # Invariants
//!
//! 1. Two `Value::Object`s are equal iff they point at the same allocation.
//! 2. Two `Value::Data`s are equal iff they hold the same Rust type and that
//!    type's `PartialEq` says so.
//! 3. [`TypeInfo`] equality and hashing use only the `TypeId`.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::notify::PropertyNotifier;

/// Runtime type descriptor.
///
/// Carries an optional default-value constructor, used when the engine needs
/// to know whether a property currently holds its type's default.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    default: Option<fn() -> Value>,
}

impl TypeInfo {
    /// Descriptor for `T` without a known default (objects, opaque data).
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            default: None,
        }
    }

    /// Descriptor for a data type whose default is `T::default()`.
    #[must_use]
    pub fn data<T: Data + Default>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            default: Some(default_value::<T>),
        }
    }

    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type name as reported by `std::any::type_name`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The type's default value; `Value::Null` when none is known.
    #[must_use]
    pub fn default_value(&self) -> Value {
        self.default.map_or(Value::Null, |make| make())
    }

    /// Whether this descriptor describes `T`.
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

fn default_value<T: Data + Default>() -> Value {
    Value::new(T::default())
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A plain value that can travel through a binding.
///
/// Blanket-implemented for every `Send + Sync + Debug + PartialEq` type.
pub trait Data: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn data_eq(&self, other: &dyn Data) -> bool;
    fn data_type(&self) -> TypeInfo;
}

impl<T> Data for T
where
    T: Any + Send + Sync + fmt::Debug + PartialEq,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn data_eq(&self, other: &dyn Data) -> bool {
        <dyn Data>::as_any(other)
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn data_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }
}

/// Type-erasure plumbing for [`Object`]; blanket-implemented.
pub trait ObjectAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn object_type(&self) -> TypeInfo;
}

impl<T: Any + Send + Sync> ObjectAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn object_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }
}

/// A host object whose members can be bound.
///
/// Objects that raise change notifications expose them through
/// [`notifier`](Object::notifier); objects returning `None` can still be
/// bound, but only their initial value is observed.
pub trait Object: ObjectAny {
    fn notifier(&self) -> Option<&PropertyNotifier> {
        None
    }
}

/// Shared handle to a host object.
pub type ObjectRef = Arc<dyn Object>;

/// Runtime type of a host object.
#[must_use]
pub fn object_type(object: &ObjectRef) -> TypeInfo {
    <dyn Object as ObjectAny>::object_type(&**object)
}

/// Borrow a host object as its concrete type.
#[must_use]
pub fn downcast_object<T: Object>(object: &ObjectRef) -> Option<&T> {
    <dyn Object as ObjectAny>::as_any(&**object).downcast_ref::<T>()
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Data(Arc<dyn Data>),
    Object(ObjectRef),
}

impl Value {
    /// Wrap a plain value.
    #[must_use]
    pub fn new<T: Data>(value: T) -> Self {
        Self::Data(Arc::new(value))
    }

    /// Wrap a host object.
    #[must_use]
    pub fn object<T: Object>(object: Arc<T>) -> Self {
        Self::Object(object)
    }

    /// Wrap an optional host object; `None` becomes [`Value::Null`].
    #[must_use]
    pub fn from_option<T: Object>(object: Option<Arc<T>>) -> Self {
        object.map_or(Self::Null, Self::object)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Runtime type, `None` for [`Value::Null`].
    #[must_use]
    pub fn type_info(&self) -> Option<TypeInfo> {
        match self {
            Self::Null => None,
            Self::Data(data) => Some(<dyn Data>::data_type(&**data)),
            Self::Object(object) => Some(object_type(object)),
        }
    }

    /// Name of the runtime type, `"null"` for [`Value::Null`].
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_info().map_or("null", |info| info.name())
    }

    /// Borrow the payload of a data value.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Data(data) => <dyn Data>::as_any(&**data).downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Clone the payload of a data value.
    #[must_use]
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Recover the concrete host object.
    #[must_use]
    pub fn object_as<T: Object>(&self) -> Option<Arc<T>> {
        let object = self.as_object()?;
        <dyn Object as ObjectAny>::into_any_arc(Arc::clone(object))
            .downcast::<T>()
            .ok()
    }

    /// Reference identity: same object allocation, or both null.
    ///
    /// Data values are never identical to anything, including themselves.
    #[must_use]
    pub fn same_ref(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Data(a), Self::Data(b)) => <dyn Data>::data_eq(&**a, &**b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Data(data) => fmt::Debug::fmt(&**data, f),
            Self::Object(object) => write!(f, "Object({})", object_type(object)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Host;
    impl Object for Host {}

    struct Other;
    impl Object for Other {}

    #[test]
    fn data_equality_uses_partial_eq() {
        assert_eq!(Value::new(3_i32), Value::new(3_i32));
        assert_ne!(Value::new(3_i32), Value::new(4_i32));
        assert_ne!(Value::new(3_i32), Value::new(3_i64), "different types");
    }

    #[test]
    fn object_equality_is_by_reference() {
        let a = Arc::new(Host);
        let b = Arc::new(Host);
        assert_eq!(Value::object(Arc::clone(&a)), Value::object(Arc::clone(&a)));
        assert_ne!(Value::object(a), Value::object(b));
    }

    #[test]
    fn null_and_type_info() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Null.type_info(), None);
        assert_eq!(Value::new("x".to_string()).type_info(), Some(TypeInfo::of::<String>()));
        assert_eq!(Value::object(Arc::new(Host)).type_info(), Some(TypeInfo::of::<Host>()));
    }

    #[test]
    fn typeinfo_default_value() {
        assert_eq!(TypeInfo::data::<i32>().default_value(), Value::new(0_i32));
        assert_eq!(TypeInfo::of::<Host>().default_value(), Value::Null);
        assert_eq!(TypeInfo::data::<i32>(), TypeInfo::of::<i32>());
    }

    #[test]
    fn object_round_trip() {
        let host = Arc::new(Host);
        let value = Value::object(Arc::clone(&host));
        let back = value.object_as::<Host>().unwrap();
        assert!(Arc::ptr_eq(&host, &back));
        assert!(value.object_as::<Other>().is_none());
    }

    #[test]
    fn downcast_data() {
        let value = Value::new(String::from("hi"));
        assert_eq!(value.get::<String>().as_deref(), Some("hi"));
        assert_eq!(value.get::<i32>(), None);
    }
}
