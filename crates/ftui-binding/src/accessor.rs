#![forbid(unsafe_code)]

//! Cached member accessors and chain traversal.
//!
//! [`AccessorCache`] hands out one [`Getter`]/[`Setter`] per member,
//! memoized in a concurrent map. Two threads compiling the same member at
//! once may both build an accessor; the map keeps whichever lands first
//! and both are interchangeable.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{AccessorKind, BindError, Result};
use crate::path::PropertyPath;
use crate::reflect::{GetterFn, MemberInfo, SetterFn};
use crate::value::{TypeInfo, Value};

type MemberKey = (TypeInfo, Arc<str>);

fn key(member: &MemberInfo) -> MemberKey {
    (member.owner(), Arc::from(member.name()))
}

fn check_host(member: &MemberInfo, host: &Value, args: &[Value]) -> Result<()> {
    match host {
        Value::Null => Err(BindError::InvalidOperation(format!(
            "cannot access `{}` on a null host",
            member.name()
        ))),
        Value::Data(_) => Err(BindError::TypeMismatch {
            expected: member.owner().name(),
            actual: host.type_name().to_owned(),
        }),
        Value::Object(_) if args.len() != member.arity() => {
            Err(BindError::InvalidOperation(format!(
                "`{}` takes {} index argument(s), got {}",
                member.name(),
                member.arity(),
                args.len()
            )))
        }
        Value::Object(_) => Ok(()),
    }
}

/// Compiled read access to one member.
pub struct Getter {
    member: Arc<MemberInfo>,
    read: GetterFn,
}

impl Getter {
    /// Read the member from `host`.
    pub fn get(&self, host: &Value, args: &[Value]) -> Result<Value> {
        check_host(&self.member, host, args)?;
        match host {
            Value::Object(object) => (self.read)(object, args),
            _ => Ok(Value::Null),
        }
    }

    #[must_use]
    pub fn member(&self) -> &Arc<MemberInfo> {
        &self.member
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Getter({}.{})", self.member.owner(), self.member.name())
    }
}

/// Compiled write access to one member.
pub struct Setter {
    member: Arc<MemberInfo>,
    write: SetterFn,
}

impl Setter {
    /// Write `value` into the member on `host`.
    pub fn set(&self, host: &Value, value: Value, args: &[Value]) -> Result<()> {
        check_host(&self.member, host, args)?;
        match host {
            Value::Object(object) => (self.write)(object, value, args),
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn member(&self) -> &Arc<MemberInfo> {
        &self.member
    }
}

impl fmt::Debug for Setter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Setter({}.{})", self.member.owner(), self.member.name())
    }
}

/// Thread-safe memo of compiled accessors.
#[derive(Default)]
pub struct AccessorCache {
    getters: DashMap<MemberKey, Arc<Getter>>,
    setters: DashMap<MemberKey, Arc<Setter>>,
}

impl AccessorCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Getter for `member`; fails when it has no public getter.
    pub fn getter_for(&self, member: &Arc<MemberInfo>) -> Result<Arc<Getter>> {
        let key = key(member);
        if let Some(getter) = self.getters.get(&key) {
            return Ok(Arc::clone(getter.value()));
        }
        let read = member
            .getter()
            .cloned()
            .ok_or_else(|| BindError::AccessorNotFound {
                owner: member.owner().name(),
                member: member.name().to_owned(),
                kind: AccessorKind::Getter,
            })?;
        let compiled = Arc::new(Getter {
            member: Arc::clone(member),
            read,
        });
        Ok(Arc::clone(self.getters.entry(key).or_insert(compiled).value()))
    }

    /// Setter for `member`; fails when it is read-only.
    pub fn setter_for(&self, member: &Arc<MemberInfo>) -> Result<Arc<Setter>> {
        let key = key(member);
        if let Some(setter) = self.setters.get(&key) {
            return Ok(Arc::clone(setter.value()));
        }
        let write = member
            .setter()
            .cloned()
            .ok_or_else(|| BindError::AccessorNotFound {
                owner: member.owner().name(),
                member: member.name().to_owned(),
                kind: AccessorKind::Setter,
            })?;
        let compiled = Arc::new(Setter {
            member: Arc::clone(member),
            write,
        });
        Ok(Arc::clone(self.setters.entry(key).or_insert(compiled).value()))
    }

    /// Read the whole chain starting at `root`.
    ///
    /// Returns `Ok(None)` when an intermediate link is null; a null value
    /// at the end of the chain is `Ok(Some(Value::Null))`.
    pub fn get_value(&self, root: &Value, path: &PropertyPath) -> Result<Option<Value>> {
        let mut current = root.clone();
        for segment in path.segments() {
            if current.is_null() {
                return Ok(None);
            }
            let getter = self.getter_for(segment.member())?;
            current = getter.get(&current, segment.args())?;
        }
        Ok(Some(current))
    }

    /// Values at every link of the chain, stopping after the first null.
    pub fn chain_values(&self, root: &Value, path: &PropertyPath) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(path.len());
        let mut current = root.clone();
        for segment in path.segments() {
            if current.is_null() {
                break;
            }
            let getter = self.getter_for(segment.member())?;
            current = getter.get(&current, segment.args())?;
            values.push(current.clone());
        }
        Ok(values)
    }

    /// Write `value` to the last member of `path`.
    ///
    /// When the host is unavailable the write is skipped and `Ok(false)`
    /// returned, unless `should_throw` is set.
    pub fn set_value(
        &self,
        root: &Value,
        path: &PropertyPath,
        value: Value,
        should_throw: bool,
    ) -> Result<bool> {
        let Some(last) = path.last() else {
            return Err(BindError::InvalidOperation(
                "cannot assign to the root of a path".to_owned(),
            ));
        };
        let host = match path.parent() {
            Some(parent) => self.get_value(root, &parent)?,
            None => Some(root.clone()),
        };
        match host {
            Some(host) if !host.is_null() => {
                let setter = self.setter_for(last.member())?;
                setter.set(&host, value, last.args())?;
                Ok(true)
            }
            _ if should_throw => Err(BindError::InvalidOperation(format!(
                "host of `{path}` is null"
            ))),
            _ => Ok(false),
        }
    }

    /// Number of compiled getters and setters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.getters.len() + self.setters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for AccessorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorCache")
            .field("getters", &self.getters.len())
            .field("setters", &self.setters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{PathExpr, PathResolver};
    use crate::reflect::{TypeDescriptor, TypeRegistry};
    use crate::value::Object;
    use parking_lot::RwLock;
    use std::thread;

    #[derive(Default)]
    struct Leaf {
        name: RwLock<String>,
    }
    impl Object for Leaf {}

    #[derive(Default)]
    struct Branch {
        leaf: RwLock<Option<Arc<Leaf>>>,
    }
    impl Object for Branch {}

    fn types() -> TypeRegistry {
        let types = TypeRegistry::new();
        types.register(
            TypeDescriptor::builder::<Leaf>()
                .property("Name", |l: &Leaf| l.name.read().clone(), |l, v| *l.name.write() = v)
                .read_only("Len", |l: &Leaf| l.name.read().len())
                .write_only("Sink", |l: &Leaf, v: String| *l.name.write() = v)
                .build(),
        );
        types.register(
            TypeDescriptor::builder::<Branch>()
                .object("Leaf", |b: &Branch| b.leaf.read().clone(), |b, v| *b.leaf.write() = v)
                .build(),
        );
        types
    }

    fn path(types: &TypeRegistry, text: &str) -> PropertyPath {
        PathResolver::new(types)
            .resolve(&PathExpr::parse_for::<Branch>(text).unwrap())
            .unwrap()
    }

    #[test]
    fn missing_accessors_are_reported() {
        let types = types();
        let cache = AccessorCache::new();
        let len = types.member(TypeInfo::of::<Leaf>(), "Len").unwrap();
        let sink = types.member(TypeInfo::of::<Leaf>(), "Sink").unwrap();
        assert!(matches!(
            cache.setter_for(&len),
            Err(BindError::AccessorNotFound { kind: AccessorKind::Setter, .. })
        ));
        assert!(matches!(
            cache.getter_for(&sink),
            Err(BindError::AccessorNotFound { kind: AccessorKind::Getter, .. })
        ));
    }

    #[test]
    fn accessors_are_memoized() {
        let types = types();
        let cache = AccessorCache::new();
        let name = types.member(TypeInfo::of::<Leaf>(), "Name").unwrap();
        let a = cache.getter_for(&name).unwrap();
        let b = cache.getter_for(&name).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_compilation_converges() {
        let types = types();
        let cache = Arc::new(AccessorCache::new());
        let name = types.member(TypeInfo::of::<Leaf>(), "Name").unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let name = Arc::clone(&name);
                thread::spawn(move || cache.getter_for(&name).unwrap())
            })
            .collect();
        let getters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(cache.len(), 1);
        let cached = cache.getter_for(&name).unwrap();
        assert!(getters.iter().any(|g| Arc::ptr_eq(g, &cached)));
    }

    #[test]
    fn chain_get_and_set() {
        let types = types();
        let cache = AccessorCache::new();
        let branch = Arc::new(Branch::default());
        let root = Value::object(Arc::clone(&branch));
        let leaf_name = path(&types, "Leaf.Name");

        assert_eq!(cache.get_value(&root, &leaf_name).unwrap(), None, "null link");
        assert!(!cache.set_value(&root, &leaf_name, Value::new("x".to_string()), false).unwrap());
        assert!(cache.set_value(&root, &leaf_name, Value::new("x".to_string()), true).is_err());

        *branch.leaf.write() = Some(Arc::new(Leaf::default()));
        assert!(cache.set_value(&root, &leaf_name, Value::new("hi".to_string()), true).unwrap());
        assert_eq!(
            cache.get_value(&root, &leaf_name).unwrap(),
            Some(Value::new("hi".to_string()))
        );
        assert_eq!(cache.chain_values(&root, &leaf_name).unwrap().len(), 2);
    }

    #[test]
    fn null_leaf_is_a_value() {
        let types = types();
        let cache = AccessorCache::new();
        let root = Value::object(Arc::new(Branch::default()));
        let leaf = path(&types, "Leaf");
        assert_eq!(cache.get_value(&root, &leaf).unwrap(), Some(Value::Null));
    }
}
