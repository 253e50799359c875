#![forbid(unsafe_code)]

use std::sync::Arc;

use super::{FallbackConverter, SetMethodConverter, TypedConverter};
use crate::registry::SnapshotRegistry;
use crate::value::TypeInfo;

/// Exact-pair converters keyed by `(from, to)`.
#[derive(Debug)]
pub struct TypedConverterRegistry {
    inner: SnapshotRegistry<(TypeInfo, TypeInfo), dyn TypedConverter>,
}

impl Default for TypedConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedConverterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SnapshotRegistry::new("typed-converters"),
        }
    }

    pub fn register(&self, converter: Arc<dyn TypedConverter>) {
        let key = (converter.from_type(), converter.to_type());
        self.inner.register(key, converter);
    }

    /// Best positive-affinity converter for exactly `from -> to`.
    #[must_use]
    pub fn try_get_converter(
        &self,
        from: TypeInfo,
        to: TypeInfo,
    ) -> Option<Arc<dyn TypedConverter>> {
        self.inner.select(&(from, to), |c| c.affinity())
    }

    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<dyn TypedConverter>> {
        self.inner.get_all()
    }
}

/// Runtime-scored converters.
#[derive(Debug)]
pub struct FallbackConverterRegistry {
    inner: SnapshotRegistry<(), dyn FallbackConverter>,
}

impl Default for FallbackConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackConverterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SnapshotRegistry::new("fallback-converters"),
        }
    }

    pub fn register(&self, converter: Arc<dyn FallbackConverter>) {
        self.inner.register((), converter);
    }

    /// Score every entry against `from -> to` and return the best.
    #[must_use]
    pub fn try_get_converter(
        &self,
        from: TypeInfo,
        to: TypeInfo,
    ) -> Option<Arc<dyn FallbackConverter>> {
        self.inner.select(&(), |c| c.affinity(from, to))
    }

    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<dyn FallbackConverter>> {
        self.inner.get_all()
    }
}

/// Converters used for the write step of set-then-get.
#[derive(Debug)]
pub struct SetMethodConverterRegistry {
    inner: SnapshotRegistry<(), dyn SetMethodConverter>,
}

impl Default for SetMethodConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SetMethodConverterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SnapshotRegistry::new("set-method-converters"),
        }
    }

    pub fn register(&self, converter: Arc<dyn SetMethodConverter>) {
        self.inner.register((), converter);
    }

    #[must_use]
    pub fn try_get_converter(
        &self,
        from: Option<TypeInfo>,
        to: Option<TypeInfo>,
    ) -> Option<Arc<dyn SetMethodConverter>> {
        self.inner.select(&(), |c| c.affinity(from, to))
    }

    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<dyn SetMethodConverter>> {
        self.inner.get_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::FnConverter;
    use crate::value::Value;

    #[test]
    fn typed_registry_is_keyed_by_exact_pair() {
        let registry = TypedConverterRegistry::new();
        registry.register(Arc::new(FnConverter::new(3, |v: &i32, _| Some(v.to_string()))));
        registry.register(Arc::new(FnConverter::new(3, |v: &i64, _| Some(v.to_string()))));
        let found = registry
            .try_get_converter(TypeInfo::of::<i64>(), TypeInfo::of::<String>())
            .unwrap();
        assert_eq!(found.from_type(), TypeInfo::of::<i64>());
        assert!(registry
            .try_get_converter(TypeInfo::of::<String>(), TypeInfo::of::<i64>())
            .is_none());
        assert_eq!(registry.get_all().len(), 2);
    }

    struct Clamp;
    impl SetMethodConverter for Clamp {
        fn affinity(&self, _from: Option<TypeInfo>, to: Option<TypeInfo>) -> i32 {
            i32::from(to == Some(TypeInfo::of::<i32>()))
        }
        fn perform_set(&self, _current: &Value, new_value: &Value, _args: &[Value]) -> Value {
            Value::new(new_value.get::<i32>().unwrap_or_default().clamp(0, 10))
        }
    }

    #[test]
    fn set_method_registry_scores_optional_types() {
        let registry = SetMethodConverterRegistry::new();
        registry.register(Arc::new(Clamp));
        assert!(registry.try_get_converter(None, Some(TypeInfo::of::<i32>())).is_some());
        assert!(registry.try_get_converter(None, None).is_none());
    }
}
