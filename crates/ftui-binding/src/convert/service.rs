#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use super::{
    DisplayConverter, FallbackConverterRegistry, IdentityConverter, ParseConverter,
    ResolvedConverter, SetMethodConverter, SetMethodConverterRegistry, TypedConverter,
    TypedConverterRegistry, WideningConverter,
};
use crate::value::{TypeInfo, Value};

/// Owns the three converter registries and resolves conversions.
///
/// Cloning shares the registries.
#[derive(Clone, Default)]
pub struct ConverterService {
    typed: Arc<TypedConverterRegistry>,
    fallback: Arc<FallbackConverterRegistry>,
    set_method: Arc<SetMethodConverterRegistry>,
}

impl ConverterService {
    /// A service with empty registries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A service with the builtin converters registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let service = Self::new();
        service.install_defaults();
        service
    }

    /// Register identity, `Display`/`FromStr` text conversions for the
    /// primitive types, and lossless numeric widening.
    pub fn install_defaults(&self) {
        self.fallback.register(Arc::new(IdentityConverter));

        macro_rules! text {
            ($($t:ty),*) => {$(
                self.typed.register(Arc::new(DisplayConverter::<$t>::default()));
                self.typed.register(Arc::new(ParseConverter::<$t>::default()));
            )*};
        }
        text!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64, bool, char);

        macro_rules! widen {
            ($($a:ty => $b:ty),*) => {$(
                self.typed.register(Arc::new(WideningConverter::<$a, $b>::default()));
            )*};
        }
        widen!(
            i8 => i16, i8 => i32, i8 => i64, i16 => i32, i16 => i64, i32 => i64,
            u8 => u16, u8 => u32, u8 => u64, u16 => u32, u16 => u64, u32 => u64,
            u8 => i32, u16 => i32, u32 => i64,
            i32 => f64, u32 => f64, f32 => f64
        );
    }

    #[must_use]
    pub fn typed(&self) -> &TypedConverterRegistry {
        &self.typed
    }

    #[must_use]
    pub fn fallback(&self) -> &FallbackConverterRegistry {
        &self.fallback
    }

    #[must_use]
    pub fn set_method(&self) -> &SetMethodConverterRegistry {
        &self.set_method
    }

    pub fn register_typed(&self, converter: impl TypedConverter + 'static) {
        self.typed.register(Arc::new(converter));
    }

    pub fn register_fallback(&self, converter: impl super::FallbackConverter + 'static) {
        self.fallback.register(Arc::new(converter));
    }

    pub fn register_set_method(&self, converter: impl SetMethodConverter + 'static) {
        self.set_method.register(Arc::new(converter));
    }

    /// Exact typed pair first, then the best fallback.
    #[must_use]
    pub fn resolve_converter(&self, from: TypeInfo, to: TypeInfo) -> Option<ResolvedConverter> {
        if let Some(typed) = self.typed.try_get_converter(from, to) {
            return Some(ResolvedConverter::Typed(typed));
        }
        if let Some(converter) = self.fallback.try_get_converter(from, to) {
            return Some(ResolvedConverter::Fallback { converter, from, to });
        }
        tracing::debug!(from = from.name(), to = to.name(), "no converter");
        None
    }

    /// Set-method converter for writing a `from` value into a `to` member.
    #[must_use]
    pub fn resolve_set_method_converter(
        &self,
        from: Option<TypeInfo>,
        to: Option<TypeInfo>,
    ) -> Option<Arc<dyn SetMethodConverter>> {
        self.set_method.try_get_converter(from, to)
    }

    /// Resolve and convert in one step.
    pub fn convert(
        &self,
        from: TypeInfo,
        value: &Value,
        to: TypeInfo,
        hint: Option<&Value>,
    ) -> Option<Value> {
        self.resolve_converter(from, to)?.convert(value, hint)
    }
}

impl fmt::Debug for ConverterService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterService")
            .field("typed", &self.typed.get_all().len())
            .field("fallback", &self.fallback.get_all().len())
            .field("set_method", &self.set_method.get_all().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::FnConverter;

    fn int() -> TypeInfo {
        TypeInfo::of::<i32>()
    }

    fn text() -> TypeInfo {
        TypeInfo::of::<String>()
    }

    #[test]
    fn typed_beats_fallback() {
        let service = ConverterService::with_defaults();
        let found = service.resolve_converter(int(), text()).unwrap();
        assert!(found.is_typed());
        assert_eq!(found.convert(&Value::new(3_i32), None), Some(Value::new("3".to_string())));

        let same = service.resolve_converter(int(), int()).unwrap();
        assert!(!same.is_typed());
        assert_eq!(same.affinity(), 100);
    }

    #[test]
    fn higher_affinity_typed_converter_wins() {
        let service = ConverterService::new();
        service.register_typed(FnConverter::new(5, |v: &i32, _| Some(format!("five:{v}"))));
        service.register_typed(FnConverter::new(2, |v: &i32, _| Some(format!("two:{v}"))));
        let found = service.resolve_converter(int(), text()).unwrap();
        assert_eq!(found.affinity(), 5);
        assert_eq!(
            found.convert(&Value::new(1_i32), None),
            Some(Value::new("five:1".to_string()))
        );
    }

    #[test]
    fn missing_pair_resolves_to_none() {
        let service = ConverterService::with_defaults();
        assert!(service.resolve_converter(text(), TypeInfo::of::<Vec<u8>>()).is_none());
        assert!(service.convert(text(), &Value::new("x".to_string()), int(), None).is_none());
    }

    #[test]
    fn widening_defaults() {
        let service = ConverterService::with_defaults();
        assert_eq!(
            service.convert(int(), &Value::new(2_i32), TypeInfo::of::<i64>(), None),
            Some(Value::new(2_i64))
        );
    }
}
