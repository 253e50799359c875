#![forbid(unsafe_code)]

//! Converters installed by default, plus [`FnConverter`] for ad-hoc pairs.

use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;

use super::{FallbackConverter, TypedConverter};
use crate::value::{Data, Object, TypeInfo, Value};

/// Affinity of the builtin typed converters; user converters above this
/// win.
pub const BUILTIN_AFFINITY: i32 = 2;

/// Passes values through unchanged when source and target types agree.
///
/// `Null` converts to the target type's default. Any object converts to
/// an untyped (`dyn Object`) target.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityConverter;

impl IdentityConverter {
    const EXACT: i32 = 100;
    const UPCAST: i32 = 50;
}

impl FallbackConverter for IdentityConverter {
    fn affinity(&self, from: TypeInfo, to: TypeInfo) -> i32 {
        if from == to {
            Self::EXACT
        } else if to.is::<dyn Object>() {
            Self::UPCAST
        } else {
            0
        }
    }

    fn try_convert(
        &self,
        _from: TypeInfo,
        value: &Value,
        to: TypeInfo,
        _hint: Option<&Value>,
    ) -> Option<Value> {
        match value {
            Value::Null => Some(to.default_value()),
            Value::Object(_) if to.is::<dyn Object>() => Some(value.clone()),
            _ if value.type_info() == Some(to) => Some(value.clone()),
            _ => None,
        }
    }
}

/// A typed converter from a closure.
pub struct FnConverter<A, B> {
    affinity: i32,
    convert: Box<dyn Fn(&A, Option<&Value>) -> Option<B> + Send + Sync>,
    _pair: PhantomData<fn(A) -> B>,
}

impl<A: Data + Clone, B: Data> FnConverter<A, B> {
    pub fn new(
        affinity: i32,
        convert: impl Fn(&A, Option<&Value>) -> Option<B> + Send + Sync + 'static,
    ) -> Self {
        Self {
            affinity,
            convert: Box::new(convert),
            _pair: PhantomData,
        }
    }
}

impl<A: Data + Clone, B: Data> TypedConverter for FnConverter<A, B> {
    fn from_type(&self) -> TypeInfo {
        TypeInfo::of::<A>()
    }

    fn to_type(&self) -> TypeInfo {
        TypeInfo::of::<B>()
    }

    fn affinity(&self) -> i32 {
        self.affinity
    }

    fn try_convert(&self, value: &Value, hint: Option<&Value>) -> Option<Value> {
        let input = value.downcast_ref::<A>()?;
        (self.convert)(input, hint).map(Value::new)
    }
}

/// `T -> String` through `Display`.
pub struct DisplayConverter<T>(PhantomData<fn(T)>);

impl<T> Default for DisplayConverter<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: Data + Display> TypedConverter for DisplayConverter<T> {
    fn from_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn to_type(&self) -> TypeInfo {
        TypeInfo::of::<String>()
    }

    fn affinity(&self) -> i32 {
        BUILTIN_AFFINITY
    }

    fn try_convert(&self, value: &Value, _hint: Option<&Value>) -> Option<Value> {
        value.downcast_ref::<T>().map(|v| Value::new(v.to_string()))
    }
}

/// `String -> T` through `FromStr`; unparsable text is dropped.
pub struct ParseConverter<T>(PhantomData<fn() -> T>);

impl<T> Default for ParseConverter<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: Data + FromStr> TypedConverter for ParseConverter<T> {
    fn from_type(&self) -> TypeInfo {
        TypeInfo::of::<String>()
    }

    fn to_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn affinity(&self) -> i32 {
        BUILTIN_AFFINITY
    }

    fn try_convert(&self, value: &Value, _hint: Option<&Value>) -> Option<Value> {
        let text = value.downcast_ref::<String>()?;
        text.trim().parse::<T>().ok().map(Value::new)
    }
}

/// Lossless `A -> B` through `From`.
pub struct WideningConverter<A, B>(PhantomData<fn(A) -> B>);

impl<A, B> Default for WideningConverter<A, B> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<A: Data + Clone, B: Data + From<A>> TypedConverter for WideningConverter<A, B> {
    fn from_type(&self) -> TypeInfo {
        TypeInfo::of::<A>()
    }

    fn to_type(&self) -> TypeInfo {
        TypeInfo::of::<B>()
    }

    fn affinity(&self) -> i32 {
        BUILTIN_AFFINITY
    }

    fn try_convert(&self, value: &Value, _hint: Option<&Value>) -> Option<Value> {
        value
            .downcast_ref::<A>()
            .map(|v| Value::new(B::from(v.clone())))
    }
}
