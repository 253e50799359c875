#![forbid(unsafe_code)]

//! Value conversion strategies.
//!
//! Three independent extension points, each with its own registry:
//!
//! - [`TypedConverter`]: declares an exact `(from, to)` pair and a fixed
//!   affinity. Consulted first.
//! - [`FallbackConverter`]: scores any pair at lookup time. Consulted only
//!   when no typed converter matches.
//! - [`SetMethodConverter`]: rewrites the value written during
//!   set-then-get, given the target's current value. Resolved separately
//!   and never used for ordinary conversion.
//!
//! An affinity of zero or less means "cannot handle". A conversion that
//! returns `None` drops the value rather than failing the binding.

mod builtin;
mod registries;
mod service;

use std::fmt;
use std::sync::Arc;

pub use builtin::{
    DisplayConverter, FnConverter, IdentityConverter, ParseConverter, WideningConverter,
};
pub use registries::{
    FallbackConverterRegistry, SetMethodConverterRegistry, TypedConverterRegistry,
};
pub use service::ConverterService;

use crate::value::{TypeInfo, Value};

/// A converter for one exact type pair.
pub trait TypedConverter: Send + Sync {
    fn from_type(&self) -> TypeInfo;

    fn to_type(&self) -> TypeInfo;

    /// Fixed preference score for this pair.
    fn affinity(&self) -> i32;

    /// Convert `value`; `None` drops it.
    fn try_convert(&self, value: &Value, hint: Option<&Value>) -> Option<Value>;
}

/// A converter scored per type pair at lookup time.
pub trait FallbackConverter: Send + Sync {
    fn affinity(&self, from: TypeInfo, to: TypeInfo) -> i32;

    fn try_convert(
        &self,
        from: TypeInfo,
        value: &Value,
        to: TypeInfo,
        hint: Option<&Value>,
    ) -> Option<Value>;
}

/// Rewrites the value written to a target during set-then-get.
pub trait SetMethodConverter: Send + Sync {
    /// Score for writing a value of `from` into a member of `to`; either
    /// side may be unknown.
    fn affinity(&self, from: Option<TypeInfo>, to: Option<TypeInfo>) -> i32;

    /// The value to write, given the target's `current` value.
    fn perform_set(&self, current: &Value, new_value: &Value, args: &[Value]) -> Value;
}

/// Outcome of [`ConverterService::resolve_converter`].
#[derive(Clone)]
pub enum ResolvedConverter {
    Typed(Arc<dyn TypedConverter>),
    Fallback {
        converter: Arc<dyn FallbackConverter>,
        from: TypeInfo,
        to: TypeInfo,
    },
}

impl ResolvedConverter {
    /// Convert one value; `None` means the value is dropped.
    pub fn convert(&self, value: &Value, hint: Option<&Value>) -> Option<Value> {
        match self {
            Self::Typed(converter) => converter.try_convert(value, hint),
            Self::Fallback {
                converter,
                from,
                to,
            } => converter.try_convert(*from, value, *to, hint),
        }
    }

    /// Affinity the converter reported when it was selected.
    #[must_use]
    pub fn affinity(&self) -> i32 {
        match self {
            Self::Typed(converter) => converter.affinity(),
            Self::Fallback {
                converter,
                from,
                to,
            } => converter.affinity(*from, *to),
        }
    }

    #[must_use]
    pub fn is_typed(&self) -> bool {
        matches!(self, Self::Typed(_))
    }
}

impl fmt::Debug for ResolvedConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Typed(converter) => write!(
                f,
                "Typed({} -> {}, affinity {})",
                converter.from_type(),
                converter.to_type(),
                converter.affinity()
            ),
            Self::Fallback { from, to, .. } => {
                write!(f, "Fallback({from} -> {to}, affinity {})", self.affinity())
            }
        }
    }
}
