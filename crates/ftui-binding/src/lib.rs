#![forbid(unsafe_code)]

//! Toolkit-agnostic property binding for FrankenTUI view-models.
//!
//! This crate provides:
//! - [`PropertyBinder`] for one-way, two-way and stream-to-property bindings
//!   between members reached through [`PathExpr`] chains
//! - [`ConverterService`] with typed, fallback and set-method converter
//!   registries (lock-free reads, copy-on-write writes)
//! - [`ObservationService`] for per-object-kind change observation
//! - [`BindingEngine`] owning all of the above, configured by
//!   [`EngineConfig`]
//!
//! Host types opt in by implementing [`Object`] and registering a
//! [`TypeDescriptor`] that lists their members.

pub mod accessor;
pub mod binder;
pub mod compiler;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod notify;
pub mod observe;
pub mod path;
pub mod reactive;
pub mod reflect;
pub mod registry;
pub mod value;

pub use accessor::{AccessorCache, Getter, Setter};
pub use binder::{
    BindingDirection, BindingUpdate, ConvertFn, LiveBinding, OneWayOptions, PropertyBinder, Side,
    TwoWayOptions,
};
pub use compiler::{BindingExpressionCompiler, SetOutcome};
#[cfg(feature = "policy-config")]
pub use config::ConfigError;
pub use config::EngineConfig;
pub use convert::{
    ConverterService, FallbackConverter, ResolvedConverter, SetMethodConverter, TypedConverter,
};
pub use engine::BindingEngine;
pub use error::{AccessorKind, BindError, Result};
pub use hooks::{HookContext, HookEvaluator, NullTargetHook, PropertyBindingHook};
pub use notify::PropertyNotifier;
pub use observe::{ObservableForProperty, ObservationService, ObservedChange};
pub use path::{PathExpr, PathResolver, PathSegment, PropertyPath};
pub use reactive::{BindingScope, Disposable, Stream, Subject, Subscription};
pub use reflect::{MemberInfo, TypeDescriptor, TypeRegistry};
pub use value::{Object, ObjectRef, TypeInfo, Value};
