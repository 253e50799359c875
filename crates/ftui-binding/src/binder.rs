#![forbid(unsafe_code)]

//! Public entry point: wire a source path to a target path.
//!
//! [`PropertyBinder`] offers four operations:
//!
//! - [`bind`](PropertyBinder::bind): two-way, converter per direction.
//! - [`one_way_bind`](PropertyBinder::one_way_bind): source to target
//!   through the converter service.
//! - [`one_way_bind_with`](PropertyBinder::one_way_bind_with): source to
//!   target through a caller projection.
//! - [`bind_to`](PropertyBinder::bind_to): any value stream onto a target.
//!
//! Each returns a disposable handle. Dropping the handle disposes it.
//!
//! # Usage
//!
//! ```ignore
//! let engine = BindingEngine::default();
//! let binding = engine.binder().one_way_bind(
//!     &Value::object(counter.clone()),
//!     &PathExpr::parse_for::<Counter>("Count")?,
//!     &Value::object(label.clone()),
//!     &PathExpr::parse_for::<Label>("Text")?,
//!     OneWayOptions::default(),
//! )?;
//! assert_eq!(label.text(), "3");
//! ```
//!
//! # Invariants
//!
//! 1. Hooks run before anything is wired; a veto yields an inert handle,
//!    never an error.
//! 2. Two-way: the target reflects the source right after `bind` returns
//!    (the view-model wins at first).
//! 3. Every write is equality gated, so a converging pair of converters
//!    settles after one exchange.
//! 4. Structural problems (bad path, missing accessor, missing two-way
//!    converter) are returned from the call; per-value conversion
//!    failures drop that value.

use std::fmt;
use std::sync::Arc;

use crate::accessor::AccessorCache;
use crate::compiler::BindingExpressionCompiler;
use crate::convert::ConverterService;
use crate::error::{BindError, Result};
use crate::hooks::{HookContext, HookEvaluator};
use crate::observe::ObservationService;
use crate::path::{PathExpr, PathResolver, PropertyPath};
use crate::reactive::{Disposable, Stream, Subject, Subscription};
use crate::reflect::TypeRegistry;
use crate::value::{TypeInfo, Value};

/// A caller-supplied conversion. `None` drops the value.
pub type ConvertFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Which way values flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingDirection {
    OneWay,
    TwoWay,
}

/// Side of a two-way binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

/// One applied exchange of a two-way binding.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingUpdate {
    /// The converted value that was written to the opposite side.
    pub value: Value,
    /// Side whose change caused the write.
    pub origin: Side,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Options for [`PropertyBinder::bind`].
#[derive(Clone, Default)]
pub struct TwoWayOptions {
    /// Drives target-to-source updates instead of the target's own change
    /// notifications.
    pub signal_view_update: Option<Stream<()>>,
    /// Conversion hint handed to resolved converters.
    pub hint: Option<Value>,
    pub source_to_target: Option<ConvertFn>,
    pub target_to_source: Option<ConvertFn>,
}

impl TwoWayOptions {
    #[must_use]
    pub fn with_hint(mut self, hint: Value) -> Self {
        self.hint = Some(hint);
        self
    }

    #[must_use]
    pub fn with_view_update_signal(mut self, signal: Stream<()>) -> Self {
        self.signal_view_update = Some(signal);
        self
    }

    /// Use explicit conversions instead of the converter service.
    #[must_use]
    pub fn with_converters(
        mut self,
        source_to_target: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
        target_to_source: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.source_to_target = Some(Arc::new(source_to_target));
        self.target_to_source = Some(Arc::new(target_to_source));
        self
    }
}

impl fmt::Debug for TwoWayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwoWayOptions")
            .field("signal_view_update", &self.signal_view_update.is_some())
            .field("hint", &self.hint)
            .field("source_to_target", &self.source_to_target.is_some())
            .field("target_to_source", &self.target_to_source.is_some())
            .finish()
    }
}

/// Options for the one-way operations.
#[derive(Clone, Default)]
pub struct OneWayOptions {
    pub hint: Option<Value>,
    pub converter: Option<ConvertFn>,
}

impl OneWayOptions {
    #[must_use]
    pub fn with_hint(mut self, hint: Value) -> Self {
        self.hint = Some(hint);
        self
    }

    #[must_use]
    pub fn with_converter(
        mut self,
        converter: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }
}

impl fmt::Debug for OneWayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneWayOptions")
            .field("hint", &self.hint)
            .field("converter", &self.converter.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LiveBinding
// ---------------------------------------------------------------------------

/// An active wiring between two paths.
///
/// Holds the single subscription that drives the binding. Disposing (or
/// dropping) it unsubscribes from every observed object; for two-way
/// bindings the internal replay trigger is completed as well.
#[must_use = "dropping a LiveBinding disposes it"]
pub struct LiveBinding<T> {
    source_path: Option<PropertyPath>,
    target_path: PropertyPath,
    direction: BindingDirection,
    changed: Stream<T>,
    subscription: Subscription,
    trigger: Option<Subject<()>>,
    inert: bool,
}

impl<T: Clone + Send + Sync + 'static> LiveBinding<T> {
    fn inert(
        source_path: Option<PropertyPath>,
        target_path: PropertyPath,
        direction: BindingDirection,
    ) -> Self {
        Self {
            source_path,
            target_path,
            direction,
            changed: Stream::empty(),
            subscription: Subscription::empty(),
            trigger: None,
            inert: true,
        }
    }

    #[must_use]
    pub fn direction(&self) -> BindingDirection {
        self.direction
    }

    /// `None` only for bindings fed by an external stream.
    #[must_use]
    pub fn source_path(&self) -> Option<&PropertyPath> {
        self.source_path.as_ref()
    }

    #[must_use]
    pub fn target_path(&self) -> &PropertyPath {
        &self.target_path
    }

    /// Values applied from now on. Multicast: subscribing does not create
    /// another wiring.
    #[must_use]
    pub fn changed(&self) -> Stream<T> {
        self.changed.clone()
    }

    /// Whether a hook vetoed this binding.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.inert
    }
}

impl<T: Send + Sync> Disposable for LiveBinding<T> {
    fn dispose(&self) {
        if self.subscription.is_disposed() {
            return;
        }
        self.subscription.dispose();
        if let Some(trigger) = &self.trigger {
            trigger.on_completed();
        }
    }

    fn is_disposed(&self) -> bool {
        self.subscription.is_disposed()
    }
}

impl<T> Drop for LiveBinding<T> {
    fn drop(&mut self) {
        if let Some(trigger) = &self.trigger {
            trigger.on_completed();
        }
    }
}

impl<T> fmt::Debug for LiveBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveBinding")
            .field("source_path", &self.source_path)
            .field("target_path", &self.target_path)
            .field("direction", &self.direction)
            .field("inert", &self.inert)
            .field("disposed", &self.subscription.is_disposed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PropertyBinder
// ---------------------------------------------------------------------------

/// Creates live bindings. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct PropertyBinder {
    types: Arc<TypeRegistry>,
    accessors: Arc<AccessorCache>,
    converters: ConverterService,
    hooks: Arc<HookEvaluator>,
    observation: ObservationService,
    compiler: BindingExpressionCompiler,
}

impl PropertyBinder {
    #[must_use]
    pub fn new(
        types: Arc<TypeRegistry>,
        accessors: Arc<AccessorCache>,
        converters: ConverterService,
        hooks: Arc<HookEvaluator>,
        observation: ObservationService,
        view_model_member: &str,
    ) -> Self {
        let compiler = BindingExpressionCompiler::new(
            Arc::clone(&accessors),
            converters.clone(),
            observation.clone(),
            view_model_member,
        );
        Self {
            types,
            accessors,
            converters,
            hooks,
            observation,
            compiler,
        }
    }

    #[must_use]
    pub fn compiler(&self) -> &BindingExpressionCompiler {
        &self.compiler
    }

    fn resolve(&self, expr: &PathExpr, bound: &Value) -> Result<PropertyPath> {
        PathResolver::new(&self.types).resolve_for(expr, bound)
    }

    fn permitted(
        &self,
        source: &Value,
        target: &Value,
        source_path: Option<&PropertyPath>,
        target_path: &PropertyPath,
        direction: BindingDirection,
    ) -> bool {
        self.hooks.evaluate(&HookContext::new(
            source,
            target,
            source_path,
            target_path,
            direction,
            &self.accessors,
        ))
    }

    /// Converter from `from` to `to`: the override, the statically resolved
    /// converter, or per-value resolution on the runtime type.
    fn one_way_converter(
        &self,
        from: TypeInfo,
        to: TypeInfo,
        options: &OneWayOptions,
    ) -> ConvertFn {
        if let Some(converter) = &options.converter {
            return Arc::clone(converter);
        }
        let hint = options.hint.clone();
        if let Some(resolved) = self.converters.resolve_converter(from, to) {
            return Arc::new(move |value: &Value| resolved.convert(value, hint.as_ref()));
        }
        let converters = self.converters.clone();
        Arc::new(move |value: &Value| {
            let runtime = value.type_info().unwrap_or(from);
            converters.convert(runtime, value, to, hint.as_ref())
        })
    }

    fn two_way_converter(
        &self,
        from: TypeInfo,
        to: TypeInfo,
        explicit: Option<&ConvertFn>,
        hint: Option<&Value>,
    ) -> Result<ConvertFn> {
        if let Some(converter) = explicit {
            return Ok(Arc::clone(converter));
        }
        let resolved = self
            .converters
            .resolve_converter(from, to)
            .ok_or_else(|| BindError::no_converter(from, to))?;
        let hint = hint.cloned();
        Ok(Arc::new(move |value: &Value| resolved.convert(value, hint.as_ref())))
    }

    fn writable_path(&self, path: &PropertyPath) -> Result<()> {
        let last = path
            .last()
            .ok_or_else(|| BindError::invalid_path(path, "path must name a member"))?;
        self.accessors.getter_for(last.member())?;
        self.accessors.setter_for(last.member())?;
        Ok(())
    }

    /// Bind `source_expr` on `source` and `target_expr` on `target` in
    /// both directions.
    ///
    /// The target is synchronised from the source before this returns.
    /// Fails with [`BindError::Argument`] when a direction has neither a
    /// registered converter nor an explicit one.
    pub fn bind(
        &self,
        source: &Value,
        source_expr: &PathExpr,
        target: &Value,
        target_expr: &PathExpr,
        options: TwoWayOptions,
    ) -> Result<LiveBinding<BindingUpdate>> {
        let source_path = self.resolve(source_expr, source)?;
        let target_path = self.resolve(target_expr, target)?;
        let _span = tracing::debug_span!(
            "bind",
            source = %source_path,
            target = %target_path,
            direction = "two-way"
        )
        .entered();

        if !self.permitted(
            source,
            target,
            Some(&source_path),
            &target_path,
            BindingDirection::TwoWay,
        ) {
            return Ok(LiveBinding::inert(
                Some(source_path),
                target_path,
                BindingDirection::TwoWay,
            ));
        }

        self.writable_path(&source_path)?;
        self.writable_path(&target_path)?;
        let to_target = self.two_way_converter(
            source_path.value_type(),
            target_path.value_type(),
            options.source_to_target.as_ref(),
            options.hint.as_ref(),
        )?;
        let to_source = self.two_way_converter(
            target_path.value_type(),
            source_path.value_type(),
            options.target_to_source.as_ref(),
            options.hint.as_ref(),
        )?;

        let source_root = source_path.root_object(source);
        let target_root = target_path.root_object(target);
        let trigger = Subject::<()>::new();

        let view_changes = match options.signal_view_update {
            Some(signal) => signal.map(|()| Side::Target),
            None => self
                .observation
                .when_any(&target_root, &target_path, false)
                .skip(1)
                .map(|_| Side::Target),
        };
        let signals = Stream::merge(vec![
            self.observation
                .when_any(&source_root, &source_path, false)
                .skip(1)
                .map(|_| Side::Source),
            trigger.stream().map(|()| Side::Source),
            view_changes,
        ])
        .synchronize();

        let exchange = Exchange {
            accessors: Arc::clone(&self.accessors),
            source_root,
            target_root,
            source_path: source_path.clone(),
            target_path: target_path.clone(),
            to_target,
            to_source,
        };
        let changed = signals
            .try_filter_map(move |origin| exchange.run(origin))
            .share();

        let subscription = changed.subscribe_with(
            |_| {},
            |error| tracing::debug!(%error, "two-way binding terminated"),
        );
        trigger.on_next(());

        Ok(LiveBinding {
            source_path: Some(source_path),
            target_path,
            direction: BindingDirection::TwoWay,
            changed,
            subscription,
            trigger: Some(trigger),
            inert: false,
        })
    }

    /// Push every value of `source_expr` on `source` into `target_expr` on
    /// `target`.
    ///
    /// Values no converter can handle are dropped. The returned binding's
    /// [`changed`](LiveBinding::changed) yields the values read back from
    /// the target after each write.
    pub fn one_way_bind(
        &self,
        source: &Value,
        source_expr: &PathExpr,
        target: &Value,
        target_expr: &PathExpr,
        options: OneWayOptions,
    ) -> Result<LiveBinding<Value>> {
        let source_path = self.resolve(source_expr, source)?;
        let target_path = self.resolve(target_expr, target)?;
        let convert =
            self.one_way_converter(source_path.value_type(), target_path.value_type(), &options);
        self.one_way(source, source_path, target, target_path, move |value| {
            convert(&value)
        })
    }

    /// Like [`one_way_bind`](Self::one_way_bind) but every source value is
    /// passed through `projection`; the converter service is not consulted.
    pub fn one_way_bind_with(
        &self,
        source: &Value,
        source_expr: &PathExpr,
        target: &Value,
        target_expr: &PathExpr,
        projection: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Result<LiveBinding<Value>> {
        let source_path = self.resolve(source_expr, source)?;
        let target_path = self.resolve(target_expr, target)?;
        self.one_way(source, source_path, target, target_path, move |value| {
            Some(projection(value))
        })
    }

    fn one_way(
        &self,
        source: &Value,
        source_path: PropertyPath,
        target: &Value,
        target_path: PropertyPath,
        convert: impl Fn(Value) -> Option<Value> + Send + Sync + 'static,
    ) -> Result<LiveBinding<Value>> {
        let _span = tracing::debug_span!(
            "bind",
            source = %source_path,
            target = %target_path,
            direction = "one-way"
        )
        .entered();

        if !self.permitted(
            source,
            target,
            Some(&source_path),
            &target_path,
            BindingDirection::OneWay,
        ) {
            return Ok(LiveBinding::inert(
                Some(source_path),
                target_path,
                BindingDirection::OneWay,
            ));
        }

        let values = self
            .observation
            .when_any(&source_path.root_object(source), &source_path, false)
            .filter_map(move |value| value.and_then(&convert));
        let changed = self
            .compiler
            .bind_to_direct(target, &target_path, values)?
            .share();
        let subscription = changed.subscribe_with(
            |_| {},
            |error| tracing::debug!(%error, "one-way binding terminated"),
        );

        Ok(LiveBinding {
            source_path: Some(source_path),
            target_path,
            direction: BindingDirection::OneWay,
            changed,
            subscription,
            trigger: None,
            inert: false,
        })
    }

    /// Apply every value of `values` to `target_expr` on `target`.
    ///
    /// Conversion follows the one-way rule: an explicit converter, or
    /// resolution on each value's runtime type; unconvertible values are
    /// dropped.
    pub fn bind_to(
        &self,
        values: &Stream<Value>,
        target: &Value,
        target_expr: &PathExpr,
        options: OneWayOptions,
    ) -> Result<Subscription> {
        let target_path = self.resolve(target_expr, target)?;
        let _span = tracing::debug_span!("bind_to", target = %target_path).entered();

        if !self.permitted(
            &Value::Null,
            target,
            None,
            &target_path,
            BindingDirection::OneWay,
        ) {
            return Ok(Subscription::empty());
        }

        let to = target_path.value_type();
        let hint = options.hint;
        let explicit = options.converter;
        let converters = self.converters.clone();
        let candidates = values.filter_map(move |value| match &explicit {
            Some(convert) => convert(&value),
            None => {
                let from = value.type_info().unwrap_or(to);
                converters.convert(from, &value, to, hint.as_ref())
            }
        });
        let applied = self.compiler.bind_to_direct(target, &target_path, candidates)?;
        Ok(applied.subscribe_with(
            |_| {},
            |error| tracing::debug!(%error, "stream binding terminated"),
        ))
    }
}

impl fmt::Debug for PropertyBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBinder")
            .field("types", &self.types.len())
            .field("hooks", &self.hooks.len())
            .field("converters", &self.converters)
            .finish()
    }
}

/// Per-signal work of a two-way binding: read both sides, convert from
/// the side that moved, write the other side when it differs.
struct Exchange {
    accessors: Arc<AccessorCache>,
    source_root: Value,
    target_root: Value,
    source_path: PropertyPath,
    target_path: PropertyPath,
    to_target: ConvertFn,
    to_source: ConvertFn,
}

impl Exchange {
    fn run(&self, origin: Side) -> Result<Option<BindingUpdate>> {
        let Some(source_value) = self.accessors.get_value(&self.source_root, &self.source_path)?
        else {
            return Ok(None);
        };
        let Some(target_value) = self.accessors.get_value(&self.target_root, &self.target_path)?
        else {
            return Ok(None);
        };

        let (converted, current, root, path) = match origin {
            Side::Source => (
                (self.to_target)(&source_value),
                target_value,
                &self.target_root,
                &self.target_path,
            ),
            Side::Target => (
                (self.to_source)(&target_value),
                source_value,
                &self.source_root,
                &self.source_path,
            ),
        };
        let Some(converted) = converted else {
            return Ok(None);
        };
        if converted == current {
            return Ok(None);
        }

        match self.accessors.set_value(root, path, converted.clone(), false) {
            Ok(true) => Ok(Some(BindingUpdate {
                value: converted,
                origin,
            })),
            Ok(false) => Ok(None),
            Err(error) => {
                tracing::error!(path = %path, %error, "failed to apply bound value");
                Err(error)
            }
        }
    }
}
