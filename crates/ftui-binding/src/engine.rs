#![forbid(unsafe_code)]

//! The service object that owns every registry.
//!
//! There is no global state: each [`BindingEngine`] has its own type
//! registry, accessor cache, converters, hooks and observation adapters.
//! Clones share them.

use std::fmt;
use std::sync::Arc;

use crate::accessor::AccessorCache;
use crate::binder::PropertyBinder;
use crate::config::EngineConfig;
use crate::convert::ConverterService;
use crate::error::Result;
use crate::hooks::{HookEvaluator, NullTargetHook, PropertyBindingHook};
use crate::observe::{ObservableForProperty, ObservationService};
use crate::path::{PathExpr, PathResolver, PropertyPath};
use crate::reflect::{TypeDescriptor, TypeRegistry};

/// Owns the registries and hands out a [`PropertyBinder`].
#[derive(Clone)]
pub struct BindingEngine {
    config: Arc<EngineConfig>,
    types: Arc<TypeRegistry>,
    accessors: Arc<AccessorCache>,
    converters: ConverterService,
    hooks: Arc<HookEvaluator>,
    observation: ObservationService,
    binder: PropertyBinder,
}

impl BindingEngine {
    /// Build an engine, installing the builtins `config` asks for.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let types = Arc::new(TypeRegistry::new());
        let accessors = Arc::new(AccessorCache::new());
        let converters = ConverterService::new();
        let hooks = Arc::new(HookEvaluator::new());
        let observation = ObservationService::new(Arc::clone(&accessors));

        if config.install_default_converters {
            converters.install_defaults();
        }
        if config.install_default_hooks {
            hooks.register(NullTargetHook);
        }
        if config.install_default_observers {
            observation.install_defaults(config.warn_on_unobservable);
        }

        let binder = PropertyBinder::new(
            Arc::clone(&types),
            Arc::clone(&accessors),
            converters.clone(),
            Arc::clone(&hooks),
            observation.clone(),
            &config.view_model_member,
        );
        tracing::debug!(
            view_model_member = %config.view_model_member,
            converters = config.install_default_converters,
            hooks = config.install_default_hooks,
            observers = config.install_default_observers,
            "binding engine created"
        );

        Self {
            config: Arc::new(config),
            types,
            accessors,
            converters,
            hooks,
            observation,
            binder,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn binder(&self) -> &PropertyBinder {
        &self.binder
    }

    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    #[must_use]
    pub fn accessors(&self) -> &AccessorCache {
        &self.accessors
    }

    #[must_use]
    pub fn converters(&self) -> &ConverterService {
        &self.converters
    }

    #[must_use]
    pub fn hooks(&self) -> &HookEvaluator {
        &self.hooks
    }

    #[must_use]
    pub fn observation(&self) -> &ObservationService {
        &self.observation
    }

    /// Make a host type's members bindable.
    pub fn register_type(&self, descriptor: TypeDescriptor) {
        self.types.register(descriptor);
    }

    pub fn register_hook(&self, hook: impl PropertyBindingHook + 'static) {
        self.hooks.register(hook);
    }

    pub fn register_observer(&self, adapter: impl ObservableForProperty + 'static) {
        self.observation.register(adapter);
    }

    /// Resolve a symbolic path against the registered types.
    pub fn resolve_path(&self, expr: &PathExpr) -> Result<PropertyPath> {
        PathResolver::new(&self.types).resolve(expr)
    }
}

impl Default for BindingEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Debug for BindingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingEngine")
            .field("config", &self.config)
            .field("types", &self.types)
            .field("converters", &self.converters)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypeInfo;

    #[test]
    fn defaults_follow_config() {
        let engine = BindingEngine::default();
        assert_eq!(engine.hooks().len(), 1);
        assert_eq!(engine.observation().adapters().len(), 2);
        assert!(
            engine
                .converters()
                .resolve_converter(TypeInfo::of::<i32>(), TypeInfo::of::<String>())
                .is_some()
        );

        let bare = BindingEngine::new(EngineConfig::bare());
        assert!(bare.hooks().is_empty());
        assert!(bare.observation().adapters().is_empty());
        assert!(
            bare.converters()
                .resolve_converter(TypeInfo::of::<i32>(), TypeInfo::of::<String>())
                .is_none()
        );
    }

    #[test]
    fn clones_share_registries() {
        let engine = BindingEngine::new(EngineConfig::bare());
        let other = engine.clone();
        other.register_hook(NullTargetHook);
        assert_eq!(engine.hooks().len(), 1);
    }
}
