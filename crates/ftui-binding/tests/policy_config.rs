#![forbid(unsafe_code)]

//! TOML policy loading (`policy-config` feature).

mod common;

use std::sync::Arc;

use common::{Counter, register_fixtures};
use ftui_binding::{
    BindingEngine, ConfigError, EngineConfig, ObjectRef, OneWayOptions, PathExpr, Value,
};

#[test]
fn missing_keys_keep_defaults() {
    let config = EngineConfig::from_toml_str("warn_on_unobservable = false\n").unwrap();
    assert_eq!(
        config,
        EngineConfig {
            warn_on_unobservable: false,
            ..EngineConfig::default()
        }
    );
}

#[test]
fn unknown_keys_and_empty_marker_are_rejected() {
    assert!(matches!(
        EngineConfig::from_toml_str("view_model = \"x\"\n"),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        EngineConfig::from_toml_str("view_model_member = \"  \"\n"),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn load_reports_the_missing_file() {
    let err = EngineConfig::load("/definitely/not/here/binding.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("binding.toml"));
}

#[derive(Default)]
struct Shell {
    notifier: ftui_binding::PropertyNotifier,
    context: parking_lot::RwLock<Option<ObjectRef>>,
}

impl ftui_binding::Object for Shell {
    fn notifier(&self) -> Option<&ftui_binding::PropertyNotifier> {
        Some(&self.notifier)
    }
}

impl Shell {
    fn set_context(&self, context: Option<ObjectRef>) {
        *self.context.write() = context;
        self.notifier.raise_property_changed("DataContext");
    }
}

#[test]
fn configured_marker_controls_replay() {
    let config = EngineConfig::from_toml_str(
        "view_model_member = \"DataContext\"\nwarn_on_unobservable = false\n",
    )
    .unwrap();
    let engine = BindingEngine::new(config);
    register_fixtures(&engine);
    engine.register_type(
        ftui_binding::TypeDescriptor::builder::<Shell>()
            .any_object(
                "DataContext",
                |s: &Shell| s.context.read().clone(),
                |s, v| s.set_context(v),
            )
            .build(),
    );

    let source = Counter::with_count(6);
    let shell = Arc::new(Shell::default());
    shell.set_context(Some(Counter::with_count(0) as ObjectRef));
    let target = PathExpr::param::<Shell>()
        .member("DataContext")
        .convert::<Counter>()
        .member("Count");
    let _binding = engine
        .binder()
        .one_way_bind(
            &Value::object(Arc::clone(&source)),
            &common::path::<Counter>("Count"),
            &Value::object(Arc::clone(&shell)),
            &target,
            OneWayOptions::default(),
        )
        .unwrap();

    let busy = Counter::with_count(2);
    shell.set_context(Some(Arc::clone(&busy) as ObjectRef));
    assert_eq!(busy.count(), 2, "DataContext is the view-model marker");
}
