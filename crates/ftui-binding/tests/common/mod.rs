#![forbid(unsafe_code)]
#![allow(dead_code)]

//! Shared fixtures: notifying view-models and views.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ftui_binding::notify::PropertyNotifier;
use ftui_binding::{
    BindingEngine, EngineConfig, Object, ObjectRef, PathExpr, Stream, Subscription,
    TypeDescriptor, Value,
};
use parking_lot::{Mutex, RwLock};

/// View-model with an integer count and a name.
#[derive(Default)]
pub struct Counter {
    pub notifier: PropertyNotifier,
    count: RwLock<i32>,
    name: RwLock<String>,
    pub count_writes: AtomicUsize,
}

impl Object for Counter {
    fn notifier(&self) -> Option<&PropertyNotifier> {
        Some(&self.notifier)
    }
}

impl Counter {
    pub fn with_count(count: i32) -> Arc<Self> {
        let counter = Arc::new(Self::default());
        *counter.count.write() = count;
        counter
    }

    pub fn count(&self) -> i32 {
        *self.count.read()
    }

    pub fn set_count(&self, count: i32) {
        if self.notifier.set_and_raise(&self.count, count, "Count") {
            self.count_writes.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: &str) {
        self.notifier.set_and_raise(&self.name, name.to_owned(), "Name");
    }
}

/// View with a text property.
#[derive(Default)]
pub struct Label {
    pub notifier: PropertyNotifier,
    text: RwLock<String>,
    pub text_writes: AtomicUsize,
}

impl Object for Label {
    fn notifier(&self) -> Option<&PropertyNotifier> {
        Some(&self.notifier)
    }
}

impl Label {
    pub fn text(&self) -> String {
        self.text.read().clone()
    }

    pub fn set_text(&self, text: &str) {
        if self.notifier.set_and_raise(&self.text, text.to_owned(), "Text") {
            self.text_writes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// View whose value is clamped to `0..=100` by its setter.
#[derive(Default)]
pub struct Gauge {
    pub notifier: PropertyNotifier,
    level: RwLock<i32>,
}

impl Object for Gauge {
    fn notifier(&self) -> Option<&PropertyNotifier> {
        Some(&self.notifier)
    }
}

impl Gauge {
    pub fn level(&self) -> i32 {
        *self.level.read()
    }

    pub fn set_level(&self, level: i32) {
        self.notifier
            .set_and_raise(&self.level, level.clamp(0, 100), "Level");
    }
}

/// View whose setter refuses negative positions.
#[derive(Default)]
pub struct Dial {
    pub notifier: PropertyNotifier,
    position: RwLock<i32>,
}

impl Object for Dial {
    fn notifier(&self) -> Option<&PropertyNotifier> {
        Some(&self.notifier)
    }
}

impl Dial {
    pub fn position(&self) -> i32 {
        *self.position.read()
    }

    pub fn set_position(&self, position: i32) -> Result<(), String> {
        if position < 0 {
            return Err(format!("position {position} is below zero"));
        }
        self.notifier
            .set_and_raise(&self.position, position, "Position");
        Ok(())
    }
}

/// View that counts setter calls running at the same time.
#[derive(Default)]
pub struct Meter {
    pub notifier: PropertyNotifier,
    reading: RwLock<i32>,
    in_flight: AtomicUsize,
    pub overlaps: AtomicUsize,
}

impl Object for Meter {
    fn notifier(&self) -> Option<&PropertyNotifier> {
        Some(&self.notifier)
    }
}

impl Meter {
    pub fn reading(&self) -> i32 {
        *self.reading.read()
    }

    pub fn set_reading(&self, reading: i32) {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::yield_now();
        self.notifier
            .set_and_raise(&self.reading, reading, "Reading");
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A view hosting a view-model slot and a nested label.
#[derive(Default)]
pub struct Window {
    pub notifier: PropertyNotifier,
    view_model: RwLock<Option<ObjectRef>>,
    caption: RwLock<Option<Arc<Label>>>,
}

impl Object for Window {
    fn notifier(&self) -> Option<&PropertyNotifier> {
        Some(&self.notifier)
    }
}

impl Window {
    pub fn set_view_model(&self, view_model: Option<ObjectRef>) {
        *self.view_model.write() = view_model;
        self.notifier.raise_property_changed("ViewModel");
    }

    pub fn caption(&self) -> Option<Arc<Label>> {
        self.caption.read().clone()
    }

    pub fn set_caption(&self, caption: Option<Arc<Label>>) {
        *self.caption.write() = caption;
        self.notifier.raise_property_changed("Caption");
    }
}

/// Register every fixture type with `engine`.
pub fn register_fixtures(engine: &BindingEngine) {
    engine.register_type(
        TypeDescriptor::builder::<Counter>()
            .property("Count", Counter::count, |c, v| c.set_count(v))
            .property("Name", Counter::name, |c, v: String| c.set_name(&v))
            .build(),
    );
    engine.register_type(
        TypeDescriptor::builder::<Label>()
            .property("Text", Label::text, |l, v: String| l.set_text(&v))
            .build(),
    );
    engine.register_type(
        TypeDescriptor::builder::<Gauge>()
            .property("Level", Gauge::level, |g, v| g.set_level(v))
            .build(),
    );
    engine.register_type(
        TypeDescriptor::builder::<Dial>()
            .validated_property("Position", Dial::position, |d, v| d.set_position(v))
            .build(),
    );
    engine.register_type(
        TypeDescriptor::builder::<Meter>()
            .property("Reading", Meter::reading, |m, v| m.set_reading(v))
            .build(),
    );
    engine.register_type(
        TypeDescriptor::builder::<Window>()
            .any_object(
                "ViewModel",
                |w: &Window| w.view_model.read().clone(),
                |w, v| w.set_view_model(v),
            )
            .object("Caption", Window::caption, |w, v| w.set_caption(v))
            .build(),
    );
}

/// Route engine logs to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn engine() -> BindingEngine {
    init_tracing();
    let engine = BindingEngine::default();
    register_fixtures(&engine);
    engine
}

pub fn bare_engine() -> BindingEngine {
    init_tracing();
    let engine = BindingEngine::new(EngineConfig::bare());
    register_fixtures(&engine);
    engine
}

pub fn path<T: Object>(text: &str) -> PathExpr {
    PathExpr::parse_for::<T>(text).unwrap()
}

pub fn text(s: &str) -> Value {
    Value::new(s.to_owned())
}

/// Collect every value of `stream` until the subscription is dropped.
pub fn record<T: Clone + Send + Sync + 'static>(
    stream: &Stream<T>,
) -> (Arc<Mutex<Vec<T>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = stream.subscribe(move |value| sink.lock().push(value));
    (seen, subscription)
}
