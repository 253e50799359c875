//! Benchmarks for converter resolution and set-then-get.
//!
//! Run with: `cargo bench --package ftui-binding --bench converter_bench`
//!
//! # Performance Baselines
//!
//! - Typed-pair resolution against a registry with many pairs
//! - Fallback resolution (typed miss, identity hit)
//! - Set-then-get through a one-way binding, writing and suppressed

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ftui_binding::convert::FnConverter;
use ftui_binding::notify::PropertyNotifier;
use ftui_binding::{
    BindingEngine, ConverterService, Object, OneWayOptions, PathExpr, TypeDescriptor, TypeInfo,
    Value,
};
use parking_lot::RwLock;

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct Meter {
    notifier: PropertyNotifier,
    reading: RwLock<i64>,
}

impl Object for Meter {
    fn notifier(&self) -> Option<&PropertyNotifier> {
        Some(&self.notifier)
    }
}

impl Meter {
    fn reading(&self) -> i64 {
        *self.reading.read()
    }

    fn set_reading(&self, reading: i64) {
        self.notifier.set_and_raise(&self.reading, reading, "Reading");
    }
}

#[derive(Default)]
struct Readout {
    notifier: PropertyNotifier,
    text: RwLock<String>,
}

impl Object for Readout {
    fn notifier(&self) -> Option<&PropertyNotifier> {
        Some(&self.notifier)
    }
}

// ============================================================================
// Resolution
// ============================================================================

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("converter_resolution");
    for extra in [0_usize, 64, 512] {
        let service = ConverterService::with_defaults();
        for i in 0..extra {
            let affinity = i32::try_from(i % 7).unwrap_or(0) + 1;
            service.register_typed(FnConverter::new(affinity, |v: &u16, _| Some(u64::from(*v))));
        }
        group.bench_with_input(BenchmarkId::new("typed", extra), &service, |b, service| {
            b.iter(|| {
                black_box(
                    service.resolve_converter(TypeInfo::of::<i32>(), TypeInfo::of::<String>()),
                )
            });
        });
        group.bench_with_input(BenchmarkId::new("fallback", extra), &service, |b, service| {
            b.iter(|| {
                black_box(service.resolve_converter(TypeInfo::of::<bool>(), TypeInfo::of::<bool>()))
            });
        });
    }
    group.finish();
}

// ============================================================================
// Set-then-get
// ============================================================================

fn bench_set_then_get(c: &mut Criterion) {
    let engine = BindingEngine::default();
    engine.register_type(
        TypeDescriptor::builder::<Meter>()
            .property("Reading", Meter::reading, |m, v| m.set_reading(v))
            .build(),
    );
    engine.register_type(
        TypeDescriptor::builder::<Readout>()
            .property(
                "Text",
                |r: &Readout| r.text.read().clone(),
                |r, v: String| {
                    r.notifier.set_and_raise(&r.text, v, "Text");
                },
            )
            .build(),
    );
    let meter = Arc::new(Meter::default());
    let readout = Arc::new(Readout::default());
    let _binding = engine
        .binder()
        .one_way_bind(
            &Value::object(Arc::clone(&meter)),
            &PathExpr::param::<Meter>().member("Reading"),
            &Value::object(Arc::clone(&readout)),
            &PathExpr::param::<Readout>().member("Text"),
            OneWayOptions::default(),
        )
        .expect("fixture binding");

    let mut group = c.benchmark_group("set_then_get");
    group.bench_function("changing", |b| {
        let mut n = 0_i64;
        b.iter(|| {
            n += 1;
            meter.set_reading(black_box(n));
        });
    });
    group.bench_function("suppressed", |b| {
        let segment = engine
            .resolve_path(&PathExpr::param::<Readout>().member("Text"))
            .expect("fixture path");
        let host = Value::object(Arc::clone(&readout));
        let current = Value::new(readout.text.read().clone());
        let last = segment.last().expect("one segment").clone();
        b.iter(|| {
            black_box(
                engine
                    .binder()
                    .compiler()
                    .set_then_get(&host, &last, &current),
            )
        });
    });
    group.finish();
}

criterion_group!(benches, bench_resolution, bench_set_then_get);
criterion_main!(benches);
