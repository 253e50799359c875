#![forbid(unsafe_code)]

//! Push-based change streams.
//!
//! A [`Stream<T>`] is a cold, callback-driven producer: nothing happens
//! until [`subscribe`](Stream::subscribe) is called, and each subscription
//! runs the producer independently. Operators return new streams and never
//! spawn threads; values are delivered on whatever thread produced them.
//!
//! # Invariants
//!
//! 1. An [`Observer`] delivers nothing after its first terminal event
//!    (`Error` or `Completed`).
//! 2. Disposing the [`Subscription`] returned by `subscribe` synchronously
//!    tears down every upstream subscription that operator chain created.
//! 3. [`Stream::synchronize`] serializes deliveries per subscription with a
//!    re-entrant lock: concurrent producers queue, while a re-entrant
//!    delivery from the same thread proceeds.
//! 4. [`Stream::share`] connects to its source once for any number of
//!    concurrent subscribers and disconnects when the last one leaves.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::{Mutex, ReentrantMutex};

use super::subject::Subject;
use super::subscription::{SerialSubscription, Subscription, UpstreamSlot};
use crate::error::{BindError, Result};

/// One event delivered to an observer.
#[derive(Debug, Clone)]
pub enum Notification<T> {
    Next(T),
    Error(BindError),
    Completed,
}

type Sink<T> = Arc<dyn Fn(Notification<T>) + Send + Sync>;

/// Receiving end of a stream.
pub struct Observer<T> {
    sink: Sink<T>,
    stopped: Arc<AtomicBool>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            stopped: Arc::clone(&self.stopped),
        }
    }
}

impl<T> Observer<T> {
    pub fn new(sink: impl Fn(Notification<T>) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn next(&self, value: T) {
        if !self.stopped.load(Ordering::Acquire) {
            (self.sink)(Notification::Next(value));
        }
    }

    pub fn error(&self, error: BindError) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            (self.sink)(Notification::Error(error));
        }
    }

    pub fn completed(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            (self.sink)(Notification::Completed);
        }
    }

    pub fn emit(&self, notification: Notification<T>) {
        match notification {
            Notification::Next(value) => self.next(value),
            Notification::Error(error) => self.error(error),
            Notification::Completed => self.completed(),
        }
    }

    /// Whether a terminal event has been delivered.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

type SubscribeFn<T> = Arc<dyn Fn(Observer<T>) -> Subscription + Send + Sync>;

/// A cold, push-based stream of values.
pub struct Stream<T> {
    subscribe_fn: SubscribeFn<T>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe_fn: Arc::clone(&self.subscribe_fn),
        }
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> Stream<T> {
    /// Build a stream from a subscribe function.
    pub fn new(subscribe: impl Fn(Observer<T>) -> Subscription + Send + Sync + 'static) -> Self {
        Self {
            subscribe_fn: Arc::new(subscribe),
        }
    }

    /// Completes immediately without values.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(|observer| {
            observer.completed();
            Subscription::empty()
        })
    }

    /// Never emits, never completes.
    #[must_use]
    pub fn never() -> Self {
        Self::new(|_| Subscription::empty())
    }

    /// Emits `value` then completes.
    #[must_use]
    pub fn just(value: T) -> Self {
        Self::new(move |observer| {
            observer.next(value.clone());
            observer.completed();
            Subscription::empty()
        })
    }

    /// Fails immediately.
    #[must_use]
    pub fn fail(error: BindError) -> Self {
        Self::new(move |observer| {
            observer.error(error.clone());
            Subscription::empty()
        })
    }

    /// Build the stream lazily, once per subscription.
    pub fn defer(factory: impl Fn() -> Stream<T> + Send + Sync + 'static) -> Self {
        Self::new(move |observer| factory().subscribe_observer(observer))
    }

    pub fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
        (self.subscribe_fn)(observer)
    }

    /// Subscribe to values; errors and completion are ignored.
    pub fn subscribe(&self, on_next: impl Fn(T) + Send + Sync + 'static) -> Subscription {
        self.subscribe_observer(Observer::new(move |notification| {
            if let Notification::Next(value) = notification {
                on_next(value);
            }
        }))
    }

    /// Subscribe to values and errors.
    pub fn subscribe_with(
        &self,
        on_next: impl Fn(T) + Send + Sync + 'static,
        on_error: impl Fn(BindError) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_observer(Observer::new(move |notification| match notification {
            Notification::Next(value) => on_next(value),
            Notification::Error(error) => on_error(error),
            Notification::Completed => {}
        }))
    }

    pub fn map<U: Clone + Send + Sync + 'static>(
        &self,
        f: impl Fn(T) -> U + Send + Sync + 'static,
    ) -> Stream<U> {
        self.filter_map(move |value| Some(f(value)))
    }

    pub fn filter(&self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Stream<T> {
        self.filter_map(move |value| predicate(&value).then_some(value))
    }

    pub fn filter_map<U: Clone + Send + Sync + 'static>(
        &self,
        f: impl Fn(T) -> Option<U> + Send + Sync + 'static,
    ) -> Stream<U> {
        self.try_filter_map(move |value| Ok(f(value)))
    }

    /// Map fallibly; an `Err` is delivered on the error channel and stops
    /// the subscription.
    pub fn try_map<U: Clone + Send + Sync + 'static>(
        &self,
        f: impl Fn(T) -> Result<U> + Send + Sync + 'static,
    ) -> Stream<U> {
        self.try_filter_map(move |value| f(value).map(Some))
    }

    /// Map and filter fallibly. An `Err` is delivered on the error channel,
    /// after which the upstream subscription is disposed.
    pub fn try_filter_map<U: Clone + Send + Sync + 'static>(
        &self,
        f: impl Fn(T) -> Result<Option<U>> + Send + Sync + 'static,
    ) -> Stream<U> {
        let source = self.clone();
        let f = Arc::new(f);
        Stream::new(move |observer: Observer<U>| {
            let f = Arc::clone(&f);
            let upstream = UpstreamSlot::new();
            let slot = upstream.clone();
            let connection = source.subscribe_observer(Observer::new(move |notification| {
                let terminal = match notification {
                    Notification::Next(value) => {
                        if observer.is_stopped() {
                            return;
                        }
                        match f(value) {
                            Ok(Some(mapped)) => observer.next(mapped),
                            Ok(None) => {}
                            Err(error) => observer.error(error),
                        }
                        observer.is_stopped()
                    }
                    Notification::Error(error) => {
                        observer.error(error);
                        true
                    }
                    Notification::Completed => {
                        observer.completed();
                        true
                    }
                };
                if terminal {
                    slot.detach();
                }
            }));
            upstream.fill(connection);
            upstream.into_subscription()
        })
    }

    /// Emit `value` on subscribe, before anything from the source.
    pub fn start_with(&self, value: T) -> Stream<T> {
        let source = self.clone();
        Stream::new(move |observer| {
            observer.next(value.clone());
            source.subscribe_observer(observer)
        })
    }

    /// Drop the first `count` values of each subscription.
    pub fn skip(&self, count: usize) -> Stream<T> {
        let source = self.clone();
        Stream::new(move |observer| {
            let seen = AtomicUsize::new(0);
            let downstream = observer.clone();
            source.subscribe_observer(Observer::new(move |notification| match notification {
                Notification::Next(value) => {
                    if seen.fetch_add(1, Ordering::AcqRel) >= count {
                        downstream.next(value);
                    }
                }
                other => downstream.emit(other),
            }))
        })
    }

    /// Interleave several streams; completes when all of them have.
    ///
    /// An error from any input disposes every input.
    pub fn merge(streams: Vec<Stream<T>>) -> Stream<T> {
        Stream::new(move |observer| {
            if streams.is_empty() {
                observer.completed();
                return Subscription::empty();
            }
            let remaining = Arc::new(AtomicUsize::new(streams.len()));
            let upstream = UpstreamSlot::new();
            let parts = streams
                .iter()
                .map(|stream| {
                    let observer = observer.clone();
                    let remaining = Arc::clone(&remaining);
                    let slot = upstream.clone();
                    stream.subscribe_observer(Observer::new(move |notification| {
                        match notification {
                            Notification::Next(value) => observer.next(value),
                            Notification::Error(error) => {
                                observer.error(error);
                                slot.detach();
                            }
                            Notification::Completed => {
                                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                                    observer.completed();
                                    slot.detach();
                                }
                            }
                        }
                    }))
                })
                .collect();
            upstream.fill(Subscription::composite(parts));
            upstream.into_subscription()
        })
    }

    /// Suppress consecutive values considered equal by `same`.
    pub fn distinct_by(&self, same: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Stream<T> {
        let source = self.clone();
        let same = Arc::new(same);
        Stream::new(move |observer| {
            let same = Arc::clone(&same);
            let last: Mutex<Option<T>> = Mutex::new(None);
            let downstream = observer.clone();
            source.subscribe_observer(Observer::new(move |notification| match notification {
                Notification::Next(value) => {
                    let fresh = {
                        let mut last = last.lock();
                        if last.as_ref().is_some_and(|prev| same(prev, &value)) {
                            false
                        } else {
                            *last = Some(value.clone());
                            true
                        }
                    };
                    if fresh {
                        downstream.next(value);
                    }
                }
                other => downstream.emit(other),
            }))
        })
    }

    /// Serialize deliveries of each subscription.
    pub fn synchronize(&self) -> Stream<T> {
        let source = self.clone();
        Stream::new(move |observer| {
            let gate = ReentrantMutex::new(());
            source.subscribe_observer(Observer::new(move |notification| {
                let _guard = gate.lock();
                observer.emit(notification);
            }))
        })
    }

    /// Multicast with reference counting.
    pub fn share(&self) -> Stream<T> {
        let shared = Arc::new(Shared {
            source: self.clone(),
            state: Mutex::new(ShareState {
                subscribers: 0,
                subject: Subject::new(),
                connection: None,
            }),
        });
        Stream::new(move |observer| Shared::subscribe(&shared, observer))
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Stream<T> {
    /// Suppress consecutive equal values.
    pub fn distinct_until_changed(&self) -> Stream<T> {
        self.distinct_by(|a, b| a == b)
    }
}

impl<T: Clone + Send + Sync + 'static> Stream<Stream<T>> {
    /// Follow only the most recent inner stream.
    ///
    /// Each new inner stream disposes the previous one before it is
    /// subscribed. Completes once the outer stream and the active inner
    /// stream have both completed. An error from either side disposes both.
    pub fn switch(&self) -> Stream<T> {
        let outer = self.clone();
        Stream::new(move |observer: Observer<T>| {
            let state = Arc::new(SwitchState {
                generation: AtomicU64::new(0),
                outer: UpstreamSlot::new(),
                inner: SerialSubscription::new(),
                outer_done: AtomicBool::new(false),
                inner_active: AtomicBool::new(false),
            });
            let teardown = Arc::clone(&state);
            let downstream = observer.clone();
            let on_outer = Arc::clone(&state);
            let connection = outer.subscribe_observer(Observer::new(move |notification| {
                match notification {
                    Notification::Next(inner) => on_outer.switch_to(&inner, &downstream),
                    Notification::Error(error) => {
                        downstream.error(error);
                        on_outer.shut_down();
                    }
                    Notification::Completed => {
                        on_outer.outer_done.store(true, Ordering::Release);
                        on_outer.outer.detach();
                        if !on_outer.inner_active.load(Ordering::Acquire) {
                            downstream.completed();
                        }
                    }
                }
            }));
            state.outer.fill(connection);
            Subscription::new(move || teardown.shut_down())
        })
    }
}

struct SwitchState {
    generation: AtomicU64,
    outer: UpstreamSlot,
    inner: SerialSubscription,
    outer_done: AtomicBool,
    inner_active: AtomicBool,
}

impl SwitchState {
    fn switch_to<T: Clone + Send + Sync + 'static>(
        self: &Arc<Self>,
        inner: &Stream<T>,
        downstream: &Observer<T>,
    ) {
        let id = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner_active.store(true, Ordering::Release);
        self.inner.replace(None);

        let state = Arc::clone(self);
        let observer = downstream.clone();
        let subscription = inner.subscribe_observer(Observer::new(move |notification| {
            if state.generation.load(Ordering::Acquire) != id {
                return;
            }
            match notification {
                Notification::Next(value) => observer.next(value),
                Notification::Error(error) => {
                    observer.error(error);
                    state.shut_down();
                }
                Notification::Completed => {
                    state.inner_active.store(false, Ordering::Release);
                    if state.outer_done.load(Ordering::Acquire) {
                        observer.completed();
                    }
                }
            }
        }));
        if self.generation.load(Ordering::Acquire) == id {
            self.inner.replace(Some(subscription));
        }
    }

    /// Dispose both sides. A generation bump keeps an inner subscription
    /// still being set up from being stored.
    fn shut_down(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.outer.detach();
        self.inner.replace(None);
    }
}

struct ShareState<T> {
    subscribers: usize,
    subject: Subject<T>,
    connection: Option<UpstreamSlot>,
}

struct Shared<T> {
    source: Stream<T>,
    state: Mutex<ShareState<T>>,
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    fn subscribe(shared: &Arc<Self>, observer: Observer<T>) -> Subscription {
        let (subject, connect) = {
            let mut state = shared.state.lock();
            state.subscribers += 1;
            if state.subscribers == 1 {
                state.subject = Subject::new();
                (state.subject.clone(), true)
            } else {
                (state.subject.clone(), false)
            }
        };

        let subscription = subject.stream().subscribe_observer(observer);

        if connect {
            // Connect outside the lock: the source may emit synchronously.
            let upstream = UpstreamSlot::new();
            let slot = upstream.clone();
            let feed = subject.observer();
            let connection = shared.source.subscribe_observer(Observer::new(move |notification| {
                let terminal = !matches!(notification, Notification::Next(_));
                feed.emit(notification);
                if terminal {
                    slot.detach();
                }
            }));
            upstream.fill(connection);
            let stale = {
                let mut state = shared.state.lock();
                if state.subscribers > 0 && state.connection.is_none() {
                    state.connection = Some(upstream);
                    None
                } else {
                    Some(upstream)
                }
            };
            if let Some(stale) = stale {
                stale.detach();
            }
        }

        let shared = Arc::clone(shared);
        Subscription::new(move || {
            subscription.dispose();
            let connection = {
                let mut state = shared.state.lock();
                state.subscribers = state.subscribers.saturating_sub(1);
                if state.subscribers == 0 {
                    state.connection.take()
                } else {
                    None
                }
            };
            if let Some(connection) = connection {
                connection.detach();
            }
        })
    }
}
