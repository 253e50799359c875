#![forbid(unsafe_code)]

//! Multicast hub: one producer, many observers.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::stream::{Notification, Observer, Stream};
use super::subscription::Subscription;
use crate::error::BindError;

enum Terminal {
    Completed,
    Failed(BindError),
}

struct SubjectState<T> {
    observers: Vec<(u64, Observer<T>)>,
    next_id: u64,
    terminal: Option<Terminal>,
}

/// A hot stream that forwards everything it is fed to its current observers.
///
/// # Invariants
///
/// 1. Observers are notified in subscription order.
/// 2. Observer callbacks run outside the internal lock, so an observer may
///    subscribe, unsubscribe or feed the subject re-entrantly.
/// 3. After a terminal event, new subscribers receive that terminal event
///    immediately and nothing else.
pub struct Subject<T> {
    state: Arc<Mutex<SubjectState<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Subject<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                observers: Vec::new(),
                next_id: 0,
                terminal: None,
            })),
        }
    }

    /// Push a value to every current observer.
    pub fn on_next(&self, value: T) {
        let observers = {
            let state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            state
                .observers
                .iter()
                .map(|(_, observer)| observer.clone())
                .collect::<Vec<_>>()
        };
        for observer in observers {
            observer.next(value.clone());
        }
    }

    pub fn on_error(&self, error: BindError) {
        for observer in self.terminate(Terminal::Failed(error.clone())) {
            observer.error(error.clone());
        }
    }

    pub fn on_completed(&self) {
        for observer in self.terminate(Terminal::Completed) {
            observer.completed();
        }
    }

    fn terminate(&self, terminal: Terminal) -> Vec<Observer<T>> {
        let mut state = self.state.lock();
        if state.terminal.is_some() {
            return Vec::new();
        }
        state.terminal = Some(terminal);
        std::mem::take(&mut state.observers)
            .into_iter()
            .map(|(_, observer)| observer)
            .collect()
    }

    /// An observer that feeds this subject.
    #[must_use]
    pub fn observer(&self) -> Observer<T> {
        let subject = self.clone();
        Observer::new(move |notification| match notification {
            Notification::Next(value) => subject.on_next(value),
            Notification::Error(error) => subject.on_error(error),
            Notification::Completed => subject.on_completed(),
        })
    }

    /// Subscribe-side view of the subject.
    #[must_use]
    pub fn stream(&self) -> Stream<T> {
        let state = Arc::downgrade(&self.state);
        Stream::new(move |observer| subscribe_to(&state, observer))
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminal.is_some()
    }
}

fn subscribe_to<T: Clone + Send + Sync + 'static>(
    state: &Weak<Mutex<SubjectState<T>>>,
    observer: Observer<T>,
) -> Subscription {
    let Some(strong) = state.upgrade() else {
        observer.completed();
        return Subscription::empty();
    };
    let id = {
        let mut guard = strong.lock();
        if let Some(terminal) = &guard.terminal {
            let error = match terminal {
                Terminal::Completed => None,
                Terminal::Failed(error) => Some(error.clone()),
            };
            drop(guard);
            match error {
                Some(error) => observer.error(error),
                None => observer.completed(),
            }
            return Subscription::empty();
        }
        let id = guard.next_id;
        guard.next_id += 1;
        guard.observers.push((id, observer));
        id
    };
    let weak = Arc::downgrade(&strong);
    Subscription::new(move || {
        if let Some(state) = weak.upgrade() {
            state.lock().observers.retain(|(other, _)| *other != id);
        }
    })
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Subject")
            .field("observers", &state.observers.len())
            .field("terminated", &state.terminal.is_some())
            .finish()
    }
}
