#![forbid(unsafe_code)]

//! RAII subscription handles.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

type Teardown = Box<dyn FnOnce() + Send>;

/// Something that can be torn down exactly once.
pub trait Disposable: Send + Sync {
    /// Tear down. Calling this more than once is a no-op.
    fn dispose(&self);

    /// Whether [`dispose`](Disposable::dispose) has run.
    fn is_disposed(&self) -> bool;
}

/// Guard for a live subscription.
///
/// Dropping the guard (or calling [`dispose`](Subscription::dispose))
/// runs the teardown synchronously. Disposal is idempotent.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    teardown: Mutex<Option<Teardown>>,
    disposed: AtomicBool,
}

impl Subscription {
    /// Create a subscription that runs `teardown` on dispose.
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
            disposed: AtomicBool::new(false),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn empty() -> Self {
        Self {
            teardown: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    /// Combine several subscriptions; they are disposed in reverse order.
    pub fn composite(parts: Vec<Subscription>) -> Self {
        Self::new(move || {
            for part in parts.into_iter().rev() {
                part.dispose();
            }
        })
    }

    /// Run the teardown now.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Take the closure before running it so a re-entrant dispose from
        // inside the teardown finds nothing left to do.
        let teardown = self.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Disposable for Subscription {
    fn dispose(&self) {
        Subscription::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        Subscription::is_disposed(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A slot holding at most one subscription; replacing it disposes the old one.
#[derive(Default)]
pub(crate) struct SerialSubscription {
    current: Arc<Mutex<Option<Subscription>>>,
}

impl SerialSubscription {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn replace(&self, next: Option<Subscription>) {
        let previous = std::mem::replace(&mut *self.current.lock(), next);
        // Dispose outside the lock; teardown may call back into us.
        drop(previous);
    }
}

/// Upstream connection of an operator, released on a terminal event.
///
/// A terminal event can arrive while the upstream `subscribe_observer` call
/// is still running, before [`fill`](UpstreamSlot::fill) has the handle; the
/// handle is then disposed as soon as it is filled in.
#[derive(Clone, Default)]
pub(crate) struct UpstreamSlot {
    state: Arc<Mutex<SlotState>>,
}

#[derive(Default)]
struct SlotState {
    connection: Option<Subscription>,
    detached: bool,
}

impl UpstreamSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fill(&self, connection: Subscription) {
        let stale = {
            let mut state = self.state.lock();
            if state.detached {
                Some(connection)
            } else {
                state.connection = Some(connection);
                None
            }
        };
        drop(stale);
    }

    /// Dispose the upstream connection. Idempotent.
    pub(crate) fn detach(&self) {
        let connection = {
            let mut state = self.state.lock();
            state.detached = true;
            state.connection.take()
        };
        // Outside the lock: disposing may deliver into this operator again.
        drop(connection);
    }

    /// Downstream handle that detaches on dispose.
    pub(crate) fn into_subscription(self) -> Subscription {
        Subscription::new(move || self.detach())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn dispose_runs_teardown_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        sub.dispose();
        sub.dispose();
        drop(sub);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_disposes() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let c = Arc::clone(&count);
            let _sub = Subscription::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn composite_disposes_in_reverse() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let parts = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                Subscription::new(move || order.lock().push(i))
            })
            .collect();
        Subscription::composite(parts).dispose();
        assert_eq!(*order.lock(), vec![2, 1, 0]);
    }

    #[test]
    fn serial_replace_disposes_previous() {
        let count = Arc::new(AtomicUsize::new(0));
        let serial = SerialSubscription::new();
        for _ in 0..3 {
            let c = Arc::clone(&count);
            serial.replace(Some(Subscription::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })));
        }
        assert_eq!(count.load(Ordering::SeqCst), 2);
        serial.replace(None);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn slot_detached_before_fill_disposes_on_fill() {
        let count = Arc::new(AtomicUsize::new(0));
        let slot = UpstreamSlot::new();
        slot.detach();
        let c = Arc::clone(&count);
        slot.fill(Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn slot_subscription_detaches_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let slot = UpstreamSlot::new();
        let c = Arc::clone(&count);
        slot.fill(Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        let handle = slot.clone().into_subscription();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        handle.dispose();
        slot.detach();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
