#![forbid(unsafe_code)]

//! Push-based change streams for the binding engine.
//!
//! - [`Stream`]: a cold, composable producer of values with an error channel.
//! - [`Subject`]: a hot multicast hub that feeds any number of observers.
//! - [`Subscription`]: RAII guard that tears a subscription down on drop.
//! - [`BindingScope`]: owns bindings for a logical owner and disposes them
//!   together.
//!
//! # Architecture
//!
//! Everything is `Send + Sync` and callback-driven: values are delivered on
//! the producer's thread and no operator owns a thread or an event loop.
//! Shared state lives behind `parking_lot` locks that are never held while
//! user callbacks run, with one exception: [`Stream::synchronize`] holds a
//! re-entrant lock across delivery so a single binding applies one value at
//! a time.
//!
//! # Invariants
//!
//! 1. No notification follows a terminal event on the same observer.
//! 2. Disposal is synchronous and idempotent.
//! 3. Subjects notify observers in subscription order.
//! 4. Dropping a [`Subscription`] detaches its callback before the next
//!    notification cycle.

pub mod scope;
pub mod stream;
pub mod subject;
pub mod subscription;

pub use scope::BindingScope;
pub use stream::{Notification, Observer, Stream};
pub use subject::Subject;
pub use subscription::{Disposable, Subscription};
