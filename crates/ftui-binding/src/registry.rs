#![forbid(unsafe_code)]

//! Copy-on-write registries with lock-free reads.
//!
//! Readers take an [`Arc`] of the current snapshot with a single atomic
//! load and never block. Writers serialize on a mutex, clone the snapshot,
//! mutate the clone and publish it with one atomic store, so a reader sees
//! either the state before a registration or the state after it.
//!
//! # Selection rule
//!
//! [`select_best`] returns the entry with the strictly highest score
//! greater than zero. Among equal top scores the entry registered last
//! wins. Entries scoring zero or less are never returned.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

/// An atomically published value replaced wholesale on every write.
pub struct CowCell<S> {
    current: ArcSwap<S>,
    write: Mutex<()>,
}

impl<S: Clone> CowCell<S> {
    pub fn new(initial: S) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            write: Mutex::new(()),
        }
    }

    /// The current snapshot.
    #[inline]
    pub fn load(&self) -> Arc<S> {
        self.current.load_full()
    }

    /// Clone the current snapshot, apply `f` and publish the result.
    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let _write = self.write.lock();
        let mut next = S::clone(&self.current.load());
        let result = f(&mut next);
        self.current.store(Arc::new(next));
        result
    }
}

impl<S: Clone + Default> Default for CowCell<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

/// Immutable contents of a [`SnapshotRegistry`].
pub struct RegistrySnapshot<K, E: ?Sized> {
    by_key: HashMap<K, Vec<Arc<E>>>,
    all: Vec<Arc<E>>,
}

impl<K: Clone, E: ?Sized> Clone for RegistrySnapshot<K, E> {
    fn clone(&self) -> Self {
        Self {
            by_key: self.by_key.clone(),
            all: self.all.clone(),
        }
    }
}

impl<K, E: ?Sized> Default for RegistrySnapshot<K, E> {
    fn default() -> Self {
        Self {
            by_key: HashMap::new(),
            all: Vec::new(),
        }
    }
}

impl<K: Eq + Hash, E: ?Sized> RegistrySnapshot<K, E> {
    /// Entries registered under `key`, oldest first.
    pub fn candidates(&self, key: &K) -> &[Arc<E>] {
        self.by_key.get(key).map_or(&[], Vec::as_slice)
    }

    /// Every entry, oldest first.
    pub fn all(&self) -> &[Arc<E>] {
        &self.all
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// A registry of strategy entries grouped by lookup key.
///
/// Registries that score every entry at lookup time use `()` as the key.
pub struct SnapshotRegistry<K, E: ?Sized> {
    label: &'static str,
    cell: CowCell<RegistrySnapshot<K, E>>,
}

impl<K, E> SnapshotRegistry<K, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
    E: ?Sized,
{
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            cell: CowCell::new(RegistrySnapshot::default()),
        }
    }

    /// Add an entry under `key`.
    pub fn register(&self, key: K, entry: Arc<E>) {
        let total = self.cell.update(|snapshot| {
            snapshot
                .by_key
                .entry(key.clone())
                .or_default()
                .push(Arc::clone(&entry));
            snapshot.all.push(entry);
            snapshot.all.len()
        });
        tracing::debug!(registry = self.label, ?key, total, "registered entry");
    }

    /// The current snapshot.
    #[inline]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot<K, E>> {
        self.cell.load()
    }

    /// Every registered entry, oldest first.
    pub fn get_all(&self) -> Vec<Arc<E>> {
        self.snapshot().all.clone()
    }

    /// Best entry registered under `key`, scored by `score`.
    pub fn select(&self, key: &K, score: impl Fn(&E) -> i32) -> Option<Arc<E>> {
        select_best(self.snapshot().candidates(key), score)
    }

    /// Best entry across every key.
    pub fn select_any(&self, score: impl Fn(&E) -> i32) -> Option<Arc<E>> {
        select_best(self.snapshot().all(), score)
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl<K: Clone, E: ?Sized> fmt::Debug for SnapshotRegistry<K, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotRegistry")
            .field("label", &self.label)
            .field("entries", &self.cell.load().all.len())
            .finish()
    }
}

/// Pick the highest positive score; the later entry wins a tie.
pub fn select_best<'a, E: ?Sized + 'a>(
    entries: impl IntoIterator<Item = &'a Arc<E>>,
    score: impl Fn(&E) -> i32,
) -> Option<Arc<E>> {
    let mut best: Option<(i32, &Arc<E>)> = None;
    for entry in entries {
        let s = score(&**entry);
        if s <= 0 {
            continue;
        }
        if best.is_none_or(|(top, _)| s >= top) {
            best = Some((s, entry));
        }
    }
    best.map(|(_, entry)| Arc::clone(entry))
}
