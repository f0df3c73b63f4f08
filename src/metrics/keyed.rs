//! Keyed, insertion-ordered collection used by both registries.
//!
//! One mutex guards the id map, the key map and the ordered list so the
//! three views never diverge, and so lookup + insert is a single critical
//! section.

use crate::core::Result;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;

/// Items stored in a [`KeyedCollection`]
pub trait Keyed {
    type Id: Copy + Eq + Hash;

    fn id(&self) -> Self::Id;

    /// Normalized (lowercase) composite key
    fn key(&self) -> &str;
}

/// Outcome of a create-or-get call
pub(crate) enum Entry<T> {
    Existing(Arc<T>),
    Created(Arc<T>),
}

impl<T> Entry<T> {
    pub(crate) fn into_inner(self) -> Arc<T> {
        match self {
            Entry::Existing(item) | Entry::Created(item) => item,
        }
    }
}

struct Inner<T: Keyed> {
    by_id: AHashMap<T::Id, Arc<T>>,
    by_key: AHashMap<String, Arc<T>>,
    ordered: Vec<Arc<T>>,
}

pub struct KeyedCollection<T: Keyed> {
    inner: Mutex<Inner<T>>,
}

impl<T: Keyed> KeyedCollection<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_id: AHashMap::with_capacity(capacity),
                by_key: AHashMap::with_capacity(capacity),
                ordered: Vec::with_capacity(capacity),
            }),
        }
    }

    /// Look up `key` and build + insert a new item if it is absent, all
    /// under the collection lock. `make` runs at most once and only when
    /// the key is missing; if it fails nothing is inserted.
    pub(crate) fn get_or_try_insert_with<F>(&self, key: &str, make: F) -> Result<Entry<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.by_key.get(key) {
            return Ok(Entry::Existing(Arc::clone(existing)));
        }

        let item = Arc::new(make()?);
        debug_assert_eq!(item.key(), key);

        inner.by_id.insert(item.id(), Arc::clone(&item));
        inner.by_key.insert(key.to_owned(), Arc::clone(&item));
        inner.ordered.push(Arc::clone(&item));

        Ok(Entry::Created(item))
    }

    pub fn get_by_id(&self, id: T::Id) -> Option<Arc<T>> {
        self.inner.lock().by_id.get(&id).cloned()
    }

    /// Lookup by an already-normalized key
    pub fn get_by_key(&self, key: &str) -> Option<Arc<T>> {
        self.inner.lock().by_key.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the items in insertion order
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.inner.lock().ordered.clone()
    }
}
