//! Framed map
//!
//! Same record semantics as the framed list. The `entries`, `keys` and
//! `values` projections are read-only snapshots.

use std::fmt;
use std::hash::Hash;

use ahash::AHashMap;

use super::collection::CollectionView;
use super::{Model, ObjectId};
use crate::frames::{frame_manager, FrameManager};
use crate::Result;

/// Create a map in the current frame of the default manager
pub fn framed_map_of<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Result<FramedMap<K, V>>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    FramedMap::new_in(frame_manager(), entries)
}

/// A hash map whose contents are versioned per frame
pub struct FramedMap<K, V> {
    model: Model<AHashMap<K, V>>,
}

impl<K, V> FramedMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(entries: impl IntoIterator<Item = (K, V)>) -> Result<Self> {
        Self::new_in(frame_manager(), entries)
    }

    pub fn new_in(
        manager: &FrameManager,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self> {
        Ok(Self {
            model: Model::new_in(manager, entries.into_iter().collect())?,
        })
    }
}

impl<K, V> FramedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
{
    pub fn id(&self) -> ObjectId {
        self.model.id()
    }

    /// Whether the current frame has written this map
    pub fn was_modified(&self) -> bool {
        self.model.was_modified()
    }

    pub fn len(&self) -> Result<usize> {
        self.model.read(|map| map.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.model.read(|map| map.is_empty())
    }

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        self.model.read(|map| map.contains_key(key))
    }

    pub fn contains_value(&self, value: &V) -> Result<bool> {
        self.model.read(|map| map.values().any(|v| v == value))
    }

    pub fn get(&self, key: &K) -> Result<Option<V>> {
        self.model.read(|map| map.get(key).cloned())
    }

    /// Iterate over a snapshot of the entries
    pub fn iter(&self) -> Result<std::vec::IntoIter<(K, V)>> {
        Ok(self.snapshot()?.into_iter())
    }

    pub fn entries(&self) -> Result<CollectionView<(K, V)>> {
        Ok(CollectionView::new(self.snapshot()?, "entries"))
    }

    pub fn keys(&self) -> Result<CollectionView<K>> {
        let keys = self.model.read(|map| map.keys().cloned().collect())?;
        Ok(CollectionView::new(keys, "keys"))
    }

    pub fn values(&self) -> Result<CollectionView<V>> {
        let values = self.model.read(|map| map.values().cloned().collect())?;
        Ok(CollectionView::new(values, "values"))
    }

    fn snapshot(&self) -> Result<Vec<(K, V)>> {
        self.model
            .read(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Insert or replace; returns the previous value
    pub fn insert(&self, key: K, value: V) -> Result<Option<V>> {
        self.model.write(|map| map.insert(key, value))
    }

    pub fn extend(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        self.model.write(|map| map.extend(entries))
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        self.model.write(|map| map.remove(key))
    }

    pub fn clear(&self) -> Result<()> {
        self.model.write(|map| map.clear())
    }
}

impl<K, V> Clone for FramedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
        }
    }
}

impl<K, V> PartialEq for FramedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model
    }
}

impl<K, V> fmt::Debug for FramedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramedMap").field("id", &self.model.id()).finish()
    }
}
