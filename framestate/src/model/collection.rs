//! Collection traits and read-only projections
//!
//! [`MutableCollection`] is the common surface of framed collections and of
//! the projections a map hands out. Projections are snapshots of the backing
//! map: they can be read and iterated, but every mutator fails.

use std::sync::Arc;

use crate::{FrameError, Result};

/// Forward cursor over a collection
pub trait CollectionCursor<T> {
    fn has_next(&self) -> Result<bool>;

    /// Advance and return the next element
    fn next_item(&mut self) -> Result<T>;

    /// Remove the element last returned by `next_item`
    fn remove(&mut self) -> Result<()>;
}

/// Collection operations shared by framed collections and their projections
///
/// Mutators return whether the collection changed.
pub trait MutableCollection<T> {
    type Cursor: CollectionCursor<T>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn contains(&self, item: &T) -> Result<bool>;

    fn contains_all(&self, items: &[T]) -> Result<bool>;

    fn add(&self, item: T) -> Result<bool>;

    fn add_all(&self, items: Vec<T>) -> Result<bool>;

    fn remove(&self, item: &T) -> Result<bool>;

    fn remove_all(&self, items: &[T]) -> Result<bool>;

    fn retain_all(&self, items: &[T]) -> Result<bool>;

    fn clear(&self) -> Result<()>;

    fn cursor(&self) -> Result<Self::Cursor>;
}

// ============================================================================
// Read-only projection
// ============================================================================

/// Read-only snapshot of a map's entries, keys or values
#[derive(Debug, Clone)]
pub struct CollectionView<T> {
    items: Arc<[T]>,
    kind: &'static str,
}

impl<T> CollectionView<T> {
    pub(crate) fn new(items: Vec<T>, kind: &'static str) -> Self {
        Self {
            items: items.into(),
            kind,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    fn unsupported<R>(&self, op: &str) -> Result<R> {
        Err(FrameError::UnsupportedOperation(format!(
            "{} on read-only map {}",
            op, self.kind
        )))
    }
}

impl<T: Clone> CollectionView<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.to_vec()
    }
}

impl<T: Clone + PartialEq> MutableCollection<T> for CollectionView<T> {
    type Cursor = ViewCursor<T>;

    fn len(&self) -> Result<usize> {
        Ok(self.items.len())
    }

    fn contains(&self, item: &T) -> Result<bool> {
        Ok(self.items.contains(item))
    }

    fn contains_all(&self, items: &[T]) -> Result<bool> {
        Ok(items.iter().all(|i| self.items.contains(i)))
    }

    fn add(&self, _item: T) -> Result<bool> {
        self.unsupported("add")
    }

    fn add_all(&self, _items: Vec<T>) -> Result<bool> {
        self.unsupported("add_all")
    }

    fn remove(&self, _item: &T) -> Result<bool> {
        self.unsupported("remove")
    }

    fn remove_all(&self, _items: &[T]) -> Result<bool> {
        self.unsupported("remove_all")
    }

    fn retain_all(&self, _items: &[T]) -> Result<bool> {
        self.unsupported("retain_all")
    }

    fn clear(&self) -> Result<()> {
        self.unsupported("clear")
    }

    fn cursor(&self) -> Result<ViewCursor<T>> {
        Ok(ViewCursor {
            items: self.items.clone(),
            kind: self.kind,
            position: 0,
        })
    }
}

impl<'a, T> IntoIterator for &'a CollectionView<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Cursor over a read-only projection
#[derive(Debug)]
pub struct ViewCursor<T> {
    items: Arc<[T]>,
    kind: &'static str,
    position: usize,
}

impl<T: Clone> CollectionCursor<T> for ViewCursor<T> {
    fn has_next(&self) -> Result<bool> {
        Ok(self.position < self.items.len())
    }

    fn next_item(&mut self) -> Result<T> {
        let item = self
            .items
            .get(self.position)
            .cloned()
            .ok_or(FrameError::NoSuchElement)?;
        self.position += 1;
        Ok(item)
    }

    fn remove(&mut self) -> Result<()> {
        Err(FrameError::UnsupportedOperation(format!(
            "remove through a cursor over read-only map {}",
            self.kind
        )))
    }
}
