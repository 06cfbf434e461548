//! Framed list
//!
//! The element vector is the record payload, so a structural mutation copies
//! the whole vector into the frame's record the first time the frame writes
//! the list. Reads never touch the write path.

use std::fmt;
use std::ops::Range;

use super::collection::{CollectionCursor, MutableCollection};
use super::{Model, ObjectId};
use crate::frames::{frame_manager, FrameId, FrameManager};
use crate::{FrameError, Result};

/// Create a list in the current frame of the default manager
pub fn framed_list_of<T>(items: impl IntoIterator<Item = T>) -> Result<FramedList<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    FramedList::new_in(frame_manager(), items)
}

/// A list whose contents are versioned per frame
pub struct FramedList<T> {
    model: Model<Vec<T>>,
}

impl<T> FramedList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(items: impl IntoIterator<Item = T>) -> Result<Self> {
        Self::new_in(frame_manager(), items)
    }

    pub fn new_in(manager: &FrameManager, items: impl IntoIterator<Item = T>) -> Result<Self> {
        Ok(Self {
            model: Model::new_in(manager, items.into_iter().collect())?,
        })
    }
}

impl<T: Clone + PartialEq> FramedList<T> {
    pub fn id(&self) -> ObjectId {
        self.model.id()
    }

    /// Whether the current frame has written this list
    pub fn was_modified(&self) -> bool {
        self.model.was_modified()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Run `f` on the elements visible to the current frame
    ///
    /// `f` runs under the list's lock and must not access this list.
    pub fn with_items<R>(&self, f: impl FnOnce(&[T]) -> R) -> Result<R> {
        self.model.read(|items| f(items))
    }

    pub fn len(&self) -> Result<usize> {
        self.with_items(|items| items.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.with_items(|items| items.is_empty())
    }

    pub fn get(&self, index: usize) -> Result<T> {
        self.with_items(|items| {
            items.get(index).cloned().ok_or(FrameError::IndexOutOfBounds {
                index,
                len: items.len(),
            })
        })?
    }

    pub fn first(&self) -> Result<Option<T>> {
        self.with_items(|items| items.first().cloned())
    }

    pub fn contains(&self, item: &T) -> Result<bool> {
        self.with_items(|items| items.contains(item))
    }

    pub fn contains_all(&self, items: &[T]) -> Result<bool> {
        self.with_items(|own| items.iter().all(|i| own.contains(i)))
    }

    pub fn index_of(&self, item: &T) -> Result<Option<usize>> {
        self.with_items(|items| items.iter().position(|i| i == item))
    }

    pub fn last_index_of(&self, item: &T) -> Result<Option<usize>> {
        self.with_items(|items| items.iter().rposition(|i| i == item))
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.with_items(|items| items.to_vec())
    }

    /// Iterate over a snapshot of the elements
    pub fn iter(&self) -> Result<std::vec::IntoIter<T>> {
        Ok(self.to_vec()?.into_iter())
    }

    /// List iterator positioned before `index`, bound to the current frame
    pub fn list_iter(&self, index: usize) -> Result<FramedListIterator<T>> {
        let frame_id = self.model.current_frame_id().ok_or(FrameError::NotInFrame)?;
        let len = self.len()?;
        if index > len {
            return Err(FrameError::IndexOutOfBounds { index, len });
        }
        Ok(FramedListIterator {
            list: self.clone(),
            frame_id,
            cursor: index,
            last_returned: None,
        })
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> Result<R> {
        self.model.write(f)
    }

    fn check_index(&self, index: usize, inclusive: bool) -> Result<()> {
        let len = self.len()?;
        let valid = if inclusive { index <= len } else { index < len };
        if valid {
            Ok(())
        } else {
            Err(FrameError::IndexOutOfBounds { index, len })
        }
    }

    pub fn push(&self, item: T) -> Result<()> {
        self.mutate(|items| items.push(item))
    }

    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.check_index(index, true)?;
        self.mutate(|items| items.insert(index, item))
    }

    /// Append every item; returns whether any was added
    pub fn extend(&self, items: impl IntoIterator<Item = T>) -> Result<bool> {
        self.mutate(|own| {
            let before = own.len();
            own.extend(items);
            own.len() != before
        })
    }

    /// Insert every item at `index`, preserving their order
    pub fn insert_all(&self, index: usize, items: impl IntoIterator<Item = T>) -> Result<bool> {
        self.check_index(index, true)?;
        self.mutate(|own| {
            let before = own.len();
            own.splice(index..index, items);
            own.len() != before
        })
    }

    /// Remove the first occurrence of `item`
    pub fn remove(&self, item: &T) -> Result<bool> {
        self.mutate(|items| match items.iter().position(|i| i == item) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        })
    }

    pub fn remove_at(&self, index: usize) -> Result<T> {
        self.check_index(index, false)?;
        self.mutate(|items| items.remove(index))
    }

    /// Remove every element contained in `items`
    pub fn remove_all(&self, items: &[T]) -> Result<bool> {
        self.retain(|i| !items.contains(i))
    }

    /// Keep only elements contained in `items`
    pub fn retain_all(&self, items: &[T]) -> Result<bool> {
        self.retain(|i| items.contains(i))
    }

    pub fn retain(&self, mut keep: impl FnMut(&T) -> bool) -> Result<bool> {
        self.mutate(|items| {
            let before = items.len();
            items.retain(|i| keep(i));
            items.len() != before
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.mutate(|items| items.clear())
    }

    /// Replace the element at `index`, returning the previous one
    pub fn set(&self, index: usize, item: T) -> Result<T> {
        self.check_index(index, false)?;
        self.mutate(|items| std::mem::replace(&mut items[index], item))
    }

    /// Mutable view of `range`; writes go to this list
    ///
    /// Taking the view already counts as a write.
    pub fn sub_list_mut(&self, range: Range<usize>) -> Result<SubListMut<T>> {
        let len = self.len()?;
        if range.start > range.end || range.end > len {
            return Err(FrameError::IndexOutOfBounds {
                index: range.start.max(range.end),
                len,
            });
        }
        self.mutate(|_| ())?;
        Ok(SubListMut {
            list: self.clone(),
            start: range.start,
            end: range.end,
        })
    }
}

impl<T> Clone for FramedList<T> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
        }
    }
}

impl<T> PartialEq for FramedList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model
    }
}

impl<T> fmt::Debug for FramedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramedList").field("id", &self.model.id()).finish()
    }
}

impl<T: Clone + PartialEq> MutableCollection<T> for FramedList<T> {
    type Cursor = FramedListIterator<T>;

    fn len(&self) -> Result<usize> {
        FramedList::len(self)
    }

    fn is_empty(&self) -> Result<bool> {
        FramedList::is_empty(self)
    }

    fn contains(&self, item: &T) -> Result<bool> {
        FramedList::contains(self, item)
    }

    fn contains_all(&self, items: &[T]) -> Result<bool> {
        FramedList::contains_all(self, items)
    }

    fn add(&self, item: T) -> Result<bool> {
        self.push(item).map(|_| true)
    }

    fn add_all(&self, items: Vec<T>) -> Result<bool> {
        self.extend(items)
    }

    fn remove(&self, item: &T) -> Result<bool> {
        FramedList::remove(self, item)
    }

    fn remove_all(&self, items: &[T]) -> Result<bool> {
        FramedList::remove_all(self, items)
    }

    fn retain_all(&self, items: &[T]) -> Result<bool> {
        FramedList::retain_all(self, items)
    }

    fn clear(&self) -> Result<()> {
        FramedList::clear(self)
    }

    fn cursor(&self) -> Result<FramedListIterator<T>> {
        self.list_iter(0)
    }
}

// ============================================================================
// List Iterator
// ============================================================================

/// Bidirectional iterator over a framed list
///
/// Reads see the list as of each call. Mutations must come from the frame
/// that created the iterator.
pub struct FramedListIterator<T> {
    list: FramedList<T>,
    frame_id: FrameId,
    cursor: usize,
    last_returned: Option<usize>,
}

impl<T: Clone + PartialEq> FramedListIterator<T> {
    fn check_frame(&self) -> Result<()> {
        match self.list.model.current_frame_id() {
            None => Err(FrameError::NotInFrame),
            Some(current) if current != self.frame_id => Err(FrameError::IllegalState(format!(
                "Iterator created in frame {} used from frame {}",
                self.frame_id, current
            ))),
            Some(_) => Ok(()),
        }
    }

    pub fn has_next(&self) -> Result<bool> {
        Ok(self.cursor < self.list.len()?)
    }

    pub fn next_item(&mut self) -> Result<T> {
        let item = self.list.with_items(|items| items.get(self.cursor).cloned())?;
        let item = item.ok_or(FrameError::NoSuchElement)?;
        self.last_returned = Some(self.cursor);
        self.cursor += 1;
        Ok(item)
    }

    pub fn has_previous(&self) -> bool {
        self.cursor > 0
    }

    pub fn previous_item(&mut self) -> Result<T> {
        if self.cursor == 0 {
            return Err(FrameError::NoSuchElement);
        }
        let index = self.cursor - 1;
        let item = self.list.with_items(|items| items.get(index).cloned())?;
        let item = item.ok_or(FrameError::NoSuchElement)?;
        self.cursor = index;
        self.last_returned = Some(index);
        Ok(item)
    }

    pub fn next_index(&self) -> usize {
        self.cursor
    }

    /// None when positioned at the start
    pub fn previous_index(&self) -> Option<usize> {
        self.cursor.checked_sub(1)
    }

    /// Remove the element last returned by `next_item` or `previous_item`
    pub fn remove(&mut self) -> Result<()> {
        self.check_frame()?;
        let index = self.last_returned.ok_or_else(|| {
            FrameError::IllegalState("remove without a preceding next or previous".into())
        })?;
        self.list.remove_at(index)?;
        self.last_returned = None;
        if index < self.cursor {
            self.cursor -= 1;
        }
        Ok(())
    }

    /// Replace the element last returned by `next_item` or `previous_item`
    pub fn set(&mut self, item: T) -> Result<()> {
        self.check_frame()?;
        let index = self.last_returned.ok_or_else(|| {
            FrameError::IllegalState("set without a preceding next or previous".into())
        })?;
        self.list.set(index, item)?;
        Ok(())
    }

    /// Insert before the cursor
    pub fn add(&mut self, item: T) -> Result<()> {
        self.check_frame()?;
        self.list.insert(self.cursor, item)?;
        self.cursor += 1;
        self.last_returned = None;
        Ok(())
    }
}

impl<T: Clone + PartialEq> CollectionCursor<T> for FramedListIterator<T> {
    fn has_next(&self) -> Result<bool> {
        FramedListIterator::has_next(self)
    }

    fn next_item(&mut self) -> Result<T> {
        FramedListIterator::next_item(self)
    }

    fn remove(&mut self) -> Result<()> {
        FramedListIterator::remove(self)
    }
}

impl<T> fmt::Debug for FramedListIterator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramedListIterator")
            .field("list", &self.list.model.id())
            .field("frame", &self.frame_id)
            .field("cursor", &self.cursor)
            .finish()
    }
}

// ============================================================================
// Sub List
// ============================================================================

/// Mutable window onto a range of a framed list
pub struct SubListMut<T> {
    list: FramedList<T>,
    start: usize,
    end: usize,
}

impl<T: Clone + PartialEq> SubListMut<T> {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    fn absolute(&self, index: usize, inclusive: bool) -> Result<usize> {
        let len = self.len();
        let valid = if inclusive { index <= len } else { index < len };
        if valid {
            Ok(self.start + index)
        } else {
            Err(FrameError::IndexOutOfBounds { index, len })
        }
    }

    pub fn get(&self, index: usize) -> Result<T> {
        self.list.get(self.absolute(index, false)?)
    }

    /// Fails when the backing list has shrunk below the window
    fn stale(&self, len: usize) -> Option<FrameError> {
        (self.end > len).then_some(FrameError::IndexOutOfBounds {
            index: self.end,
            len,
        })
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.list.with_items(|items| match self.stale(items.len()) {
            Some(err) => Err(err),
            None => Ok(items[self.start..self.end].to_vec()),
        })?
    }

    pub fn set(&self, index: usize, item: T) -> Result<T> {
        self.list.set(self.absolute(index, false)?, item)
    }

    /// Append at the end of the window
    pub fn push(&mut self, item: T) -> Result<()> {
        self.list.insert(self.end, item)?;
        self.end += 1;
        Ok(())
    }

    pub fn insert(&mut self, index: usize, item: T) -> Result<()> {
        self.list.insert(self.absolute(index, true)?, item)?;
        self.end += 1;
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> Result<T> {
        let item = self.list.remove_at(self.absolute(index, false)?)?;
        self.end -= 1;
        Ok(item)
    }

    /// Remove every element in the window from the backing list
    pub fn clear(&mut self) -> Result<()> {
        if let Some(err) = self.stale(self.list.len()?) {
            return Err(err);
        }
        let range = self.start..self.end;
        self.list.mutate(|items| {
            items.drain(range);
        })?;
        self.end = self.start;
        Ok(())
    }
}

impl<T> fmt::Debug for SubListMut<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubListMut")
            .field("list", &self.list.model.id())
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
