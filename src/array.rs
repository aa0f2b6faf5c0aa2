use std::collections::TryReserveError;

use crate::BuildError;

/// Number of slots addressable by an `i32` index.
pub(crate) const MAX_SLOTS: usize = i32::MAX as usize + 1;

/// Resizes `v` to `len`, failing instead of aborting when the allocation
/// cannot be satisfied.
pub(crate) fn try_resize<T: Clone>(v: &mut Vec<T>, len: usize, fill: T) -> Result<(), BuildError> {
    v.try_reserve_exact(len.saturating_sub(v.len()))
        .map_err(|_: TryReserveError| BuildError::Capacity { required: len })?;
    v.resize(len, fill);
    Ok(())
}

/// Size the arrays grow to when `required` slots are needed, clamped to the
/// addressable range.
fn grown_size(required: usize, rate: f64) -> usize {
    let grown = (required as f64 * rate) as usize;
    grown.min(MAX_SLOTS).max(required)
}

/// The `base`/`check` pair backing a double-array trie.
///
/// `size` is one past the highest index written so far, `alloc_size` is the
/// physical length of both arrays. Slots past `size` are always zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ArrayStore {
    pub(crate) base: Vec<i32>,
    pub(crate) check: Vec<i32>,
    pub(crate) size: usize,
}

impl ArrayStore {
    /// Creates zeroed arrays of `capacity` slots.
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, BuildError> {
        if capacity > MAX_SLOTS {
            return Err(BuildError::Capacity { required: capacity });
        }
        let mut store = Self::default();
        store.resize(capacity)?;
        Ok(store)
    }

    #[inline]
    pub(crate) fn alloc_size(&self) -> usize {
        self.check.len()
    }

    /// Resizes both arrays to exactly `new_size` slots, keeping existing contents.
    pub(crate) fn resize(&mut self, new_size: usize) -> Result<(), BuildError> {
        try_resize(&mut self.base, new_size, 0)?;
        try_resize(&mut self.check, new_size, 0)
    }

    /// Ensures at least `required` slots exist, over-allocating by `rate` but
    /// never past [`MAX_SLOTS`].
    ///
    /// Returns true if the arrays were grown.
    pub(crate) fn reserve(&mut self, required: usize, rate: f64) -> Result<bool, BuildError> {
        if required <= self.alloc_size() {
            return Ok(false);
        }
        if required > MAX_SLOTS {
            return Err(BuildError::Capacity { required });
        }
        self.resize(grown_size(required, rate))?;
        Ok(true)
    }

    /// Slot is unowned (never committed by a sibling group).
    #[inline]
    pub(crate) fn is_free(&self, index: usize) -> bool {
        self.check.get(index).map_or(true, |&c| c == 0)
    }

    /// Raises the watermark so that every index below `end` counts as used.
    #[inline]
    pub(crate) fn mark_used(&mut self, end: usize) {
        if self.size < end {
            self.size = end;
        }
    }

    /// Drops the unused tail so that `alloc_size == size`.
    pub(crate) fn shrink(&mut self) {
        self.base.truncate(self.size);
        self.check.truncate(self.size);
        self.base.shrink_to_fit();
        self.check.shrink_to_fit();
    }
}
