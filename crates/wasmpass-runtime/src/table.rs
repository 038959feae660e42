//! Wasm tables: growable vectors of nullable references.
//!
//! A table backs `call_indirect`, `table.get`/`table.set` and the bulk table
//! operations. The element type `R` is whatever the embedder uses for a
//! reference (a function handle for `funcref` tables, an opaque host id for
//! `externref` tables); the table itself only needs to clone it.
//!
//! Every access is bounds checked against the *current* size; accesses past
//! it trap with `TableOutOfBounds`. Growth is bounded by the declared maximum
//! and by [`MAX_TABLE_ELEMENTS`].

use alloc::vec::Vec;
use core::ops::Range;

use crate::{ConstructionError, Trap, TrapResult};

/// Hard cap on the number of elements any table may hold, regardless of the
/// declared maximum. `table.grow` past this returns -1.
pub const MAX_TABLE_ELEMENTS: u32 = 10_000_000;

/// A growable table of nullable references.
#[derive(Debug, Clone)]
pub struct Table<R> {
    entries: Vec<Option<R>>,
    maximum: Option<u32>,
}

impl<R: Clone> Table<R> {
    /// Create a table with `initial` null slots.
    ///
    /// # Errors
    /// Returns `ConstructionError::TableInitialSizeExceedsMax` if `initial`
    /// exceeds the declared maximum or [`MAX_TABLE_ELEMENTS`].
    pub fn try_new(initial: u32, maximum: Option<u32>) -> Result<Self, ConstructionError> {
        let limit = maximum.map_or(MAX_TABLE_ELEMENTS, |m| m.min(MAX_TABLE_ELEMENTS));
        if initial > limit {
            return Err(ConstructionError::TableInitialSizeExceedsMax {
                initial,
                max: limit,
            });
        }
        let mut entries = Vec::new();
        entries.resize(initial as usize, None);
        Ok(Self { entries, maximum })
    }

    /// Current number of slots.
    #[inline(always)]
    pub fn size(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Declared maximum, if any.
    #[inline]
    pub fn maximum(&self) -> Option<u32> {
        self.maximum
    }

    /// `table.get`: the slot at `index`, which may be null.
    #[inline]
    pub fn get(&self, index: u32) -> TrapResult<Option<R>> {
        self.entries
            .get(index as usize)
            .cloned()
            .ok_or(Trap::TableOutOfBounds)
    }

    /// Fetch the slot at `index` for an indirect call.
    ///
    /// - `TableOutOfBounds` if `index >= size`
    /// - `UninitializedElement` if the slot is null
    #[inline]
    pub fn get_non_null(&self, index: u32) -> TrapResult<R> {
        self.get(index)?.ok_or(Trap::UninitializedElement)
    }

    /// `table.set`: overwrite the slot at `index`.
    #[inline]
    pub fn set(&mut self, index: u32, entry: Option<R>) -> TrapResult<()> {
        let slot = self
            .entries
            .get_mut(index as usize)
            .ok_or(Trap::TableOutOfBounds)?;
        *slot = entry;
        Ok(())
    }

    /// `table.grow`: append `delta` slots filled with `init`.
    /// Returns the previous size, or -1 if the new size would exceed the limit.
    pub fn grow(&mut self, delta: u32, init: Option<R>) -> i32 {
        let old = self.size();
        let limit = self
            .maximum
            .map_or(MAX_TABLE_ELEMENTS, |m| m.min(MAX_TABLE_ELEMENTS));
        let new = match old.checked_add(delta) {
            Some(n) if n <= limit => n,
            _ => return -1,
        };
        self.entries.resize(new as usize, init);
        old as i32
    }

    /// `table.fill`: set `len` slots starting at `dst` to `value`.
    pub fn fill(&mut self, dst: u32, value: Option<R>, len: u32) -> TrapResult<()> {
        let range = checked_range(self.entries.len(), dst, len)?;
        for slot in &mut self.entries[range] {
            *slot = value.clone();
        }
        Ok(())
    }

    /// `table.copy` within one table. Overlapping ranges behave like `memmove`.
    pub fn copy_within(&mut self, dst: u32, src: u32, len: u32) -> TrapResult<()> {
        let src_range = checked_range(self.entries.len(), src, len)?;
        let dst_range = checked_range(self.entries.len(), dst, len)?;
        if dst_range.start <= src_range.start {
            for (d, s) in dst_range.zip(src_range) {
                self.entries[d] = self.entries[s].clone();
            }
        } else {
            for (d, s) in dst_range.rev().zip(src_range.rev()) {
                self.entries[d] = self.entries[s].clone();
            }
        }
        Ok(())
    }

    /// `table.copy` from another table.
    pub fn copy_from(&mut self, dst: u32, src_table: &Table<R>, src: u32, len: u32) -> TrapResult<()> {
        let src_range = checked_range(src_table.entries.len(), src, len)?;
        let dst_range = checked_range(self.entries.len(), dst, len)?;
        self.entries[dst_range].clone_from_slice(&src_table.entries[src_range]);
        Ok(())
    }

    /// `table.init` / active element segments: copy `len` items of `segment`
    /// starting at `src` into slots starting at `dst`.
    pub fn init(&mut self, dst: u32, segment: &[Option<R>], src: u32, len: u32) -> TrapResult<()> {
        let src_range = checked_range(segment.len(), src, len)?;
        let dst_range = checked_range(self.entries.len(), dst, len)?;
        self.entries[dst_range].clone_from_slice(&segment[src_range]);
        Ok(())
    }
}

/// `start..start+len` if it lies within `0..active`, else `TableOutOfBounds`.
/// A zero-length range at exactly `active` is in bounds.
#[inline]
fn checked_range(active: usize, start: u32, len: u32) -> TrapResult<Range<usize>> {
    let start = start as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or(Trap::TableOutOfBounds)?;
    if end > active {
        return Err(Trap::TableOutOfBounds);
    }
    Ok(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn new_table_is_null_filled() {
        let table = Table::<u32>::try_new(4, Some(8)).unwrap();
        assert_eq!(table.size(), 4);
        assert_eq!(table.get(0), Ok(None));
        assert_eq!(table.get_non_null(3), Err(Trap::UninitializedElement));
    }

    #[test]
    fn get_out_of_bounds() {
        let table = Table::<u32>::try_new(4, None).unwrap();
        assert_eq!(table.get(4), Err(Trap::TableOutOfBounds));
        assert_eq!(table.get_non_null(100), Err(Trap::TableOutOfBounds));
    }

    #[test]
    fn set_and_get() {
        let mut table = Table::try_new(4, None).unwrap();
        table.set(2, Some(5u32)).unwrap();
        assert_eq!(table.get_non_null(2), Ok(5));
        table.set(2, None).unwrap();
        assert_eq!(table.get(2), Ok(None));
        assert_eq!(table.set(4, Some(1)), Err(Trap::TableOutOfBounds));
    }

    #[test]
    fn grow_returns_old_size_and_initializes() {
        let mut table = Table::try_new(2, Some(8)).unwrap();
        assert_eq!(table.grow(3, Some(7u32)), 2);
        assert_eq!(table.size(), 5);
        assert_eq!(table.get(4), Ok(Some(7)));
        assert_eq!(table.get(1), Ok(None));
    }

    #[test]
    fn grow_beyond_max_fails() {
        let mut table = Table::<u32>::try_new(2, Some(4)).unwrap();
        assert_eq!(table.grow(3, None), -1);
        assert_eq!(table.size(), 2);
        assert_eq!(table.grow(u32::MAX, None), -1);
    }

    #[test]
    fn grow_by_zero_is_size_query() {
        let mut table = Table::<u32>::try_new(3, Some(3)).unwrap();
        assert_eq!(table.grow(0, None), 3);
    }

    #[test]
    fn fill_bounds() {
        let mut table = Table::try_new(4, None).unwrap();
        table.fill(1, Some(9u32), 3).unwrap();
        assert_eq!(table.get(0), Ok(None));
        assert_eq!(table.get(3), Ok(Some(9)));
        assert_eq!(table.fill(2, None, 3), Err(Trap::TableOutOfBounds));
        // Zero length at the end is fine.
        assert!(table.fill(4, None, 0).is_ok());
    }

    #[test]
    fn copy_within_handles_overlap() {
        let mut table = Table::try_new(5, None).unwrap();
        for i in 0..5 {
            table.set(i, Some(i)).unwrap();
        }
        table.copy_within(1, 0, 4).unwrap();
        assert_eq!(table.get(1), Ok(Some(0)));
        assert_eq!(table.get(4), Ok(Some(3)));

        table.copy_within(0, 1, 4).unwrap();
        assert_eq!(table.get(0), Ok(Some(0)));
        assert_eq!(table.get(3), Ok(Some(3)));
    }

    #[test]
    fn copy_from_other_table() {
        let mut src = Table::try_new(2, None).unwrap();
        src.set(1, Some(42u32)).unwrap();
        let mut dst = Table::try_new(3, None).unwrap();
        dst.copy_from(2, &src, 1, 1).unwrap();
        assert_eq!(dst.get(2), Ok(Some(42)));
        assert_eq!(dst.copy_from(2, &src, 0, 2), Err(Trap::TableOutOfBounds));
    }

    #[test]
    fn init_from_segment() {
        let mut table = Table::try_new(4, None).unwrap();
        let segment = vec![Some(1u32), None, Some(3)];
        table.init(1, &segment, 0, 3).unwrap();
        assert_eq!(table.get(1), Ok(Some(1)));
        assert_eq!(table.get(3), Ok(Some(3)));
        assert_eq!(table.init(0, &segment, 2, 2), Err(Trap::TableOutOfBounds));
        assert_eq!(table.init(3, &segment, 0, 2), Err(Trap::TableOutOfBounds));
    }

    #[test]
    fn try_new_fails_if_initial_exceeds_max() {
        let result = Table::<u32>::try_new(5, Some(4));
        assert!(matches!(
            result,
            Err(ConstructionError::TableInitialSizeExceedsMax { initial: 5, max: 4 })
        ));
    }
}

#[cfg(kani)]
mod proofs {
    use super::*;

    /// get never panics for any index.
    #[kani::proof]
    #[kani::unwind(6)]
    fn get_never_panics() {
        let table = Table::<u32>::try_new(4, Some(8)).unwrap();
        let index: u32 = kani::any();
        let _ = table.get(index);
    }

    /// A successful set is visible through get.
    #[kani::proof]
    #[kani::unwind(6)]
    fn set_get_roundtrip() {
        let mut table = Table::<u32>::try_new(4, Some(8)).unwrap();
        let index: u32 = kani::any();
        let value: u32 = kani::any();
        if table.set(index, Some(value)).is_ok() {
            kani::assert(table.get(index) == Ok(Some(value)), "set then get");
            kani::assert(index < table.size(), "set succeeded in bounds");
        }
    }

    /// grow never takes the table past its declared maximum.
    #[kani::proof]
    #[kani::unwind(6)]
    fn grow_respects_maximum() {
        let mut table = Table::<u32>::try_new(1, Some(4)).unwrap();
        let delta: u32 = kani::any();
        kani::assume(delta <= 4);
        let old = table.size();
        let result = table.grow(delta, None);
        kani::assert(table.size() <= 4, "size never exceeds maximum");
        if result < 0 {
            kani::assert(table.size() == old, "failed grow leaves size unchanged");
        }
    }
}
