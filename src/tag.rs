//! Helpers for the logical-deletion mark packed into the low bit of a link
//! word. Node allocations are aligned so the bit is always free.

/// The logical-deletion mark.
pub(crate) const MARK: usize = 1;

/// Returns the word with the deletion mark set.
#[inline]
pub fn marked(ptr: usize) -> usize {
    ptr | MARK
}

/// Extracts the address out of a possibly marked word.
#[inline]
pub fn unmarked(ptr: usize) -> usize {
    ptr & !MARK
}

/// Whether the word carries the deletion mark.
#[inline]
pub fn is_marked(ptr: usize) -> bool {
    ptr & MARK != 0
}
