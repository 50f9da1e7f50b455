//! Stack growth for recursive walks
//!
//! Evaluation, printing, comparison and marshaling all recurse once per
//! level of nesting. Each recursive step goes through [`guarded`], which
//! switches to a fresh heap-allocated stack segment when the current one
//! runs low, so the evaluation depth limit is reached (or a deeply nested
//! value is walked) before the native stack is exhausted on any thread.

/// Remaining stack below which a new segment is allocated
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each new segment
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

#[inline]
pub(crate) fn guarded<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, f)
}
