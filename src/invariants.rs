//! Debug assertion macros for the bus's slot state machine and segment bookkeeping.
//!
//! These are runtime checks for the invariants documented in `SPEC_FULL.md` §3.2.
//! They are only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

// =============================================================================
// INV-SLOT-01: Single-owner state transition
// =============================================================================

/// Assert that an observed slot state is one of the states a given role is
/// allowed to act from.
///
/// **Invariant**: transitions are FREE→READY→CONSUMING→FEEDBACK→FREE only.
macro_rules! debug_assert_valid_transition {
    ($from:expr, $to:expr, $allowed_from:expr) => {
        debug_assert!(
            $from == $allowed_from,
            "INV-SLOT-01 violated: transition to {:?} attempted from {:?}, expected {:?}",
            $to,
            $from,
            $allowed_from
        )
    };
}

// =============================================================================
// INV-SEQ-01: Bounded in-flight count
// =============================================================================

/// Assert that `head - tail` never exceeds a segment's slot count.
///
/// **Invariant**: `head − tail ≤ slot_count`
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "INV-SEQ-01 violated: in-flight count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

// =============================================================================
// INV-SEQ-02: Monotonic progress
// =============================================================================

/// Assert that a monotone counter (head, seq) never decreases.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "INV-SEQ-02 violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// INV-CODEC-01: Header/trailer checksum agreement
// =============================================================================

/// Assert that a just-written trailer's checksum copy matches the header.
///
/// This is a writer-side self-check: a mismatch here indicates a bug in the
/// codec itself (not a corruption the reader is supposed to detect), since no
/// other thread may observe the slot between header and trailer writes.
macro_rules! debug_assert_checksum_copy_matches {
    ($header_checksum:expr, $trailer_checksum_copy:expr) => {
        debug_assert_eq!(
            $header_checksum, $trailer_checksum_copy,
            "INV-CODEC-01 violated: trailer checksum_copy diverged from header checksum during encode"
        )
    };
}

// =============================================================================
// INV-HANDLE-01: No torn registry reads
// =============================================================================

/// Assert a handle is non-zero wherever the registry hands one out.
///
/// **Invariant**: handle `0` is reserved for "invalid" and never assigned.
macro_rules! debug_assert_nonzero_handle {
    ($handle:expr) => {
        debug_assert!($handle != 0, "INV-HANDLE-01 violated: issued reserved handle 0")
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_checksum_copy_matches;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_nonzero_handle;
pub(crate) use debug_assert_valid_transition;
