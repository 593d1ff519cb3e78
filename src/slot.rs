//! A single slot: one message cell carrying state, framed bytes, and feedback (§3.1).

use crate::invariants::debug_assert_valid_transition;
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};

/// The four states a slot may be in. Transitions are FREE→READY→CONSUMING→FEEDBACK→FREE
/// and nothing else (INV-SLOT-01, §3.2 invariant 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotState {
    Free = 0,
    Ready = 1,
    Consuming = 2,
    Feedback = 3,
}

impl SlotState {
    #[inline]
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Free,
            1 => Self::Ready,
            2 => Self::Consuming,
            3 => Self::Feedback,
            _ => unreachable!(),
        }
    }
}

/// One message cell. Ownership of `bytes` transfers by state transition, never
/// by pointer aliasing (§3.1): whichever role's CAS wins the transition is the
/// sole reader/writer of `bytes` until the next transition.
pub struct Slot {
    state: CachePadded<AtomicU8>,
    /// Framed message bytes followed by the feedback region. Exclusive access
    /// is granted by the `state` CAS protocol, never by Rust's aliasing rules
    /// directly — hence `UnsafeCell`.
    bytes: UnsafeCell<Box<[u8]>>,
}

// SAFETY: access to `bytes` is serialized by the `state` CAS protocol: only
// the current state's designated owner may read or write it.
unsafe impl Send for Slot {}
unsafe impl Sync for Slot {}

impl Slot {
    #[must_use]
    pub fn new(byte_capacity: usize) -> Self {
        Self {
            state: CachePadded::new(AtomicU8::new(SlotState::Free as u8)),
            bytes: UnsafeCell::new(vec![0u8; byte_capacity].into_boxed_slice()),
        }
    }

    #[inline]
    pub fn state(&self) -> SlotState {
        SlotState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Attempts `FREE → READY`. Only a producer may call this (§3.2 invariant 2).
    #[inline]
    pub fn try_claim(&self) -> bool {
        self.state
            .compare_exchange(SlotState::Free as u8, SlotState::Ready as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Attempts `READY → CONSUMING`. Only a consumer may call this.
    #[inline]
    pub fn try_consume(&self) -> bool {
        self.state
            .compare_exchange(SlotState::Ready as u8, SlotState::Consuming as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `CONSUMING → FEEDBACK`. The caller already won the `try_consume` CAS
    /// and is the slot's sole owner, so this is an unconditional store, not a
    /// racing CAS — `try_claim`/`try_consume`/`try_reclaim` get their
    /// single-owner guarantee from the CAS itself, but a plain store has
    /// nothing enforcing its precondition, so it's checked explicitly here.
    #[inline]
    pub fn mark_feedback(&self) {
        debug_assert_valid_transition!(self.state(), SlotState::Feedback, SlotState::Consuming);
        self.state.store(SlotState::Feedback as u8, Ordering::Release);
    }

    /// Attempts `FEEDBACK → FREE`. Only a producer may call this, during its
    /// reclaim pass over a slot it is about to reuse (§4.5: lazy reclaim).
    #[inline]
    pub fn try_reclaim(&self) -> bool {
        self.state
            .compare_exchange(SlotState::Feedback as u8, SlotState::Free as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Direct access to the slot's byte region for the current, verified owner.
    ///
    /// # Safety
    ///
    /// The caller must currently hold the state that makes it the slot's sole
    /// owner (i.e. it just won the corresponding CAS and has not yet performed
    /// the next transition).
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn bytes_mut(&self) -> &mut [u8] {
        &mut *self.bytes.get()
    }

    /// Read-only access to the slot's byte region for the current owner.
    ///
    /// # Safety
    ///
    /// Same precondition as [`Slot::bytes_mut`].
    #[inline]
    pub unsafe fn bytes(&self) -> &[u8] {
        &*self.bytes.get()
    }

    pub fn byte_capacity(&self) -> usize {
        // SAFETY: length never changes after construction; reading it racily
        // is fine since it's immutable for the slot's lifetime.
        unsafe { (&*self.bytes.get()).len() }
    }
}
