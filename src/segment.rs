//! One segment: a fixed-size ring of slots, a monotone claim cursor, and the
//! producer/consumer CAS protocol that drives slots through their states
//! (§4.2).

use crate::admission;
use crate::codec::{self, Header, Routing};
use crate::config::Config;
use crate::error::BusError;
use crate::feedback;
use crate::invariants::{debug_assert_bounded_count, debug_assert_monotonic};
use crate::message::{ConsumerId, Feedback, FeedbackStatus, MessageView};
use crate::slot::{Slot, SlotState};
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};

/// A segment's lifecycle state (§4.3): `ACTIVE ↔ DRAINING → TOMBSTONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SegmentState {
    Active = 0,
    Draining = 1,
    Tombstone = 2,
}

impl SegmentState {
    #[inline]
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Active,
            1 => Self::Draining,
            2 => Self::Tombstone,
            _ => unreachable!(),
        }
    }
}

/// Outcome of a single consumer scan step against one slot.
pub enum ConsumeOutcome {
    /// The slot is not `READY`; nothing to do.
    NotReady,
    /// The slot is `READY` but addressed to a different consumer.
    WrongConsumer,
    /// Another consumer won the `READY → CONSUMING` race first.
    Contended,
    /// This call won the race; the message is valid and ready to hand back.
    Delivered(MessageView, u32),
    /// This call won the race, but the message failed validation. Feedback
    /// (`CORRUPT`) has already been written and the slot moved to `FEEDBACK`.
    Corrupted,
}

/// A fixed-size ring of slots with one logical producer at a time (§3.1, §4.2).
pub struct Segment {
    slots: Box<[Slot]>,
    mask: u64,
    head: CachePadded<AtomicU64>,
    /// Count of outstanding (produced but not yet fed back) slots, used for
    /// HWM admission. Incremented on every successful claim, decremented as
    /// soon as feedback is written — not when the slot is physically
    /// reclaimed, which happens lazily and independently on a later claim.
    /// Decoupling the two matters: if admission only relaxed at physical
    /// reclaim, a segment parked at its HWM could never recover, since
    /// reclaim itself happens inside `try_produce`, which admission would be
    /// blocking.
    pending: CachePadded<AtomicI64>,
    state: CachePadded<AtomicU8>,
}

impl Segment {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let byte_capacity = config.slot_byte_capacity();
        let slots = (0..config.slot_count()).map(|_| Slot::new(byte_capacity)).collect::<Vec<_>>().into_boxed_slice();
        Self {
            slots,
            mask: config.mask(),
            head: CachePadded::new(AtomicU64::new(0)),
            pending: CachePadded::new(AtomicI64::new(0)),
            // Freshly constructed segments start vacant (TOMBSTONE doubles as
            // "never attached"); `try_activate` is how a segment ring hands
            // one out to a newly attached producer.
            state: CachePadded::new(AtomicU8::new(SegmentState::Tombstone as u8)),
        }
    }

    /// Attempts `TOMBSTONE → ACTIVE`: claims this vacant segment for a newly
    /// attaching producer. Only the segment ring's attach path calls this.
    pub fn try_activate(&self) -> bool {
        self.state
            .compare_exchange(
                SegmentState::Tombstone as u8,
                SegmentState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> SegmentState {
        SegmentState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == SegmentState::Active
    }

    /// Current in-flight count: slots that are not `FREE`.
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.pending.load(Ordering::Relaxed).max(0) as u64
    }

    /// Marks the segment `DRAINING` (§3.2 invariant 6): closed to producers,
    /// still readable by consumers until every slot is `FREE`.
    pub fn mark_draining(&self) {
        self.state.store(SegmentState::Draining as u8, Ordering::Release);
    }

    /// Advances `DRAINING → TOMBSTONE` if every slot has returned to `FREE`.
    /// Returns whether the transition happened.
    pub fn try_advance_tombstone(&self) -> bool {
        if self.state() != SegmentState::Draining {
            return false;
        }
        if self.in_flight() == 0 && self.slots.iter().all(|s| s.state() == SlotState::Free) {
            self.state.store(SegmentState::Tombstone as u8, Ordering::Release);
            return true;
        }
        false
    }

    /// Producer-side claim/write/commit (§4.2). `global_seq` is the bus-wide
    /// sequence counter; it is only advanced once the claim has actually
    /// succeeded, so a failed `produce` never consumes a sequence number
    /// (§7 "user-visible behavior"). `hwm` is the segment's absolute
    /// high-water mark. Returns `(slot_index, seq)`.
    #[allow(clippy::too_many_arguments)]
    pub fn try_produce(
        &self,
        global_seq: &AtomicU64,
        timestamp_us: u64,
        routing: Routing,
        meta: &[u8],
        payload: &[u8],
        hwm: u64,
    ) -> Result<(u32, u64), BusError> {
        if self.state() != SegmentState::Active {
            return Err(BusError::Closed);
        }
        if admission::should_throttle(self.in_flight(), hwm, self.slot_count() as u64) {
            return Err(BusError::Throttled);
        }

        let pos = self.head.load(Ordering::Relaxed);
        let idx = (pos & self.mask) as usize;
        let slot = &self.slots[idx];

        let claimed = match slot.state() {
            SlotState::Free => slot.try_claim(),
            // Already excluded from `in_flight` since its feedback write;
            // reclaiming it here is bookkeeping for slot reuse, not admission.
            SlotState::Feedback => slot.try_reclaim() && slot.try_claim(),
            SlotState::Ready | SlotState::Consuming => false,
        };
        if !claimed {
            return Err(BusError::BufferFull);
        }

        let seq = global_seq.fetch_add(1, Ordering::Relaxed);

        // SAFETY: this call just won the FREE->READY CAS and is the slot's
        // sole owner until the consumer side wins READY->CONSUMING.
        let bytes = unsafe { slot.bytes_mut() };
        codec::encode(bytes, seq, timestamp_us, routing, meta, payload);

        let new_pos = pos.wrapping_add(1);
        debug_assert_monotonic!("segment.head", pos, new_pos);
        self.head.store(new_pos, Ordering::Release);
        self.pending.fetch_add(1, Ordering::Release);
        debug_assert_bounded_count!(self.in_flight() as usize, self.slot_count());

        Ok((idx as u32, seq))
    }

    /// Consumer-side scan step against a single slot index (§4.2).
    pub fn try_consume(&self, idx: usize, consumer_id: ConsumerId) -> ConsumeOutcome {
        let slot = &self.slots[idx];
        if slot.state() != SlotState::Ready {
            return ConsumeOutcome::NotReady;
        }

        // SAFETY: READY means the producer has finished writing and will not
        // touch these bytes again until the slot cycles back to FREE. Reading
        // here races only with other consumers performing the same read,
        // which is sound since none of them mutate.
        let peek = unsafe { slot.bytes() };
        let routing = Routing::read_from(&peek[codec::HEADER_SIZE..codec::HEADER_SIZE + codec::ROUTING_SIZE]);
        if routing.consumer_id != consumer_id {
            return ConsumeOutcome::WrongConsumer;
        }

        if !slot.try_consume() {
            return ConsumeOutcome::Contended;
        }

        // SAFETY: this call just won READY->CONSUMING and is the slot's sole
        // owner until the feedback transition.
        let bytes = unsafe { slot.bytes() };
        if codec::validate(bytes) == codec::Validation::Corrupt {
            self.write_feedback_unchecked(idx, FeedbackStatus::Corrupt, b"");
            return ConsumeOutcome::Corrupted;
        }

        let (header, routing, meta, payload) = codec::decode(bytes);
        let view = MessageView {
            seq: header.seq,
            msg_id: routing.msg_id,
            producer_id: routing.producer_id,
            consumer_id: routing.consumer_id,
            meta_type: routing.meta_type,
            meta: meta.to_vec(),
            payload: payload.to_vec(),
            timestamp_us: header.timestamp_us,
        };
        ConsumeOutcome::Delivered(view, idx as u32)
    }

    /// Writes a feedback record and performs `CONSUMING → FEEDBACK` without
    /// checking the caller's expected sequence. Used internally once a slot
    /// is already known to be validly owned (corrupt-path auto-feedback).
    fn write_feedback_unchecked(&self, idx: usize, status: FeedbackStatus, detail: &[u8]) {
        let slot = &self.slots[idx];
        let region_start = slot.byte_capacity() - feedback::FEEDBACK_REGION_SIZE;
        // SAFETY: caller already holds the CONSUMING-state ownership.
        let bytes = unsafe { slot.bytes_mut() };
        feedback::write(&mut bytes[region_start..], status, detail);
        slot.mark_feedback();
        self.pending.fetch_sub(1, Ordering::Release);
    }

    /// `feedback()` façade entry point: writes a caller-supplied status for a
    /// ticket and performs `CONSUMING → FEEDBACK`. Also serves `reap_stale`
    /// (§4.11), which calls this with `FeedbackStatus::Timeout`.
    pub fn write_feedback(&self, idx: usize, expected_seq: u64, status: FeedbackStatus, detail: &[u8]) -> Result<(), BusError> {
        let slot = &self.slots[idx];
        if slot.state() != SlotState::Consuming {
            return Err(BusError::InvalidTicket);
        }
        // SAFETY: CONSUMING means the caller (having received this ticket
        // from `try_consume`) is the slot's sole owner.
        let bytes = unsafe { slot.bytes() };
        let header = Header::read_from(&bytes[0..codec::HEADER_SIZE]);
        if header.seq != expected_seq {
            return Err(BusError::InvalidTicket);
        }

        self.write_feedback_unchecked(idx, status, detail);
        Ok(())
    }

    /// Reads back a feedback record for a slot currently in `FEEDBACK`,
    /// without mutating it. Used by `collect_feedback`.
    #[must_use]
    pub fn read_feedback(&self, idx: usize) -> Option<(u64, Feedback)> {
        let slot = &self.slots[idx];
        if slot.state() != SlotState::Feedback {
            return None;
        }
        // SAFETY: FEEDBACK means no other role is touching these bytes until
        // the producer's next reclaim pass.
        let bytes = unsafe { slot.bytes() };
        let header = Header::read_from(&bytes[0..codec::HEADER_SIZE]);
        let region_start = slot.byte_capacity() - feedback::FEEDBACK_REGION_SIZE;
        feedback::read(&bytes[region_start..]).map(|fb| (header.seq, fb))
    }

    /// Returns the current state of a slot, for debug/age-tracking tooling
    /// (e.g. the janitor demo deciding which `CONSUMING` slots look stuck).
    #[must_use]
    pub fn slot_state(&self, idx: usize) -> SlotState {
        self.slots[idx].state()
    }
}
