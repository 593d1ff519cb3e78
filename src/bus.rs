//! The bus façade (§4.6): binds segment ring, admission, stats, and the
//! feedback channel behind a small set of operations. Cold paths (create,
//! destroy, attach, detach, corruption, janitor reclaim) are traced with
//! `tracing`; the hot produce/consume/feedback path emits no events, to
//! preserve the wait-free budget (§4.9).

use crate::config::BusConfig;
use crate::error::BusError;
use crate::message::{ConsumerId, Feedback, FeedbackStatus, Message, MessageView, ProducerId, Ticket};
use crate::ring::SegmentRing;
use crate::stats::{Stats, StatsSnapshot};
use std::sync::atomic::AtomicU64;

/// A single in-process message bus (§3.1 `Bus` entity). Usually reached
/// through a handle via [`crate::registry`], but constructible directly for
/// embedding in a larger Rust program without the C-ABI.
pub struct Bus {
    ring: SegmentRing,
    global_seq: AtomicU64,
    hwm: u64,
    max_message_size: usize,
    offload_threshold: usize,
    try_offload: fn(&[u8]) -> bool,
    stats: Stats,
}

impl Bus {
    /// Builds a bus from a validated [`BusConfig`]. Allocation happens up
    /// front: every segment's slots are allocated and zeroed here, never on
    /// the hot path (§3.3).
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        Self {
            ring: SegmentRing::new(&config.segment, config.segment_count),
            global_seq: AtomicU64::new(0),
            hwm: config.segment.hwm() as u64,
            max_message_size: config.segment.max_message_size,
            offload_threshold: config.offload_threshold,
            try_offload: config.try_offload,
            stats: Stats::new(),
        }
    }

    /// Creates a bus and registers it, returning its process-wide handle.
    pub fn create(config: BusConfig) -> Result<u32, BusError> {
        let handle = crate::registry::insert(Self::new(config))?;
        tracing::info!(handle, "bus created");
        Ok(handle)
    }

    /// Destroys a previously created bus, invalidating its handle (§3.3,
    /// §4.7). Does not wait for attached producers/consumers to detach first
    /// — the registry's `Arc` keeps the memory alive for any caller still
    /// holding a reference, but the handle itself stops resolving.
    pub fn destroy(handle: u32) -> Result<(), BusError> {
        crate::registry::remove(handle)?;
        tracing::info!(handle, "bus destroyed");
        Ok(())
    }

    pub fn attach_producer(&self) -> Result<ProducerId, BusError> {
        let id = self.ring.attach_producer()?;
        tracing::debug!(producer_id = id, "producer attached");
        Ok(id)
    }

    pub fn detach_producer(&self, producer_id: ProducerId) -> Result<(), BusError> {
        self.ring.detach_producer(producer_id)?;
        tracing::debug!(producer_id, "producer detached");
        Ok(())
    }

    #[must_use]
    pub fn attach_consumer(&self) -> ConsumerId {
        let id = self.ring.attach_consumer();
        tracing::debug!(consumer_id = id, "consumer attached");
        id
    }

    pub fn detach_consumer(&self, consumer_id: ConsumerId) -> Result<(), BusError> {
        self.ring.detach_consumer(consumer_id)?;
        tracing::debug!(consumer_id, "consumer detached");
        Ok(())
    }

    /// Writes a message to its producer's segment (§4.2 producer-side
    /// claim/commit). A failed write never consumes a sequence number (§7).
    pub fn produce(&self, msg: Message) -> Result<Ticket, BusError> {
        let result = self.try_produce(msg);
        if result.is_err() {
            self.stats.record_failed_write();
        }
        result
    }

    fn try_produce(&self, msg: Message) -> Result<Ticket, BusError> {
        if msg.meta.len() > crate::codec::META_SIZE || msg.payload.len() > self.max_message_size {
            return Err(BusError::MsgTooLarge);
        }
        let segment = self.ring.producer_segment(msg.producer_id)?;
        let routing = crate::codec::Routing {
            producer_id: msg.producer_id,
            consumer_id: msg.consumer_id,
            msg_id: msg.msg_id,
            meta_type: msg.meta_type,
        };
        let timestamp_us = crate::clock::now_us();
        let (slot_index, seq) =
            segment.try_produce(&self.global_seq, timestamp_us, routing, &msg.meta, &msg.payload, self.hwm)?;
        self.stats.record_write(msg.payload.len());
        Ok(Ticket { segment_index: self.producer_segment_index(msg.producer_id), slot_index, seq })
    }

    fn producer_segment_index(&self, producer_id: ProducerId) -> u32 {
        producer_id - 1
    }

    /// Scans for a message addressed to `consumer_id` (§4.2 consumer-side
    /// scan/consume). A `CORRUPT` slot is dropped and counted, never handed
    /// back to the caller.
    pub fn consume(&self, consumer_id: ConsumerId) -> Result<(MessageView, Ticket), BusError> {
        match self.ring.try_consume(consumer_id) {
            Ok((segment_index, slot_index, view)) => {
                if view.payload.len() >= self.offload_threshold {
                    let _ = (self.try_offload)(&view.payload);
                }
                self.stats.record_read(view.payload.len());
                let ticket = Ticket { segment_index, slot_index, seq: view.seq };
                Ok((view, ticket))
            }
            Err(BusError::CorruptedData) => {
                tracing::warn!(consumer_id, "dropped corrupted message");
                self.stats.record_dropped_corrupt();
                Err(BusError::CorruptedData)
            }
            Err(err) => {
                self.stats.record_failed_read();
                Err(err)
            }
        }
    }

    /// Writes feedback for a ticket and performs `CONSUMING → FEEDBACK`
    /// (§4.5). Rejects a ticket that no longer names the slot it was issued
    /// for (reused after a producer reclaim).
    pub fn feedback(&self, ticket: Ticket, status: FeedbackStatus, detail: &[u8]) -> Result<(), BusError> {
        let segment = self.segment_for_ticket(ticket)?;
        segment.write_feedback(ticket.slot_index as usize, ticket.seq, status, detail)
    }

    /// Pull-only read of a ticket's feedback record, once a consumer has
    /// written one (§4.5). Returns `Ok(None)` if feedback hasn't landed yet.
    pub fn collect_feedback(&self, ticket: Ticket) -> Result<Option<Feedback>, BusError> {
        let segment = self.segment_for_ticket(ticket)?;
        Ok(segment.read_feedback(ticket.slot_index as usize).and_then(
            |(seq, fb)| if seq == ticket.seq { Some(fb) } else { None },
        ))
    }

    /// Forces a stuck `CONSUMING` slot back to `FEEDBACK` with `TIMEOUT`
    /// (§4.11 janitor support). Built from the same primitive `feedback`
    /// uses; the reclaim policy itself lives in the demo, not here.
    pub fn reap_stale(&self, ticket: Ticket) -> Result<(), BusError> {
        let segment = self.segment_for_ticket(ticket)?;
        segment.write_feedback(ticket.slot_index as usize, ticket.seq, FeedbackStatus::Timeout, b"")?;
        tracing::warn!(segment_index = ticket.segment_index, slot_index = ticket.slot_index, "reclaimed stale slot");
        Ok(())
    }

    fn segment_for_ticket(&self, ticket: Ticket) -> Result<&crate::segment::Segment, BusError> {
        if ticket.segment_index as usize >= self.ring.segment_count() {
            return Err(BusError::InvalidTicket);
        }
        Ok(self.ring.segment(ticket.segment_index))
    }

    /// Returns the slot state for a ticket's slot (janitor/debug tooling:
    /// deciding which `CONSUMING` slots look stuck).
    pub fn slot_state(&self, ticket: Ticket) -> Result<crate::slot::SlotState, BusError> {
        let segment = self.segment_for_ticket(ticket)?;
        Ok(segment.slot_state(ticket.slot_index as usize))
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_bus() -> Bus {
        Bus::new(BusConfig { size_mib: 1, segment_count: 2, segment: Config::new(3, 1.0), offload_threshold: 1 << 20, try_offload: |_| false })
    }

    fn msg(producer_id: ProducerId, consumer_id: ConsumerId, payload: &[u8]) -> Message {
        Message::new(1, producer_id, consumer_id, 0, b"", payload)
    }

    #[test]
    fn produce_then_consume_round_trip() {
        let bus = test_bus();
        let producer = bus.attach_producer().unwrap();
        let consumer = bus.attach_consumer();
        bus.produce(msg(producer, consumer, b"hello")).unwrap();
        let (view, ticket) = bus.consume(consumer).unwrap();
        assert_eq!(view.payload, b"hello");
        bus.feedback(ticket, FeedbackStatus::Ack, b"").unwrap();
        let fb = bus.collect_feedback(ticket).unwrap().unwrap();
        assert_eq!(fb.status, FeedbackStatus::Ack);
    }

    #[test]
    fn produce_to_unknown_producer_is_rejected() {
        let bus = test_bus();
        let consumer = bus.attach_consumer();
        assert!(matches!(bus.produce(msg(99, consumer, b"x")), Err(BusError::UnknownId)));
    }

    #[test]
    fn oversized_payload_is_rejected_before_touching_a_segment() {
        let bus = test_bus();
        let producer = bus.attach_producer().unwrap();
        let big = vec![0u8; crate::config::MAX_MESSAGE_SIZE + 1];
        assert!(matches!(bus.produce(msg(producer, 1, &big)), Err(BusError::MsgTooLarge)));
        assert_eq!(bus.stats().failed_writes, 1);
    }

    #[test]
    fn consume_with_no_messages_is_buffer_empty_and_counted() {
        let bus = test_bus();
        let consumer = bus.attach_consumer();
        assert!(matches!(bus.consume(consumer), Err(BusError::BufferEmpty)));
        assert_eq!(bus.stats().failed_reads, 1);
    }

    #[test]
    fn detached_producer_cannot_write() {
        let bus = test_bus();
        let producer = bus.attach_producer().unwrap();
        bus.detach_producer(producer).unwrap();
        assert!(matches!(bus.produce(msg(producer, 1, b"x")), Err(BusError::Closed)));
    }

    #[test]
    fn stale_ticket_after_reclaim_is_rejected() {
        let bus = test_bus();
        let producer = bus.attach_producer().unwrap();
        let consumer = bus.attach_consumer();
        bus.produce(msg(producer, consumer, b"x")).unwrap();
        let (_, ticket) = bus.consume(consumer).unwrap();
        bus.feedback(ticket, FeedbackStatus::Ack, b"").unwrap();
        assert!(matches!(bus.feedback(ticket, FeedbackStatus::Ack, b""), Err(BusError::InvalidTicket)));
    }
}
