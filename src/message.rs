//! Message, feedback, and ticket types exchanged across the façade (§3.1).

use crate::codec::META_SIZE;

/// Stable identifier assigned to an attached producer.
pub type ProducerId = u32;
/// Stable identifier assigned to an attached consumer.
pub type ConsumerId = u32;

/// A message as submitted by a producer.
///
/// `payload` is opaque to the bus and must be at most `MAX_MESSAGE_SIZE`
/// bytes; `meta` is a small fixed side-channel (at most [`META_SIZE`] bytes).
#[derive(Debug, Clone)]
pub struct Message {
    pub msg_id: u64,
    pub producer_id: ProducerId,
    pub consumer_id: ConsumerId,
    pub meta_type: u32,
    pub meta: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Message {
    /// Builds a message, truncating nothing — callers are expected to respect
    /// `META_SIZE`/`MAX_MESSAGE_SIZE`; the façade enforces the real limits.
    #[must_use]
    pub fn new(
        msg_id: u64,
        producer_id: ProducerId,
        consumer_id: ConsumerId,
        meta_type: u32,
        meta: &[u8],
        payload: &[u8],
    ) -> Self {
        debug_assert!(meta.len() <= META_SIZE);
        Self { msg_id, producer_id, consumer_id, meta_type, meta: meta.to_vec(), payload: payload.to_vec() }
    }
}

/// A message as handed back to a consumer: owned bytes copied out of the
/// slot, plus the header fields a consumer may want to inspect.
#[derive(Debug, Clone)]
pub struct MessageView {
    pub seq: u64,
    pub msg_id: u64,
    pub producer_id: ProducerId,
    pub consumer_id: ConsumerId,
    pub meta_type: u32,
    pub meta: Vec<u8>,
    pub payload: Vec<u8>,
    pub timestamp_us: u64,
}

/// Feedback status written back into a slot after consumption (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FeedbackStatus {
    None = 0,
    Ack = 1,
    Nack = 2,
    Timeout = 3,
    Corrupt = 4,
}

impl FeedbackStatus {
    #[must_use]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::Ack),
            2 => Some(Self::Nack),
            3 => Some(Self::Timeout),
            4 => Some(Self::Corrupt),
            _ => None,
        }
    }
}

/// Feedback record: a status plus a short detail blob.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub status: FeedbackStatus,
    pub detail: Vec<u8>,
}

/// Opaque `(segment_index, slot_index)` coordinate returned by `consume` and
/// later redeemed by `feedback` (§4.6, §9 "no back-pointers").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub segment_index: u32,
    pub slot_index: u32,
    /// The sequence number claimed by this slot, used to detect a ticket
    /// redeemed after the slot already cycled back to FREE and was reused.
    pub seq: u64,
}
