use thiserror::Error;

/// Errors returned by the safe Rust façade ([`crate::bus::Bus`]).
///
/// Every variant maps to exactly one stable C-ABI status code via
/// [`BusError::as_code`] (§6.1 of `SPEC_FULL.md`), so the two surfaces never
/// drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    /// A parameter was out of its declared bounds (size, segment count, ...).
    #[error("invalid parameters")]
    InvalidParams,
    /// Admission refused the write: the target segment has no FREE slot.
    #[error("segment is full")]
    BufferFull,
    /// `consume` found no READY slot for this consumer.
    #[error("no message available")]
    BufferEmpty,
    /// The handle does not name a live bus.
    #[error("invalid or destroyed handle")]
    InvalidHandle,
    /// Allocation of the bus's backing memory failed.
    #[error("out of memory")]
    Oom,
    /// Validation failed: magic, size, end marker, or checksum mismatch.
    #[error("corrupted data")]
    CorruptedData,
    /// Payload exceeds `MAX_MESSAGE_SIZE` or the segment's slot capacity.
    #[error("message too large")]
    MsgTooLarge,
    /// Admission refused the write: high-water mark reached.
    #[error("throttled")]
    Throttled,
    /// A ticket did not name a slot currently owned for feedback.
    #[error("invalid ticket")]
    InvalidTicket,
    /// `init_system` was never called, or the registry was already torn down.
    #[error("system not initialized")]
    NotInitialized,
    /// A producer/consumer id is not attached to the named bus.
    #[error("unknown producer or consumer id")]
    UnknownId,
    /// A destination buffer was too small to hold the message.
    #[error("destination buffer too small")]
    BufferTooSmall,
    /// The segment is closed (its producer detached); no further writes accepted.
    #[error("segment closed")]
    Closed,
    /// No vacant segment is available for a new producer attachment.
    #[error("no free segment available")]
    NoCapacity,
}

impl BusError {
    /// Stable, negative-on-failure integer code for the C-ABI (§6.1).
    #[must_use]
    pub const fn as_code(self) -> i32 {
        match self {
            BusError::InvalidParams => -1,
            BusError::BufferFull => -2,
            BusError::BufferEmpty => -3,
            BusError::InvalidHandle => -4,
            BusError::Oom => -5,
            BusError::CorruptedData => -6,
            BusError::MsgTooLarge => -7,
            BusError::Throttled => -8,
            BusError::InvalidTicket => -9,
            BusError::NotInitialized => -10,
            BusError::UnknownId => -11,
            BusError::BufferTooSmall => -12,
            BusError::Closed => -13,
            BusError::NoCapacity => -14,
        }
    }
}

/// Status code for operations that only succeed or fail (`SUCCESS = 0`).
pub const SUCCESS: i32 = 0;

pub type BusResult<T> = Result<T, BusError>;
