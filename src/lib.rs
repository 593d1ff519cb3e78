//! ringbus - Lock-Free Multi-Segment Shared-Memory Message Bus
//!
//! An in-process message bus carrying opaque byte payloads from many
//! producers to many consumers. Each attached producer gets a dedicated
//! segment (a fixed-size ring of slots, one writer, many scanning readers),
//! eliminating producer-producer contention the same way the ring-decomposed
//! MPSC this crate grew out of eliminates it for a single consumer. What's
//! new here is the per-slot state machine: FREE → READY → CONSUMING →
//! FEEDBACK → FREE, so many consumers — not one — can race to drain a
//! segment, and a consumer can hand structured feedback back to the
//! producer without a second channel.
//!
//! # Key features
//!
//! - Per-slot atomic state machine, no locks on the produce/consume path
//! - CRC-32 framing with a bit-exact header/trailer for corruption detection
//! - High-water-mark admission control, explicit `THROTTLED` rather than blocking
//! - Pull-based ACK/NACK feedback carried in the same slot as the message
//! - A thin C-ABI (`ffi` module) over opaque `u32` handles and tickets
//!
//! # Example
//!
//! ```
//! use ringbus::{Bus, BusConfig, FeedbackStatus, Message};
//!
//! let bus = Bus::new(BusConfig::new(1, 1).unwrap());
//! let producer = bus.attach_producer().unwrap();
//! let consumer = bus.attach_consumer();
//!
//! bus.produce(Message::new(1, producer, consumer, 0, b"", b"hello")).unwrap();
//! let (view, ticket) = bus.consume(consumer).unwrap();
//! assert_eq!(view.payload, b"hello");
//! bus.feedback(ticket, FeedbackStatus::Ack, b"").unwrap();
//! ```

mod admission;
mod bus;
mod clock;
mod codec;
mod config;
mod error;
mod feedback;
mod ffi;
mod invariants;
mod message;
mod registry;
mod ring;
mod segment;
mod slot;
mod stats;

pub use bus::Bus;
pub use config::{BusConfig, Config, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG};
pub use error::{BusError, BusResult, SUCCESS};
pub use message::{ConsumerId, Feedback, FeedbackStatus, Message, MessageView, ProducerId, Ticket};
pub use slot::SlotState;
pub use stats::StatsSnapshot;

pub use ffi::{FfiStats, FfiTicket};
