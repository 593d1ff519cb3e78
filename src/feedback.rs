//! Feedback record layout and (de)serialization (§3.1, §4.5).
//!
//! Feedback lives in the same slot as the message, in a small fixed region
//! immediately after the framed message. A consumer writes it during the
//! `CONSUMING → FEEDBACK` transition; the producer (or any poller) reads it
//! back via `collect_feedback`.

use crate::message::{Feedback, FeedbackStatus};

/// Maximum bytes of free-form feedback detail.
pub const FEEDBACK_DETAIL_SIZE: usize = 64;
/// Total bytes reserved for the feedback record: 1 status byte, 1 length
/// byte, padding, and the detail bytes.
pub const FEEDBACK_REGION_SIZE: usize = 4 + FEEDBACK_DETAIL_SIZE;

/// Writes a feedback record into `region[..FEEDBACK_REGION_SIZE]`.
///
/// # Panics
///
/// Panics if `detail` exceeds `FEEDBACK_DETAIL_SIZE` or `region` is too small.
pub fn write(region: &mut [u8], status: FeedbackStatus, detail: &[u8]) {
    assert!(detail.len() <= FEEDBACK_DETAIL_SIZE, "feedback detail exceeds FEEDBACK_DETAIL_SIZE");
    assert!(region.len() >= FEEDBACK_REGION_SIZE, "feedback region too small");

    region[0] = status as u8;
    region[1] = detail.len() as u8;
    region[2] = 0;
    region[3] = 0;
    region[4..4 + detail.len()].copy_from_slice(detail);
    region[4 + detail.len()..FEEDBACK_REGION_SIZE].fill(0);
}

/// Reads a feedback record back out of `region[..FEEDBACK_REGION_SIZE]`.
///
/// Returns `None` if the status byte doesn't name a known [`FeedbackStatus`].
#[must_use]
pub fn read(region: &[u8]) -> Option<Feedback> {
    debug_assert!(region.len() >= FEEDBACK_REGION_SIZE);
    let status = FeedbackStatus::from_u8(region[0])?;
    let len = region[1] as usize;
    let detail = region[4..4 + len.min(FEEDBACK_DETAIL_SIZE)].to_vec();
    Some(Feedback { status, detail })
}
