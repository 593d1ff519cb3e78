//! Wall-clock timestamp source for message headers (§4.1 `timestamp_us`).

use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds since the Unix epoch, saturating rather than panicking on a
/// clock set before 1970.
#[must_use]
pub fn now_us() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_micros() as u64)
}
