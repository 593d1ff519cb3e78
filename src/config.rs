//! Configuration for a [`crate::bus::Bus`] and its segments.

/// Magic number stamped into every message header ("UMSB").
pub const MAGIC: u32 = 0x554D_5342;
/// Trailer end marker.
pub const END_MARKER: u32 = 0xDEAD_BEEF;

/// Maximum payload size accepted by any segment.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;
/// Maximum bus size in MiB.
pub const MAX_BUFFER_SIZE_MIB: u32 = 64;
/// Minimum bus size in MiB.
pub const MIN_BUFFER_SIZE_MIB: u32 = 1;
/// Maximum live buses tracked by the process-wide registry.
pub const MAX_BUFFERS: usize = 256;

/// Default high-water mark, expressed as a fraction of `slot_count`.
pub const DEFAULT_HWM_RATIO: f64 = 0.8;

/// Per-segment configuration: slot count (power of two) and admission policy.
///
/// Mirrors the teacher crate's `Config`: a `const fn` constructor that
/// validates its arguments up front, plus a couple of named presets.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Ring size as a power of 2 (`slot_count = 1 << slot_bits`).
    pub slot_bits: u8,
    /// High-water mark as a fraction of `slot_count`, in `(0.0, 1.0]`.
    pub hwm_ratio: f64,
    /// Maximum payload bytes a single slot in this segment can hold.
    /// Always `<= MAX_MESSAGE_SIZE`.
    pub max_message_size: usize,
}

impl Config {
    /// Creates a new configuration with custom settings and the global
    /// maximum payload size.
    ///
    /// # Panics
    ///
    /// Panics if `slot_bits` is 0 or greater than 16 (64K slots max per
    /// segment), or if `hwm_ratio` is not in `(0.0, 1.0]`.
    #[must_use]
    pub const fn new(slot_bits: u8, hwm_ratio: f64) -> Self {
        Self::with_message_size(slot_bits, hwm_ratio, MAX_MESSAGE_SIZE)
    }

    /// Creates a new configuration with an explicit per-slot payload cap.
    ///
    /// # Panics
    ///
    /// Panics if `slot_bits` is 0 or greater than 16, `hwm_ratio` is not in
    /// `(0.0, 1.0]`, or `max_message_size` exceeds `MAX_MESSAGE_SIZE`.
    #[must_use]
    pub const fn with_message_size(slot_bits: u8, hwm_ratio: f64, max_message_size: usize) -> Self {
        assert!(slot_bits > 0 && slot_bits <= 16, "slot_bits must be between 1 and 16 (max 64K slots)");
        assert!(hwm_ratio > 0.0 && hwm_ratio <= 1.0, "hwm_ratio must be in (0.0, 1.0]");
        assert!(max_message_size <= MAX_MESSAGE_SIZE, "max_message_size exceeds the global MAX_MESSAGE_SIZE");

        Self { slot_bits, hwm_ratio, max_message_size }
    }

    /// Total byte capacity a slot in this segment must allocate: framing
    /// overhead plus the padded payload plus the feedback region.
    #[inline]
    #[must_use]
    pub const fn slot_byte_capacity(&self) -> usize {
        crate::codec::SLOT_OVERHEAD + crate::codec::align8(self.max_message_size) + crate::feedback::FEEDBACK_REGION_SIZE
    }

    /// Returns the segment's slot count.
    #[inline]
    #[must_use]
    pub const fn slot_count(&self) -> usize {
        1 << self.slot_bits
    }

    /// Returns the index mask used to wrap a monotone cursor into `[0, slot_count)`.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> u64 {
        (self.slot_count() - 1) as u64
    }

    /// Returns the absolute high-water mark (number of in-flight slots) at
    /// which `produce` is throttled.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn hwm(&self) -> usize {
        ((self.slot_count() as f64) * self.hwm_ratio).floor() as usize
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(10, DEFAULT_HWM_RATIO) // 1024 slots/segment
    }
}

/// Low-latency preset: small segments (256 slots/segment), default HWM.
pub const LOW_LATENCY_CONFIG: Config = Config::new(8, DEFAULT_HWM_RATIO);

/// High-throughput preset: large segments (8K slots/segment), default HWM.
pub const HIGH_THROUGHPUT_CONFIG: Config = Config::new(13, DEFAULT_HWM_RATIO);

/// Top-level bus configuration, validated against the declared size.
#[derive(Debug, Clone, Copy)]
pub struct BusConfig {
    /// Declared bus size in MiB; governs how segments are sized.
    pub size_mib: u32,
    /// Number of segments, a power of two in `[1, 64]`.
    pub segment_count: u32,
    /// Per-segment configuration.
    pub segment: Config,
    /// Payload size above which `consume` optionally consults the GPU/offload
    /// hook (§6.4). Has no effect on correctness.
    pub offload_threshold: usize,
    /// Optional external-processor hook consulted for payloads at or above
    /// `offload_threshold` (§6.4). Defaults to a no-op returning `false`; out
    /// of scope for testable properties.
    pub try_offload: fn(&[u8]) -> bool,
}

fn no_offload(_payload: &[u8]) -> bool {
    false
}

impl BusConfig {
    /// Validates and builds a `BusConfig` from the C-ABI's `size_mib` and a
    /// segment count.
    pub fn new(size_mib: u32, segment_count: u32) -> Result<Self, crate::error::BusError> {
        use crate::error::BusError;

        if !(MIN_BUFFER_SIZE_MIB..=MAX_BUFFER_SIZE_MIB).contains(&size_mib) {
            return Err(BusError::InvalidParams);
        }
        if segment_count == 0 || segment_count > 64 || !segment_count.is_power_of_two() {
            return Err(BusError::InvalidParams);
        }

        // Size each segment so that `segment_count` segments roughly fill the
        // declared MiB budget, rounding the slot count down to a power of two.
        // Per-slot payload capacity is capped well below MAX_MESSAGE_SIZE so a
        // modest bus still gets a useful number of slots per segment.
        let per_slot_payload = MAX_MESSAGE_SIZE.min(4096);
        let bytes_total = (size_mib as usize) * 1024 * 1024;
        let bytes_per_segment = bytes_total / (segment_count as usize);
        let slot_bytes = Config::with_message_size(1, DEFAULT_HWM_RATIO, per_slot_payload).slot_byte_capacity();
        let slots_fit = (bytes_per_segment / slot_bytes).max(1);
        let slot_bits = (usize::BITS - 1 - slots_fit.leading_zeros()).min(16) as u8;
        let slot_bits = slot_bits.max(1);

        Ok(Self {
            size_mib,
            segment_count,
            segment: Config::with_message_size(slot_bits, DEFAULT_HWM_RATIO, per_slot_payload),
            offload_threshold: 1024 * 1024,
            try_offload: no_offload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_capacity_and_mask() {
        let c = Config::new(4, 0.8);
        assert_eq!(c.slot_count(), 16);
        assert_eq!(c.mask(), 15);
        assert_eq!(c.hwm(), 12);
    }

    #[test]
    fn bus_config_rejects_bad_sizes() {
        assert!(BusConfig::new(0, 4).is_err());
        assert!(BusConfig::new(128, 4).is_err());
        assert!(BusConfig::new(4, 3).is_err());
        assert!(BusConfig::new(4, 0).is_err());
    }

    #[test]
    fn bus_config_accepts_seed_suite_shape() {
        let cfg = BusConfig::new(4, 4).unwrap();
        assert_eq!(cfg.segment_count, 4);
        assert!(cfg.segment.slot_count() >= 1);
    }
}
