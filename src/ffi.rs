//! C-ABI layer (§6.1): `extern "C"` entry points over opaque `u32` handles,
//! stable negative error codes, and `Box::into_raw`/`Box::from_raw`-free
//! marshalling — the registry already holds the real state, so this layer
//! stays thin (idiom of `DMXP-MPMC`'s `ffi.rs`: null-pointer checks first,
//! then delegate to the safe Rust API, then map the error).

use crate::bus::Bus;
use crate::config::BusConfig;
use crate::error::{BusError, SUCCESS};
use crate::message::{FeedbackStatus, Message, Ticket};
use std::slice;
use std::sync::atomic::{AtomicBool, Ordering};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Opaque ticket handed back by `write_message`/`read_message` and redeemed
/// by `write_feedback`/`collect_feedback`. Callers must treat its fields as
/// opaque and pass the struct back unmodified.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiTicket {
    pub segment_index: u32,
    pub slot_index: u32,
    pub seq: u64,
}

impl From<Ticket> for FfiTicket {
    fn from(t: Ticket) -> Self {
        Self { segment_index: t.segment_index, slot_index: t.slot_index, seq: t.seq }
    }
}

impl From<FfiTicket> for Ticket {
    fn from(t: FfiTicket) -> Self {
        Self { segment_index: t.segment_index, slot_index: t.slot_index, seq: t.seq }
    }
}

/// C-ABI mirror of [`crate::stats::StatsSnapshot`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FfiStats {
    pub total_messages_written: u64,
    pub total_messages_read: u64,
    pub total_bytes_written: u64,
    pub total_bytes_read: u64,
    pub failed_writes: u64,
    pub failed_reads: u64,
    pub dropped_corrupt: u64,
    pub peak_pending: u64,
    pub current_pending: u64,
}

fn bus_ref(handle: u32) -> Result<std::sync::Arc<Bus>, BusError> {
    crate::registry::get(handle)
}

/// Initializes process-wide state. Idempotent; safe to call more than once.
#[no_mangle]
pub extern "C" fn ringbus_init_system() -> i32 {
    INITIALIZED.store(true, Ordering::Release);
    SUCCESS
}

/// Tears down process-wide state flags. Does not destroy any live buses —
/// callers must `destroy_buffer` each handle they created first.
#[no_mangle]
pub extern "C" fn ringbus_shutdown_system() -> i32 {
    INITIALIZED.store(false, Ordering::Release);
    SUCCESS
}

fn require_initialized() -> Result<(), BusError> {
    if INITIALIZED.load(Ordering::Acquire) { Ok(()) } else { Err(BusError::NotInitialized) }
}

/// Creates a bus and writes its handle to `*out_handle`.
#[no_mangle]
pub extern "C" fn ringbus_create_buffer(size_mib: u32, segment_count: u32, out_handle: *mut u32) -> i32 {
    if out_handle.is_null() {
        return BusError::InvalidParams.as_code();
    }
    let result = require_initialized().and_then(|()| {
        let config = BusConfig::new(size_mib, segment_count)?;
        Bus::create(config)
    });
    match result {
        Ok(handle) => {
            // SAFETY: `out_handle` was just checked non-null.
            unsafe { *out_handle = handle };
            SUCCESS
        }
        Err(e) => e.as_code(),
    }
}

/// Destroys a bus, invalidating its handle.
#[no_mangle]
pub extern "C" fn ringbus_destroy_buffer(handle: u32) -> i32 {
    match Bus::destroy(handle) {
        Ok(()) => SUCCESS,
        Err(e) => e.as_code(),
    }
}

#[no_mangle]
pub extern "C" fn ringbus_attach_producer(handle: u32, out_producer_id: *mut u32) -> i32 {
    if out_producer_id.is_null() {
        return BusError::InvalidParams.as_code();
    }
    match bus_ref(handle).and_then(|bus| bus.attach_producer()) {
        Ok(id) => {
            unsafe { *out_producer_id = id };
            SUCCESS
        }
        Err(e) => e.as_code(),
    }
}

#[no_mangle]
pub extern "C" fn ringbus_detach_producer(handle: u32, producer_id: u32) -> i32 {
    match bus_ref(handle).and_then(|bus| bus.detach_producer(producer_id)) {
        Ok(()) => SUCCESS,
        Err(e) => e.as_code(),
    }
}

#[no_mangle]
pub extern "C" fn ringbus_attach_consumer(handle: u32, out_consumer_id: *mut u32) -> i32 {
    if out_consumer_id.is_null() {
        return BusError::InvalidParams.as_code();
    }
    match bus_ref(handle) {
        Ok(bus) => {
            unsafe { *out_consumer_id = bus.attach_consumer() };
            SUCCESS
        }
        Err(e) => e.as_code(),
    }
}

#[no_mangle]
pub extern "C" fn ringbus_detach_consumer(handle: u32, consumer_id: u32) -> i32 {
    match bus_ref(handle).and_then(|bus| bus.detach_consumer(consumer_id)) {
        Ok(()) => SUCCESS,
        Err(e) => e.as_code(),
    }
}

/// Writes a message. `meta`/`payload` are copied out of the caller's buffers
/// immediately; neither pointer needs to stay valid afterward.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn ringbus_write_message(
    handle: u32,
    producer_id: u32,
    consumer_id: u32,
    msg_id: u64,
    meta_type: u32,
    meta: *const u8,
    meta_len: usize,
    payload: *const u8,
    payload_len: usize,
    out_ticket: *mut FfiTicket,
) -> i32 {
    if out_ticket.is_null() || (meta_len > 0 && meta.is_null()) || (payload_len > 0 && payload.is_null()) {
        return BusError::InvalidParams.as_code();
    }
    // SAFETY: null-checked above; caller guarantees `len` bytes are valid.
    // `from_raw_parts` requires a non-null, aligned pointer even when `len == 0`,
    // so substitute a dangling aligned pointer for the zero-length case.
    let meta_ptr = if meta_len == 0 { std::ptr::NonNull::dangling().as_ptr() } else { meta };
    let payload_ptr = if payload_len == 0 { std::ptr::NonNull::dangling().as_ptr() } else { payload };
    let meta_slice = unsafe { slice::from_raw_parts(meta_ptr, meta_len) };
    let payload_slice = unsafe { slice::from_raw_parts(payload_ptr, payload_len) };
    let msg = Message::new(msg_id, producer_id, consumer_id, meta_type, meta_slice, payload_slice);

    match bus_ref(handle).and_then(|bus| bus.produce(msg)) {
        Ok(ticket) => {
            unsafe { *out_ticket = ticket.into() };
            SUCCESS
        }
        Err(e) => e.as_code(),
    }
}

/// Reads the next message addressed to `consumer_id`, copying its payload
/// and meta into the caller's buffers. The message is already removed from
/// the segment by the time this validates buffer sizes (consumption is
/// one-way, §3.2 invariant 1), so `BUFFER_TOO_SMALL` still hands back a
/// valid `*out_ticket` and the required length via `*out_payload_len` —
/// callers that can't fit the payload should write `NACK` feedback for it.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn ringbus_read_message(
    handle: u32,
    consumer_id: u32,
    out_meta: *mut u8,
    out_meta_len: usize,
    out_payload: *mut u8,
    out_payload_len: *mut usize,
    out_meta_type: *mut u32,
    out_msg_id: *mut u64,
    out_ticket: *mut FfiTicket,
) -> i32 {
    if out_payload_len.is_null() || out_ticket.is_null() {
        return BusError::InvalidParams.as_code();
    }
    let bus = match bus_ref(handle) {
        Ok(bus) => bus,
        Err(e) => return e.as_code(),
    };
    let (view, ticket) = match bus.consume(consumer_id) {
        Ok(pair) => pair,
        Err(e) => return e.as_code(),
    };

    let capacity = unsafe { *out_payload_len };
    if view.payload.len() > capacity {
        unsafe {
            *out_payload_len = view.payload.len();
            *out_ticket = ticket.into();
        }
        return BusError::BufferTooSmall.as_code();
    }

    if !out_payload.is_null() {
        unsafe { std::ptr::copy_nonoverlapping(view.payload.as_ptr(), out_payload, view.payload.len()) };
    }
    unsafe { *out_payload_len = view.payload.len() };

    if !out_meta.is_null() {
        let n = view.meta.len().min(out_meta_len);
        unsafe { std::ptr::copy_nonoverlapping(view.meta.as_ptr(), out_meta, n) };
    }
    if !out_meta_type.is_null() {
        unsafe { *out_meta_type = view.meta_type };
    }
    if !out_msg_id.is_null() {
        unsafe { *out_msg_id = view.msg_id };
    }
    unsafe { *out_ticket = ticket.into() };
    SUCCESS
}

#[no_mangle]
pub extern "C" fn ringbus_write_feedback(
    handle: u32,
    ticket: FfiTicket,
    status: u8,
    detail: *const u8,
    detail_len: usize,
) -> i32 {
    let Some(status) = FeedbackStatus::from_u8(status) else {
        return BusError::InvalidParams.as_code();
    };
    if detail_len > 0 && detail.is_null() {
        return BusError::InvalidParams.as_code();
    }
    let detail_slice = if detail.is_null() { &[][..] } else { unsafe { slice::from_raw_parts(detail, detail_len) } };

    match bus_ref(handle).and_then(|bus| bus.feedback(ticket.into(), status, detail_slice)) {
        Ok(()) => SUCCESS,
        Err(e) => e.as_code(),
    }
}

/// Pulls back the ACK/NACK record for a ticket (§6.1). `out_seq` is handed
/// back alongside the status so a caller holding several outstanding
/// tickets can match a result to the produced sequence number without a
/// side table — it's the same `seq` the ticket itself carries, surfaced
/// here because the spec's C-ABI table returns it explicitly.
#[no_mangle]
pub extern "C" fn ringbus_collect_feedback(
    handle: u32,
    ticket: FfiTicket,
    out_seq: *mut u64,
    out_status: *mut u8,
    out_detail: *mut u8,
    out_detail_len: *mut usize,
) -> i32 {
    if out_status.is_null() {
        return BusError::InvalidParams.as_code();
    }
    let bus = match bus_ref(handle) {
        Ok(bus) => bus,
        Err(e) => return e.as_code(),
    };
    match bus.collect_feedback(ticket.into()) {
        Ok(Some(fb)) => {
            if !out_seq.is_null() {
                unsafe { *out_seq = ticket.seq };
            }
            unsafe { *out_status = fb.status as u8 };
            if !out_detail.is_null() && !out_detail_len.is_null() {
                let capacity = unsafe { *out_detail_len };
                let n = fb.detail.len().min(capacity);
                unsafe { std::ptr::copy_nonoverlapping(fb.detail.as_ptr(), out_detail, n) };
                unsafe { *out_detail_len = fb.detail.len() };
            }
            SUCCESS
        }
        Ok(None) => BusError::BufferEmpty.as_code(),
        Err(e) => e.as_code(),
    }
}

#[no_mangle]
pub extern "C" fn ringbus_stats(handle: u32, out_stats: *mut FfiStats) -> i32 {
    if out_stats.is_null() {
        return BusError::InvalidParams.as_code();
    }
    match bus_ref(handle) {
        Ok(bus) => {
            let s = bus.stats();
            unsafe {
                *out_stats = FfiStats {
                    total_messages_written: s.total_messages_written,
                    total_messages_read: s.total_messages_read,
                    total_bytes_written: s.total_bytes_written,
                    total_bytes_read: s.total_bytes_read,
                    failed_writes: s.failed_writes,
                    failed_reads: s.failed_reads,
                    dropped_corrupt: s.dropped_corrupt,
                    peak_pending: s.peak_pending,
                    current_pending: s.current_pending,
                };
            }
            SUCCESS
        }
        Err(e) => e.as_code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_round_trip_through_the_c_abi() {
        assert_eq!(ringbus_init_system(), SUCCESS);

        let mut handle = 0u32;
        assert_eq!(ringbus_create_buffer(1, 2, &mut handle), SUCCESS);

        let mut producer_id = 0u32;
        assert_eq!(ringbus_attach_producer(handle, &mut producer_id), SUCCESS);
        let mut consumer_id = 0u32;
        assert_eq!(ringbus_attach_consumer(handle, &mut consumer_id), SUCCESS);

        let payload = b"hello";
        let mut ticket = FfiTicket { segment_index: 0, slot_index: 0, seq: 0 };
        let rc = ringbus_write_message(
            handle,
            producer_id,
            consumer_id,
            1,
            0,
            std::ptr::null(),
            0,
            payload.as_ptr(),
            payload.len(),
            &mut ticket,
        );
        assert_eq!(rc, SUCCESS);

        let mut out_buf = [0u8; 16];
        let mut out_len = out_buf.len();
        let mut read_ticket = FfiTicket { segment_index: 0, slot_index: 0, seq: 0 };
        let rc = ringbus_read_message(
            handle,
            consumer_id,
            std::ptr::null_mut(),
            0,
            out_buf.as_mut_ptr(),
            &mut out_len,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            &mut read_ticket,
        );
        assert_eq!(rc, SUCCESS);
        assert_eq!(&out_buf[..out_len], payload);

        assert_eq!(ringbus_write_feedback(handle, read_ticket, FeedbackStatus::Ack as u8, std::ptr::null(), 0), SUCCESS);

        let mut seq = 0u64;
        let mut status = 0u8;
        assert_eq!(
            ringbus_collect_feedback(handle, read_ticket, &mut seq, &mut status, std::ptr::null_mut(), std::ptr::null_mut()),
            SUCCESS
        );
        assert_eq!(status, FeedbackStatus::Ack as u8);
        assert_eq!(seq, read_ticket.seq);

        assert_eq!(ringbus_destroy_buffer(handle), SUCCESS);
        assert_eq!(ringbus_shutdown_system(), SUCCESS);
    }

    #[test]
    fn null_out_pointer_is_rejected() {
        assert_eq!(ringbus_create_buffer(1, 1, std::ptr::null_mut()), BusError::InvalidParams.as_code());
    }

    #[test]
    fn undersized_read_buffer_reports_required_length() {
        assert_eq!(ringbus_init_system(), SUCCESS);
        let mut handle = 0u32;
        assert_eq!(ringbus_create_buffer(1, 1, &mut handle), SUCCESS);
        let mut producer_id = 0u32;
        ringbus_attach_producer(handle, &mut producer_id);
        let mut consumer_id = 0u32;
        ringbus_attach_consumer(handle, &mut consumer_id);

        let payload = b"hello world";
        let mut ticket = FfiTicket { segment_index: 0, slot_index: 0, seq: 0 };
        ringbus_write_message(
            handle,
            producer_id,
            consumer_id,
            1,
            0,
            std::ptr::null(),
            0,
            payload.as_ptr(),
            payload.len(),
            &mut ticket,
        );

        let mut out_len = 2usize;
        let mut read_ticket = FfiTicket { segment_index: 0, slot_index: 0, seq: 0 };
        let rc = ringbus_read_message(
            handle,
            consumer_id,
            std::ptr::null_mut(),
            0,
            std::ptr::null_mut(),
            &mut out_len,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            &mut read_ticket,
        );
        assert_eq!(rc, BusError::BufferTooSmall.as_code());
        assert_eq!(out_len, payload.len());

        // The slot was already consumed despite BUFFER_TOO_SMALL, so the
        // ticket it hands back must be valid: the caller still needs it to
        // write NACK feedback for the message it couldn't fit.
        assert_eq!(
            ringbus_write_feedback(handle, read_ticket, FeedbackStatus::Nack as u8, std::ptr::null(), 0),
            SUCCESS
        );
    }
}
