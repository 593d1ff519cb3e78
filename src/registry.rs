//! Process-wide handle registry (§4.7).
//!
//! Handles are monotone 32-bit ids, never reused for the lifetime of the
//! process (§3.2 invariant 7, §8.1 property 7). `0` is reserved for
//! "invalid". An `RwLock<HashMap<...>>` gives the "consistent (alive,
//! memory) pair, never torn" guarantee directly (§5) — registration and
//! destruction are rare compared to produce/consume, so a read-mostly lock
//! is the right tool rather than hand-rolled RCU.

use crate::bus::Bus;
use crate::config::MAX_BUFFERS;
use crate::error::BusError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

struct Registry {
    table: RwLock<HashMap<u32, Arc<Bus>>>,
    next_handle: AtomicU32,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry { table: RwLock::new(HashMap::new()), next_handle: AtomicU32::new(1) })
}

/// Registers a newly created bus and returns its handle.
pub fn insert(bus: Bus) -> Result<u32, BusError> {
    let reg = registry();
    let mut table = reg.table.write().unwrap();
    if table.len() >= MAX_BUFFERS {
        return Err(BusError::Oom);
    }
    let handle = reg.next_handle.fetch_add(1, Ordering::Relaxed);
    crate::invariants::debug_assert_nonzero_handle!(handle);
    table.insert(handle, Arc::new(bus));
    Ok(handle)
}

/// Resolves a handle to its bus, or `INVALID_HANDLE` if it never existed or
/// was destroyed.
pub fn get(handle: u32) -> Result<Arc<Bus>, BusError> {
    if handle == 0 {
        return Err(BusError::InvalidHandle);
    }
    registry().table.read().unwrap().get(&handle).cloned().ok_or(BusError::InvalidHandle)
}

/// Removes a handle from the registry, invalidating it permanently.
pub fn remove(handle: u32) -> Result<Arc<Bus>, BusError> {
    if handle == 0 {
        return Err(BusError::InvalidHandle);
    }
    registry().table.write().unwrap().remove(&handle).ok_or(BusError::InvalidHandle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusConfig;

    #[test]
    fn handles_are_never_reused() {
        let cfg = BusConfig::new(1, 1).unwrap();
        let h1 = insert(Bus::new(cfg)).unwrap();
        remove(h1).unwrap();
        let h2 = insert(Bus::new(cfg)).unwrap();
        assert_ne!(h1, h2);
        assert!(matches!(get(h1), Err(BusError::InvalidHandle)));
    }

    #[test]
    fn zero_handle_is_always_invalid() {
        assert!(matches!(get(0), Err(BusError::InvalidHandle)));
    }
}
