use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::storage::HostAllocation;

use super::r#trait::{Allocated, InteropOps};

// Arena alignment, wide enough for any vector load an emulated kernel might use
const ARENA_ALIGN: usize = 256;

struct Arena {
    device: u32,
    memory: HostAllocation,
}

/// Devices emulated in host memory, so device code paths run without hardware.
///
/// Allocations are only reachable through their handle, the same way real
/// device memory is.
pub(crate) struct VirtualInterop {
    devices: u32,
    next_handle: AtomicU64,
    arenas: Mutex<HashMap<u64, Arena>>,
}

impl VirtualInterop {
    pub fn new(devices: u32) -> Self {
        Self {
            devices,
            next_handle: AtomicU64::new(1),
            arenas: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn live_allocations(&self) -> usize {
        self.arenas.lock().len()
    }
}

impl InteropOps for VirtualInterop {
    fn device_count(&self) -> usize {
        self.devices as usize
    }

    fn allocate(&self, device: u32, len: usize) -> Result<Allocated, String> {
        if device >= self.devices {
            return Err(format!(
                "virtual device {} does not exist, {} configured",
                device, self.devices
            ));
        }

        let memory = HostAllocation::zeroed(len, ARENA_ALIGN)?;
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.arenas.lock().insert(handle, Arena { device, memory });
        Ok(Allocated::Device(handle))
    }

    fn release(&self, device: u32, handle: u64) {
        match self.arenas.lock().remove(&handle) {
            Some(arena) if arena.device != device => {
                tracing::warn!(handle, device, owner = arena.device, "released handle from wrong device");
            }
            Some(_) => {}
            None => tracing::warn!(handle, device, "release of unknown virtual handle"),
        }
    }

    fn resolve_device(&self, handle: u64, offset: usize, len: usize) -> Result<*mut u8, String> {
        let arenas = self.arenas.lock();
        let arena = arenas
            .get(&handle)
            .ok_or_else(|| format!("unknown virtual handle {}", handle))?;

        match offset.checked_add(len) {
            Some(end) if end <= arena.memory.len() => {
                Ok(arena.memory.as_ptr().wrapping_add(offset))
            }
            _ => Err(format!(
                "range {}..{} outside virtual allocation of {} bytes",
                offset,
                offset.saturating_add(len),
                arena.memory.len()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Address;

    fn handle(a: Allocated) -> u64 {
        match a {
            Allocated::Device(h) => h,
            Allocated::Host(_) => panic!("virtual devices hand out handles"),
        }
    }

    #[test]
    fn round_trip_through_arena() {
        let v = VirtualInterop::new(2);
        let h = handle(v.allocate(1, 8).unwrap());

        let src = [9u8, 8, 7, 6];
        let mut out = [0u8; 4];
        v.transfer(
            Address::host(src.as_ptr() as *mut u8),
            Address::Device { handle: h, offset: 4 },
            4,
        )
        .unwrap();
        v.transfer(
            Address::Device { handle: h, offset: 4 },
            Address::host(out.as_mut_ptr()),
            4,
        )
        .unwrap();
        assert_eq!(out, src);

        v.release(1, h);
        assert_eq!(v.live_allocations(), 0);
    }

    #[test]
    fn out_of_range_access_fails() {
        let v = VirtualInterop::new(1);
        let h = handle(v.allocate(0, 8).unwrap());
        assert!(v.resolve_device(h, 6, 4).is_err());
        assert!(v.resolve_device(h + 100, 0, 1).is_err());
        assert!(v.allocate(3, 8).is_err());
    }
}
