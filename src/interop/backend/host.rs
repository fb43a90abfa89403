use crate::os;
use crate::storage::HostAllocation;

use super::r#trait::{Allocated, InteropOps};

/// Plain CPU memory. Device index 0 is pageable, 1 is page-locked.
pub(crate) struct HostInterop;

pub(crate) const PAGEABLE: u32 = 0;
pub(crate) const PINNED: u32 = 1;

impl InteropOps for HostInterop {
    fn device_count(&self) -> usize {
        1
    }

    fn allocate(&self, device: u32, len: usize) -> Result<Allocated, String> {
        let mut allocation = HostAllocation::zeroed(len, os::page_size())?;
        if device == PINNED {
            // an mlock limit is common in containers, the memory is still usable
            if let Err(e) = allocation.lock() {
                tracing::warn!(bytes = len, error = %e, "pinned allocation is not page-locked");
            }
        }
        Ok(Allocated::Host(allocation))
    }

    fn release(&self, _device: u32, _handle: u64) {}

    fn resolve_device(&self, handle: u64, _offset: usize, _len: usize) -> Result<*mut u8, String> {
        Err(format!("host backend does not own device handle {}", handle))
    }
}
