use crate::storage::{Address, HostAllocation};

/// Memory handed out by a backend.
pub(crate) enum Allocated {
    /// CPU addressable block owned by the caller
    Host(HostAllocation),
    /// Opaque handle, only meaningful to the backend that issued it
    Device(u64),
}

/// Operations every transfer backend supports.
///
/// Backend errors are plain strings; the dispatcher wraps them with the
/// addresses and locations involved.
pub(crate) trait InteropOps {
    fn device_count(&self) -> usize;

    fn allocate(&self, device: u32, len: usize) -> Result<Allocated, String>;

    fn release(&self, device: u32, handle: u64);

    /// CPU pointer to `len` bytes of a device allocation.
    fn resolve_device(&self, handle: u64, offset: usize, len: usize) -> Result<*mut u8, String>;

    fn resolve(&self, address: Address, len: usize) -> Result<*mut u8, String> {
        match address {
            Address::Host(ptr) => Ok(ptr.0),
            Address::Device { handle, offset } => self.resolve_device(handle, offset, len),
        }
    }

    /// Moves `len` bytes between two addresses this backend can resolve.
    fn transfer(&self, src: Address, dst: Address, len: usize) -> Result<(), String> {
        if len == 0 {
            return Ok(());
        }
        let src = self.resolve(src, len)?;
        let dst = self.resolve(dst, len)?;
        // Views may alias, so the ranges can overlap
        unsafe { std::ptr::copy(src as *const u8, dst, len) };
        Ok(())
    }
}
