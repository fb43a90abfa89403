use std::fmt;
use std::sync::Arc;

use bytemuck::Pod;

use crate::error::{Result, RuntimeError};
use crate::interop::{Allocated, DeviceInterop, TransferMode};
use crate::view::View;

use super::{Address, HostAllocation, Region, StorageLocation};

enum Memory {
    Host(HostAllocation),
    Device(u64),
}

/// Owning allocation in one storage location.
///
/// Views borrow the buffer, so the borrow checker enforces that the buffer
/// outlives every view over it. Nothing is reference counted per view.
pub struct Buffer {
    region: Region,
    memory: Memory,
    interop: Arc<DeviceInterop>,
}

impl Buffer {
    pub(crate) fn allocate(
        interop: Arc<DeviceInterop>,
        location: StorageLocation,
        len: usize,
    ) -> Result<Self> {
        let (base, memory) = match interop.allocate(location, len)? {
            Allocated::Host(allocation) => {
                (Address::host(allocation.as_ptr()), Memory::Host(allocation))
            }
            Allocated::Device(handle) => (
                Address::Device { handle, offset: 0 },
                Memory::Device(handle),
            ),
        };

        Ok(Self {
            region: Region::new(location, base, len),
            memory,
            interop,
        })
    }

    pub fn location(&self) -> StorageLocation {
        self.region.location()
    }

    pub fn len(&self) -> usize {
        self.region.len()
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Alignment of host-backed storage, `None` for device allocations.
    pub fn host_alignment(&self) -> Option<usize> {
        match &self.memory {
            Memory::Host(allocation) => Some(allocation.align()),
            Memory::Device(_) => None,
        }
    }

    /// Whether the pages are locked in RAM, only ever true for pinned buffers.
    pub fn is_page_locked(&self) -> bool {
        matches!(&self.memory, Memory::Host(allocation) if allocation.is_locked())
    }

    /// Strided view over the buffer. `offset` and `stride` are in elements.
    pub fn view(
        &self,
        offset: usize,
        extent: &[usize],
        stride: &[isize],
        elem_size: usize,
    ) -> Result<View<'_>> {
        // SAFETY: the returned view borrows self, so the region stays allocated
        unsafe { View::new(self.region, offset, extent.to_vec(), stride.to_vec(), elem_size) }
    }

    /// Row-major dense view starting at the first byte.
    pub fn contiguous_view(&self, extent: &[usize], elem_size: usize) -> Result<View<'_>> {
        unsafe { View::contiguous(self.region, 0, extent, elem_size) }
    }

    pub fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        // SAFETY: the range was checked against this buffer and the copy blocks
        unsafe {
            self.interop.transfer(
                Address::host(data.as_ptr() as *mut u8),
                self.region.at(offset),
                StorageLocation::Host,
                self.location(),
                data.len(),
                TransferMode::Blocking,
            )?;
        }
        Ok(())
    }

    pub fn read_bytes(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        self.check_range(offset, out.len())?;
        // SAFETY: the range was checked against this buffer and the copy blocks
        unsafe {
            self.interop.transfer(
                self.region.at(offset),
                Address::host(out.as_mut_ptr()),
                self.location(),
                StorageLocation::Host,
                out.len(),
                TransferMode::Blocking,
            )?;
        }
        Ok(())
    }

    pub fn write_slice<T: Pod>(&self, data: &[T]) -> Result<()> {
        self.write_bytes(0, bytemuck::cast_slice(data))
    }

    /// Copies the whole buffer out as `T`, trailing bytes that do not fill a `T` are ignored.
    pub fn to_vec<T: Pod>(&self) -> Result<Vec<T>> {
        let count = self.len() / std::mem::size_of::<T>().max(1);
        let mut out = vec![T::zeroed(); count];
        self.read_bytes(0, bytemuck::cast_slice_mut(&mut out))?;
        Ok(out)
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len() => Ok(()),
            _ => Err(RuntimeError::OutOfBounds(format!(
                "byte range {}..{} outside {} byte buffer on {}",
                offset,
                offset.saturating_add(len),
                self.len(),
                self.location()
            ))),
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Memory::Device(handle) = self.memory {
            self.interop.release(self.location(), handle);
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("location", &self.location())
            .field("len", &self.len())
            .field("host_alignment", &self.host_alignment())
            .field("page_locked", &self.is_page_locked())
            .finish()
    }
}
