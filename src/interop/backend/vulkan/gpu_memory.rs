use std::sync::Arc;

use vulkanalia::{Device, vk, vk::DeviceV1_0};

/// Host-visible, coherent buffer memory that stays mapped for its whole life.
pub(crate) struct GpuMemory {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
    mapped: *mut u8,
    device: Arc<Device>,
}

// The mapping is plain coherent memory; ordering is up to the views using it.
unsafe impl Send for GpuMemory {}
unsafe impl Sync for GpuMemory {}

impl GpuMemory {
    /// # Safety
    /// `mapped` must be the live mapping of `memory`, covering `size` bytes.
    pub unsafe fn new(
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        size: vk::DeviceSize,
        mapped: *mut u8,
        device: Arc<Device>,
    ) -> Self {
        Self {
            buffer,
            memory,
            size,
            mapped,
            device,
        }
    }

    pub fn len(&self) -> usize {
        self.size as usize
    }

    /// Mapped pointer to `len` bytes at `offset`, bounds checked.
    pub fn mapped_range(&self, offset: usize, len: usize) -> Result<*mut u8, String> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len() => Ok(self.mapped.wrapping_add(offset)),
            _ => Err(format!(
                "range {}..{} outside GPU buffer of {} bytes",
                offset,
                offset.saturating_add(len),
                self.size
            )),
        }
    }
}

impl Drop for GpuMemory {
    fn drop(&mut self) {
        unsafe {
            self.device.unmap_memory(self.memory);
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
