mod host;
mod r#trait;
mod virtual_device;
mod vulkan;

pub(crate) use host::HostInterop;
pub(crate) use r#trait::{Allocated, InteropOps};
pub(crate) use virtual_device::VirtualInterop;
pub(crate) use vulkan::VulkanInterop;

use crate::error::{Result, RuntimeError};
use crate::storage::{Address, HostPtr, LocationKind, StorageLocation};

/// One variant per transfer backend, chosen by the storage location tag.
pub(crate) enum Backend {
    Host(HostInterop),
    Vulkan(VulkanInterop),
    Virtual(VirtualInterop),
}

impl InteropOps for Backend {
    fn device_count(&self) -> usize {
        match self {
            Backend::Host(b) => b.device_count(),
            Backend::Vulkan(b) => b.device_count(),
            Backend::Virtual(b) => b.device_count(),
        }
    }

    fn allocate(&self, device: u32, len: usize) -> std::result::Result<Allocated, String> {
        match self {
            Backend::Host(b) => b.allocate(device, len),
            Backend::Vulkan(b) => b.allocate(device, len),
            Backend::Virtual(b) => b.allocate(device, len),
        }
    }

    fn release(&self, device: u32, handle: u64) {
        match self {
            Backend::Host(b) => b.release(device, handle),
            Backend::Vulkan(b) => b.release(device, handle),
            Backend::Virtual(b) => b.release(device, handle),
        }
    }

    fn resolve_device(
        &self,
        handle: u64,
        offset: usize,
        len: usize,
    ) -> std::result::Result<*mut u8, String> {
        match self {
            Backend::Host(b) => b.resolve_device(handle, offset, len),
            Backend::Vulkan(b) => b.resolve_device(handle, offset, len),
            Backend::Virtual(b) => b.resolve_device(handle, offset, len),
        }
    }
}

impl Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Host(_) => "host",
            Backend::Vulkan(_) => "vulkan",
            Backend::Virtual(_) => "virtual",
        }
    }
}

pub(crate) struct Backends {
    host: Backend,
    gpu: Backend,
    virtual_devices: Backend,
}

impl Backends {
    pub fn new(enable_vulkan: bool, virtual_devices: u32) -> Self {
        let gpu = if enable_vulkan {
            VulkanInterop::new()
        } else {
            VulkanInterop::unavailable()
        };

        Self {
            host: Backend::Host(HostInterop),
            gpu: Backend::Vulkan(gpu),
            virtual_devices: Backend::Virtual(VirtualInterop::new(virtual_devices)),
        }
    }

    /// Backend serving `location` and the device index it knows the location by.
    pub fn select(&self, location: StorageLocation) -> (&Backend, u32) {
        match location {
            StorageLocation::Host => (&self.host, host::PAGEABLE),
            StorageLocation::Pinned => (&self.host, host::PINNED),
            StorageLocation::Gpu(idx) => (&self.gpu, idx),
            StorageLocation::Virtual(idx) => (&self.virtual_devices, idx),
        }
    }

    pub fn device_count(&self, kind: LocationKind) -> usize {
        match kind {
            LocationKind::Host | LocationKind::Pinned => 1,
            LocationKind::Gpu => self.gpu.device_count(),
            LocationKind::Virtual => self.virtual_devices.device_count(),
        }
    }

    pub fn allocate(&self, location: StorageLocation, len: usize) -> Result<Allocated> {
        let (backend, device) = self.select(location);
        if !location.is_host_accessible() && device as usize >= backend.device_count() {
            return Err(RuntimeError::UnsupportedLocation {
                location,
                operation: "allocation",
            });
        }

        backend
            .allocate(device, len)
            .map_err(|reason| RuntimeError::Allocation {
                location,
                bytes: len,
                reason,
            })
    }

    pub fn release(&self, location: StorageLocation, handle: u64) {
        let (backend, device) = self.select(location);
        backend.release(device, handle);
    }

    /// Moves `len` bytes and returns once they have landed.
    ///
    /// Host pairs go through the host backend, a pair with one device side
    /// through that device's backend, and two devices on different backends
    /// bounce through host memory.
    pub fn transfer(
        &self,
        src: Address,
        dst: Address,
        src_location: StorageLocation,
        dst_location: StorageLocation,
        len: usize,
    ) -> Result<()> {
        let (src_backend, _) = self.select(src_location);
        let (dst_backend, _) = self.select(dst_location);

        let outcome = match (
            src_location.is_host_accessible(),
            dst_location.is_host_accessible(),
        ) {
            (true, true) => self.host.transfer(src, dst, len),
            (false, true) => src_backend.transfer(src, dst, len),
            (true, false) => dst_backend.transfer(src, dst, len),
            (false, false) if src_backend.name() == dst_backend.name() => {
                src_backend.transfer(src, dst, len)
            }
            (false, false) => {
                let mut staging = vec![0u8; len];
                let bounce = Address::Host(HostPtr(staging.as_mut_ptr()));
                src_backend
                    .transfer(src, bounce, len)
                    .and_then(|_| dst_backend.transfer(bounce, dst, len))
            }
        };

        outcome.map_err(|reason| RuntimeError::DeviceTransferFailure {
            src,
            dst,
            src_location,
            dst_location,
            len,
            reason,
        })
    }
}
