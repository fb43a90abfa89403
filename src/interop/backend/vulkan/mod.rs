mod gpu;
mod gpu_memory;

use std::collections::HashMap;
use std::ffi::CString;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use vulkanalia::{
    Entry, Instance,
    loader::{LIBRARY, LibloadingLoader},
    vk::{self, InstanceV1_0},
};

use crate::error::{Result, RuntimeError};

use super::r#trait::{Allocated, InteropOps};
use gpu::Gpu;
use gpu_memory::GpuMemory;

struct VulkanContext {
    // dropped before the devices they were allocated from
    allocations: Mutex<HashMap<u64, (u32, GpuMemory)>>,
    gpus: Vec<Gpu>,
    instance: Instance,
    _entry: Entry,
}

// Vulkan handles may be used from any thread; allocations are guarded by the mutex.
unsafe impl Send for VulkanContext {}
unsafe impl Sync for VulkanContext {}

/// Vulkan physical devices, reached through persistently mapped host-visible memory.
///
/// When the loader or a driver is missing this backend reports zero devices
/// instead of failing the whole runtime.
pub(crate) struct VulkanInterop {
    context: Option<VulkanContext>,
    next_handle: AtomicU64,
}

impl VulkanInterop {
    pub fn unavailable() -> Self {
        Self {
            context: None,
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn new() -> Self {
        match unsafe { Self::create_context() } {
            Ok(context) => {
                let names: Vec<&str> = context.gpus.iter().map(|g| g.name()).collect();
                tracing::info!(gpus = context.gpus.len(), ?names, "vulkan backend ready");
                Self {
                    context: Some(context),
                    next_handle: AtomicU64::new(1),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "vulkan unavailable, continuing without GPUs");
                Self::unavailable()
            }
        }
    }

    unsafe fn create_context() -> Result<VulkanContext> {
        unsafe {
            let loader = LibloadingLoader::new(LIBRARY)
                .map_err(|e| RuntimeError::Vulkan(format!("failed to load Vulkan library: {}", e)))?;
            let entry = Entry::new(loader)
                .map_err(|e| RuntimeError::Vulkan(format!("failed to create Vulkan entry: {}", e)))?;

            let aname = CString::new("flowrt")
                .map_err(|e| RuntimeError::Vulkan(e.to_string()))?;

            let appinfo = vk::ApplicationInfo {
                s_type: vk::StructureType::APPLICATION_INFO,
                next: ptr::null(),
                application_name: aname.as_ptr(),
                application_version: vk::make_version(0, 1, 0),
                engine_name: aname.as_ptr(),
                engine_version: vk::make_version(0, 1, 0),
                api_version: vk::make_version(1, 1, 0),
            };

            let create_info = vk::InstanceCreateInfo {
                s_type: vk::StructureType::INSTANCE_CREATE_INFO,
                next: ptr::null(),
                flags: vk::InstanceCreateFlags::empty(),
                application_info: &appinfo,
                enabled_layer_count: 0,
                enabled_layer_names: ptr::null(),
                enabled_extension_count: 0,
                enabled_extension_names: ptr::null(),
            };

            let instance = entry.create_instance(&create_info, None)?;

            let physical_devices = match instance.enumerate_physical_devices() {
                Ok(devices) => devices,
                Err(e) => {
                    instance.destroy_instance(None);
                    return Err(e.into());
                }
            };

            let mut gpus = Vec::with_capacity(physical_devices.len());
            for (idx, &physical_device) in physical_devices.iter().enumerate() {
                match Gpu::new_shared(&instance, physical_device) {
                    Ok(gpu) => gpus.push(gpu),
                    // later indices would shift, so stop at the first device that fails
                    Err(e) => {
                        tracing::warn!(gpu = idx, error = %e, "skipping GPU and every later index");
                        break;
                    }
                }
            }

            Ok(VulkanContext {
                allocations: Mutex::new(HashMap::new()),
                gpus,
                instance,
                _entry: entry,
            })
        }
    }

    fn context(&self) -> std::result::Result<&VulkanContext, String> {
        self.context
            .as_ref()
            .ok_or_else(|| "vulkan backend is not available".to_string())
    }
}

impl InteropOps for VulkanInterop {
    fn device_count(&self) -> usize {
        self.context.as_ref().map_or(0, |c| c.gpus.len())
    }

    fn allocate(&self, device: u32, len: usize) -> std::result::Result<Allocated, String> {
        let context = self.context()?;
        let gpu = context
            .gpus
            .get(device as usize)
            .ok_or_else(|| format!("gpu {} does not exist, {} found", device, context.gpus.len()))?;

        let memory = gpu.allocate(len).map_err(|e| e.to_string())?;
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        context.allocations.lock().insert(handle, (device, memory));
        Ok(Allocated::Device(handle))
    }

    fn release(&self, device: u32, handle: u64) {
        let Some(context) = self.context.as_ref() else {
            return;
        };
        if context.allocations.lock().remove(&handle).is_none() {
            tracing::warn!(handle, device, "release of unknown gpu handle");
        }
    }

    fn resolve_device(
        &self,
        handle: u64,
        offset: usize,
        len: usize,
    ) -> std::result::Result<*mut u8, String> {
        let context = self.context()?;
        let allocations = context.allocations.lock();
        let (_, memory) = allocations
            .get(&handle)
            .ok_or_else(|| format!("unknown gpu handle {}", handle))?;
        memory.mapped_range(offset, len)
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        self.allocations.lock().clear();
        self.gpus.clear();
        unsafe { self.instance.destroy_instance(None) };
    }
}
