use std::ptr;
use std::sync::Arc;

use vulkanalia::{
    Device, Instance,
    vk::{self, DeviceV1_0, InstanceV1_0},
};

use crate::error::{Result, RuntimeError};

use super::gpu_memory::GpuMemory;

/// One logical device per physical GPU, used only for host-visible buffers.
pub(crate) struct Gpu {
    name: String,
    device: Arc<Device>,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl Gpu {
    pub fn new_shared(instance: &Instance, physical_device: vk::PhysicalDevice) -> Result<Self> {
        unsafe {
            let properties = instance.get_physical_device_properties(physical_device);
            let name = String::from_utf8_lossy(
                &properties
                    .device_name
                    .iter()
                    .take_while(|&&c| c != 0)
                    .map(|&c| c as u8)
                    .collect::<Vec<u8>>(),
            )
            .to_string();

            // any family can serve mapped-memory copies, prefer one with transfer support
            let queue_families =
                instance.get_physical_device_queue_family_properties(physical_device);
            let queue_family_index = queue_families
                .iter()
                .position(|props| {
                    props
                        .queue_flags
                        .intersects(vk::QueueFlags::TRANSFER | vk::QueueFlags::COMPUTE)
                })
                .unwrap_or(0) as u32;

            let queue_priorities = [1.0f32];
            let queue_info = vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                next: ptr::null(),
                flags: vk::DeviceQueueCreateFlags::empty(),
                queue_family_index,
                queue_count: 1,
                queue_priorities: queue_priorities.as_ptr(),
            };

            let device_features = vk::PhysicalDeviceFeatures::default();

            let device_create_info = vk::DeviceCreateInfo {
                s_type: vk::StructureType::DEVICE_CREATE_INFO,
                next: ptr::null(),
                flags: vk::DeviceCreateFlags::empty(),
                queue_create_info_count: 1,
                queue_create_infos: &queue_info,
                enabled_layer_count: 0,
                enabled_layer_names: ptr::null(),
                enabled_extension_count: 0,
                enabled_extension_names: ptr::null(),
                enabled_features: &device_features,
            };

            let device = instance.create_device(physical_device, &device_create_info, None)?;
            let memory_properties = instance.get_physical_device_memory_properties(physical_device);

            Ok(Self {
                name,
                device: Arc::new(device),
                memory_properties,
            })
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> Option<u32> {
        (0..self.memory_properties.memory_type_count).find(|&i| {
            (type_filter & (1 << i)) != 0
                && self.memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
    }

    /// Allocates a zeroed buffer that stays mapped until dropped.
    pub fn allocate(&self, len: usize) -> Result<GpuMemory> {
        // Vulkan rejects zero-sized buffers
        let size = len.max(1) as vk::DeviceSize;

        unsafe {
            let buffer_info = vk::BufferCreateInfo {
                s_type: vk::StructureType::BUFFER_CREATE_INFO,
                next: ptr::null(),
                flags: vk::BufferCreateFlags::empty(),
                size,
                usage: vk::BufferUsageFlags::STORAGE_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_SRC
                    | vk::BufferUsageFlags::TRANSFER_DST,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                queue_family_index_count: 0,
                queue_family_indices: ptr::null(),
            };

            let buffer = self.device.create_buffer(&buffer_info, None)?;
            let mem_requirements = self.device.get_buffer_memory_requirements(buffer);

            let Some(memory_type) = self.find_memory_type(
                mem_requirements.memory_type_bits,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ) else {
                self.device.destroy_buffer(buffer, None);
                return Err(RuntimeError::Vulkan(format!(
                    "{} has no host-visible coherent memory type",
                    self.name
                )));
            };

            let alloc_info = vk::MemoryAllocateInfo {
                s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                next: ptr::null(),
                allocation_size: mem_requirements.size,
                memory_type_index: memory_type,
            };

            let memory = match self.device.allocate_memory(&alloc_info, None) {
                Ok(memory) => memory,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    return Err(e.into());
                }
            };

            let mapped = self
                .device
                .bind_buffer_memory(buffer, memory, 0)
                .and_then(|_| {
                    self.device
                        .map_memory(memory, 0, size, vk::MemoryMapFlags::empty())
                });
            let mapped = match mapped {
                Ok(ptr) => ptr as *mut u8,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    self.device.free_memory(memory, None);
                    return Err(e.into());
                }
            };

            // fresh allocations read as zero on every location
            ptr::write_bytes(mapped, 0, size as usize);

            Ok(GpuMemory::new(buffer, memory, size, mapped, self.device.clone()))
        }
    }
}

impl Drop for Gpu {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::warn!(gpu = %self.name, error = ?e, "device_wait_idle failed during teardown");
            }
            self.device.destroy_device(None);
        }
    }
}
