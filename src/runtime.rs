use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::copy::{CopyDescriptor, CopyEngine};
use crate::error::{Result, RuntimeError};
use crate::interop::DeviceInterop;
use crate::os::{self, TimingReport};
use crate::storage::{Buffer, LocationKind, StorageLocation};
use crate::stream::{self, StreamConsumer, StreamProducer};
use crate::view::View;

/// Everything generated code needs at run time: allocation, copies and channels.
pub struct Runtime {
    config: RuntimeConfig,
    interop: Arc<DeviceInterop>,
    engine: CopyEngine,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let config = config.build()?;

        let interop = Arc::new(DeviceInterop::new(
            config.enable_vulkan,
            config.virtual_devices,
            config.transfer_workers,
        )?);

        if let StorageLocation::Gpu(idx) = config.default_location {
            let gpus = interop.device_count(LocationKind::Gpu);
            if idx as usize >= gpus {
                return Err(RuntimeError::Config(format!(
                    "default location {} is not available, {} GPUs found",
                    config.default_location, gpus
                )));
            }
        }

        tracing::info!(
            default_location = %config.default_location,
            channel_capacity = %config.channel_capacity,
            workers = config.transfer_workers,
            gpus = interop.device_count(LocationKind::Gpu),
            virtual_devices = interop.device_count(LocationKind::Virtual),
            "runtime ready"
        );

        let engine = CopyEngine::new(interop.clone(), config.transfer_policy.clone());
        Ok(Self {
            config,
            interop,
            engine,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(RuntimeConfig::from_env()?)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn engine(&self) -> &CopyEngine {
        &self.engine
    }

    pub fn interop(&self) -> &Arc<DeviceInterop> {
        &self.interop
    }

    pub fn device_count(&self, kind: LocationKind) -> usize {
        self.interop.device_count(kind)
    }

    /// Zeroed allocation of `bytes` bytes.
    pub fn allocate(&self, location: StorageLocation, bytes: usize) -> Result<Buffer> {
        let buffer = Buffer::allocate(self.interop.clone(), location, bytes)?;
        tracing::debug!(%location, bytes, "allocated buffer");
        Ok(buffer)
    }

    pub fn allocate_default(&self, bytes: usize) -> Result<Buffer> {
        self.allocate(self.config.default_location, bytes)
    }

    /// Blocking copy between two views.
    pub fn copy(&self, src: &View<'_>, dst: &View<'_>) -> Result<()> {
        self.engine.copy(&CopyDescriptor::new(src, dst)?)
    }

    /// Channel with the configured default capacity.
    pub fn channel<T>(&self) -> (StreamProducer<T>, StreamConsumer<T>) {
        stream::channel(self.config.channel_capacity)
    }

    /// Times `f` over the configured number of repetitions.
    pub fn time<R>(&self, title: &str, f: impl FnMut() -> R) -> (R, TimingReport) {
        os::time_reps(title, self.config.timing_reps, f)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("interop", &self.interop)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Capacity;

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            enable_vulkan: false,
            virtual_devices: 2,
            transfer_workers: 2,
            channel_capacity: Capacity::Bounded(3),
            ..Default::default()
        }
    }

    #[test]
    fn allocates_on_every_location_kind() {
        let rt = Runtime::new(config()).unwrap();
        for location in [
            StorageLocation::Host,
            StorageLocation::Pinned,
            StorageLocation::Virtual(0),
            StorageLocation::Virtual(1),
        ] {
            let buffer = rt.allocate(location, 32).unwrap();
            assert_eq!(buffer.location(), location);
            if location != StorageLocation::Pinned {
                assert!(!buffer.is_page_locked());
            }
            assert_eq!(buffer.to_vec::<u8>().unwrap(), vec![0u8; 32]);
        }
        assert!(rt.allocate(StorageLocation::Virtual(2), 8).is_err());
    }

    #[test]
    fn missing_gpu_default_is_rejected() {
        let err = Runtime::new(RuntimeConfig {
            default_location: StorageLocation::Gpu(0),
            enable_vulkan: false,
            ..config()
        })
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn channel_uses_configured_capacity() {
        let rt = Runtime::new(config()).unwrap();
        let (tx, _rx) = rt.channel::<u8>();
        assert_eq!(tx.capacity(), Capacity::Bounded(3));
    }

    #[test]
    fn copy_through_runtime() {
        let rt = Runtime::new(config()).unwrap();
        let buffer = rt.allocate(StorageLocation::Virtual(0), 16).unwrap();
        buffer.write_slice(&[1u32, 2, 3, 4]).unwrap();

        let mut out = vec![0u32; 4];
        {
            let dev = buffer.view(0, &[2, 2], &[1, 2], 4).unwrap();
            let host = View::from_slice_mut(&mut out, &[2, 2]).unwrap();
            rt.copy(&dev, &host).unwrap();
        }
        assert_eq!(out, vec![1, 3, 2, 4]);
    }
}
