use crate::copy::TransferPolicy;
use crate::error::{Result, RuntimeError};
use crate::os;
use crate::storage::StorageLocation;
use crate::stream::Capacity;

pub const ENV_DEFAULT_STORAGE: &str = "FLOWRT_DEFAULT_STORAGE";
pub const ENV_CHANNEL_CAPACITY: &str = "FLOWRT_CHANNEL_CAPACITY";
pub const ENV_WORKERS: &str = "FLOWRT_WORKERS";
pub const ENV_VIRTUAL_DEVICES: &str = "FLOWRT_VIRTUAL_DEVICES";
pub const ENV_VULKAN: &str = "FLOWRT_VULKAN";
pub const ENV_TREPS: &str = "FLOWRT_TREPS";

const DEFAULT_CHANNEL_CAPACITY: usize = 64;
const MAX_DEFAULT_WORKERS: usize = 8;

pub struct RuntimeConfig {
    pub default_location: StorageLocation,
    pub channel_capacity: Capacity,
    pub transfer_workers: usize,
    pub virtual_devices: u32,
    pub enable_vulkan: bool,
    pub transfer_policy: TransferPolicy,
    pub timing_reps: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_location: StorageLocation::Host,
            channel_capacity: Capacity::Bounded(DEFAULT_CHANNEL_CAPACITY),
            transfer_workers: os::cpu_count().clamp(1, MAX_DEFAULT_WORKERS),
            virtual_devices: 1,
            enable_vulkan: true,
            transfer_policy: TransferPolicy::default(),
            timing_reps: 1,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by whichever `FLOWRT_*` variables are set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(location) = os::env_parse::<StorageLocation>(ENV_DEFAULT_STORAGE)? {
            config.default_location = location;
        }
        if let Some(capacity) = os::env_parse::<Capacity>(ENV_CHANNEL_CAPACITY)? {
            config.channel_capacity = capacity;
        }
        if let Some(workers) = os::env_parse::<usize>(ENV_WORKERS)? {
            config.transfer_workers = workers;
        }
        if let Some(devices) = os::env_parse::<u32>(ENV_VIRTUAL_DEVICES)? {
            config.virtual_devices = devices;
        }
        if let Some(enable) = os::env_bool(ENV_VULKAN)? {
            config.enable_vulkan = enable;
        }
        if let Some(reps) = os::env_parse::<usize>(ENV_TREPS)? {
            config.timing_reps = reps;
        }

        config.build()
    }

    pub fn build(self) -> Result<Self> {
        if self.transfer_workers == 0 {
            return Err(RuntimeError::Config(
                "transfer_workers must be at least 1".to_string(),
            ));
        }

        if self.timing_reps == 0 {
            return Err(RuntimeError::Config(
                "timing_reps must be at least 1".to_string(),
            ));
        }

        if let StorageLocation::Virtual(idx) = self.default_location {
            if idx >= self.virtual_devices {
                return Err(RuntimeError::Config(format!(
                    "default location {} needs at least {} virtual devices, {} configured",
                    self.default_location,
                    idx + 1,
                    self.virtual_devices
                )));
            }
        }

        if let StorageLocation::Gpu(_) = self.default_location {
            if !self.enable_vulkan {
                return Err(RuntimeError::Config(format!(
                    "default location {} requires Vulkan to be enabled",
                    self.default_location
                )));
            }
        }

        Ok(self)
    }
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("default_location", &format_args!("{}", self.default_location))
            .field("channel_capacity", &format_args!("{}", self.channel_capacity))
            .field("transfer_workers", &self.transfer_workers)
            .field("virtual_devices", &self.virtual_devices)
            .field("enable_vulkan", &self.enable_vulkan)
            .field("timing_reps", &self.timing_reps)
            .finish()
    }
}
