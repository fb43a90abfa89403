use std::fmt;
use std::str::FromStr;

use crate::error::RuntimeError;

/// Where a buffer's bytes physically live. Fixed for the lifetime of the allocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StorageLocation {
    /// Pageable CPU heap
    #[default]
    Host,
    /// Page-locked host memory shared with an FPGA or DMA engine
    Pinned,
    /// Vulkan physical device
    Gpu(u32),
    /// Host-resident emulated device
    Virtual(u32),
}

/// A `StorageLocation` without its device index, used to key per-pair policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LocationKind {
    Host,
    Pinned,
    Gpu,
    Virtual,
}

impl LocationKind {
    pub fn all() -> Vec<LocationKind> {
        vec![
            LocationKind::Host,
            LocationKind::Pinned,
            LocationKind::Gpu,
            LocationKind::Virtual,
        ]
    }

    pub fn is_host_accessible(self) -> bool {
        matches!(self, LocationKind::Host | LocationKind::Pinned)
    }
}

impl StorageLocation {
    pub fn kind(self) -> LocationKind {
        match self {
            StorageLocation::Host => LocationKind::Host,
            StorageLocation::Pinned => LocationKind::Pinned,
            StorageLocation::Gpu(_) => LocationKind::Gpu,
            StorageLocation::Virtual(_) => LocationKind::Virtual,
        }
    }

    /// True when the CPU can dereference addresses in this location directly.
    pub fn is_host_accessible(self) -> bool {
        self.kind().is_host_accessible()
    }

    pub fn device_index(self) -> Option<u32> {
        match self {
            StorageLocation::Gpu(idx) | StorageLocation::Virtual(idx) => Some(idx),
            StorageLocation::Host | StorageLocation::Pinned => None,
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLocation::Host => write!(f, "host"),
            StorageLocation::Pinned => write!(f, "pinned"),
            StorageLocation::Gpu(idx) => write!(f, "gpu:{}", idx),
            StorageLocation::Virtual(idx) => write!(f, "virtual:{}", idx),
        }
    }
}

impl FromStr for StorageLocation {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (name, index) = match lower.split_once(':') {
            Some((name, index)) => (name, Some(index)),
            None => (lower.as_str(), None),
        };

        let parse_index = |index: Option<&str>| -> Result<u32, RuntimeError> {
            index
                .unwrap_or("0")
                .parse::<u32>()
                .map_err(|_| RuntimeError::Config(format!("Invalid device index in '{}'", s)))
        };

        match name {
            "host" | "cpu" if index.is_none() => Ok(StorageLocation::Host),
            "pinned" | "fpga" if index.is_none() => Ok(StorageLocation::Pinned),
            "gpu" => Ok(StorageLocation::Gpu(parse_index(index)?)),
            "virtual" => Ok(StorageLocation::Virtual(parse_index(index)?)),
            _ => Err(RuntimeError::Config(format!(
                "Unknown storage location '{}'",
                s
            ))),
        }
    }
}
