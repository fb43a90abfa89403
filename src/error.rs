use thiserror::Error;

use crate::math::reduction::ReductionType;
use crate::storage::{Address, StorageLocation};

pub type Result<T> = std::result::Result<T, RuntimeError>;

// Nothing in this layer retries. Every variant goes straight back to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Rank mismatch: expected {expected}, got {actual}")]
    RankMismatch { expected: usize, actual: usize },

    #[error("Shape mismatch: source {src:?}, destination {dst:?}")]
    ShapeMismatch { src: Vec<usize>, dst: Vec<usize> },

    #[error("Element size mismatch: source {src} bytes, destination {dst} bytes")]
    ElementSizeMismatch { src: usize, dst: usize },

    #[error("Layout is not contiguous: {0}")]
    NotContiguous(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("End of stream")]
    EndOfStream,

    #[error(
        "Device transfer failed: {len} bytes from {src:?} ({src_location}) to {dst:?} ({dst_location}): {reason}"
    )]
    DeviceTransferFailure {
        src: Address,
        dst: Address,
        src_location: StorageLocation,
        dst_location: StorageLocation,
        len: usize,
        reason: String,
    },

    #[error("Allocation of {bytes} bytes on {location} failed: {reason}")]
    Allocation {
        location: StorageLocation,
        bytes: usize,
        reason: String,
    },

    #[error("Unsupported storage location {location} for {operation}")]
    UnsupportedLocation {
        location: StorageLocation,
        operation: &'static str,
    },

    #[error("Reduction {op:?} is not defined for {type_name}")]
    UnsupportedReduction {
        op: ReductionType,
        type_name: &'static str,
    },

    #[error("Transfer worker panicked: {0}")]
    WorkerPanic(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Vulkan error: {0}")]
    Vulkan(String),
}

impl From<vulkanalia::vk::Result> for RuntimeError {
    fn from(r: vulkanalia::vk::Result) -> Self {
        RuntimeError::Vulkan(format!("vk::Result: {:?}", r))
    }
}

impl From<vulkanalia::vk::ErrorCode> for RuntimeError {
    fn from(c: vulkanalia::vk::ErrorCode) -> Self {
        RuntimeError::Vulkan(format!("vk::ErrorCode: {:?}", c))
    }
}
