//! flowrt - runtime support for generated dataflow array code
//!
//! Strided views over memory in any storage location, an N-dimensional copy
//! engine that moves them between host, Vulkan and emulated devices, and
//! bounded stream channels connecting pipeline stages.

pub mod config;

pub mod copy;

pub mod error;

pub mod interop;

pub mod logging;

pub mod math;

pub mod os;

mod runtime;

pub mod storage;

pub mod stream;

mod thread_pool;

pub mod view;

pub use config::RuntimeConfig;
pub use copy::{CopyDescriptor, CopyEngine, TransferPolicy, TransferScope};
pub use error::{Result, RuntimeError};
pub use interop::{CompletionToken, DeviceInterop, HostArray, HostElement, TransferMode};
pub use math::{IndexSpace, Range, Reducible, ReductionType};
pub use runtime::Runtime;
pub use storage::{Buffer, LocationKind, StorageLocation};
pub use stream::{Capacity, StreamChannel, StreamConsumer, StreamProducer, channel};
pub use view::View;
