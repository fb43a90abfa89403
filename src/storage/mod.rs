mod buffer;
mod host;
mod location;
mod region;

pub use buffer::Buffer;
pub(crate) use host::HostAllocation;
pub use location::{LocationKind, StorageLocation};
pub use region::{Address, HostPtr, Region};
