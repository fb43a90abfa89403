use crate::error::{Result, RuntimeError};

use super::StorageLocation;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HostPtr(pub *mut u8);
unsafe impl Send for HostPtr {}
unsafe impl Sync for HostPtr {}

/// Start of a byte range in the address space of one storage location.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Address {
    Host(HostPtr),
    /// Offset into a backend allocation, `handle` is only meaningful to that backend
    Device { handle: u64, offset: usize },
}

impl Address {
    pub fn host(ptr: *mut u8) -> Self {
        Address::Host(HostPtr(ptr))
    }

    pub fn add(self, bytes: usize) -> Self {
        match self {
            Address::Host(ptr) => Address::Host(HostPtr(ptr.0.wrapping_add(bytes))),
            Address::Device { handle, offset } => Address::Device {
                handle,
                offset: offset + bytes,
            },
        }
    }
}

/// The allocation a view points into: base address, length in bytes and location.
///
/// A region does not own anything. Whoever handed it out must keep the memory
/// alive for as long as any view built on it is in use.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    location: StorageLocation,
    base: Address,
    len: usize,
}

impl Region {
    /// Wraps externally owned host memory.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` bytes for as long as the
    /// region or any view derived from it is used.
    pub unsafe fn from_host_ptr(
        ptr: *mut u8,
        len: usize,
        location: StorageLocation,
    ) -> Result<Self> {
        if !location.is_host_accessible() {
            return Err(RuntimeError::UnsupportedLocation {
                location,
                operation: "wrapping a host pointer",
            });
        }
        Ok(Self {
            location,
            base: Address::host(ptr),
            len,
        })
    }

    pub(crate) fn new(location: StorageLocation, base: Address, len: usize) -> Self {
        Self {
            location,
            base,
            len,
        }
    }

    pub fn location(&self) -> StorageLocation {
        self.location
    }

    pub fn base(&self) -> Address {
        self.base
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn at(&self, byte_offset: usize) -> Address {
        self.base.add(byte_offset)
    }

    /// Host pointer to the first byte, `None` for device regions.
    pub fn host_ptr(&self) -> Option<*mut u8> {
        match self.base {
            Address::Host(ptr) => Some(ptr.0),
            Address::Device { .. } => None,
        }
    }
}
