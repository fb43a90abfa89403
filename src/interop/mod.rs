mod backend;
mod completion;
pub mod host_array;

use std::sync::Arc;

pub use completion::{CompletionToken, wait_all};
pub use host_array::{HostArray, HostElement};

pub(crate) use backend::{Allocated, Backends};

use crate::error::Result;
use crate::storage::{Address, LocationKind, StorageLocation};
use crate::thread_pool::{Job, TransferPool};

/// Whether a transfer completes before the call returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransferMode {
    Blocking,
    /// Queued on the transfer pool, completion is signalled through a token
    Deferred,
}

/// Entry point for every byte that crosses a storage domain.
pub struct DeviceInterop {
    backends: Arc<Backends>,
    pool: TransferPool,
}

impl DeviceInterop {
    pub fn new(enable_vulkan: bool, virtual_devices: u32, workers: usize) -> Result<Self> {
        Ok(Self {
            backends: Arc::new(Backends::new(enable_vulkan, virtual_devices)),
            pool: TransferPool::new(workers)?,
        })
    }

    pub fn device_count(&self, kind: LocationKind) -> usize {
        self.backends.device_count(kind)
    }

    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    /// Moves `len` bytes exactly once.
    ///
    /// Blocking calls return `None` after the bytes have landed. Deferred calls
    /// return a token that becomes ready once they have.
    ///
    /// # Safety
    ///
    /// Host addresses must be valid for `len` bytes of reads (`src`) or writes
    /// (`dst`) and the two ranges must not overlap. Host and device addresses
    /// must stay valid until the bytes have landed, which for deferred calls
    /// means until the returned token is ready.
    ///
    /// ```compile_fail
    /// use flowrt::storage::Address;
    /// use flowrt::{DeviceInterop, StorageLocation, TransferMode};
    ///
    /// let interop = DeviceInterop::new(false, 0, 1).unwrap();
    /// let src = [0u8; 8];
    /// let _ = interop.transfer(
    ///     Address::host(src.as_ptr() as *mut u8),
    ///     Address::host(0x10 as *mut u8),
    ///     StorageLocation::Host,
    ///     StorageLocation::Host,
    ///     8,
    ///     TransferMode::Blocking,
    /// );
    /// ```
    pub unsafe fn transfer(
        &self,
        src: Address,
        dst: Address,
        src_location: StorageLocation,
        dst_location: StorageLocation,
        len: usize,
        mode: TransferMode,
    ) -> Result<Option<CompletionToken>> {
        tracing::trace!(%src_location, %dst_location, len, ?mode, "transfer");

        match mode {
            TransferMode::Blocking => {
                self.backends
                    .transfer(src, dst, src_location, dst_location, len)?;
                Ok(None)
            }
            TransferMode::Deferred => Ok(Some(self.submit(move |backends| {
                backends.transfer(src, dst, src_location, dst_location, len)
            }))),
        }
    }

    /// Runs `job` on the transfer pool.
    pub(crate) fn submit<F>(&self, job: F) -> CompletionToken
    where
        F: FnOnce(&Backends) -> Result<()> + Send + 'static,
    {
        let backends = self.backends.clone();
        self.pool.submit(Box::new(move || job(&backends)))
    }

    /// Queues several jobs at once, one token per job in order.
    pub(crate) fn submit_all<F>(&self, jobs: impl IntoIterator<Item = F>) -> Vec<CompletionToken>
    where
        F: FnOnce(&Backends) -> Result<()> + Send + 'static,
    {
        let jobs = jobs
            .into_iter()
            .map(|job| {
                let backends = self.backends.clone();
                Box::new(move || job(&backends)) as Job
            })
            .collect();
        self.pool.submit_batch(jobs)
    }

    pub(crate) fn allocate(&self, location: StorageLocation, len: usize) -> Result<Allocated> {
        self.backends.allocate(location, len)
    }

    pub(crate) fn release(&self, location: StorageLocation, handle: u64) {
        self.backends.release(location, handle)
    }
}

impl std::fmt::Debug for DeviceInterop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceInterop")
            .field("gpus", &self.device_count(LocationKind::Gpu))
            .field("virtual_devices", &self.device_count(LocationKind::Virtual))
            .field("workers", &self.pool.size())
            .finish()
    }
}
