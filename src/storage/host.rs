use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Zero-initialised, aligned heap block owned by a buffer or an emulated device.
pub(crate) struct HostAllocation {
    ptr: NonNull<u8>,
    layout: Layout,
    len: usize,
    locked: bool,
}

// The block is plain bytes, access is synchronised by whoever holds views on it.
unsafe impl Send for HostAllocation {}
unsafe impl Sync for HostAllocation {}

impl HostAllocation {
    pub fn zeroed(len: usize, align: usize) -> Result<Self, String> {
        // zero-sized layouts are not allowed by the global allocator
        let layout = Layout::from_size_align(len.max(1), align)
            .map_err(|e| format!("invalid layout for {} bytes: {}", len, e))?;

        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or_else(|| "host allocator returned null".to_string())?;

        Ok(Self {
            ptr,
            layout,
            len,
            locked: false,
        })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn align(&self) -> usize {
        self.layout.align()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Page-locks the block so DMA engines can address it.
    pub fn lock(&mut self) -> Result<(), String> {
        if self.locked || self.len == 0 {
            return Ok(());
        }
        let rc = unsafe { libc::mlock(self.ptr.as_ptr() as *const libc::c_void, self.len) };
        if rc != 0 {
            return Err(format!(
                "mlock of {} bytes failed: {}",
                self.len,
                std::io::Error::last_os_error()
            ));
        }
        self.locked = true;
        Ok(())
    }
}

impl Drop for HostAllocation {
    fn drop(&mut self) {
        unsafe {
            if self.locked {
                libc::munlock(self.ptr.as_ptr() as *const libc::c_void, self.len);
            }
            alloc::dealloc(self.ptr.as_ptr(), self.layout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_zeroed_and_aligned() {
        let a = HostAllocation::zeroed(100, 4096).unwrap();
        assert_eq!(a.as_ptr() as usize % 4096, 0);
        assert_eq!(a.len(), 100);
        let bytes = unsafe { std::slice::from_raw_parts(a.as_ptr(), a.len()) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn empty_allocation_is_valid() {
        let a = HostAllocation::zeroed(0, 64).unwrap();
        assert_eq!(a.len(), 0);
        assert_eq!(a.align(), 64);
    }

    #[test]
    fn bad_alignment_is_rejected() {
        assert!(HostAllocation::zeroed(16, 3).is_err());
    }
}
