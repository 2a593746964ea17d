/*!
 * Raw Memory Source
 *
 * The external collaborator that actually reserves and releases address
 * space. The core calls it only on an index miss, and never while holding
 * the index guard. Its address space is disjoint from the index's own
 * bookkeeping memory: tree nodes are ordinary heap values.
 */

use crate::core::types::{Address, Size};
use crate::memory::types::{MemoryError, MemoryResult};
use std::ptr;

/// Contract of the raw memory source.
///
/// Addresses are the region pointers as integers; zero is never handed
/// out. `resize` may relocate the region, in which case the old address
/// is dead once it returns.
pub trait MemorySource: Send {
    /// Reserve a region of `size` bytes.
    fn reserve(&mut self, size: Size) -> MemoryResult<Address>;

    /// Return the region starting at `address`. `size` must be the length
    /// the region was reserved with, never a shrunk user-visible size.
    fn release(&mut self, address: Address, size: Size);

    /// Resize a region, relocating it if necessary. `old_size` is the
    /// length the existing region was reserved with. The provided
    /// implementation reserves a new region, copies the surviving bytes,
    /// and releases the old one at its full length.
    fn resize(
        &mut self,
        address: Address,
        old_size: Size,
        new_size: Size,
    ) -> MemoryResult<Address> {
        let new_address = self.reserve(new_size)?;
        unsafe {
            copy_region(address, new_address, old_size.min(new_size));
        }
        self.release(address, old_size);
        Ok(new_address)
    }
}

/// Copy `len` bytes between two live, non-overlapping regions.
///
/// # Safety
///
/// Both addresses must come from a [`MemorySource`] reservation of at
/// least `len` bytes that has not been released.
pub(crate) unsafe fn copy_region(src: Address, dst: Address, len: Size) {
    unsafe {
        ptr::copy_nonoverlapping(src as *const u8, dst as *mut u8, len);
    }
}

/// Zero-fill `len` bytes of a live region.
///
/// # Safety
///
/// `address` must come from a [`MemorySource`] reservation of at least
/// `len` bytes that has not been released.
pub(crate) unsafe fn zero_region(address: Address, len: Size) {
    unsafe {
        ptr::write_bytes(address as *mut u8, 0, len);
    }
}

/// Memory source backed by the operating system's virtual memory calls.
pub struct SystemSource;

impl SystemSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Abstraction over the syscalls each platform offers for requesting and
/// returning whole memory regions.
trait PlatformMemory {
    /// Request a region where `len` bytes can be written safely, or None
    /// if the underlying call fails.
    unsafe fn request_memory(len: usize) -> Option<*mut u8>;

    /// Return the region of `len` bytes starting at `addr`.
    unsafe fn return_memory(addr: *mut u8, len: usize);
}

impl MemorySource for SystemSource {
    fn reserve(&mut self, size: Size) -> MemoryResult<Address> {
        match unsafe { Self::request_memory(size) } {
            Some(addr) => Ok(addr as Address),
            None => Err(MemoryError::SourceExhausted { requested: size }),
        }
    }

    fn release(&mut self, address: Address, size: Size) {
        unsafe {
            Self::return_memory(address as *mut u8, size);
        }
    }
}

#[cfg(unix)]
mod unix {
    use super::{PlatformMemory, SystemSource};

    use libc::{mmap, munmap, off_t, size_t};
    use std::os::raw::{c_int, c_void};

    impl PlatformMemory for SystemSource {
        unsafe fn request_memory(len: usize) -> Option<*mut u8> {
            // mmap parameters: anonymous read-write mapping anywhere.
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            unsafe {
                let addr = mmap(ADDR, len as size_t, PROT, FLAGS, FD, OFFSET);
                if addr == libc::MAP_FAILED {
                    None
                } else {
                    Some(addr.cast::<u8>())
                }
            }
        }

        unsafe fn return_memory(addr: *mut u8, len: usize) {
            unsafe {
                munmap(addr as *mut c_void, len as size_t);
            }
        }
    }
}

#[cfg(windows)]
mod windows {
    use super::{PlatformMemory, SystemSource};

    use std::os::raw::c_void;
    use windows::Win32::System::Memory;

    impl PlatformMemory for SystemSource {
        unsafe fn request_memory(len: usize) -> Option<*mut u8> {
            let protection = Memory::PAGE_READWRITE;
            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            unsafe {
                let addr = Memory::VirtualAlloc(None, len, flags, protection);
                if addr.is_null() {
                    None
                } else {
                    Some(addr.cast::<u8>())
                }
            }
        }

        unsafe fn return_memory(addr: *mut u8, _len: usize) {
            unsafe {
                let _ = Memory::VirtualFree(addr as *mut c_void, 0, Memory::MEM_RELEASE);
            }
        }
    }
}
