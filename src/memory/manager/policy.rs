/*!
 * Allocation Policy
 * The four allocation verbs composed from index and source operations
 */

use super::TreeAllocator;
use crate::core::types::{Address, Size, NULL_ADDRESS};
use crate::memory::types::{MemoryError, MemoryResult};
use crate::source::{copy_region, zero_region, MemorySource};
use log::{error, info, warn};

impl<S: MemorySource> TreeAllocator<S> {
    /// Allocate `size` bytes.
    ///
    /// Best-fit reuse is tried first; only on a miss does the raw memory
    /// source get involved. A zero-size request yields the null handle
    /// without touching index or source, consistently with `release`
    /// ignoring it.
    pub fn allocate(&self, size: Size) -> MemoryResult<Address> {
        if size == 0 {
            return Ok(NULL_ADDRESS);
        }

        // Bind the scan result so the guard drops before any source call.
        let reused = self.index().lock().find_best_fit(size);
        if let Some(address) = reused {
            info!("Reused block at 0x{:x} for {} byte request", address, size);
            return Ok(address);
        }

        // Index miss: reserve fresh memory. The index guard is not held
        // across this call.
        let address = match self.guarded_source().lock().reserve(size) {
            Ok(address) => address,
            Err(err) => {
                error!("Source could not reserve {} bytes: {}", size, err);
                return Err(err);
            }
        };

        let mut index = self.index().lock();
        debug_assert!(
            index.locate(address).is_none(),
            "source handed out a tracked address"
        );
        index.insert(address, size)?;
        info!("Allocated {} bytes at 0x{:x}", size, address);
        Ok(address)
    }

    /// Resize the block at `address` to `new_size` bytes, relocating it
    /// when it cannot grow in place.
    ///
    /// Any size that fits the existing reservation updates the stored
    /// size and keeps the address; the source is never consulted. Past
    /// the reservation, best-fit among the other tracked records is tried
    /// first (the old block is live, so the scan cannot return it),
    /// copying the old contents over and retaining the old block for
    /// reuse. On a miss the source resizes the region, which may relocate
    /// it. The old record is removed before that call: the source may
    /// re-issue the old address the moment the region is released, and
    /// the index must not still be tracking it when that happens. If the
    /// source fails, the record is put back intact and the original block
    /// stays valid.
    pub fn resize(&self, address: Address, new_size: Size) -> MemoryResult<Address> {
        if address == NULL_ADDRESS {
            return self.allocate(new_size);
        }
        if new_size == 0 {
            self.release(address)?;
            return Ok(NULL_ADDRESS);
        }

        let located = self.index().lock().locate(address);
        let record = match located {
            Some(record) if !record.free => record,
            // Untracked or already released: treat as a fresh allocation.
            _ => return self.allocate(new_size),
        };

        if new_size <= record.reserved {
            self.index().lock().resize_record(address, new_size)?;
            info!(
                "Resized block at 0x{:x} to {} bytes in place",
                address, new_size
            );
            return Ok(address);
        }

        let reused = self.index().lock().find_best_fit(new_size);
        if let Some(new_address) = reused {
            unsafe {
                copy_region(address, new_address, record.size.min(new_size));
            }
            self.index().lock().mark_free(address)?;
            info!(
                "Moved block 0x{:x} into reused block 0x{:x} ({} -> {} bytes)",
                address, new_address, record.size, new_size
            );
            return Ok(new_address);
        }

        // Untrack the record first. Sources may re-issue the old address
        // to a concurrent reservation as soon as resize releases it.
        let removed = self.index().lock().remove(address)?;
        let resized = self
            .guarded_source()
            .lock()
            .resize(address, removed.reserved, new_size);
        let new_address = match resized {
            Ok(new_address) => new_address,
            Err(err) => {
                error!(
                    "Source could not resize block 0x{:x} to {} bytes: {}",
                    address, new_size, err
                );
                // The region was not touched; the record goes back as it
                // was, reservation included.
                self.index().lock().insert_record(removed)?;
                return Err(err);
            }
        };

        self.index().lock().insert(new_address, new_size)?;
        info!(
            "Resized block 0x{:x} to {} bytes at 0x{:x}",
            address, new_size, new_address
        );
        Ok(new_address)
    }

    /// Allocate a zero-filled region of `count` elements of `size` bytes.
    pub fn allocate_zeroed(&self, count: Size, size: Size) -> MemoryResult<Address> {
        let total = count
            .checked_mul(size)
            .ok_or(MemoryError::SizeOverflow { count, size })?;

        let address = self.allocate(total)?;
        if address != NULL_ADDRESS {
            unsafe {
                zero_region(address, total);
            }
        }
        Ok(address)
    }

    /// Return the block at `address` to the reuse pool.
    ///
    /// The record stays in the index with `free = true` so a later
    /// allocation can claim it by best fit. Releasing the null handle is
    /// a no-op; releasing an untracked or already-free address reports
    /// NotFound.
    pub fn release(&self, address: Address) -> MemoryResult<()> {
        if address == NULL_ADDRESS {
            return Ok(());
        }

        let mut index = self.index().lock();
        match index.locate(address) {
            Some(record) if record.free => {
                warn!("Release of already-free block at 0x{:x}", address);
                Err(MemoryError::NotFound(address))
            }
            Some(record) => {
                index.mark_free(address)?;
                info!(
                    "Released {} bytes at 0x{:x} into the reuse pool",
                    record.size, address
                );
                Ok(())
            }
            None => {
                warn!("Release of untracked address 0x{:x}", address);
                Err(MemoryError::NotFound(address))
            }
        }
    }
}
