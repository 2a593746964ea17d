/*!
 * Reclaim Operations
 * Returning tracked memory to the raw source
 */

use super::TreeAllocator;
use crate::core::types::Size;
use crate::index::BlockRecord;
use crate::source::MemorySource;
use log::info;

impl<S: MemorySource> TreeAllocator<S> {
    /// Purge every free record from the index and return its region to
    /// the source. Returns the number of bytes released.
    ///
    /// This drains the reuse pool, so it is never run automatically; it
    /// exists for callers that want memory back under pressure.
    pub fn trim(&self) -> Size {
        let purged: Vec<BlockRecord> = {
            let mut index = self.index().lock();
            let free: Vec<_> = index
                .snapshot()
                .into_iter()
                .filter(|block| block.free)
                .collect();
            free.iter()
                .filter_map(|block| index.remove(block.address).ok())
                .collect()
        };

        let bytes: Size = purged.iter().map(|record| record.reserved).sum();
        if !purged.is_empty() {
            let mut source = self.guarded_source().lock();
            for record in &purged {
                source.release(record.address, record.reserved);
            }
            info!(
                "Trim returned {} free blocks ({} bytes) to the source",
                purged.len(),
                bytes
            );
        }
        bytes
    }

    /// Release everything the index tracks, live blocks included, and
    /// reset it to empty. Shutdown only: live addresses are invalid
    /// afterwards.
    pub fn cleanup(&self) {
        let records = self.index().lock().drain_records();
        if records.is_empty() {
            return;
        }

        let bytes: Size = records.iter().map(|record| record.reserved).sum();
        let mut source = self.guarded_source().lock();
        for record in &records {
            source.release(record.address, record.reserved);
        }
        info!(
            "Cleanup released {} tracked blocks ({} bytes)",
            records.len(),
            bytes
        );
    }
}
