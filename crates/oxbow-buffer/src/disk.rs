//! Collaborator interfaces consumed by the buffer pool.

use oxbow_common::page::{PageId, PAGE_SIZE};
use oxbow_common::{OxbowError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Backing store for page data.
///
/// Transfers are synchronous and always move exactly one page. A returned
/// `write_page` is the pool's only signal that the bytes are durable.
pub trait DiskManager: Send + Sync {
    /// Reads a page's bytes into the buffer.
    fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()>;

    /// Writes a page's bytes; durable on return.
    fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()>;
}

/// Write-ahead log collaborator.
///
/// The pool accepts and holds a log manager for recovery integration, but
/// no pool operation appends log records itself; log coordination lives
/// with the callers that modify page content.
pub trait LogManager: Send + Sync {
    /// Appends a record to the log, returning its sequence number.
    fn append(&self, record: &[u8]) -> Result<u64>;

    /// Forces buffered records to durable storage.
    fn flush(&self) -> Result<()>;
}

/// In-memory backing store for tests and benchmarks.
///
/// Reading a page that was never written is an error, matching a durable
/// store that has no record of the page.
#[derive(Default)]
pub struct MemDiskManager {
    pages: Mutex<HashMap<PageId, Box<[u8; PAGE_SIZE]>>>,
}

impl MemDiskManager {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pages ever written.
    pub fn page_count(&self) -> usize {
        self.pages.lock().len()
    }

    /// Returns true if the page has been written at least once.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.pages.lock().contains_key(&page_id)
    }
}

impl DiskManager for MemDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let pages = self.pages.lock();
        match pages.get(&page_id) {
            Some(data) => {
                buf.copy_from_slice(&**data);
                Ok(())
            }
            None => Err(OxbowError::PageNotFound { page_id }),
        }
    }

    fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut pages = self.pages.lock();
        match pages.get_mut(&page_id) {
            Some(existing) => existing.copy_from_slice(data),
            None => {
                pages.insert(page_id, Box::new(*data));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_disk_write_read() {
        let disk = MemDiskManager::new();
        let mut data = [0u8; PAGE_SIZE];
        data[0] = 0xAB;
        data[PAGE_SIZE - 1] = 0xCD;

        disk.write_page(PageId(3), &data).unwrap();

        let mut buf = [0u8; PAGE_SIZE];
        disk.read_page(PageId(3), &mut buf).unwrap();
        assert_eq!(buf[0], 0xAB);
        assert_eq!(buf[PAGE_SIZE - 1], 0xCD);
    }

    #[test]
    fn test_mem_disk_read_unwritten_page_fails() {
        let disk = MemDiskManager::new();
        let mut buf = [0u8; PAGE_SIZE];

        let result = disk.read_page(PageId(9), &mut buf);
        assert!(matches!(
            result,
            Err(OxbowError::PageNotFound {
                page_id: PageId(9)
            })
        ));
    }

    #[test]
    fn test_mem_disk_overwrite() {
        let disk = MemDiskManager::new();
        let mut data = [0u8; PAGE_SIZE];

        data[0] = 0xAA;
        disk.write_page(PageId(0), &data).unwrap();

        data[0] = 0xBB;
        disk.write_page(PageId(0), &data).unwrap();

        let mut buf = [0u8; PAGE_SIZE];
        disk.read_page(PageId(0), &mut buf).unwrap();
        assert_eq!(buf[0], 0xBB);
        assert_eq!(disk.page_count(), 1);
    }
}
