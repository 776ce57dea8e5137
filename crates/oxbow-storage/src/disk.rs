//! Disk manager for page-level file I/O.

use oxbow_buffer::DiskManager;
use oxbow_common::config::StorageConfig;
use oxbow_common::page::{PageId, PAGE_SIZE};
use oxbow_common::{OxbowError, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Name of the data file inside the data directory.
const DATA_FILE: &str = "oxbow.db";

/// Configuration for the disk manager.
#[derive(Debug, Clone)]
pub struct DiskManagerConfig {
    /// Base directory for the data file.
    pub data_dir: PathBuf,
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
}

impl Default for DiskManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            fsync_enabled: true,
        }
    }
}

impl From<&StorageConfig> for DiskManagerConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            fsync_enabled: config.fsync_enabled,
        }
    }
}

/// File-backed page store.
///
/// Pages live in one data file at `page_id * PAGE_SIZE`. Partitioned pools
/// produce strided ids, so the file may be sparse; a page between two
/// written ids reads back as zeroes once the file has grown past it, while
/// a page beyond the end of the file is an error.
pub struct FileDiskManager {
    /// Configuration.
    config: DiskManagerConfig,
    /// Open data file and its page count.
    state: Mutex<FileState>,
}

struct FileState {
    /// The data file handle.
    file: File,
    /// Number of pages the file spans.
    num_pages: u64,
}

impl FileDiskManager {
    /// Opens (or creates) the data file under the configured directory.
    pub fn new(config: DiskManagerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let path = config.data_dir.join(DATA_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let num_pages = file_size / PAGE_SIZE as u64;

        Ok(Self {
            config,
            state: Mutex::new(FileState { file, num_pages }),
        })
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Returns the number of pages the data file currently spans.
    pub fn num_pages(&self) -> u64 {
        self.state.lock().num_pages
    }

    /// Flushes all pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        self.state.lock().file.sync_all()?;
        Ok(())
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let mut state = self.state.lock();

        if page_id.0 >= state.num_pages {
            return Err(OxbowError::PageNotFound { page_id });
        }

        let offset = page_id.0 * PAGE_SIZE as u64;
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.read_exact(buf)?;
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut state = self.state.lock();

        let offset = page_id.0 * PAGE_SIZE as u64;
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(data)?;

        if self.config.fsync_enabled {
            state.file.sync_all()?;
        }

        // Track growth when the write extended the file.
        if page_id.0 >= state.num_pages {
            state.num_pages = page_id.0 + 1;
        }
        Ok(())
    }
}

impl Drop for FileDiskManager {
    fn drop(&mut self) {
        let _ = self.state.lock().file.sync_all();
    }
}
