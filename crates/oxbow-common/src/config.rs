//! Configuration structures for OxbowDB.

use crate::error::{OxbowError, Result};
use crate::page::PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage configuration for the database engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for data files.
    pub data_dir: PathBuf,
    /// Page size in bytes.
    pub page_size: usize,
    /// Buffer pool size in number of pages.
    pub pool_pages: usize,
    /// Enable fsync for durability.
    pub fsync_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            page_size: PAGE_SIZE,
            pool_pages: 1024, // 16 MB with 16 KB pages
            fsync_enabled: true,
        }
    }
}

impl StorageConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.pool_pages == 0 {
            return Err(OxbowError::InvalidParameter {
                name: "pool_pages".to_string(),
                value: "0".to_string(),
            });
        }
        if self.page_size != PAGE_SIZE {
            return Err(OxbowError::InvalidParameter {
                name: "page_size".to_string(),
                value: self.page_size.to_string(),
            });
        }
        Ok(())
    }
}
