//! Error types for OxbowDB.

use crate::page::PageId;
use thiserror::Error;

/// Result type alias using OxbowError.
pub type Result<T> = std::result::Result<T, OxbowError>;

/// Errors that can occur in OxbowDB operations.
#[derive(Debug, Error)]
pub enum OxbowError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Backing store errors
    #[error("page {page_id} not found in backing store")]
    PageNotFound { page_id: PageId },

    // Buffer pool errors
    #[error("buffer pool exhausted: no free frame and no evictable page")]
    PoolExhausted,

    #[error("page {page_id} is not resident in the buffer pool")]
    PageNotResident { page_id: PageId },

    #[error("page {page_id} is pinned by another user")]
    PageInUse { page_id: PageId },

    #[error("page {page_id} has no outstanding pins")]
    PageNotPinned { page_id: PageId },

    // Configuration errors
    #[error("invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },
}
