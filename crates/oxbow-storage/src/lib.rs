//! Durable backing store for OxbowDB.
//!
//! This crate provides the file-backed disk manager that the buffer pool
//! writes through: page-granular I/O against a single data file, with
//! configurable fsync behavior.

mod disk;

pub use disk::{DiskManagerConfig, FileDiskManager};
