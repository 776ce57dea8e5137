//! Page identity for OxbowDB storage.

use serde::{Deserialize, Serialize};

/// Default page size in bytes (16 KB).
pub const PAGE_SIZE: usize = 16 * 1024;

/// Unique identifier for a logical page.
///
/// Page ids form a single flat integer space. Cooperating pool instances
/// partition the space by stride, so any id may be sparse within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub u64);

impl PageId {
    /// Sentinel meaning "no page".
    pub const INVALID: PageId = PageId(u64::MAX);

    /// Creates a new PageId.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns true if this id refers to an actual page.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Returns the raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_validity() {
        let valid = PageId(0);
        let invalid = PageId::INVALID;

        assert!(valid.is_valid());
        assert!(!invalid.is_valid());
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(PageId(42).to_string(), "42");
    }

    #[test]
    fn test_page_id_roundtrip() {
        let id = PageId::new(17);
        assert_eq!(id.as_u64(), 17);
        assert_eq!(PageId::new(id.as_u64()), id);
    }

    #[test]
    fn test_page_id_ordering() {
        assert!(PageId(1) < PageId(2));
        assert!(PageId(100) < PageId::INVALID);
    }
}
