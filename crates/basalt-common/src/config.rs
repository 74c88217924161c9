//! Configuration structures for BasaltDB.

use crate::error::{BasaltError, Result};
use crate::page::{DEFAULT_PAGE_SIZE, MIN_PAGE_SIZE};
use serde::{Deserialize, Serialize};

/// Default capacity of the page cache, in pages.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Configuration for a paged store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bytes per page. Fixed for the lifetime of a database file.
    pub page_size: usize,
    /// Upper bound on resident non-meta pages in the cache (0 disables it).
    pub cache_capacity: usize,
    /// Enable fsync for durability. Tests may disable for speed; all
    /// crash-consistency guarantees assume this is on.
    pub fsync_enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            fsync_enabled: true,
        }
    }
}

impl StoreConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(BasaltError::Config(format!(
                "page_size must be at least {} bytes, got {}",
                MIN_PAGE_SIZE, self.page_size
            )));
        }
        Ok(())
    }
}
