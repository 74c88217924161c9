//! Page identifiers and chain-page framing for BasaltDB storage.

use serde::{Deserialize, Serialize};

/// Default page size in bytes (4 KB).
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Smallest page size the store accepts. A chain page must fit its 12-byte
/// header plus at least some payload.
pub const MIN_PAGE_SIZE: usize = 64;

/// Unique identifier for a page within the data file.
///
/// Page ids index fixed-size pages from the start of the file. Page 0 holds
/// the store metadata and never appears in a chain or on the free list; the
/// value 0 therefore doubles as the null link in chain and free-list
/// next-pointers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct PageId(pub u64);

impl PageId {
    /// The metadata page.
    pub const META: PageId = PageId(0);

    /// Null link terminating a chain or an empty free list.
    pub const NULL: PageId = PageId(0);

    /// Returns true if this id is the null link.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Byte offset of this page for a given page size.
    pub fn offset(&self, page_size: usize) -> u64 {
        self.0 * page_size as u64
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Header at the start of every chain page.
///
/// Layout (12 bytes):
/// - next: 8 bytes (page id of the next chain page, 0 terminates)
/// - len: 4 bytes (payload bytes stored in this page)
///
/// Payload follows immediately after the header. Pages on the free list
/// reuse the first 8 bytes as the next-free link and ignore the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHeader {
    /// Next page in the chain (null terminates).
    pub next: PageId,
    /// Number of payload bytes in this page.
    pub len: u32,
}

impl ChainHeader {
    /// Size of the chain header in bytes.
    pub const SIZE: usize = 12;

    /// Maximum payload bytes a chain page can carry.
    pub fn max_payload(page_size: usize) -> usize {
        page_size - Self::SIZE
    }

    /// Serializes the header to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(&self.next.0.to_le_bytes());
        buf[8..12].copy_from_slice(&self.len.to_le_bytes());
        buf
    }

    /// Deserializes the header from the start of a page.
    pub fn from_bytes(buf: &[u8]) -> Self {
        let next = u64::from_le_bytes([
            buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
        ]);
        let len = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        Self {
            next: PageId(next),
            len,
        }
    }
}
