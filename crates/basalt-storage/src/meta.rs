//! Store metadata and its page-0 encoding.

use basalt_common::{BasaltError, PageId, Result, TableId};
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Magic bytes at the start of the meta page.
const META_MAGIC: &[u8; 8] = b"BSLTMETA";

/// Current meta format version.
const META_VERSION: u32 = 1;

/// Fixed header in front of the encoded payload:
/// magic (8) + version (4) + page_size (4) + payload_len (4) + crc32 (4).
const META_HDR_SIZE: usize = 24;

/// Logical metadata stored on page 0.
///
/// All truth about the store lives here: the table registry, the id
/// allocator, each table's chain head, and the free-list head. `BTreeMap`
/// keeps iteration (and therefore the encoding) deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Table name -> table id.
    pub tables: BTreeMap<String, TableId>,
    /// Monotonically increasing id allocator; the next table gets
    /// `next_table_id + 1`.
    pub next_table_id: u64,
    /// Table id -> head page of its blob chain. Absent means no blob.
    pub table_head: BTreeMap<TableId, PageId>,
    /// Head page of the free list (null means empty).
    pub free_list: PageId,
}

impl Meta {
    /// Creates empty metadata for a fresh store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the chain head for a table id, if it has a blob.
    pub fn head(&self, table_id: TableId) -> Option<PageId> {
        self.table_head
            .get(&table_id)
            .copied()
            .filter(|head| !head.is_null())
    }

    /// Serializes the metadata into a full page image.
    ///
    /// Fails with `Corruption` if the encoding does not fit in one page;
    /// metadata must always fit on page 0.
    pub fn encode(&self, page_size: usize) -> Result<Vec<u8>> {
        let mut payload = BytesMut::new();
        payload.put_u64_le(self.next_table_id);
        payload.put_u64_le(self.free_list.0);

        payload.put_u32_le(self.tables.len() as u32);
        for (name, id) in &self.tables {
            payload.put_u32_le(name.len() as u32);
            payload.put_slice(name.as_bytes());
            payload.put_u64_le(id.0);
        }

        payload.put_u32_le(self.table_head.len() as u32);
        for (id, head) in &self.table_head {
            payload.put_u64_le(id.0);
            payload.put_u64_le(head.0);
        }

        if META_HDR_SIZE + payload.len() > page_size {
            return Err(BasaltError::Corruption(format!(
                "metadata does not fit in page 0 ({} bytes for a {}-byte page)",
                META_HDR_SIZE + payload.len(),
                page_size
            )));
        }

        let mut page = vec![0u8; page_size];
        page[0..8].copy_from_slice(META_MAGIC);
        page[8..12].copy_from_slice(&META_VERSION.to_le_bytes());
        page[12..16].copy_from_slice(&(page_size as u32).to_le_bytes());
        page[16..20].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        page[20..24].copy_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        page[META_HDR_SIZE..META_HDR_SIZE + payload.len()].copy_from_slice(&payload);
        Ok(page)
    }

    /// Decodes metadata from a page-0 image.
    ///
    /// Returns the page size recorded at creation time along with the
    /// metadata, so the caller can verify it against its configuration.
    pub fn decode(page: &[u8]) -> Result<(usize, Meta)> {
        if page.len() < META_HDR_SIZE {
            return Err(BasaltError::Corruption(
                "meta page shorter than header".to_string(),
            ));
        }
        if &page[0..8] != META_MAGIC {
            return Err(BasaltError::Corruption("bad meta magic".to_string()));
        }

        let version = u32::from_le_bytes([page[8], page[9], page[10], page[11]]);
        if version != META_VERSION {
            return Err(BasaltError::Corruption(format!(
                "unsupported meta version {} (expected {})",
                version, META_VERSION
            )));
        }

        let page_size = u32::from_le_bytes([page[12], page[13], page[14], page[15]]) as usize;
        let payload_len = u32::from_le_bytes([page[16], page[17], page[18], page[19]]) as usize;
        let stored_crc = u32::from_le_bytes([page[20], page[21], page[22], page[23]]);

        if META_HDR_SIZE + payload_len > page.len() {
            return Err(BasaltError::Corruption(
                "meta payload length exceeds page".to_string(),
            ));
        }

        let payload = &page[META_HDR_SIZE..META_HDR_SIZE + payload_len];
        let computed_crc = crc32fast::hash(payload);
        if stored_crc != computed_crc {
            return Err(BasaltError::Corruption(format!(
                "meta checksum mismatch: stored={:08x}, computed={:08x}",
                stored_crc, computed_crc
            )));
        }

        let mut buf = payload;
        let need = |n: usize, buf: &[u8]| -> Result<()> {
            if buf.remaining() < n {
                Err(BasaltError::Corruption(
                    "meta payload truncated".to_string(),
                ))
            } else {
                Ok(())
            }
        };

        need(16, buf)?;
        let next_table_id = buf.get_u64_le();
        let free_list = PageId(buf.get_u64_le());

        need(4, buf)?;
        let table_count = buf.get_u32_le() as usize;
        let mut tables = BTreeMap::new();
        for _ in 0..table_count {
            need(4, buf)?;
            let name_len = buf.get_u32_le() as usize;
            need(name_len + 8, buf)?;
            let name = String::from_utf8(buf[..name_len].to_vec())
                .map_err(|_| BasaltError::Corruption("table name is not UTF-8".to_string()))?;
            buf.advance(name_len);
            let id = TableId(buf.get_u64_le());
            tables.insert(name, id);
        }

        need(4, buf)?;
        let head_count = buf.get_u32_le() as usize;
        let mut table_head = BTreeMap::new();
        for _ in 0..head_count {
            need(16, buf)?;
            let id = TableId(buf.get_u64_le());
            let head = PageId(buf.get_u64_le());
            table_head.insert(id, head);
        }

        Ok((
            page_size,
            Meta {
                tables,
                next_table_id,
                table_head,
                free_list,
            },
        ))
    }
}
