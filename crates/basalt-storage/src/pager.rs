//! Paged file store with a free list, write-ahead log, and crash recovery.

use crate::cache::PageCache;
use crate::fault;
use crate::meta::Meta;
use basalt_common::{BasaltError, ChainHeader, PageId, Result, StoreConfig, TableId};
use basalt_wal::{WalReader, WalRecord, WalWriter};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Crash-consistent store of one variable-length blob per table id.
///
/// The data file is a flat sequence of fixed-size pages. Page 0 holds the
/// metadata image; every other page is either on the free list or part of
/// exactly one table's chain. Blob replacement is made atomic by a
/// write-ahead log in a sibling `<path>.wal` file: once the log record is
/// fsynced the operation is durable, and `open` replays whatever an
/// interrupted process left behind.
///
/// A single mutex serializes every public call and protects the data file,
/// the log, the metadata image, and the page cache as one unit.
#[derive(Debug)]
pub struct PagedStore {
    /// Path of the data file.
    path: PathBuf,
    /// Everything the mutex protects.
    inner: Mutex<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    /// The data file.
    file: File,
    /// Append handle for the sibling WAL file.
    wal: WalWriter,
    /// In-memory image of page 0.
    meta: Meta,
    /// LRU cache over non-meta pages.
    cache: PageCache,
    /// Store configuration, fixed at open.
    config: StoreConfig,
    /// One-shot crash point armed by recovery tests.
    crash_point: Option<String>,
}

/// Derives the WAL path for a data file path.
fn wal_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".wal");
    PathBuf::from(os)
}

impl PagedStore {
    /// Opens or creates the store at `path` with default configuration.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens or creates the store at `path`.
    ///
    /// A fresh (or shorter-than-one-page) file is extended to a single page
    /// holding an empty metadata image. An existing file must have been
    /// created with the same `page_size`. Any records left in the WAL by an
    /// interrupted operation are replayed, then the WAL is truncated.
    pub fn open_with_config(path: &Path, config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let wal_file = wal_path(path);
        let wal = WalWriter::open(&wal_file)?;

        let mut inner = StoreInner {
            file,
            wal,
            meta: Meta::new(),
            cache: PageCache::new(config.cache_capacity),
            config,
            crash_point: None,
        };

        let len = inner.file.metadata()?.len();
        if len < inner.config.page_size as u64 {
            inner.file.set_len(inner.config.page_size as u64)?;
            inner.flush_meta()?;
        } else {
            let page = inner.read_page(PageId::META)?;
            let (stored_page_size, meta) = Meta::decode(&page)?;
            if stored_page_size != inner.config.page_size {
                return Err(BasaltError::InvalidPageSize {
                    expected: stored_page_size,
                    actual: inner.config.page_size,
                });
            }
            inner.meta = meta;
        }

        let records = WalReader::open(&wal_file)?.read_all()?;
        if !records.is_empty() {
            inner.replay(records)?;
        }
        inner.wal.truncate()?;

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(inner),
        })
    }

    /// Returns the path of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the page size this store was opened with.
    pub fn page_size(&self) -> usize {
        self.inner.lock().config.page_size
    }

    /// Returns a snapshot of the current metadata.
    pub fn meta(&self) -> Meta {
        self.inner.lock().meta.clone()
    }

    /// Applies `mutator` to the metadata and flushes page 0.
    ///
    /// When this returns, page 0 on disk reflects the new state and has been
    /// fsynced.
    pub fn update_meta<F>(&self, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut Meta),
    {
        let mut inner = self.inner.lock();
        mutator(&mut inner.meta);
        inner.flush_meta()
    }

    /// Reads the blob stored for `table_id`, or None if it has no blob.
    pub fn load_table_blob(&self, table_id: TableId) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        match inner.meta.head(table_id) {
            Some(head) => inner.load_chain(head).map(Some),
            None => Ok(None),
        }
    }

    /// Atomically replaces the blob for `table_id`.
    ///
    /// Ordering: the WAL record is appended and fsynced (the commit point),
    /// the previous chain is freed, the new chain is written and linked, the
    /// table head is updated, page 0 is flushed and the data file fsynced,
    /// and finally the WAL is truncated. A crash at any point either loses
    /// the operation entirely (before the WAL fsync) or is healed on replay.
    pub fn store_table_blob(&self, table_id: TableId, blob: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();

        inner.wal.append(&WalRecord::Store {
            table_id,
            blob: blob.to_vec(),
        })?;
        inner.wal_sync()?;
        fault::trigger(fault::AFTER_WAL_STORE, &mut inner.crash_point)?;

        inner.apply_store(table_id, blob)?;

        fault::trigger(fault::BEFORE_META_FLUSH, &mut inner.crash_point)?;
        inner.flush_meta()?;
        inner.wal.truncate()?;
        Ok(())
    }

    /// Removes the blob for `table_id`, freeing its chain.
    ///
    /// Removing an absent blob is a no-op but still runs the full
    /// log-apply-flush-truncate sequence.
    pub fn delete_table_blob(&self, table_id: TableId) -> Result<()> {
        let mut inner = self.inner.lock();

        inner.wal.append(&WalRecord::Delete { table_id })?;
        inner.wal_sync()?;
        fault::trigger(fault::AFTER_WAL_DELETE, &mut inner.crash_point)?;

        inner.apply_delete(table_id)?;

        fault::trigger(fault::BEFORE_META_FLUSH, &mut inner.crash_point)?;
        inner.flush_meta()?;
        inner.wal.truncate()?;
        Ok(())
    }

    /// Arms a one-shot crash point; the next operation reaching it fails
    /// with `FaultInjected` mid-flight. See the [`fault`] module.
    pub fn arm_crash_point(&self, point: &str) {
        self.inner.lock().crash_point = Some(point.to_string());
    }

    /// Clears any armed crash point.
    pub fn disarm_crash_point(&self) {
        self.inner.lock().crash_point = None;
    }

    /// Returns the number of pages in the data file (including page 0).
    pub fn num_pages(&self) -> Result<u64> {
        self.inner.lock().num_pages()
    }

    /// Returns the pages currently on the free list, head first.
    pub fn free_pages(&self) -> Result<Vec<PageId>> {
        let mut inner = self.inner.lock();
        let total = inner.num_pages()?;
        let mut pages = Vec::new();
        let mut seen = HashSet::new();
        let mut pid = inner.meta.free_list;
        while !pid.is_null() {
            if pid.0 >= total || !seen.insert(pid) {
                return Err(BasaltError::Corruption(format!(
                    "free list broken at page {}",
                    pid
                )));
            }
            pages.push(pid);
            let page = inner.read_page(pid)?;
            pid = ChainHeader::from_bytes(&page).next;
        }
        Ok(pages)
    }

    /// Returns the pages of a table's chain in order, empty if it has none.
    pub fn chain_pages(&self, table_id: TableId) -> Result<Vec<PageId>> {
        let mut inner = self.inner.lock();
        let total = inner.num_pages()?;
        let mut pages = Vec::new();
        let mut seen = HashSet::new();
        let mut pid = inner.meta.head(table_id).unwrap_or(PageId::NULL);
        while !pid.is_null() {
            if pid.0 >= total || !seen.insert(pid) {
                return Err(BasaltError::Corruption(format!(
                    "chain for table {} broken at page {}",
                    table_id, pid
                )));
            }
            pages.push(pid);
            let page = inner.read_page(pid)?;
            pid = ChainHeader::from_bytes(&page).next;
        }
        Ok(pages)
    }

    /// Returns the number of pages resident in the cache.
    pub fn cache_len(&self) -> usize {
        self.inner.lock().cache.len()
    }
}

impl StoreInner {
    fn page_size(&self) -> usize {
        self.config.page_size
    }

    fn num_pages(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len() / self.page_size() as u64)
    }

    /// Reads a page, preferring the cache. The meta page is never cached.
    fn read_page(&mut self, page_id: PageId) -> Result<Vec<u8>> {
        if let Some(page) = self.cache.get(page_id) {
            return Ok(page);
        }
        let mut buf = vec![0u8; self.page_size()];
        self.file
            .seek(SeekFrom::Start(page_id.offset(self.page_size())))?;
        self.file.read_exact(&mut buf)?;
        if page_id != PageId::META {
            self.cache.put(page_id, &buf);
        }
        Ok(buf)
    }

    /// Writes a full page image through to disk and into the cache.
    fn write_page(&mut self, page_id: PageId, page: &[u8]) -> Result<()> {
        if page.len() != self.page_size() {
            return Err(BasaltError::InvalidPageSize {
                expected: self.page_size(),
                actual: page.len(),
            });
        }
        self.file
            .seek(SeekFrom::Start(page_id.offset(self.page_size())))?;
        self.file.write_all(page)?;
        if page_id != PageId::META {
            self.cache.put(page_id, page);
        }
        Ok(())
    }

    /// Encodes the metadata onto page 0 and fsyncs the data file.
    fn flush_meta(&mut self) -> Result<()> {
        let page = self.meta.encode(self.page_size())?;
        self.write_page(PageId::META, &page)?;
        if self.config.fsync_enabled {
            self.file.sync_all()?;
        }
        Ok(())
    }

    fn wal_sync(&mut self) -> Result<()> {
        if self.config.fsync_enabled {
            self.wal.sync()?;
        }
        Ok(())
    }

    /// Allocates a page, reusing the free-list head if there is one and
    /// extending the file otherwise. The file length stays a multiple of the
    /// page size.
    fn alloc_page(&mut self) -> Result<PageId> {
        if !self.meta.free_list.is_null() {
            let page_id = self.meta.free_list;
            let mut page = self.read_page(page_id)?;
            self.meta.free_list = ChainHeader::from_bytes(&page).next;
            page[0..8].copy_from_slice(&0u64.to_le_bytes());
            self.write_page(page_id, &page)?;
            return Ok(page_id);
        }

        let len = self.file.metadata()?.len();
        debug_assert_eq!(len % self.page_size() as u64, 0);
        let page_id = PageId(len / self.page_size() as u64);
        // Keeps the file length an exact multiple of the page size.
        self.file
            .set_len((page_id.0 + 1) * self.page_size() as u64)?;
        // The extended page reads as zeros; keep the cache coherent.
        self.cache.put(page_id, &vec![0u8; self.page_size()]);
        Ok(page_id)
    }

    /// Pushes every page of a chain onto the free list, head first (LIFO).
    ///
    /// The walk is visited-set-guarded: recovery can free a chain whose
    /// links were scribbled by an interrupted store, and must terminate on
    /// whatever it finds.
    fn free_chain(&mut self, head: PageId) -> Result<()> {
        let total = self.num_pages()?;
        let mut visited = HashSet::new();
        let mut pid = head;
        while !pid.is_null() && pid.0 < total && visited.insert(pid) {
            let mut page = self.read_page(pid)?;
            let next = ChainHeader::from_bytes(&page).next;
            page[0..8].copy_from_slice(&self.meta.free_list.0.to_le_bytes());
            self.write_page(pid, &page)?;
            self.meta.free_list = pid;
            pid = next;
        }
        Ok(())
    }

    /// Concatenates the payloads of a chain starting at `head`.
    fn load_chain(&mut self, head: PageId) -> Result<Vec<u8>> {
        let total = self.num_pages()?;
        let max_payload = ChainHeader::max_payload(self.page_size());
        let mut out = Vec::new();
        let mut pid = head;
        let mut hops = 0u64;
        while !pid.is_null() {
            if pid.0 >= total {
                return Err(BasaltError::Corruption(format!(
                    "chain link {} beyond end of file ({} pages)",
                    pid, total
                )));
            }
            hops += 1;
            if hops > total {
                return Err(BasaltError::Corruption(
                    "chain cycle detected".to_string(),
                ));
            }
            let page = self.read_page(pid)?;
            let header = ChainHeader::from_bytes(&page);
            if header.len as usize > max_payload {
                return Err(BasaltError::Corruption(format!(
                    "page {} declares {} payload bytes, page body holds {}",
                    pid, header.len, max_payload
                )));
            }
            out.extend_from_slice(
                &page[ChainHeader::SIZE..ChainHeader::SIZE + header.len as usize],
            );
            pid = header.next;
        }
        Ok(out)
    }

    /// Replaces the chain for `table_id` with one holding `blob`.
    ///
    /// Mutates pages and the in-memory meta only; the caller flushes page 0.
    fn apply_store(&mut self, table_id: TableId, blob: &[u8]) -> Result<()> {
        if let Some(head) = self.meta.head(table_id) {
            self.free_chain(head)?;
        }
        self.meta.table_head.remove(&table_id);

        if blob.is_empty() {
            return Ok(());
        }

        let max_payload = ChainHeader::max_payload(self.page_size());
        let mut pages = Vec::new();
        for chunk in blob.chunks(max_payload) {
            let page_id = self.alloc_page()?;
            let mut page = vec![0u8; self.page_size()];
            let header = ChainHeader {
                next: PageId::NULL,
                len: chunk.len() as u32,
            };
            page[..ChainHeader::SIZE].copy_from_slice(&header.to_bytes());
            page[ChainHeader::SIZE..ChainHeader::SIZE + chunk.len()].copy_from_slice(chunk);
            self.write_page(page_id, &page)?;
            pages.push(page_id);
        }

        // Second pass: link the chain now that every page id is known.
        for i in 0..pages.len() {
            let next = pages.get(i + 1).copied().unwrap_or(PageId::NULL);
            let mut page = self.read_page(pages[i])?;
            page[0..8].copy_from_slice(&next.0.to_le_bytes());
            self.write_page(pages[i], &page)?;
        }

        self.meta.table_head.insert(table_id, pages[0]);
        Ok(())
    }

    /// Frees the chain for `table_id` and drops its head entry.
    fn apply_delete(&mut self, table_id: TableId) -> Result<()> {
        if let Some(head) = self.meta.head(table_id) {
            self.free_chain(head)?;
        }
        self.meta.table_head.remove(&table_id);
        Ok(())
    }

    /// Replays WAL records left behind by an interrupted operation.
    ///
    /// The free list is rebuilt first: an interrupted store may have
    /// scribbled next-pointers in place, leaving the on-disk free list
    /// pointing at pages that a chain also claims. Every page unreachable
    /// from a table head is relinked as free, after which the records (each
    /// a full-blob replacement) apply cleanly in order.
    fn replay(&mut self, records: Vec<WalRecord>) -> Result<()> {
        self.reconcile_free_list()?;
        for record in records {
            match record {
                WalRecord::Store { table_id, blob } => self.apply_store(table_id, &blob)?,
                WalRecord::Delete { table_id } => self.apply_delete(table_id)?,
            }
        }
        self.flush_meta()
    }

    /// Rebuilds the free list as the complement of all reachable chain
    /// pages, linked in ascending page order.
    fn reconcile_free_list(&mut self) -> Result<()> {
        let total = self.num_pages()?;
        let mut live: HashSet<PageId> = HashSet::new();
        live.insert(PageId::META);

        let heads: Vec<PageId> = self.meta.table_head.values().copied().collect();
        for head in heads {
            let mut pid = head;
            while !pid.is_null() && pid.0 < total && live.insert(pid) {
                let page = self.read_page(pid)?;
                pid = ChainHeader::from_bytes(&page).next;
            }
        }

        let mut head = PageId::NULL;
        for n in 1..total {
            let pid = PageId(n);
            if live.contains(&pid) {
                continue;
            }
            let mut page = self.read_page(pid)?;
            page[0..8].copy_from_slice(&head.0.to_le_bytes());
            self.write_page(pid, &page)?;
            head = pid;
        }
        self.meta.free_list = head;
        Ok(())
    }
}
