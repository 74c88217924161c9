//! Table catalog: name ↔ id registry and tree persistence.

use crate::btree::BPlusTree;
use crate::pager::PagedStore;
use basalt_common::{BasaltError, Result, TableId};
use std::sync::Arc;

/// Maps user-visible table names to stable table ids and moves each table's
/// B+ tree through the paged store as a serialized blob.
///
/// The catalog owns no state of its own; all truth lives in the store's
/// metadata. Callers that mutate trees must serialize writers externally;
/// the catalog only guarantees that each individual call is atomic.
pub struct Catalog {
    store: Arc<PagedStore>,
}

/// Summary statistics for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    /// Number of rows.
    pub rows: usize,
    /// Height of the table's tree.
    pub height: usize,
    /// Smallest key, if any rows exist.
    pub min_key: Option<String>,
    /// Largest key, if any rows exist.
    pub max_key: Option<String>,
}

impl Catalog {
    /// Creates a catalog over an open store.
    pub fn new(store: Arc<PagedStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<PagedStore> {
        &self.store
    }

    /// Registers a new table and returns its freshly minted id.
    ///
    /// The new table has no blob; loading its tree yields an empty one.
    pub fn create_table(&self, name: &str) -> Result<TableId> {
        if self.store.meta().tables.contains_key(name) {
            return Err(BasaltError::TableAlreadyExists(name.to_string()));
        }
        let mut assigned = TableId(0);
        self.store.update_meta(|meta| {
            meta.next_table_id += 1;
            assigned = TableId(meta.next_table_id);
            meta.tables.insert(name.to_string(), assigned);
        })?;
        Ok(assigned)
    }

    /// Looks up the id for a table name.
    pub fn get_table_id(&self, name: &str) -> Option<TableId> {
        self.store.meta().tables.get(name).copied()
    }

    /// Returns all table names, sorted.
    pub fn list_tables(&self) -> Vec<String> {
        self.store.meta().tables.keys().cloned().collect()
    }

    /// Renames a table, keeping its id and blob.
    pub fn rename_table(&self, old: &str, new: &str) -> Result<()> {
        let meta = self.store.meta();
        if meta.tables.contains_key(new) {
            return Err(BasaltError::TableAlreadyExists(new.to_string()));
        }
        let Some(id) = meta.tables.get(old).copied() else {
            return Err(BasaltError::TableNotFound(old.to_string()));
        };
        self.store.update_meta(|meta| {
            meta.tables.remove(old);
            meta.tables.insert(new.to_string(), id);
        })
    }

    /// Drops a table: frees its blob, then removes the name.
    ///
    /// These are two separate meta flushes. A crash between them leaves the
    /// name pointing at no blob, which reads as an empty table and can be
    /// dropped again.
    pub fn delete_table(&self, name: &str) -> Result<()> {
        let Some(id) = self.get_table_id(name) else {
            return Err(BasaltError::TableNotFound(name.to_string()));
        };
        self.store.delete_table_blob(id)?;
        self.store.update_meta(|meta| {
            meta.tables.remove(name);
        })
    }

    /// Empties a table, keeping its name and id.
    pub fn truncate_table(&self, name: &str) -> Result<()> {
        let Some(id) = self.get_table_id(name) else {
            return Err(BasaltError::TableNotFound(name.to_string()));
        };
        self.store.delete_table_blob(id)
    }

    /// Loads the tree for a table id. An absent or empty blob yields a
    /// fresh empty tree.
    pub fn load_tree(&self, table_id: TableId) -> Result<BPlusTree> {
        match self.store.load_table_blob(table_id)? {
            Some(blob) if !blob.is_empty() => BPlusTree::decode(&blob),
            _ => Ok(BPlusTree::new()),
        }
    }

    /// Persists the tree for a table id.
    pub fn store_tree(&self, table_id: TableId, tree: &BPlusTree) -> Result<()> {
        self.store.store_table_blob(table_id, &tree.encode())
    }

    /// Reports row count, height, and extremal keys for a table.
    pub fn table_stats(&self, name: &str) -> Result<TableStats> {
        let Some(id) = self.get_table_id(name) else {
            return Err(BasaltError::TableNotFound(name.to_string()));
        };
        let tree = self.load_tree(id)?;
        Ok(TableStats {
            rows: tree.len(),
            height: tree.height(),
            min_key: tree.leftmost_key().map(str::to_string),
            max_key: tree.rightmost_key().map(str::to_string),
        })
    }
}
