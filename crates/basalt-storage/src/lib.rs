//! Storage engine for BasaltDB.
//!
//! This crate provides:
//! - A paged blob store with a free list, write-ahead logging, and crash
//!   recovery
//! - A table catalog mapping names to stable numeric ids
//! - An in-memory B+ tree with a canonical serialized form
//!
//! Writes flow top-down: the catalog resolves a table name to an id, loads
//! the table's tree blob from the paged store, the caller mutates the
//! decoded tree in memory, and `store_tree` writes it back atomically.

pub mod btree;
pub mod cache;
pub mod catalog;
pub mod fault;
pub mod meta;
pub mod pager;

pub use btree::{BPlusTree, ORDER};
pub use cache::{auto_capacity, PageCache};
pub use catalog::{Catalog, TableStats};
pub use meta::Meta;
pub use pager::PagedStore;
