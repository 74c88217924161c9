//! Write-Ahead Log (WAL) for BasaltDB.
//!
//! Provides durability by logging each blob replacement before it is applied
//! to the data file. The log is replayed and truncated on every open, so it
//! only ever holds the records of one interrupted operation.

pub mod reader;
pub mod record;
pub mod writer;

pub use reader::WalReader;
pub use record::{WalRecord, TAG_DELETE, TAG_STORE};
pub use writer::WalWriter;
