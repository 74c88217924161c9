//! WAL writer for appending log records.

use crate::record::WalRecord;
use basalt_common::Result;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Append-only handle for the WAL file.
///
/// The log holds the records of at most one in-flight operation: the store
/// truncates it to zero length after every successful commit, so a non-empty
/// log on open means the previous process died mid-operation.
#[derive(Debug)]
pub struct WalWriter {
    /// The open log file.
    file: File,
    /// Path to the log file.
    path: PathBuf,
}

impl WalWriter {
    /// Opens or creates the WAL file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Returns the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current length of the log in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Returns true if the log holds no records.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Appends a record at the end of the log.
    ///
    /// The record is not durable until [`sync`](Self::sync) returns.
    pub fn append(&mut self, record: &WalRecord) -> Result<()> {
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&record.encode())?;
        Ok(())
    }

    /// Forces appended records to disk. This is the commit point for the
    /// operation that wrote them.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Truncates the log to zero length and syncs.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_all()?;
        Ok(())
    }
}
