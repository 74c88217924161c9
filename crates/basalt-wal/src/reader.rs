//! WAL reader for log replay on startup.

use crate::record::WalRecord;
use basalt_common::Result;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Reader that scans every complete record out of a WAL file.
pub struct WalReader {
    path: PathBuf,
}

impl WalReader {
    /// Creates a reader for the log at `path`. A missing file reads as empty.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Reads every complete record in log order.
    ///
    /// A trailing partial record (a crash tore the last append before its
    /// fsync) is silently ignored: it never committed. An unrecognized tag
    /// ends the scan the same way.
    pub fn read_all(&self) -> Result<Vec<WalRecord>> {
        let mut data = Vec::new();
        match File::open(&self.path) {
            Ok(mut file) => {
                file.read_to_end(&mut data)?;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        }

        let mut records = Vec::new();
        let mut offset = 0;
        while let Some((record, consumed)) = WalRecord::decode_from(&data[offset..]) {
            records.push(record);
            offset += consumed;
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::WalWriter;
    use basalt_common::TableId;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let reader = WalReader::open(&dir.path().join("absent.wal")).unwrap();
        assert!(reader.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_read_empty_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.wal");
        WalWriter::open(&path).unwrap();

        let reader = WalReader::open(&path).unwrap();
        assert!(reader.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_read_multiple_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.wal");

        let records = vec![
            WalRecord::Store {
                table_id: TableId(1),
                blob: b"first".to_vec(),
            },
            WalRecord::Delete {
                table_id: TableId(2),
            },
            WalRecord::Store {
                table_id: TableId(1),
                blob: b"second".to_vec(),
            },
        ];

        let mut writer = WalWriter::open(&path).unwrap();
        for record in &records {
            writer.append(record).unwrap();
        }
        writer.sync().unwrap();

        let reader = WalReader::open(&path).unwrap();
        assert_eq!(reader.read_all().unwrap(), records);
    }

    #[test]
    fn test_trailing_partial_record_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.wal");

        let complete = WalRecord::Store {
            table_id: TableId(1),
            blob: b"committed".to_vec(),
        };
        let torn = WalRecord::Store {
            table_id: TableId(2),
            blob: vec![0xEE; 64],
        };

        let mut writer = WalWriter::open(&path).unwrap();
        writer.append(&complete).unwrap();
        writer.sync().unwrap();

        // Simulate a crash mid-append: only part of the second record lands.
        let mut raw = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        raw.write_all(&torn.encode()[..20]).unwrap();
        drop(raw);

        let reader = WalReader::open(&path).unwrap();
        assert_eq!(reader.read_all().unwrap(), vec![complete]);
    }

    #[test]
    fn test_partial_header_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.wal");

        let mut raw = std::fs::File::create(&path).unwrap();
        raw.write_all(&[1, 2, 3]).unwrap();
        drop(raw);

        let reader = WalReader::open(&path).unwrap();
        assert!(reader.read_all().unwrap().is_empty());
    }
}
