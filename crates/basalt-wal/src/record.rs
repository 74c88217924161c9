//! WAL log record format.

use basalt_common::TableId;
use bytes::{BufMut, Bytes, BytesMut};

/// Record type tags.
pub const TAG_STORE: u8 = 1;
pub const TAG_DELETE: u8 = 2;

/// A single log record in the WAL.
///
/// Record format on disk:
/// - header (17 bytes):
///   - tag: 1 byte (1 = store, 2 = delete)
///   - table_id: 8 bytes LE
///   - blob_len: 8 bytes LE (always 0 for delete)
/// - blob: `blob_len` payload bytes (store only)
///
/// Records are packed back-to-back with no padding. A record whose header or
/// payload runs past the end of the file never applied and is ignored by the
/// reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// Replace the blob for a table id.
    Store { table_id: TableId, blob: Vec<u8> },
    /// Remove the blob for a table id.
    Delete { table_id: TableId },
}

impl WalRecord {
    /// Size of the record header in bytes.
    pub const HEADER_SIZE: usize = 17;

    /// Returns the table id this record applies to.
    pub fn table_id(&self) -> TableId {
        match self {
            WalRecord::Store { table_id, .. } => *table_id,
            WalRecord::Delete { table_id } => *table_id,
        }
    }

    /// Returns the total size of this record on disk.
    pub fn size_on_disk(&self) -> usize {
        match self {
            WalRecord::Store { blob, .. } => Self::HEADER_SIZE + blob.len(),
            WalRecord::Delete { .. } => Self::HEADER_SIZE,
        }
    }

    /// Serializes this record to bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size_on_disk());
        match self {
            WalRecord::Store { table_id, blob } => {
                buf.put_u8(TAG_STORE);
                buf.put_u64_le(table_id.0);
                buf.put_u64_le(blob.len() as u64);
                buf.put_slice(blob);
            }
            WalRecord::Delete { table_id } => {
                buf.put_u8(TAG_DELETE);
                buf.put_u64_le(table_id.0);
                buf.put_u64_le(0);
            }
        }
        buf.freeze()
    }

    /// Decodes one record from the front of `buf`.
    ///
    /// Returns the record and the number of bytes consumed, or None if the
    /// buffer holds a partial record or an unknown tag (either way the
    /// remainder of the log is unusable and must be ignored).
    pub fn decode_from(buf: &[u8]) -> Option<(WalRecord, usize)> {
        if buf.len() < Self::HEADER_SIZE {
            return None;
        }

        let tag = buf[0];
        let table_id = TableId(u64::from_le_bytes([
            buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8],
        ]));
        let blob_len = u64::from_le_bytes([
            buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15], buf[16],
        ]) as usize;

        match tag {
            TAG_STORE => {
                if buf.len() < Self::HEADER_SIZE + blob_len {
                    return None;
                }
                let blob = buf[Self::HEADER_SIZE..Self::HEADER_SIZE + blob_len].to_vec();
                Some((
                    WalRecord::Store { table_id, blob },
                    Self::HEADER_SIZE + blob_len,
                ))
            }
            TAG_DELETE => Some((WalRecord::Delete { table_id }, Self::HEADER_SIZE)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(WalRecord::HEADER_SIZE, 17);
        let record = WalRecord::Delete {
            table_id: TableId(1),
        };
        assert_eq!(record.encode().len(), 17);
    }

    #[test]
    fn test_store_roundtrip() {
        let record = WalRecord::Store {
            table_id: TableId(42),
            blob: b"tree bytes".to_vec(),
        };
        let encoded = record.encode();
        assert_eq!(encoded.len(), 17 + 10);

        let (decoded, consumed) = WalRecord::decode_from(&encoded).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn test_delete_roundtrip() {
        let record = WalRecord::Delete {
            table_id: TableId(7),
        };
        let encoded = record.encode();
        let (decoded, consumed) = WalRecord::decode_from(&encoded).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(consumed, 17);
    }

    #[test]
    fn test_store_empty_blob() {
        let record = WalRecord::Store {
            table_id: TableId(3),
            blob: Vec::new(),
        };
        let encoded = record.encode();
        assert_eq!(encoded.len(), 17);
        let (decoded, _) = WalRecord::decode_from(&encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_partial_header() {
        let record = WalRecord::Delete {
            table_id: TableId(1),
        };
        let encoded = record.encode();
        assert!(WalRecord::decode_from(&encoded[..10]).is_none());
        assert!(WalRecord::decode_from(&[]).is_none());
    }

    #[test]
    fn test_decode_partial_payload() {
        let record = WalRecord::Store {
            table_id: TableId(1),
            blob: vec![0xAB; 100],
        };
        let encoded = record.encode();
        // Header is intact but the payload is torn.
        assert!(WalRecord::decode_from(&encoded[..50]).is_none());
    }

    #[test]
    fn test_decode_unknown_tag() {
        let mut encoded = WalRecord::Delete {
            table_id: TableId(1),
        }
        .encode()
        .to_vec();
        encoded[0] = 0xFF;
        assert!(WalRecord::decode_from(&encoded).is_none());
    }

    #[test]
    fn test_decode_consumes_exactly_one_record() {
        let first = WalRecord::Store {
            table_id: TableId(1),
            blob: b"abc".to_vec(),
        };
        let second = WalRecord::Delete {
            table_id: TableId(2),
        };

        let mut buf = first.encode().to_vec();
        buf.extend_from_slice(&second.encode());

        let (decoded, consumed) = WalRecord::decode_from(&buf).unwrap();
        assert_eq!(decoded, first);

        let (decoded, _) = WalRecord::decode_from(&buf[consumed..]).unwrap();
        assert_eq!(decoded, second);
    }

    #[test]
    fn test_table_id_accessor() {
        let store = WalRecord::Store {
            table_id: TableId(5),
            blob: Vec::new(),
        };
        let delete = WalRecord::Delete {
            table_id: TableId(6),
        };
        assert_eq!(store.table_id(), TableId(5));
        assert_eq!(delete.table_id(), TableId(6));
    }
}
