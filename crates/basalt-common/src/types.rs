//! Table identifiers for BasaltDB.

use serde::{Deserialize, Serialize};

/// Stable numeric identifier for a table.
///
/// Minted by the catalog when a table is created, retained across renames,
/// and discarded on drop. Table ids key blob chains in the paged store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TableId(pub u64);

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TableId(7).to_string(), "7");
    }

    #[test]
    fn test_ordering() {
        assert!(TableId(1) < TableId(2));
    }

    #[test]
    fn test_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(TableId(1));
        set.insert(TableId(2));
        set.insert(TableId(1)); // Duplicate

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_serde_roundtrip() {
        let original = TableId(99);
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: TableId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(original, deserialized);
    }
}
