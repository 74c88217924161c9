//! In-memory B+ tree ordered map from string keys to string values.

mod encode;
mod node;

pub use node::ORDER;

use node::{upper_bound, Node};

/// An ordered map backing one table.
///
/// Nodes live in an arena and reference each other by index; the leaf
/// forward-link chain visits leaves in ascending key order and drives range
/// scans. Insert is an upsert and splits full nodes on the way back up;
/// delete removes from the leaf only (no merging or redistribution, so
/// leaves may become arbitrarily sparse). The tree exists only in memory;
/// the catalog persists it through [`BPlusTree::encode`] and
/// [`BPlusTree::decode`].
#[derive(Debug, Clone)]
pub struct BPlusTree {
    /// Node arena; indices are stable for the life of the tree.
    nodes: Vec<Node>,
    /// Arena index of the root node.
    root: usize,
    /// Number of key/value pairs.
    len: usize,
}

impl Default for BPlusTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Element-wise equality: same pairs in the same order, regardless of how
/// the arenas are laid out.
impl PartialEq for BPlusTree {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.range_from("", 0) == other.range_from("", 0)
    }
}

impl Eq for BPlusTree {}

impl BPlusTree {
    /// Creates an empty tree (a single empty leaf).
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::empty_leaf()],
            root: 0,
            len: 0,
        }
    }

    /// Returns the number of key/value pairs.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        let leaf = self.find_leaf(key);
        let Node::Leaf { keys, values, .. } = &self.nodes[leaf] else {
            unreachable!("find_leaf returned an internal node");
        };
        match keys.binary_search_by(|k| k.as_str().cmp(key)) {
            Ok(pos) => Some(&values[pos]),
            Err(_) => None,
        }
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts or replaces the value for `key`.
    pub fn insert(&mut self, key: &str, value: &str) {
        if let Some((separator, right)) = self.insert_into(self.root, key, value) {
            let old_root = self.root;
            self.nodes.push(Node::Internal {
                keys: vec![separator],
                children: vec![old_root, right],
            });
            self.root = self.nodes.len() - 1;
        }
    }

    /// Removes `key` if present. Returns true if a pair was removed.
    ///
    /// No underflow handling: the leaf keeps whatever remains, and internal
    /// separators are left as-is (search only relies on the upper-bound
    /// ordering, which deletion cannot break).
    pub fn delete(&mut self, key: &str) -> bool {
        let leaf = self.find_leaf(key);
        let Node::Leaf { keys, values, .. } = &mut self.nodes[leaf] else {
            unreachable!("find_leaf returned an internal node");
        };
        match keys.binary_search_by(|k| k.as_str().cmp(key)) {
            Ok(pos) => {
                keys.remove(pos);
                values.remove(pos);
                self.len -= 1;
                true
            }
            Err(_) => false,
        }
    }

    /// Returns pairs with `key >= start` in ascending order. A `limit` of 0
    /// means unbounded.
    pub fn range_from(&self, start: &str, limit: usize) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let mut leaf = self.find_leaf(start);
        let mut pos = {
            let Node::Leaf { keys, .. } = &self.nodes[leaf] else {
                unreachable!("find_leaf returned an internal node");
            };
            keys.partition_point(|k| k.as_str() < start)
        };

        loop {
            let Node::Leaf { keys, values, next } = &self.nodes[leaf] else {
                unreachable!("leaf chain reached an internal node");
            };
            while pos < keys.len() {
                if limit != 0 && out.len() == limit {
                    return out;
                }
                out.push((keys[pos].clone(), values[pos].clone()));
                pos += 1;
            }
            match next {
                Some(n) => {
                    leaf = *n;
                    pos = 0;
                }
                None => return out,
            }
        }
    }

    /// Returns pairs whose key starts with `prefix`, in ascending order,
    /// bounded by `limit` (0 = unbounded).
    pub fn range_prefix(&self, prefix: &str, limit: usize) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let mut leaf = self.find_leaf(prefix);
        let mut pos = {
            let Node::Leaf { keys, .. } = &self.nodes[leaf] else {
                unreachable!("find_leaf returned an internal node");
            };
            keys.partition_point(|k| k.as_str() < prefix)
        };

        loop {
            let Node::Leaf { keys, values, next } = &self.nodes[leaf] else {
                unreachable!("leaf chain reached an internal node");
            };
            while pos < keys.len() {
                // Matching keys are contiguous; the first non-match ends it.
                if !keys[pos].starts_with(prefix) {
                    return out;
                }
                if limit != 0 && out.len() == limit {
                    return out;
                }
                out.push((keys[pos].clone(), values[pos].clone()));
                pos += 1;
            }
            match next {
                Some(n) => {
                    leaf = *n;
                    pos = 0;
                }
                None => return out,
            }
        }
    }

    /// Number of edges from the root to any leaf (a single-leaf tree has
    /// height 0).
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut idx = self.root;
        while let Node::Internal { children, .. } = &self.nodes[idx] {
            idx = children[0];
            height += 1;
        }
        height
    }

    /// Smallest key in the tree, or None if empty.
    pub fn leftmost_key(&self) -> Option<&str> {
        // Deletes can leave leading leaves empty; walk the chain.
        let mut leaf = self.first_leaf();
        loop {
            let Node::Leaf { keys, next, .. } = &self.nodes[leaf] else {
                unreachable!("leaf chain reached an internal node");
            };
            if let Some(first) = keys.first() {
                return Some(first);
            }
            leaf = (*next)?;
        }
    }

    /// Largest key in the tree, or None if empty.
    pub fn rightmost_key(&self) -> Option<&str> {
        // Any leaf may be empty after deletes, so track the last key seen
        // along the whole chain.
        let mut leaf = self.first_leaf();
        let mut last: Option<&str> = None;
        loop {
            let Node::Leaf { keys, next, .. } = &self.nodes[leaf] else {
                unreachable!("leaf chain reached an internal node");
            };
            if let Some(key) = keys.last() {
                last = Some(key);
            }
            match next {
                Some(n) => leaf = *n,
                None => return last,
            }
        }
    }

    /// Descends to the leaf that holds (or would hold) `key`.
    fn find_leaf(&self, key: &str) -> usize {
        let mut idx = self.root;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Internal { keys, children } => {
                    idx = children[upper_bound(keys, key)];
                }
            }
        }
    }

    /// Arena index of the leftmost leaf.
    fn first_leaf(&self) -> usize {
        let mut idx = self.root;
        while let Node::Internal { children, .. } = &self.nodes[idx] {
            idx = children[0];
        }
        idx
    }

    /// Recursive insert. Returns the promoted separator and the new right
    /// sibling's arena index if the node at `idx` split.
    fn insert_into(&mut self, idx: usize, key: &str, value: &str) -> Option<(String, usize)> {
        let (pos, child) = match &self.nodes[idx] {
            Node::Leaf { .. } => return self.insert_into_leaf(idx, key, value),
            Node::Internal { keys, children } => {
                let pos = upper_bound(keys, key);
                (pos, children[pos])
            }
        };

        let (separator, right) = self.insert_into(child, key, value)?;

        let split = {
            let Node::Internal { keys, children } = &mut self.nodes[idx] else {
                unreachable!("descent state changed under us");
            };
            keys.insert(pos, separator);
            children.insert(pos + 1, right);
            if keys.len() < ORDER {
                None
            } else {
                // The middle key moves up and is retained by neither half;
                // its right subtree leads the new right sibling.
                let mid = ORDER / 2;
                let promoted = keys.remove(mid);
                let right_keys = keys.split_off(mid);
                let right_children = children.split_off(mid + 1);
                Some((promoted, right_keys, right_children))
            }
        };

        let (promoted, right_keys, right_children) = split?;
        self.nodes.push(Node::Internal {
            keys: right_keys,
            children: right_children,
        });
        Some((promoted, self.nodes.len() - 1))
    }

    fn insert_into_leaf(&mut self, idx: usize, key: &str, value: &str) -> Option<(String, usize)> {
        let split = {
            let Node::Leaf { keys, values, next } = &mut self.nodes[idx] else {
                unreachable!("insert_into_leaf called on an internal node");
            };
            match keys.binary_search_by(|k| k.as_str().cmp(key)) {
                Ok(pos) => {
                    // Upsert: replace in place, size unchanged.
                    values[pos] = value.to_string();
                    return None;
                }
                Err(pos) => {
                    keys.insert(pos, key.to_string());
                    values.insert(pos, value.to_string());
                }
            }
            if keys.len() < ORDER {
                None
            } else {
                let mid = ORDER / 2;
                let right_keys = keys.split_off(mid);
                let right_values = values.split_off(mid);
                Some((right_keys, right_values, *next))
            }
        };
        self.len += 1;

        let (right_keys, right_values, old_next) = split?;
        let separator = right_keys[0].clone();
        self.nodes.push(Node::Leaf {
            keys: right_keys,
            values: right_values,
            next: old_next,
        });
        let new_idx = self.nodes.len() - 1;

        let Node::Leaf { next, .. } = &mut self.nodes[idx] else {
            unreachable!("leaf moved during split");
        };
        *next = Some(new_idx);
        Some((separator, new_idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(keys: &[&str]) -> BPlusTree {
        let mut tree = BPlusTree::new();
        for k in keys {
            tree.insert(k, &format!("v:{}", k));
        }
        tree
    }

    fn scan_keys(tree: &BPlusTree) -> Vec<String> {
        tree.range_from("", 0).into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_empty_tree() {
        let tree = BPlusTree::new();
        assert_eq!(tree.len(), 0);
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.get("anything"), None);
        assert_eq!(tree.leftmost_key(), None);
        assert_eq!(tree.rightmost_key(), None);
        assert!(tree.range_from("", 0).is_empty());
    }

    #[test]
    fn test_insert_and_get() {
        let mut tree = BPlusTree::new();
        tree.insert("alice", "A");
        tree.insert("bob", "B");

        assert_eq!(tree.get("alice"), Some("A"));
        assert_eq!(tree.get("bob"), Some("B"));
        assert_eq!(tree.get("carol"), None);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut tree = BPlusTree::new();
        tree.insert("k", "v1");
        tree.insert("k", "v2");

        assert_eq!(tree.get("k"), Some("v2"));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_split_shape_at_order_four() {
        // After the fourth insert the root leaf splits; the fifth lands in
        // the right leaf without another split.
        let tree = tree_with(&["a", "b", "c", "d", "e"]);

        assert_eq!(tree.height(), 1);
        let Node::Internal { keys, children } = &tree.nodes[tree.root] else {
            panic!("root should be internal after a split");
        };
        assert_eq!(keys, &["c"]);
        assert_eq!(children.len(), 2);
        assert_eq!(scan_keys(&tree), ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_many_inserts_stay_sorted() {
        let mut keys: Vec<String> = (0..200).map(|i| format!("key{:03}", i)).collect();
        // Insert in a scrambled order.
        keys.reverse();
        let mut tree = BPlusTree::new();
        for (i, k) in keys.iter().enumerate() {
            tree.insert(k, &i.to_string());
        }

        assert_eq!(tree.len(), 200);
        let scanned = scan_keys(&tree);
        let mut expected = keys.clone();
        expected.sort();
        assert_eq!(scanned, expected);
        assert!(tree.height() >= 2);
    }

    #[test]
    fn test_delete_law() {
        let mut tree = BPlusTree::new();
        tree.insert("k", "v");

        assert!(tree.delete("k"));
        assert_eq!(tree.get("k"), None);
        assert!(!tree.delete("k"));
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn test_delete_leaves_sparse_leaves() {
        let mut tree = tree_with(&["a", "b", "c", "d", "e", "f", "g"]);

        for k in ["a", "b", "c"] {
            assert!(tree.delete(k));
        }
        assert_eq!(tree.len(), 4);
        assert_eq!(scan_keys(&tree), ["d", "e", "f", "g"]);
        // Search still works through the now-stale separators.
        assert_eq!(tree.get("d"), Some("v:d"));
        assert_eq!(tree.get("a"), None);
    }

    #[test]
    fn test_extremal_keys() {
        let tree = tree_with(&["m", "c", "x", "a", "t"]);
        assert_eq!(tree.leftmost_key(), Some("a"));
        assert_eq!(tree.rightmost_key(), Some("x"));
    }

    #[test]
    fn test_extremal_keys_with_empty_edge_leaves() {
        let mut tree = tree_with(&["a", "b", "c", "d", "e"]);
        // Empty out the leftmost leaf and the tail of the rightmost.
        assert!(tree.delete("a"));
        assert!(tree.delete("b"));
        assert!(tree.delete("e"));

        assert_eq!(tree.leftmost_key(), Some("c"));
        assert_eq!(tree.rightmost_key(), Some("d"));
    }

    #[test]
    fn test_extremal_keys_after_deleting_everything() {
        let mut tree = tree_with(&["a", "b", "c", "d", "e"]);
        for k in ["a", "b", "c", "d", "e"] {
            assert!(tree.delete(k));
        }
        assert_eq!(tree.leftmost_key(), None);
        assert_eq!(tree.rightmost_key(), None);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_range_from() {
        let tree = tree_with(&["apple", "banana", "cherry", "date", "elderberry"]);

        let all = tree.range_from("", 0);
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].0, "apple");

        let from_c = tree.range_from("cherry", 0);
        assert_eq!(
            from_c.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            ["cherry", "date", "elderberry"]
        );

        // Start between keys.
        let from_b2 = tree.range_from("blue", 2);
        assert_eq!(
            from_b2.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            ["cherry", "date"]
        );

        assert!(tree.range_from("zzz", 0).is_empty());
    }

    #[test]
    fn test_range_from_is_strictly_ascending() {
        let mut tree = BPlusTree::new();
        for i in [5, 3, 9, 1, 7, 2, 8, 4, 6, 0] {
            tree.insert(&format!("k{}", i), "v");
        }
        let keys = scan_keys(&tree);
        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_range_prefix() {
        let tree = tree_with(&["apple", "apricot", "banana", "blueberry"]);

        let ap = tree.range_prefix("ap", 0);
        assert_eq!(
            ap.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            ["apple", "apricot"]
        );

        let b1 = tree.range_from("b", 1);
        assert_eq!(b1.len(), 1);
        assert_eq!(b1[0].0, "banana");

        assert!(tree.range_prefix("zz", 0).is_empty());
        assert_eq!(tree.range_prefix("", 0).len(), 4);
        assert_eq!(tree.range_prefix("a", 1).len(), 1);
    }

    #[test]
    fn test_prefix_spanning_leaves() {
        let mut tree = BPlusTree::new();
        for i in 0..30 {
            tree.insert(&format!("user:{:02}", i), "v");
        }
        tree.insert("vendor:01", "v");

        assert_eq!(tree.range_prefix("user:", 0).len(), 30);
        assert_eq!(tree.range_prefix("vendor:", 0).len(), 1);
    }

    #[test]
    fn test_height_growth() {
        let mut tree = BPlusTree::new();
        assert_eq!(tree.height(), 0);
        for i in 0..4 {
            tree.insert(&format!("k{}", i), "v");
        }
        assert_eq!(tree.height(), 1);
        for i in 4..100 {
            tree.insert(&format!("k{:03}", i), "v");
        }
        assert!(tree.height() >= 2);
    }

    #[test]
    fn test_clone_preserves_scans() {
        let tree = tree_with(&["a", "b", "c", "d", "e", "f"]);
        let clone = tree.clone();

        assert_eq!(clone, tree);
        assert_eq!(scan_keys(&clone), scan_keys(&tree));
    }

    #[test]
    fn test_clone_is_independent() {
        let tree = tree_with(&["a", "b"]);
        let mut clone = tree.clone();
        clone.insert("c", "v:c");
        clone.delete("a");

        assert_eq!(tree.get("a"), Some("v:a"));
        assert_eq!(tree.get("c"), None);
        assert_eq!(clone.get("a"), None);
        assert_eq!(clone.get("c"), Some("v:c"));
    }

    #[test]
    fn test_element_equality_ignores_layout() {
        // Same contents built in different orders produce different arenas
        // but equal trees.
        let a = tree_with(&["a", "b", "c", "d", "e"]);
        let b = tree_with(&["e", "d", "c", "b", "a"]);
        assert_eq!(a, b);

        let c = tree_with(&["a", "b"]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_mixed_workload() {
        let mut tree = BPlusTree::new();
        for i in 0..50 {
            tree.insert(&format!("k{:02}", i), &format!("v{}", i));
        }
        for i in (0..50).step_by(2) {
            assert!(tree.delete(&format!("k{:02}", i)));
        }
        for i in 0..50 {
            let key = format!("k{:02}", i);
            if i % 2 == 0 {
                assert_eq!(tree.get(&key), None);
            } else {
                assert_eq!(tree.get(&key).unwrap(), format!("v{}", i));
            }
        }
        assert_eq!(tree.len(), 25);
    }
}
