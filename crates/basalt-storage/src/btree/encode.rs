//! Canonical serialization of the B+ tree.
//!
//! Layout (all integers little-endian):
//! - u32 node count
//! - each node in pre-order:
//!   - u8 is-leaf flag (1 = leaf, 0 = internal)
//!   - u32 key count, then each key as u32 length + bytes
//!   - leaf: each value as u32 length + bytes, then a u32 next-leaf index
//!     (`0xFFFF_FFFF` = none)
//!   - internal: `key count + 1` u32 child indices
//!
//! Node indices refer to pre-order positions, so the root is always node 0
//! and leaves appear in left-to-right key order, letting decode rebuild the
//! leaf forward chain in a single pass.

use super::node::Node;
use super::BPlusTree;
use basalt_common::{BasaltError, Result};
use bytes::{BufMut, BytesMut};

/// Sentinel for a leaf with no forward link.
const NO_NEXT: u32 = u32::MAX;

impl BPlusTree {
    /// Serializes the tree into its canonical byte form.
    pub fn encode(&self) -> Vec<u8> {
        // Pre-order walk; children pushed in reverse so they pop in order.
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            order.push(idx);
            if let Node::Internal { children, .. } = &self.nodes[idx] {
                for child in children.iter().rev() {
                    stack.push(*child);
                }
            }
        }

        let mut serial = vec![0u32; self.nodes.len()];
        for (pos, &idx) in order.iter().enumerate() {
            serial[idx] = pos as u32;
        }

        let mut buf = BytesMut::new();
        buf.put_u32_le(order.len() as u32);
        for &idx in &order {
            match &self.nodes[idx] {
                Node::Leaf { keys, values, next } => {
                    buf.put_u8(1);
                    buf.put_u32_le(keys.len() as u32);
                    for key in keys {
                        buf.put_u32_le(key.len() as u32);
                        buf.put_slice(key.as_bytes());
                    }
                    for value in values {
                        buf.put_u32_le(value.len() as u32);
                        buf.put_slice(value.as_bytes());
                    }
                    buf.put_u32_le(next.map(|n| serial[n]).unwrap_or(NO_NEXT));
                }
                Node::Internal { keys, children } => {
                    buf.put_u8(0);
                    buf.put_u32_le(keys.len() as u32);
                    for key in keys {
                        buf.put_u32_le(key.len() as u32);
                        buf.put_slice(key.as_bytes());
                    }
                    for child in children {
                        buf.put_u32_le(serial[*child]);
                    }
                }
            }
        }
        buf.to_vec()
    }

    /// Rebuilds a tree from its canonical byte form.
    pub fn decode(data: &[u8]) -> Result<BPlusTree> {
        let mut buf = data;
        let node_count = take_u32(&mut buf)? as usize;
        if node_count == 0 {
            return Err(BasaltError::Corruption(
                "tree encoding has no nodes".to_string(),
            ));
        }

        let mut nodes = Vec::with_capacity(node_count);
        let mut len = 0usize;
        for _ in 0..node_count {
            let flag = take_u8(&mut buf)?;
            let key_count = take_u32(&mut buf)? as usize;
            let mut keys = Vec::with_capacity(key_count);
            for _ in 0..key_count {
                keys.push(take_string(&mut buf)?);
            }

            match flag {
                1 => {
                    let mut values = Vec::with_capacity(key_count);
                    for _ in 0..key_count {
                        values.push(take_string(&mut buf)?);
                    }
                    let next_raw = take_u32(&mut buf)?;
                    let next = if next_raw == NO_NEXT {
                        None
                    } else {
                        let next = next_raw as usize;
                        if next >= node_count {
                            return Err(BasaltError::Corruption(format!(
                                "leaf link {} out of range ({} nodes)",
                                next, node_count
                            )));
                        }
                        Some(next)
                    };
                    len += keys.len();
                    nodes.push(Node::Leaf { keys, values, next });
                }
                0 => {
                    if key_count == 0 {
                        return Err(BasaltError::Corruption(
                            "internal node without keys".to_string(),
                        ));
                    }
                    let mut children = Vec::with_capacity(key_count + 1);
                    for _ in 0..key_count + 1 {
                        let child = take_u32(&mut buf)? as usize;
                        if child >= node_count {
                            return Err(BasaltError::Corruption(format!(
                                "child index {} out of range ({} nodes)",
                                child, node_count
                            )));
                        }
                        children.push(child);
                    }
                    nodes.push(Node::Internal { keys, children });
                }
                other => {
                    return Err(BasaltError::Corruption(format!(
                        "unknown node flag {}",
                        other
                    )));
                }
            }
        }

        // Forward links must land on leaves.
        for node in &nodes {
            if let Node::Leaf {
                next: Some(next), ..
            } = node
            {
                if !nodes[*next].is_leaf() {
                    return Err(BasaltError::Corruption(
                        "leaf link points at an internal node".to_string(),
                    ));
                }
            }
        }

        Ok(BPlusTree {
            nodes,
            root: 0,
            len,
        })
    }
}

fn take_u8(buf: &mut &[u8]) -> Result<u8> {
    if buf.is_empty() {
        return Err(truncated());
    }
    let value = buf[0];
    *buf = &buf[1..];
    Ok(value)
}

fn take_u32(buf: &mut &[u8]) -> Result<u32> {
    if buf.len() < 4 {
        return Err(truncated());
    }
    let value = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    *buf = &buf[4..];
    Ok(value)
}

fn take_string(buf: &mut &[u8]) -> Result<String> {
    let len = take_u32(buf)? as usize;
    if buf.len() < len {
        return Err(truncated());
    }
    let value = String::from_utf8(buf[..len].to_vec())
        .map_err(|_| BasaltError::Corruption("tree key or value is not UTF-8".to_string()))?;
    *buf = &buf[len..];
    Ok(value)
}

fn truncated() -> BasaltError {
    BasaltError::Corruption("tree encoding truncated".to_string())
}
