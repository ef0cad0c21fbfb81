//! Slice codec
//!
//! Pre-order serialization of a `DictSlice`. Every node carries its label
//! length, label, terminal flag/ID and child count, so decoding is a single
//! forward pass with no backtracking.

use std::collections::HashSet;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DictError, Result};

use super::trie::{DictNode, NodeIndex};
use super::{DictSlice, FLAG_TERMINAL, FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Smallest encoded node: LabelLen (4) + Flags (1) + ChildCount (4)
const MIN_NODE_SIZE: usize = 9;

/// Encode a slice to bytes
pub fn encode(slice: &DictSlice) -> Vec<u8> {
    let mut body = BytesMut::with_capacity(slice.node_count() * 16);

    let mut stack: Vec<NodeIndex> = vec![0];
    while let Some(index) = stack.pop() {
        let node = match slice.node(index) {
            Some(node) => node,
            None => continue,
        };

        body.put_u32_le(node.label().len() as u32);
        body.put_slice(node.label());
        match node.id() {
            Some(id) => {
                body.put_u8(FLAG_TERMINAL);
                body.put_u32_le(id);
            }
            None => body.put_u8(0),
        }
        body.put_u32_le(node.children().len() as u32);

        // Reverse so the first child is popped (and written) first
        stack.extend(node.children().iter().rev().copied());
    }

    let crc = crc32fast::hash(&body);

    let mut out = BytesMut::with_capacity(HEADER_SIZE + body.len() + FOOTER_SIZE);
    out.put_slice(MAGIC);
    out.put_u16_le(VERSION);
    out.put_u32_le(slice.node_count() as u32);
    out.put_u32_le(slice.entry_count() as u32);
    out.put_slice(&body);
    out.put_u32_le(crc);
    out.to_vec()
}

/// Decode a slice from bytes
///
/// Any inconsistency is reported as `CorruptSlice`; nothing is repaired.
pub fn decode(bytes: &[u8]) -> Result<DictSlice> {
    if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(corrupt(format!(
            "truncated: {} bytes is smaller than header + footer",
            bytes.len()
        )));
    }

    // Header
    let mut header = &bytes[..HEADER_SIZE];
    if &header[..4] != MAGIC {
        return Err(corrupt(format!(
            "invalid magic: expected GDSL, got {:?}",
            &header[..4]
        )));
    }
    header.advance(4);
    let version = header.get_u16_le();
    if version != VERSION {
        return Err(corrupt(format!("unsupported format version: {}", version)));
    }
    let node_count = header.get_u32_le() as usize;
    let entry_count = header.get_u32_le() as usize;

    // Footer
    let body = &bytes[HEADER_SIZE..bytes.len() - FOOTER_SIZE];
    let mut footer = &bytes[bytes.len() - FOOTER_SIZE..];
    let stored_crc = footer.get_u32_le();
    let actual_crc = crc32fast::hash(body);
    if stored_crc != actual_crc {
        return Err(corrupt(format!(
            "checksum mismatch: stored {:08x}, computed {:08x}",
            stored_crc, actual_crc
        )));
    }

    if node_count == 0 || node_count > body.len() / MIN_NODE_SIZE {
        return Err(corrupt(format!(
            "node count {} inconsistent with body of {} bytes",
            node_count,
            body.len()
        )));
    }

    // Body
    let mut buf = body;
    let mut nodes: Vec<DictNode> = Vec::with_capacity(node_count);
    let mut ids: HashSet<u32> = HashSet::with_capacity(entry_count.min(node_count));

    let (root, root_children) = read_node(&mut buf)?;
    if !root.label().is_empty() {
        return Err(corrupt("root node has a non-empty label"));
    }
    if let Some(id) = root.id() {
        ids.insert(id);
    }
    nodes.push(root);

    // (parent, children still to read)
    let mut pending: Vec<(NodeIndex, usize)> = vec![(0, root_children)];

    while let Some(top) = pending.last_mut() {
        if top.1 == 0 {
            pending.pop();
            continue;
        }
        top.1 -= 1;
        let parent = top.0;

        if nodes.len() == node_count {
            return Err(corrupt(format!(
                "child counts describe more than {} nodes",
                node_count
            )));
        }

        let (node, child_count) = read_node(&mut buf)?;
        if node.label().is_empty() {
            return Err(corrupt(format!("node {} has an empty label", nodes.len())));
        }
        if node.id().is_none() && child_count == 0 {
            return Err(corrupt(format!(
                "node {} is a leaf without a value",
                nodes.len()
            )));
        }
        if let Some(id) = node.id() {
            if !ids.insert(id) {
                return Err(corrupt(format!("id {} stored twice", id)));
            }
        }

        // Children must be strictly ordered by first label byte
        let first = node.label()[0];
        if let Some(&prev) = nodes[parent].children().last() {
            if nodes[prev].label()[0] >= first {
                return Err(corrupt(format!(
                    "children of node {} are not ordered by first byte",
                    parent
                )));
            }
        }

        let index = nodes.len();
        nodes[parent].push_child(index);
        nodes.push(node);
        if child_count > 0 {
            pending.push((index, child_count));
        }
    }

    if nodes.len() != node_count {
        return Err(corrupt(format!(
            "header declares {} nodes, body holds {}",
            node_count,
            nodes.len()
        )));
    }
    if buf.has_remaining() {
        return Err(corrupt(format!("{} trailing bytes after last node", buf.remaining())));
    }
    if ids.len() != entry_count {
        return Err(corrupt(format!(
            "header declares {} entries, body holds {}",
            entry_count,
            ids.len()
        )));
    }

    Ok(DictSlice::from_raw_parts(nodes, entry_count))
}

/// Read one node; children are attached by the caller
fn read_node(buf: &mut &[u8]) -> Result<(DictNode, usize)> {
    let label_len = read_u32(buf, "label length")? as usize;
    if buf.remaining() < label_len {
        return Err(corrupt(format!(
            "truncated label: need {} bytes, have {}",
            label_len,
            buf.remaining()
        )));
    }
    let label = buf[..label_len].to_vec();
    buf.advance(label_len);

    if !buf.has_remaining() {
        return Err(corrupt("truncated node flags"));
    }
    let flags = buf.get_u8();
    if flags & !FLAG_TERMINAL != 0 {
        return Err(corrupt(format!("unknown node flags: {:#04x}", flags)));
    }
    let id = if flags & FLAG_TERMINAL != 0 {
        Some(read_u32(buf, "terminal id")?)
    } else {
        None
    };

    let child_count = read_u32(buf, "child count")? as usize;
    // Each child needs at least MIN_NODE_SIZE bytes
    if child_count > buf.remaining() / MIN_NODE_SIZE {
        return Err(corrupt(format!(
            "child count {} exceeds remaining input",
            child_count
        )));
    }

    Ok((DictNode::from_parts(label, id, Vec::with_capacity(child_count)), child_count))
}

fn read_u32(buf: &mut &[u8], what: &str) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(corrupt(format!("truncated {}", what)));
    }
    Ok(buf.get_u32_le())
}

fn corrupt(msg: impl Into<String>) -> DictError {
    DictError::CorruptSlice(msg.into())
}
