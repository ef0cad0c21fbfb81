//! Arena-backed radix trie
//!
//! Nodes live in a flat `Vec` owned by the slice; children are referenced by
//! index. Node 0 is the root and always has an empty label.

use super::DictId;

/// Index of a node inside its slice's arena
pub type NodeIndex = usize;

/// An edge-labeled trie node
#[derive(Debug, Clone, Default)]
pub struct DictNode {
    /// Bytes on the edge leading into this node
    label: Vec<u8>,
    /// Set when a stored value ends at this node
    id: Option<DictId>,
    /// Child indices, sorted by the first byte of their labels
    children: Vec<NodeIndex>,
}

impl DictNode {
    pub fn label(&self) -> &[u8] {
        &self.label
    }

    pub fn id(&self) -> Option<DictId> {
        self.id
    }

    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }

    pub(crate) fn from_parts(label: Vec<u8>, id: Option<DictId>, children: Vec<NodeIndex>) -> Self {
        Self { label, id, children }
    }

    pub(crate) fn push_child(&mut self, child: NodeIndex) {
        self.children.push(child);
    }
}

/// A self-contained dictionary partition
#[derive(Debug, Clone)]
pub struct DictSlice {
    nodes: Vec<DictNode>,
    entry_count: usize,
}

impl DictSlice {
    /// Create an empty slice (just the root)
    pub fn new() -> Self {
        Self {
            nodes: vec![DictNode::default()],
            entry_count: 0,
        }
    }

    /// Build a slice from `(value, id)` pairs
    ///
    /// Later duplicates of a value are ignored; the first ID wins.
    pub fn from_entries<I, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (V, DictId)>,
        V: AsRef<[u8]>,
    {
        let mut slice = Self::new();
        for (value, id) in entries {
            slice.insert(value.as_ref(), id);
        }
        slice
    }

    /// Assemble a slice from decoded parts; the caller has validated them
    pub(crate) fn from_raw_parts(nodes: Vec<DictNode>, entry_count: usize) -> Self {
        Self { nodes, entry_count }
    }

    pub fn root(&self) -> &DictNode {
        &self.nodes[0]
    }

    pub fn node(&self, index: NodeIndex) -> Option<&DictNode> {
        self.nodes.get(index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of stored values
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Store `value` with `id`
    ///
    /// Returns the existing ID, leaving the slice untouched, if the value is
    /// already present. Returns `None` when the value was inserted.
    pub fn insert(&mut self, value: &[u8], id: DictId) -> Option<DictId> {
        let mut node = 0;
        let mut rest = value;

        loop {
            if rest.is_empty() {
                if let Some(existing) = self.nodes[node].id {
                    return Some(existing);
                }
                self.nodes[node].id = Some(id);
                self.entry_count += 1;
                return None;
            }

            match self.find_child(node, rest[0]) {
                Err(pos) => {
                    let leaf = self.push_node(DictNode::from_parts(rest.to_vec(), Some(id), Vec::new()));
                    self.nodes[node].children.insert(pos, leaf);
                    self.entry_count += 1;
                    return None;
                }
                Ok(pos) => {
                    let child = self.nodes[node].children[pos];
                    let common = common_prefix_len(&self.nodes[child].label, rest);

                    if common < self.nodes[child].label.len() {
                        // Split the edge: parent -> mid(common) -> child(remaining label)
                        let tail = self.nodes[child].label.split_off(common);
                        let head = std::mem::replace(&mut self.nodes[child].label, tail);
                        let mid = self.push_node(DictNode::from_parts(head, None, vec![child]));
                        self.nodes[node].children[pos] = mid;
                        node = mid;
                    } else {
                        node = child;
                    }
                    rest = &rest[common..];
                }
            }
        }
    }

    /// ID of `value`, if stored
    pub fn get_id(&self, value: &[u8]) -> Option<DictId> {
        let mut node = 0;
        let mut rest = value;

        while !rest.is_empty() {
            let pos = self.find_child(node, rest[0]).ok()?;
            let child = self.nodes[node].children[pos];
            let label = &self.nodes[child].label;
            if !rest.starts_with(label) {
                return None;
            }
            rest = &rest[label.len()..];
            node = child;
        }

        self.nodes[node].id
    }

    /// Value stored under `id`, if any (full walk)
    pub fn value_of(&self, id: DictId) -> Option<Vec<u8>> {
        let mut found = None;
        self.walk(|value, node_id| {
            if node_id == id {
                found = Some(value.to_vec());
                false
            } else {
                true
            }
        });
        found
    }

    /// All `(value, id)` pairs in ascending value order
    pub fn entries(&self) -> Vec<(Vec<u8>, DictId)> {
        let mut out = Vec::with_capacity(self.entry_count);
        self.walk(|value, id| {
            out.push((value.to_vec(), id));
            true
        });
        out
    }

    /// Smallest stored value
    pub fn min_value(&self) -> Option<Vec<u8>> {
        let mut min = None;
        self.walk(|value, _| {
            min = Some(value.to_vec());
            false
        });
        min
    }

    /// Largest stored value
    pub fn max_value(&self) -> Option<Vec<u8>> {
        // Follow the last child; a node's own value sorts before its children
        let mut node = 0;
        let mut path = Vec::new();
        let mut last = None;
        loop {
            path.extend_from_slice(&self.nodes[node].label);
            if self.nodes[node].id.is_some() {
                last = Some(path.clone());
            }
            match self.nodes[node].children.last() {
                Some(&child) => node = child,
                None => return last,
            }
        }
    }

    /// `(id, node)` for every node that terminates a value, in arena order
    pub fn terminals(&self) -> impl Iterator<Item = (DictId, NodeIndex)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| node.id.map(|id| (id, index)))
    }

    /// Parent of every node; the root is its own parent
    pub fn parent_links(&self) -> Vec<NodeIndex> {
        let mut parents = vec![0; self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            for &child in &node.children {
                parents[child] = index;
            }
        }
        parents
    }

    /// Value spelled by the path from the root to `node`
    ///
    /// `parents` must come from `parent_links` on this slice.
    pub fn value_at(&self, node: NodeIndex, parents: &[NodeIndex]) -> Option<Vec<u8>> {
        let mut labels = Vec::new();
        let mut current = node;
        while current != 0 {
            if labels.len() >= self.nodes.len() {
                return None;
            }
            labels.push(self.nodes.get(current)?.label.as_slice());
            current = *parents.get(current)?;
        }
        Some(labels.into_iter().rev().flatten().copied().collect())
    }

    /// Largest ID stored in this slice
    pub fn max_id(&self) -> Option<DictId> {
        self.nodes.iter().filter_map(|n| n.id).max()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn push_node(&mut self, node: DictNode) -> NodeIndex {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Binary search the children of `node` by first label byte
    fn find_child(&self, node: NodeIndex, byte: u8) -> std::result::Result<usize, usize> {
        self.nodes[node]
            .children
            .binary_search_by_key(&byte, |&c| self.nodes[c].label[0])
    }

    /// Pre-order walk over terminal nodes; stops when `visit` returns false
    fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&[u8], DictId) -> bool,
    {
        let mut path: Vec<u8> = Vec::new();
        // (node, path length before this node's label)
        let mut stack: Vec<(NodeIndex, usize)> = vec![(0, 0)];

        while let Some((node, base)) = stack.pop() {
            path.truncate(base);
            path.extend_from_slice(&self.nodes[node].label);

            if let Some(id) = self.nodes[node].id {
                if !visit(&path, id) {
                    return;
                }
            }

            let len = path.len();
            for &child in self.nodes[node].children.iter().rev() {
                stack.push((child, len));
            }
        }
    }
}

impl Default for DictSlice {
    fn default() -> Self {
        Self::new()
    }
}

/// Two slices are equal when their tries have the same shape, labels and IDs,
/// regardless of arena layout.
impl PartialEq for DictSlice {
    fn eq(&self, other: &Self) -> bool {
        if self.entry_count != other.entry_count || self.nodes.len() != other.nodes.len() {
            return false;
        }

        let mut stack = vec![(0usize, 0usize)];
        while let Some((a, b)) = stack.pop() {
            let (na, nb) = (&self.nodes[a], &other.nodes[b]);
            if na.label != nb.label || na.id != nb.id || na.children.len() != nb.children.len() {
                return false;
            }
            stack.extend(na.children.iter().copied().zip(nb.children.iter().copied()));
        }
        true
    }
}

impl Eq for DictSlice {}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
