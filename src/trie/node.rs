//! Trie node types
//!
//! The variant set is closed: a [`Node`] is either a 256-way branch or a
//! path node (leaf or extension). Every operation dispatches with a `match`.
//!
//! Binary form:
//! ```text
//! byte 0      kind tag (0 = leaf, 1 = extension, 2 = branch)
//! bytes 1..   bincode of the node fields
//!               branch:   (occupied slots byte -> digest, auxiliary value)
//!               leaf/ext: (path, value or child digest)
//! ```

use super::branch::BranchNode;
use super::path::{PathKind, PathNode};
use crate::model::Hash;
use crate::{Error, Result};
use bincode::Options;
use std::collections::BTreeMap;

/// Encoding tag of a leaf
pub const LEAF_TAG: u8 = 0;
/// Encoding tag of an extension
pub const EXTENSION_TAG: u8 = 1;
/// Encoding tag of a branch
pub const BRANCH_TAG: u8 = 2;

/// Where a successful `descend` leads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Descent<'a> {
    /// Child digest for branches and extensions, the value for a leaf
    pub next: &'a [u8],
    /// Key bytes used up by this node
    pub consumed: usize,
}

/// Number of nodes of each kind an `insert` adds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Increase {
    pub branches: usize,
    pub extensions: usize,
    pub leaves: usize,
}

impl Increase {
    /// Count the kinds in a stack returned by `insert`
    pub fn tally(stack: &[Node]) -> Self {
        let mut count = Increase::default();
        for node in stack {
            match node {
                Node::Branch(_) => count.branches += 1,
                Node::Path(p) if p.is_extension() => count.extensions += 1,
                Node::Path(_) => count.leaves += 1,
            }
        }
        count
    }

    pub fn total(&self) -> usize {
        self.branches + self.extensions + self.leaves
    }
}

/// The single path left behind by a collapse
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collapsed {
    pub path: Vec<u8>,
    /// Child digest, or a leaf's value
    pub value: Vec<u8>,
}

/// A node in the merkle patricia trie
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// Fan-out on the next key byte
    Branch(BranchNode),
    /// Compressed run of key bytes ending in a value or a subtree
    Path(PathNode),
}

impl Node {
    /// The kind tag written in front of the encoding
    pub fn tag(&self) -> u8 {
        match self {
            Node::Branch(_) => BRANCH_TAG,
            Node::Path(p) => p.kind().flag(),
        }
    }

    pub fn as_branch(&self) -> Option<&BranchNode> {
        match self {
            Node::Branch(b) => Some(b),
            Node::Path(_) => None,
        }
    }

    pub fn as_path(&self) -> Option<&PathNode> {
        match self {
            Node::Path(p) => Some(p),
            Node::Branch(_) => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Path(p) if p.is_leaf())
    }

    pub fn is_extension(&self) -> bool {
        matches!(self, Node::Path(p) if p.is_extension())
    }

    /// Consume the front of `key`
    ///
    /// Fails with `SlotEmpty` on a branch without a child for the lead byte
    /// and with `PathDiverge(matched)` when the key leaves a path node.
    pub fn descend(&self, key: &[u8]) -> Result<Descent<'_>> {
        match self {
            Node::Branch(b) => b.descend(key),
            Node::Path(p) => p.descend(key),
        }
    }

    /// Record a child's new digest
    ///
    /// Returns this node's new digest when its identity changed. A leaf
    /// returns `None`: it has no children and is replaced wholesale.
    pub fn ascend(&mut self, child: Hash, index: u8) -> Option<Hash> {
        match self {
            Node::Branch(b) => Some(b.ascend(child, index)),
            Node::Path(p) => p.ascend(child),
        }
    }

    /// Insert `key` below this node, returning the newly created nodes
    ///
    /// A branch mutates itself to link the new leaf; a leaf stays as it is
    /// and the first returned node replaces it.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<Vec<Node>> {
        match self {
            Node::Branch(b) => b.insert(key, value),
            Node::Path(p) => p.insert(key, value),
        }
    }

    /// Predict what `insert(key, ..)` would add, without touching the node
    pub fn increase(&self, key: &[u8]) -> Result<Increase> {
        match self {
            Node::Branch(b) => b.increase(key),
            Node::Path(p) => p.increase(key),
        }
    }

    /// Compact after the child at `index` went away
    pub fn collapse(&mut self, index: u8, child_collapse: bool) -> Option<Collapsed> {
        match self {
            Node::Branch(b) => b.collapse(index, child_collapse),
            Node::Path(p) => p.collapse(child_collapse),
        }
    }

    /// The application value held by a leaf
    pub fn blob(&self) -> Result<&[u8]> {
        match self {
            Node::Branch(_) => Err(Error::NotAValue("branch")),
            Node::Path(p) => p.blob(),
        }
    }

    pub fn hash(&self) -> Hash {
        match self {
            Node::Branch(b) => b.hash(),
            Node::Path(p) => p.hash(),
        }
    }

    /// Serialize to the tagged binary form
    pub fn encode(&self) -> Result<Vec<u8>> {
        let fields = match self {
            Node::Branch(b) => codec().serialize(&b.parts())?,
            Node::Path(p) => codec().serialize(&(p.path(), p.value()))?,
        };
        let mut out = Vec::with_capacity(1 + fields.len());
        out.push(self.tag());
        out.extend(fields);
        Ok(out)
    }

    /// Parse the tagged binary form
    pub fn decode(data: &[u8]) -> Result<Node> {
        let (&tag, fields) = data
            .split_first()
            .ok_or_else(|| Error::Decode("empty node encoding".into()))?;

        match tag {
            BRANCH_TAG => {
                let (slots, value): (BTreeMap<u8, Hash>, Vec<u8>) = codec().deserialize(fields)?;
                Ok(Node::Branch(BranchNode::from_parts(slots, value)))
            }
            LEAF_TAG | EXTENSION_TAG => {
                let (path, value): (Vec<u8>, Vec<u8>) = codec().deserialize(fields)?;
                let kind = if tag == LEAF_TAG {
                    PathKind::Leaf
                } else {
                    PathKind::Extension
                };
                Ok(Node::Path(PathNode::from_parts(kind, path, value)?))
            }
            other => Err(Error::Decode(format!("unknown node tag {}", other))),
        }
    }

    /// Overwrite this node with a decoded one
    ///
    /// The node is reset first, so a failed decode leaves an empty leaf
    /// behind rather than a mix of old and new fields.
    pub fn reload(&mut self, data: &[u8]) -> Result<()> {
        *self = Node::default();
        *self = Node::decode(data)?;
        Ok(())
    }
}

/// Fixed-width little-endian fields; anything after them is malformed
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

impl Default for Node {
    fn default() -> Self {
        Node::Path(PathNode::default())
    }
}

impl From<BranchNode> for Node {
    fn from(branch: BranchNode) -> Self {
        Node::Branch(branch)
    }
}

impl From<PathNode> for Node {
    fn from(path: PathNode) -> Self {
        Node::Path(path)
    }
}
