//! Merkle patricia trie over a node store

use super::{BranchNode, Node, PathNode};
use crate::model::Hash;
use crate::store::NodeStore;
use crate::{Error, Result};
use tracing::{debug, trace};

/// A node passed through on the way down, with the byte that led out of it
struct Step {
    node: Node,
    index: u8,
}

/// A merkle patricia trie whose nodes live in a [`NodeStore`]
///
/// Every mutation persists the new nodes immediately and moves the root to
/// a new digest; old nodes stay in the store untouched. Keys must be
/// prefix-free: branches do not hold values, so a key that ends where
/// another continues is rejected with `InvalidPatricia`.
pub struct MerkleTrie<'a, S: NodeStore> {
    store: &'a S,
    root: Option<Hash>,
}

impl<'a, S: NodeStore> MerkleTrie<'a, S> {
    /// Create a new empty trie
    pub fn new(store: &'a S) -> Self {
        MerkleTrie { store, root: None }
    }

    /// Load a trie from a root hash
    pub fn from_root(store: &'a S, root_hash: Hash) -> Result<Self> {
        if root_hash.is_zero() {
            return Ok(Self::new(store));
        }
        if !store.contains(&root_hash) {
            return Err(Error::NotFound(root_hash.to_hex()));
        }
        Ok(MerkleTrie {
            store,
            root: Some(root_hash),
        })
    }

    /// Get the root hash; the empty trie has `Hash::ZERO`
    pub fn root_hash(&self) -> Hash {
        self.root.unwrap_or(Hash::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(mut hash) = self.root else {
            return Ok(None);
        };
        let mut remaining = key;

        loop {
            let node = self.store.get(&hash)?;
            if remaining.is_empty() && node.as_branch().is_some() {
                return Ok(None);
            }

            let descent = match node.descend(remaining) {
                Ok(descent) => descent,
                Err(Error::SlotEmpty(_) | Error::PathDiverge(_)) => return Ok(None),
                Err(e) => return Err(e),
            };

            if node.is_leaf() {
                let hit = descent.consumed == remaining.len();
                return Ok(hit.then(|| descent.next.to_vec()));
            }

            hash = child_ref(descent.next)?;
            remaining = &remaining[descent.consumed..];
        }
    }

    /// Insert a key-value pair, returning the new root hash
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<Hash> {
        let Some(root) = self.root else {
            let leaf = Node::from(PathNode::leaf(key.to_vec(), value.to_vec()));
            let hash = self.store.put(&leaf)?;
            return self.set_root(hash);
        };

        let mut steps = Vec::new();
        let mut hash = root;
        let mut remaining = key;

        let subtree = loop {
            let mut node = self.store.get(&hash)?;
            let descent = node
                .descend(remaining)
                .map(|d| (d.consumed, d.next.to_vec()));

            match descent {
                Ok((consumed, _)) if node.is_leaf() => {
                    if consumed != remaining.len() {
                        return Err(Error::InvalidPatricia(format!(
                            "key {} extends a stored key",
                            hex::encode(key)
                        )));
                    }
                    let leaf = PathNode::leaf(remaining.to_vec(), value.to_vec());
                    trace!(key = %hex::encode(key), "replacing leaf value");
                    break self.store.put(&leaf.into())?;
                }
                Ok((consumed, next)) => {
                    let index = remaining[0];
                    steps.push(Step { node, index });
                    hash = child_ref(&next)?;
                    remaining = &remaining[consumed..];
                }
                Err(Error::SlotEmpty(_)) => {
                    let created = node.insert(remaining, value)?;
                    self.put_all(&created)?;
                    break self.store.put(&node)?;
                }
                Err(Error::PathDiverge(_)) if node.is_leaf() => {
                    let created = node.insert(remaining, value)?;
                    self.put_all(&created)?;
                    break created[0].hash();
                }
                Err(Error::PathDiverge(matched)) => {
                    let Node::Path(ext) = &node else {
                        return Err(Error::Corruption("branch reported a divergence".into()));
                    };
                    break self.split_extension(ext, matched, remaining, value)?;
                }
                Err(e) => return Err(e),
            }
        };

        let root = self.ascend(steps, subtree)?;
        debug!(key = %hex::encode(key), root = %root.short(), "inserted");
        self.set_root(root)
    }

    /// Remove a key, returning its value if it was present
    pub fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(mut hash) = self.root else {
            return Ok(None);
        };

        let mut steps = Vec::new();
        let mut remaining = key;

        let removed = loop {
            let node = self.store.get(&hash)?;
            if remaining.is_empty() && node.as_branch().is_some() {
                return Ok(None);
            }

            let (consumed, next) = match node.descend(remaining) {
                Ok(d) => (d.consumed, d.next.to_vec()),
                Err(Error::SlotEmpty(_) | Error::PathDiverge(_)) => return Ok(None),
                Err(e) => return Err(e),
            };

            if node.is_leaf() {
                if consumed != remaining.len() {
                    return Ok(None);
                }
                break next;
            }

            let index = remaining[0];
            steps.push(Step { node, index });
            hash = child_ref(&next)?;
            remaining = &remaining[consumed..];
        };

        self.root = self.detach_leaf(steps)?;
        debug!(key = %hex::encode(key), root = %self.root_hash().short(), "removed");
        Ok(Some(removed))
    }

    /// List all keys with a given prefix, in key order
    pub fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut results = Vec::new();
        if let Some(root) = self.root {
            self.collect_prefix(root, prefix, Vec::new(), &mut results)?;
        }
        Ok(results)
    }

    // === Internal helpers ===

    fn set_root(&mut self, root: Hash) -> Result<Hash> {
        self.root = Some(root);
        Ok(root)
    }

    fn put_all(&self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            self.store.put(node)?;
        }
        Ok(())
    }

    /// Propagate a new child digest from the bottom of `steps` to the root
    fn ascend(&self, mut steps: Vec<Step>, mut child: Hash) -> Result<Hash> {
        while let Some(Step { mut node, index }) = steps.pop() {
            if node.ascend(child, index).is_none() {
                return Err(Error::Corruption("leaf found above another node".into()));
            }
            child = self.store.put(&node)?;
        }
        Ok(child)
    }

    /// Split an extension that `key` leaves after `matched` bytes
    ///
    /// Builds `[prefix extension] -> branch -> {[suffix extension] -> old
    /// subtree, new leaf}` and returns the digest of its top node.
    fn split_extension(
        &self,
        ext: &PathNode,
        matched: usize,
        key: &[u8],
        value: &[u8],
    ) -> Result<Hash> {
        let path = ext.path();
        let child = ext
            .child()
            .ok_or_else(|| Error::Corruption("extension without a child digest".into()))?;
        if matched == key.len() {
            return Err(Error::InvalidPatricia(format!(
                "key {} ends inside extension {}",
                hex::encode(key),
                hex::encode(path)
            )));
        }

        let old_side = if matched + 1 < path.len() {
            let suffix = PathNode::extension(path[matched + 1..].to_vec(), child)?;
            self.store.put(&suffix.into())?
        } else {
            child
        };
        let leaf = PathNode::leaf(key[matched + 1..].to_vec(), value.to_vec());

        let mut branch = BranchNode::new();
        branch.set_slot(path[matched], old_side);
        branch.set_slot(key[matched], self.store.put(&leaf.into())?);
        let mut top = self.store.put(&branch.into())?;

        if matched > 0 {
            let prefix = PathNode::extension(path[..matched].to_vec(), top)?;
            top = self.store.put(&prefix.into())?;
        }
        trace!(
            extension = %hex::encode(path),
            matched,
            "split extension"
        );
        Ok(top)
    }

    /// Rebuild the path above a deleted leaf, collapsing where needed
    fn detach_leaf(&self, mut steps: Vec<Step>) -> Result<Option<Hash>> {
        // The leaf was the root
        let Some(Step { node, index }) = steps.pop() else {
            return Ok(None);
        };
        let Node::Branch(mut branch) = node else {
            return Err(Error::Corruption("leaf hangs off a path node".into()));
        };

        let child = match branch.collapse(index, true) {
            Some(single) => {
                let mut replacement = self.merge_single_child(&single.path, &single.value)?;

                // An extension directly above absorbs the merged path
                let outer = match steps.last_mut() {
                    Some(step) if step.node.is_extension() => step.node.collapse(step.index, true),
                    _ => None,
                };
                if let Some(outer) = outer {
                    steps.pop();
                    replacement = replacement.prefixed(&outer.path);
                }
                trace!(path = %hex::encode(replacement.path()), "collapsed branch");
                self.store.put(&replacement.into())?
            }
            None => {
                branch.clear(index);
                self.store.put(&branch.into())?
            }
        };

        self.ascend(steps, child).map(Some)
    }

    /// Turn the last child of a degenerate branch into a single path node
    fn merge_single_child(&self, path: &[u8], reference: &[u8]) -> Result<PathNode> {
        let child_hash = child_ref(reference)?;
        match self.store.get(&child_hash)? {
            Node::Path(p) => Ok(p.prefixed(path)),
            Node::Branch(_) => PathNode::extension(path.to_vec(), child_hash),
        }
    }

    fn collect_prefix(
        &self,
        hash: Hash,
        prefix: &[u8],
        current: Vec<u8>,
        results: &mut Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<()> {
        let relevant = |key: &[u8]| key.starts_with(prefix) || prefix.starts_with(key);

        match self.store.get(&hash)? {
            Node::Branch(branch) => {
                for (byte, child) in branch.slots() {
                    let mut key = current.clone();
                    key.push(byte);
                    if relevant(key.as_slice()) {
                        self.collect_prefix(child, prefix, key, results)?;
                    }
                }
            }
            Node::Path(node) => {
                let mut key = current;
                key.extend_from_slice(node.path());
                if !relevant(key.as_slice()) {
                    return Ok(());
                }
                match node.child() {
                    Some(child) => self.collect_prefix(child, prefix, key, results)?,
                    None if key.starts_with(prefix) => results.push((key, node.value().to_vec())),
                    None => {}
                }
            }
        }
        Ok(())
    }
}

fn child_ref(bytes: &[u8]) -> Result<Hash> {
    Hash::from_slice(bytes)
        .ok_or_else(|| Error::Corruption(format!("child reference has {} bytes", bytes.len())))
}
