//! In-memory node store

use super::NodeStore;
use crate::model::Hash;
use crate::trie::Node;
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

/// A node store holding encoded nodes in a hash map
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: RwLock<HashMap<Hash, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct nodes stored
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

impl NodeStore for MemoryStore {
    fn get(&self, hash: &Hash) -> Result<Node> {
        let nodes = self.nodes.read();
        let data = nodes
            .get(hash)
            .ok_or_else(|| Error::NotFound(hash.to_hex()))?;
        Node::decode(data)
    }

    fn put(&self, node: &Node) -> Result<Hash> {
        let hash = node.hash();
        if self.nodes.read().contains_key(&hash) {
            return Ok(hash);
        }

        let data = node.encode()?;
        trace!(node = %hash.short(), size = data.len(), "storing node");
        self.nodes.write().insert(hash, data);
        Ok(hash)
    }

    fn contains(&self, hash: &Hash) -> bool {
        self.nodes.read().contains_key(hash)
    }
}
