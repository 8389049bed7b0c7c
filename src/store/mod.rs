//! Content-addressed node storage
//!
//! A store maps a node digest to the node's tagged binary encoding. Putting
//! the same node twice is a no-op; nodes are never overwritten, so a
//! superseded digest simply stays behind.

mod file_store;
mod memory;

pub use file_store::FileStore;
pub use memory::MemoryStore;

use crate::model::Hash;
use crate::trie::Node;
use crate::Result;

/// Digest-addressed persistence for trie nodes
pub trait NodeStore {
    /// Load and decode the node named by `hash`
    fn get(&self, hash: &Hash) -> Result<Node>;

    /// Persist a node under its own digest, returning that digest
    fn put(&self, node: &Node) -> Result<Hash>;

    /// Check if a digest is stored
    fn contains(&self, hash: &Hash) -> bool;
}
