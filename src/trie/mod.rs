//! Merkle patricia trie
//!
//! This implements a content-addressed radix trie where:
//! - Branch nodes fan out 256 ways on the next key byte
//! - Leaf and extension nodes compress runs of key bytes
//! - Each node's hash is derived from its children's hashes
//! - The root hash uniquely identifies the whole mapping

mod branch;
mod node;
mod path;
mod tree;

pub use branch::BranchNode;
pub use node::{Collapsed, Descent, Increase, Node, BRANCH_TAG, EXTENSION_TAG, LEAF_TAG};
pub use path::{PathKind, PathNode};
pub use tree::MerkleTrie;
