//! # patricia_db
//!
//! A content-addressed Merkle Patricia trie.
//!
//! Every node is named by the BLAKE3 digest of its content, so the digest
//! of the root certifies the entire key/value mapping. The node layer
//! ([`trie::Node`]) keeps the trie canonical: no single-child branches and
//! no zero-length extensions, under any sequence of inserts and removals.
//!
//! ## Core Concepts
//!
//! - **Branches**: 256-way fan-out on the next key byte
//! - **Leaves**: a compressed key suffix and the value it maps to
//! - **Extensions**: a compressed run of key bytes leading to a branch
//! - **Stores**: digest → encoded node, in memory or in a single file
//!
//! ## Example
//!
//! ```
//! use patricia_db::{MemoryStore, MerkleTrie};
//!
//! let store = MemoryStore::new();
//! let mut trie = MerkleTrie::new(&store);
//! trie.insert(b"key:a", b"one")?;
//! trie.insert(b"key:b", b"two")?;
//! assert_eq!(trie.get(b"key:a")?, Some(b"one".to_vec()));
//! # Ok::<(), patricia_db::Error>(())
//! ```

pub mod model;
pub mod store;
pub mod trie;

mod error;

pub use error::{Error, Result};
pub use model::Hash;
pub use store::{FileStore, MemoryStore, NodeStore};
pub use trie::{BranchNode, MerkleTrie, Node, PathKind, PathNode};

/// Number of slots in a branch node, one per byte value
pub const RADIX: usize = 256;

/// Size of a node digest in bytes
pub const HASH_SIZE: usize = 32;

/// Store file format version
pub const VERSION: u32 = 1;

/// Magic bytes for file identification
pub const MAGIC: &[u8; 8] = b"PATRICIA";
