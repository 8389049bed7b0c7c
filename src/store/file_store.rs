//! Single-file node store
//!
//! File format:
//! ```text
//! [HEADER: 64 bytes]
//!   - magic: 8 bytes ("PATRICIA")
//!   - version: 4 bytes (u32 LE)
//!   - flags: 4 bytes
//!   - object_count: 8 bytes (u64 LE)
//!   - index_offset: 8 bytes (u64 LE)
//!   - root: 32 bytes (digest of the current root node, zero if empty)
//!
//! [RECORDS: variable]
//!   - zstd-compressed node encodings, concatenated
//!
//! [INDEX: variable]
//!   - sorted array of (digest, offset, size) entries
//! ```

use super::NodeStore;
use crate::model::Hash;
use crate::trie::Node;
use crate::{Error, Result, HASH_SIZE, MAGIC, VERSION};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const HEADER_SIZE: u64 = 64;
const ROOT_OFFSET: usize = 32;
/// 32 (digest) + 8 (offset) + 4 (size)
const INDEX_ENTRY_SIZE: usize = HASH_SIZE + 12;
const ZSTD_LEVEL: i32 = 3;

/// Index entry for a stored node
#[derive(Clone, Copy, Debug)]
struct IndexEntry {
    offset: u64,
    size: u32,
}

/// A content-addressed node store backed by a single file
pub struct FileStore {
    path: PathBuf,
    file: RwLock<File>,
    index: RwLock<HashMap<Hash, IndexEntry>>,
    root: RwLock<Hash>,
    /// Current append position
    write_offset: RwLock<u64>,
}

impl FileStore {
    /// Create a new store file, truncating any existing one
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        header[0..8].copy_from_slice(MAGIC);
        header[8..12].copy_from_slice(&VERSION.to_le_bytes());
        file.write_all(&header)?;
        file.sync_all()?;

        debug!(path = %path.display(), "created node store");
        Ok(FileStore {
            path,
            file: RwLock::new(file),
            index: RwLock::new(HashMap::new()),
            root: RwLock::new(Hash::ZERO),
            write_offset: RwLock::new(HEADER_SIZE),
        })
    }

    /// Open an existing store file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..8] != MAGIC {
            return Err(Error::InvalidFile("Invalid magic bytes".into()));
        }

        let version = read_u32(&header, 8);
        if version != VERSION {
            return Err(Error::VersionMismatch {
                expected: VERSION,
                found: version,
            });
        }

        let object_count = read_u64(&header, 16);
        let index_offset = read_u64(&header, 24);
        let root = read_hash(&header, ROOT_OFFSET);

        let mut index = HashMap::new();
        if index_offset > 0 && object_count > 0 {
            file.seek(SeekFrom::Start(index_offset))?;
            for _ in 0..object_count {
                let mut entry = [0u8; INDEX_ENTRY_SIZE];
                file.read_exact(&mut entry)?;

                let hash = read_hash(&entry, 0);
                let offset = read_u64(&entry, HASH_SIZE);
                let size = read_u32(&entry, HASH_SIZE + 8);
                index.insert(hash, IndexEntry { offset, size });
            }
        }

        // Records end where the index begins
        let write_offset = if index_offset > 0 {
            index_offset
        } else {
            file.seek(SeekFrom::End(0))?
        };

        debug!(
            path = %path.display(),
            nodes = index.len(),
            root = %root.short(),
            "opened node store"
        );
        Ok(FileStore {
            path,
            file: RwLock::new(file),
            index: RwLock::new(index),
            root: RwLock::new(root),
            write_offset: RwLock::new(write_offset),
        })
    }

    /// Open or create a store file
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Digest of the root node recorded in the header
    pub fn root(&self) -> Hash {
        *self.root.read()
    }

    /// Record a new root; written out on the next `sync`
    pub fn set_root(&self, root: Hash) {
        *self.root.write() = root;
    }

    /// Get the number of nodes in the store
    pub fn object_count(&self) -> usize {
        self.index.read().len()
    }

    /// Flush the index and header to disk
    pub fn sync(&self) -> Result<()> {
        let index = self.index.read();
        let root = *self.root.read();
        let write_offset = *self.write_offset.read();
        let mut file = self.file.write();

        file.seek(SeekFrom::Start(16))?;
        file.write_all(&(index.len() as u64).to_le_bytes())?;
        file.write_all(&write_offset.to_le_bytes())?;
        file.write_all(root.as_bytes())?;

        file.seek(SeekFrom::Start(write_offset))?;

        // Sort by hash for determinism
        let mut entries: Vec<_> = index.iter().collect();
        entries.sort_by_key(|(h, _)| **h);

        for (hash, entry) in entries {
            file.write_all(hash.as_bytes())?;
            file.write_all(&entry.offset.to_le_bytes())?;
            file.write_all(&entry.size.to_le_bytes())?;
        }

        let end = write_offset + (index.len() * INDEX_ENTRY_SIZE) as u64;
        file.set_len(end)?;
        file.sync_all()?;
        debug!(nodes = index.len(), root = %root.short(), "synced node store");
        Ok(())
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NodeStore for FileStore {
    fn get(&self, hash: &Hash) -> Result<Node> {
        let entry = self
            .index
            .read()
            .get(hash)
            .copied()
            .ok_or_else(|| Error::NotFound(hash.to_hex()))?;

        let mut data = vec![0u8; entry.size as usize];
        {
            let mut file = self.file.write();
            file.seek(SeekFrom::Start(entry.offset))?;
            file.read_exact(&mut data)?;
        }

        let encoded = zstd::decode_all(data.as_slice())?;
        let node = Node::decode(&encoded)?;
        if node.hash() != *hash {
            return Err(Error::Corruption(format!(
                "node stored under {} hashes to {}",
                hash.short(),
                node.hash().short()
            )));
        }
        Ok(node)
    }

    fn put(&self, node: &Node) -> Result<Hash> {
        let hash = node.hash();
        if self.index.read().contains_key(&hash) {
            return Ok(hash);
        }

        let compressed = zstd::encode_all(node.encode()?.as_slice(), ZSTD_LEVEL)?;
        let size = compressed.len() as u32;

        let offset = {
            let mut write_offset = self.write_offset.write();
            let offset = *write_offset;

            let mut file = self.file.write();
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(&compressed)?;

            *write_offset = offset + size as u64;
            offset
        };

        trace!(node = %hash.short(), offset, size, "appended node");
        self.index.write().insert(hash, IndexEntry { offset, size });
        Ok(hash)
    }

    fn contains(&self, hash: &Hash) -> bool {
        self.index.read().contains_key(hash)
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.sync();
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

fn read_hash(buf: &[u8], at: usize) -> Hash {
    let mut bytes = [0u8; HASH_SIZE];
    bytes.copy_from_slice(&buf[at..at + HASH_SIZE]);
    Hash::from_bytes(bytes)
}
