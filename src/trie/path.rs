//! Path-compressed nodes: leaves and extensions

use super::branch::BranchNode;
use super::node::{Collapsed, Descent, Increase, Node};
use crate::model::Hash;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Which flavour of path node this is
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    /// Ends a key and stores its value
    #[default]
    Leaf,
    /// Skips a run of key bytes on the way to a deeper branch
    Extension,
}

impl PathKind {
    /// The flag byte, which doubles as the encoding tag
    pub fn flag(self) -> u8 {
        match self {
            PathKind::Leaf => 0,
            PathKind::Extension => 1,
        }
    }
}

/// A run of key bytes with no branching, plus a value or a child reference
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathNode {
    kind: PathKind,
    path: Vec<u8>,
    /// Application value for a leaf, child digest for an extension
    value: Vec<u8>,
}

impl PathNode {
    /// Create a leaf; the path may be empty
    pub fn leaf(path: Vec<u8>, value: Vec<u8>) -> Self {
        PathNode {
            kind: PathKind::Leaf,
            path,
            value,
        }
    }

    /// Create an extension; a zero-length path is rejected
    pub fn extension(path: Vec<u8>, child: Hash) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::InvalidPatricia(
                "extension must cover at least one key byte".into(),
            ));
        }
        Ok(PathNode {
            kind: PathKind::Extension,
            path,
            value: child.as_ref().to_vec(),
        })
    }

    /// Rebuild a decoded node; a malformed extension is `Corruption`
    pub(crate) fn from_parts(kind: PathKind, path: Vec<u8>, value: Vec<u8>) -> Result<Self> {
        match kind {
            PathKind::Leaf => Ok(Self::leaf(path, value)),
            PathKind::Extension => {
                if path.is_empty() {
                    return Err(Error::Corruption("extension with an empty path".into()));
                }
                let child = Hash::from_slice(&value).ok_or_else(|| {
                    Error::Corruption(format!(
                        "extension reference has {} bytes",
                        value.len()
                    ))
                })?;
                Self::extension(path, child)
            }
        }
    }

    pub fn kind(&self) -> PathKind {
        self.kind
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == PathKind::Leaf
    }

    pub fn is_extension(&self) -> bool {
        self.kind == PathKind::Extension
    }

    /// The compressed key bytes
    pub fn path(&self) -> &[u8] {
        &self.path
    }

    /// Raw value bytes, whatever the kind
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Subtree reference of an extension
    pub fn child(&self) -> Option<Hash> {
        match self.kind {
            PathKind::Extension => Hash::from_slice(&self.value),
            PathKind::Leaf => None,
        }
    }

    /// Same node with `prefix` prepended to its path
    pub fn prefixed(&self, prefix: &[u8]) -> PathNode {
        let mut path = Vec::with_capacity(prefix.len() + self.path.len());
        path.extend_from_slice(prefix);
        path.extend_from_slice(&self.path);
        PathNode {
            kind: self.kind,
            path,
            value: self.value.clone(),
        }
    }

    /// Match the stored path against the front of `key`
    pub fn descend(&self, key: &[u8]) -> Result<Descent<'_>> {
        let matched = common_prefix_len(&self.path, key);
        if matched == self.path.len() {
            Ok(Descent {
                next: &self.value,
                consumed: matched,
            })
        } else {
            Err(Error::PathDiverge(matched))
        }
    }

    /// Point an extension at a new subtree; leaves are replaced, never patched
    pub fn ascend(&mut self, child: Hash) -> Option<Hash> {
        match self.kind {
            PathKind::Leaf => None,
            PathKind::Extension => {
                self.value = child.as_ref().to_vec();
                Some(self.hash())
            }
        }
    }

    /// Split this leaf where `key` diverges from it
    ///
    /// Returns `[extension], branch, old leaf, new leaf`; the extension is
    /// present only when the two keys share a prefix. Extensions return an
    /// empty stack: their subtree has to be resolved by the caller first.
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<Vec<Node>> {
        if self.is_extension() {
            return Ok(Vec::new());
        }

        let m = self.split_point(key)?;
        let old = PathNode::leaf(self.path[m + 1..].to_vec(), self.value.clone());
        let new = PathNode::leaf(key[m + 1..].to_vec(), value.to_vec());

        let mut branch = BranchNode::new();
        branch.set_slot(self.path[m], old.hash());
        branch.set_slot(key[m], new.hash());

        let mut stack = Vec::with_capacity(4);
        if m > 0 {
            let ext = PathNode::extension(key[..m].to_vec(), branch.hash())?;
            stack.push(Node::Path(ext));
        }
        stack.push(Node::Branch(branch));
        stack.push(Node::Path(old));
        stack.push(Node::Path(new));
        Ok(stack)
    }

    /// Nodes `insert` would add for `key`
    pub fn increase(&self, key: &[u8]) -> Result<Increase> {
        if self.is_extension() {
            return Ok(Increase::default());
        }

        let m = self.split_point(key)?;
        Ok(Increase {
            branches: 1,
            extensions: usize::from(m > 0),
            leaves: 2,
        })
    }

    /// A path node is a single path by construction; defer to the parent
    pub fn collapse(&self, child_collapse: bool) -> Option<Collapsed> {
        child_collapse.then(|| Collapsed {
            path: self.path.clone(),
            value: self.value.clone(),
        })
    }

    /// The stored application value
    pub fn blob(&self) -> Result<&[u8]> {
        match self.kind {
            PathKind::Leaf => Ok(&self.value),
            PathKind::Extension => Err(Error::NotAValue("extension")),
        }
    }

    /// Digest of `flag ++ len(path) ++ path ++ value`, length as u64 LE
    pub fn hash(&self) -> Hash {
        Hash::digest_many([
            &[self.kind.flag()][..],
            &(self.path.len() as u64).to_le_bytes()[..],
            self.path.as_slice(),
            self.value.as_slice(),
        ])
    }

    fn split_point(&self, key: &[u8]) -> Result<usize> {
        let m = common_prefix_len(&self.path, key);
        if m == self.path.len() {
            return Err(Error::InvalidPatricia(format!(
                "try to split a node with matching path = {}",
                hex::encode(&self.path)
            )));
        }
        if m == key.len() {
            return Err(Error::InvalidPatricia(format!(
                "key {} ends inside path = {}",
                hex::encode(key),
                hex::encode(&self.path)
            )));
        }
        Ok(m)
    }
}

/// Find the length of the common prefix between two byte slices
pub(crate) fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descend_full_match() {
        let leaf = PathNode::leaf(vec![0x10, 0x20], b"v".to_vec());
        let descent = leaf.descend(&[0x10, 0x20]).unwrap();
        assert_eq!(descent.consumed, 2);
        assert_eq!(descent.next, b"v");

        let empty = PathNode::leaf(Vec::new(), b"v".to_vec());
        assert_eq!(empty.descend(&[]).unwrap().consumed, 0);
    }

    #[test]
    fn test_descend_reports_matched_length() {
        let leaf = PathNode::leaf(vec![0x10, 0x20, 0x30], b"v".to_vec());
        assert!(matches!(
            leaf.descend(&[0x10, 0x20, 0x99]),
            Err(Error::PathDiverge(2))
        ));
        assert!(matches!(leaf.descend(&[0x10]), Err(Error::PathDiverge(1))));
        assert!(matches!(leaf.descend(&[0x99]), Err(Error::PathDiverge(0))));
    }

    #[test]
    fn test_zero_length_extension_rejected() {
        let err = PathNode::extension(Vec::new(), Hash::digest(b"b")).unwrap_err();
        assert!(err.is_invalid_patricia());
    }

    #[test]
    fn test_split_with_shared_prefix() {
        let leaf = PathNode::leaf(vec![0x61, 0x62], b"V1".to_vec());
        let stack = leaf.insert(&[0x61, 0x63], b"V2").unwrap();
        assert_eq!(stack.len(), 4);

        let ext = stack[0].as_path().unwrap();
        assert!(ext.is_extension());
        assert_eq!(ext.path(), &[0x61]);
        assert_eq!(ext.child(), Some(stack[1].hash()));

        let branch = stack[1].as_branch().unwrap();
        assert_eq!(branch.occupied(), 2);
        assert_eq!(branch.slot(0x62), Some(stack[2].hash()));
        assert_eq!(branch.slot(0x63), Some(stack[3].hash()));

        let (l1, l2) = (stack[2].as_path().unwrap(), stack[3].as_path().unwrap());
        assert!(l1.path().is_empty() && l2.path().is_empty());
        assert_eq!(l1.blob().unwrap(), b"V1");
        assert_eq!(l2.blob().unwrap(), b"V2");
    }

    #[test]
    fn test_split_without_shared_prefix() {
        let leaf = PathNode::leaf(vec![0x61], b"V1".to_vec());
        let stack = leaf.insert(&[0x62], b"V2").unwrap();
        assert_eq!(stack.len(), 3);
        assert!(stack[0].as_branch().is_some());
    }

    #[test]
    fn test_split_keeps_tails() {
        let leaf = PathNode::leaf(vec![1, 2, 3, 4], b"old".to_vec());
        let stack = leaf.insert(&[1, 2, 9, 8, 7], b"new").unwrap();
        assert_eq!(stack[0].as_path().unwrap().path(), &[1, 2]);
        assert_eq!(stack[2].as_path().unwrap().path(), &[4]);
        assert_eq!(stack[3].as_path().unwrap().path(), &[8, 7]);
    }

    #[test]
    fn test_split_rejects_full_match_and_prefix_keys() {
        let leaf = PathNode::leaf(vec![1, 2], b"v".to_vec());
        assert!(leaf.insert(&[1, 2], b"w").unwrap_err().is_invalid_patricia());
        assert!(leaf.insert(&[1, 2, 3], b"w").unwrap_err().is_invalid_patricia());
        assert!(leaf.insert(&[1], b"w").unwrap_err().is_invalid_patricia());
    }

    #[test]
    fn test_extension_insert_is_pass_through() {
        let ext = PathNode::extension(vec![1], Hash::digest(b"b")).unwrap();
        assert!(ext.insert(&[2, 3], b"v").unwrap().is_empty());
        assert_eq!(ext.increase(&[2, 3]).unwrap(), Increase::default());
    }

    #[test]
    fn test_ascend_by_kind() {
        let mut leaf = PathNode::leaf(vec![1], b"v".to_vec());
        assert_eq!(leaf.ascend(Hash::digest(b"c")), None);
        assert_eq!(leaf.value(), b"v");

        let mut ext = PathNode::extension(vec![1], Hash::digest(b"b")).unwrap();
        let before = ext.hash();
        let after = ext.ascend(Hash::digest(b"c")).unwrap();
        assert_ne!(before, after);
        assert_eq!(ext.child(), Some(Hash::digest(b"c")));
    }

    #[test]
    fn test_collapse_returns_own_path() {
        let ext = PathNode::extension(vec![4, 5], Hash::digest(b"b")).unwrap();
        assert!(ext.collapse(false).is_none());
        let collapsed = ext.collapse(true).unwrap();
        assert_eq!(collapsed.path, vec![4, 5]);
        assert_eq!(collapsed.value, Hash::digest(b"b").as_ref().to_vec());
    }

    #[test]
    fn test_blob_by_kind() {
        let leaf = PathNode::leaf(vec![1], b"payload".to_vec());
        assert_eq!(leaf.blob().unwrap(), b"payload");

        let ext = PathNode::extension(vec![1], Hash::digest(b"b")).unwrap();
        assert!(matches!(ext.blob(), Err(Error::NotAValue(_))));
    }

    #[test]
    fn test_hash_covers_flag() {
        let child = Hash::digest(b"b");
        let leaf = PathNode::leaf(vec![1], child.as_ref().to_vec());
        let ext = PathNode::extension(vec![1], child).unwrap();
        assert_ne!(leaf.hash(), ext.hash());
        assert_eq!(
            ext.hash(),
            Hash::digest_many([
                &[1u8][..],
                &1u64.to_le_bytes()[..],
                &[1u8][..],
                child.as_ref(),
            ])
        );
    }

    #[test]
    fn test_hash_separates_path_from_value() {
        let long_path = PathNode::leaf(b"ab".to_vec(), Vec::new());
        let long_value = PathNode::leaf(b"a".to_vec(), b"b".to_vec());
        assert_ne!(long_path.hash(), long_value.hash());
    }
}
