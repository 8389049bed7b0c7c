//! 256-way branch node

use super::node::{Collapsed, Descent, Increase, Node, BRANCH_TAG};
use super::path::PathNode;
use crate::model::Hash;
use crate::{Error, Result, HASH_SIZE};
use std::collections::BTreeMap;

/// A full node fanning out on the next key byte
///
/// Only occupied slots are kept; iterating the map in key order gives the
/// same stream as walking all `RADIX` slots and skipping the empty ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BranchNode {
    slots: BTreeMap<u8, Hash>,
    /// Folded into the hash and the encoding, never written by the trie
    value: Vec<u8>,
}

impl BranchNode {
    /// Create a branch with every slot empty
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(slots: BTreeMap<u8, Hash>, value: Vec<u8>) -> Self {
        BranchNode { slots, value }
    }

    /// Digest stored in a slot, if any
    pub fn slot(&self, index: u8) -> Option<Hash> {
        self.slots.get(&index).copied()
    }

    /// Point a slot at a child
    pub fn set_slot(&mut self, index: u8, child: Hash) {
        self.slots.insert(index, child);
    }

    /// Empty a slot, returning what it held
    pub fn clear(&mut self, index: u8) -> Option<Hash> {
        self.slots.remove(&index)
    }

    /// Occupied slots in key order
    pub fn slots(&self) -> impl Iterator<Item = (u8, Hash)> + '_ {
        self.slots.iter().map(|(k, h)| (*k, *h))
    }

    pub fn occupied(&self) -> usize {
        self.slots.len()
    }

    /// The auxiliary value bytes
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub(crate) fn parts(&self) -> (&BTreeMap<u8, Hash>, &Vec<u8>) {
        (&self.slots, &self.value)
    }

    /// Follow the slot named by the lead byte of `key`
    pub fn descend(&self, key: &[u8]) -> Result<Descent<'_>> {
        let lead = lead_byte(key)?;
        match self.slots.get(&lead) {
            Some(child) => Ok(Descent {
                next: child.as_ref(),
                consumed: 1,
            }),
            None => Err(Error::SlotEmpty(lead)),
        }
    }

    /// Store a child's new digest and return this branch's new digest
    pub fn ascend(&mut self, child: Hash, index: u8) -> Hash {
        self.slots.insert(index, child);
        self.hash()
    }

    /// Hang a new leaf for `key[1..]` off the empty slot `key[0]`
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<Vec<Node>> {
        self.increase(key)?;
        let (lead, rest) = (key[0], &key[1..]);

        let leaf = PathNode::leaf(rest.to_vec(), value.to_vec());
        self.slots.insert(lead, leaf.hash());
        Ok(vec![Node::Path(leaf)])
    }

    /// Nodes `insert` would add: always a single leaf
    pub fn increase(&self, key: &[u8]) -> Result<Increase> {
        let lead = lead_byte(key)?;
        if self.slots.contains_key(&lead) {
            return Err(Error::SlotOccupied(lead));
        }
        Ok(Increase {
            branches: 0,
            extensions: 0,
            leaves: 1,
        })
    }

    /// Report the single remaining path if removing slot `index` leaves one
    ///
    /// Clears `index` only when the branch does degenerate.
    pub fn collapse(&mut self, index: u8, child_collapse: bool) -> Option<Collapsed> {
        if !child_collapse {
            return None;
        }

        let mut others = self.slots.iter().filter(|(k, _)| **k != index);
        let (&key, &child) = others.next()?;
        if others.next().is_some() {
            return None;
        }

        self.slots.remove(&index);
        Some(Collapsed {
            path: vec![key],
            value: child.as_ref().to_vec(),
        })
    }

    /// Digest of the tag, the slot count, each `index ++ child` entry in
    /// slot order, then the auxiliary value
    pub fn hash(&self) -> Hash {
        let mut entries = Vec::with_capacity(self.slots.len() * (1 + HASH_SIZE));
        for (&index, child) in &self.slots {
            entries.push(index);
            entries.extend_from_slice(child.as_bytes());
        }
        Hash::digest_many([
            &[BRANCH_TAG][..],
            &(self.slots.len() as u16).to_le_bytes()[..],
            entries.as_slice(),
            self.value.as_slice(),
        ])
    }
}

fn lead_byte(key: &[u8]) -> Result<u8> {
    key.first()
        .copied()
        .ok_or_else(|| Error::InvalidPatricia("branch reached with an exhausted key".into()))
}
