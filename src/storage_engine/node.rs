use crate::error::{Error, Result};
use crate::storage_engine::TreeConfig;
use std::fmt::{self, Display};

/// One B-tree page. Keys are 64-bit content hashes in strictly ascending order among
/// occupied slots, with a parallel frequency for each key. Empty key and child slots are
/// `None` and only ever trail the occupied slots. A node either has no children (a leaf)
/// or one more child than keys.
///
/// The address is the node's byte offset within the backing file and doubles as the
/// pointer value stored in parents and children. Parent links are maintained on writes
/// but never used for descent, so stale parent links in grandchildren after a split are
/// tolerated.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub address: u64,
    pub parent: Option<u64>,
    /// Ordered child addresses, `order + 1` slots.
    pub children: Vec<Option<u64>>,
    /// Ordered keys, `order` slots.
    pub keys: Vec<Option<u64>>,
    /// Occurrence counts parallel to `keys`. Unused slots are held at 0 so that encoding
    /// round-trips exactly.
    pub frequencies: Vec<u32>,
}

impl Node {
    /// Creates an empty leaf node at the given address.
    pub fn new(config: &TreeConfig, address: u64) -> Self {
        Self {
            address,
            parent: None,
            children: vec![None; config.num_children()],
            keys: vec![None; config.order],
            frequencies: vec![0; config.order],
        }
    }

    /// Number of occupied key slots.
    pub fn num_keys(&self) -> usize {
        self.keys.iter().filter(|k| k.is_some()).count()
    }

    /// A node is a leaf iff it has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(|c| c.is_none())
    }

    /// A node is full when every key slot is occupied.
    pub fn is_full(&self) -> bool {
        self.keys.iter().all(|k| k.is_some())
    }

    /// Returns the slot index holding exactly this key, if present.
    pub fn key_index(&self, key: u64) -> Option<usize> {
        self.keys.iter().position(|k| *k == Some(key))
    }

    /// Returns the index of the child responsible for the given key, i.e. the number of
    /// keys strictly less than it. Keys are ascending with trailing `None`s, so the scan
    /// short-circuits on the first key at or above the target.
    pub fn child_index(&self, key: u64) -> usize {
        self.keys.iter().flatten().take_while(|k| **k < key).count()
    }

    /// Inserts a key and frequency into a leaf, shifting larger keys one slot to the
    /// right. The caller must have ruled out a full node and a duplicate key.
    pub fn insert_slot(&mut self, key: u64, frequency: u32) -> Result<()> {
        if self.is_full() {
            return Err(Error::Internal(format!("Insert into full node {}", self.address)));
        }
        let at = self.child_index(key);
        let n = self.num_keys();
        for i in (at..n).rev() {
            self.keys[i + 1] = self.keys[i];
            self.frequencies[i + 1] = self.frequencies[i];
        }
        self.keys[at] = Some(key);
        self.frequencies[at] = frequency;
        Ok(())
    }

    /// Every occupied (key, frequency) pair in this node, in key order.
    pub fn entries(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.keys
            .iter()
            .zip(self.frequencies.iter())
            .filter_map(|(k, f)| k.map(|k| (k, *f)))
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node {} parent ", self.address)?;
        match self.parent {
            Some(p) => write!(f, "{}", p)?,
            None => write!(f, "-")?,
        }
        write!(f, " children [")?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match child {
                Some(c) => write!(f, "{}", c)?,
                None => write!(f, "-")?,
            }
        }
        write!(f, "] keys [")?;
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match key {
                Some(k) => write!(f, "{}={}", k, self.frequencies[i])?,
                None => write!(f, "-")?,
            }
        }
        write!(f, "]")
    }
}
