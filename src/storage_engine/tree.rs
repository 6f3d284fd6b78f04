use crate::error::{Error, Result};
use crate::storage_engine::{codec, BlockFile, Node, NodeCache, TreeConfig};
use log::{debug, error};
use std::path::Path;

/// Address of the root node. The root never moves: when it splits, the old root is
/// relocated to a freshly allocated address and a new empty node takes over address 0.
pub const ROOT_ADDRESS: u64 = 0;

/// A persistent B-tree mapping 64-bit content hashes to occurrence counts, one backing
/// file per tree. Nodes are fixed-size blocks addressed by file offset; reads consult the
/// bounded node cache before the file, and every mutation writes through both within the
/// same operation.
///
/// The tree assumes a single writer and no concurrent access to its backing file: address
/// allocation re-derives from the file length, so two instances over one file can hand
/// out the same address. Multi-block mutations (splits) are not atomic; a crash between
/// the writes of a split leaves the file partially split with no recovery procedure.
#[derive(Debug)]
pub struct Tree {
    file: BlockFile,
    cache: NodeCache,
    config: TreeConfig,
}

impl Tree {
    /// Opens the tree at the given path, creating the backing file with an empty root
    /// node if it does not exist. Opening an existing file reads the node at address 0
    /// as the root, surfacing on-disk corruption immediately.
    pub fn open(path: impl AsRef<Path>, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        let file = BlockFile::open(path, config.block_size)?;
        let cache = NodeCache::new(config.cache_size);
        let mut tree = Self { file, cache, config };
        if tree.file.is_empty()? {
            let root = Node::new(&tree.config, ROOT_ADDRESS);
            tree.write_node(&root)?;
        } else {
            tree.read_node(ROOT_ADDRESS)?;
        }
        Ok(tree)
    }

    /// The sizing parameters this tree was opened with.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Inserts a key with its occurrence count. Re-inserting an existing key overwrites
    /// its stored count in place; a node holding the key is never split for its sake,
    /// though full ancestors on the descent may still be. New keys descend via preemptive
    /// splitting: any full node on the path is split before it is entered, so a leaf
    /// always has room for the insertion.
    pub fn insert(&mut self, key: u64, frequency: u32) -> Result<()> {
        if key == codec::NIL {
            return Err(Error::Internal("Key u64::MAX is reserved for empty slots".into()));
        }
        let mut root = self.read_node(ROOT_ADDRESS)?;
        if let Some(i) = root.key_index(key) {
            root.frequencies[i] = frequency;
            return self.write_node(&root);
        }
        if root.is_full() {
            // Relocate the full root to a fresh address, install a new empty root at
            // address 0 with it as the sole child, and split it.
            let relocated = self.file.allocate()?;
            debug!("Root is full, relocating it to {} and splitting", relocated);
            root.address = relocated;
            root.parent = Some(ROOT_ADDRESS);
            self.write_node(&root)?;
            let mut new_root = Node::new(&self.config, ROOT_ADDRESS);
            new_root.children[0] = Some(relocated);
            self.write_node(&new_root)?;
            self.split_child(ROOT_ADDRESS, 0)?;
            root = self.read_node(ROOT_ADDRESS)?;
        }
        self.insert_non_full(root, key, frequency)
    }

    /// Descends from a non-full node to the leaf responsible for the key, splitting any
    /// full child before entering it, and places the key there. A node holding the key
    /// already is updated in place wherever it is found.
    fn insert_non_full(&mut self, mut node: Node, key: u64, frequency: u32) -> Result<()> {
        loop {
            if let Some(i) = node.key_index(key) {
                node.frequencies[i] = frequency;
                return self.write_node(&node);
            }
            if node.is_leaf() {
                node.insert_slot(key, frequency)?;
                return self.write_node(&node);
            }
            let i = node.child_index(key);
            let child_address = node.children[i].ok_or_else(|| {
                Error::Internal(format!("Node {} has no child at index {}", node.address, i))
            })?;
            let child = self.read_node(child_address)?;
            if child.is_full() && child.key_index(key).is_none() {
                self.split_child(node.address, i)?;
                // Re-descend from the updated node: the promoted median determines
                // which half the key belongs to.
                node = self.read_node(node.address)?;
                continue;
            }
            node = child;
        }
    }

    /// Splits the full child at the given slot of the parent. The median key moves up
    /// into the parent; the lower half stays in place while the upper half moves to a
    /// newly allocated sibling, which becomes the parent's next child. Persists the new
    /// sibling, the parent, and the shrunk child, in that order.
    pub(crate) fn split_child(&mut self, parent_address: u64, index: usize) -> Result<()> {
        let mut parent = self.read_node(parent_address)?;
        let y_address = parent.children[index].ok_or_else(|| {
            Error::Internal(format!("Node {} has no child at index {}", parent_address, index))
        })?;
        let mut y = self.read_node(y_address)?;
        if !y.is_full() {
            return Err(Error::Internal(format!("Split of non-full node {}", y_address)));
        }
        if parent.is_full() {
            return Err(Error::Internal(format!("Split into full parent {}", parent_address)));
        }

        let order = self.config.order;
        let mid = order / 2;
        let mut z = Node::new(&self.config, self.file.allocate()?);
        debug!("Splitting node {} at key {} into new sibling {}", y_address, mid, z.address);
        y.parent = Some(parent.address);
        z.parent = Some(parent.address);

        // Move the upper half of the keys and frequencies into the new sibling. The
        // median at `mid` goes to the parent, not to either half.
        for j in mid + 1..order {
            z.keys[j - mid - 1] = y.keys[j].take();
            z.frequencies[j - mid - 1] = std::mem::take(&mut y.frequencies[j]);
        }
        if !y.is_leaf() {
            for j in mid + 1..=order {
                z.children[j - mid - 1] = y.children[j].take();
            }
        }
        let median_key = y.keys[mid]
            .take()
            .ok_or_else(|| Error::Internal(format!("Full node {} has an empty slot", y_address)))?;
        let median_frequency = std::mem::take(&mut y.frequencies[mid]);

        // Shift the parent's slots right of the split point and link in the sibling and
        // the median.
        let n = parent.num_keys();
        for j in (index + 1..=n).rev() {
            parent.children[j + 1] = parent.children[j];
        }
        parent.children[index + 1] = Some(z.address);
        for j in (index..n).rev() {
            parent.keys[j + 1] = parent.keys[j];
            parent.frequencies[j + 1] = parent.frequencies[j];
        }
        parent.keys[index] = Some(median_key);
        parent.frequencies[index] = median_frequency;

        self.write_node(&z)?;
        self.write_node(&parent)?;
        self.write_node(&y)
    }

    /// Looks up the occurrence count for a key, or `None` if the key is absent. Each node
    /// is scanned in ascending key order, short-circuiting on the first key at or above
    /// the target; on a miss the search descends into the responsible child.
    pub fn search(&mut self, key: u64) -> Result<Option<u32>> {
        let mut node = match self.read_root()? {
            Some(node) => node,
            None => return Ok(None),
        };
        loop {
            let i = node.child_index(key);
            if node.keys.get(i) == Some(&Some(key)) {
                return Ok(Some(node.frequencies[i]));
            }
            if node.is_leaf() {
                return Ok(None);
            }
            match node.children[i] {
                Some(address) => node = self.read_node(address)?,
                None => return Ok(None),
            }
        }
    }

    /// Visits every reachable node exactly once in pre-order: the node itself, then each
    /// occupied child slot left to right. An absent backing file visits nothing.
    pub fn for_each<F: FnMut(&Node)>(&mut self, mut visitor: F) -> Result<()> {
        match self.read_root()? {
            Some(root) => self.walk(root, &mut visitor),
            None => Ok(()),
        }
    }

    fn walk<F: FnMut(&Node)>(&mut self, node: Node, visitor: &mut F) -> Result<()> {
        visitor(&node);
        for address in node.children.iter().flatten().copied() {
            let child = self.read_node(address)?;
            self.walk(child, visitor)?;
        }
        Ok(())
    }

    /// Every (key, frequency) pair in the tree, in traversal order.
    pub fn entries(&mut self) -> Result<Vec<(u64, u32)>> {
        let mut entries = Vec::new();
        self.for_each(|node| entries.extend(node.entries()))?;
        Ok(entries)
    }

    /// Total frequency mass: the sum of every occurrence count in the tree.
    pub fn total_word_count(&mut self) -> Result<u64> {
        let mut total = 0u64;
        self.for_each(|node| total += node.entries().map(|(_, f)| f as u64).sum::<u64>())?;
        Ok(total)
    }

    /// Reads the root node, degrading an absent backing file or empty file to `None` so
    /// lookups over a never-written tree behave as an empty result.
    fn read_root(&mut self) -> Result<Option<Node>> {
        match self.read_node(ROOT_ADDRESS) {
            Ok(node) => Ok(Some(node)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Reads the node at an address, consulting the cache before the backing file and
    /// caching the block on a miss.
    fn read_node(&mut self, address: u64) -> Result<Node> {
        if let Some(block) = self.cache.get(address) {
            return codec::decode(&block, &self.config);
        }
        let block = self.file.read_block(address)?;
        let node = codec::decode(&block, &self.config)?;
        if node.address != address {
            return Err(Error::Decode(format!(
                "Block at address {} claims address {}",
                address, node.address
            )));
        }
        self.cache.put(address, block);
        Ok(node)
    }

    /// Writes a node through to the backing file and the cache within one operation. The
    /// file is written first so the cache never holds bytes the file does not.
    fn write_node(&mut self, node: &Node) -> Result<()> {
        let block = codec::encode(node, &self.config);
        if let Err(err) = self.file.write_block(node.address, &block) {
            error!("Failed to write node {}: {}", node.address, err);
            return Err(err);
        }
        self.cache.put(node.address, block);
        Ok(())
    }
}
