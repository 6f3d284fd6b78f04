use bytes::Bytes;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Bounded cache of node blocks, keyed by block address. Both lookups and insertions
/// count as use for recency; inserting beyond capacity evicts the least-recently-used
/// entry. The cache is a read/write-through accelerator only: the backing file is always
/// the system of record, and every write path overwrites the cached block in the same
/// operation that writes it to disk.
#[derive(Debug)]
pub struct NodeCache {
    blocks: LruCache<u64, Bytes>,
}

impl NodeCache {
    /// Creates a cache holding at most `capacity` blocks. Capacity must be nonzero, which
    /// `TreeConfig::validate` guarantees.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self { blocks: LruCache::new(capacity) }
    }

    /// Fetches the cached block at an address, marking it most recently used.
    pub fn get(&mut self, address: u64) -> Option<Bytes> {
        self.blocks.get(&address).cloned()
    }

    /// Inserts or overwrites the block at an address, evicting the least-recently-used
    /// entry if the cache is at capacity.
    pub fn put(&mut self, address: u64, block: Bytes) {
        self.blocks.put(address, block);
    }

    /// Removes the block at an address, if cached.
    pub fn remove(&mut self, address: u64) {
        self.blocks.pop(&address);
    }

    /// Whether an address is cached. Does not affect recency.
    pub fn contains(&self, address: u64) -> bool {
        self.blocks.contains(&address)
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
