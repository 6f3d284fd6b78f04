use crate::error::{Error, Result};

/// The default maximum number of keys per node, i.e. an order-5 tree.
const DEFAULT_ORDER: usize = 4;

/// The default size in bytes of one on-disk block.
const DEFAULT_BLOCK_SIZE: usize = 4096;

/// The default maximum number of cached node blocks.
const DEFAULT_CACHE_SIZE: usize = 100;

/// Sizing parameters for one tree. Every tree owns its own config, so trees with different
/// sizing can coexist within a process and be tested independently.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConfig {
    /// Maximum number of keys per node. A node holds one more child than keys.
    pub order: usize,
    /// Size in bytes of one on-disk block. Every node occupies exactly one block, so this
    /// must be at least the encoded node size for the chosen order.
    pub block_size: usize,
    /// Maximum number of node blocks held in the in-memory cache.
    pub cache_size: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            block_size: DEFAULT_BLOCK_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl TreeConfig {
    /// Creates a config with the given order and the default block and cache sizing.
    pub fn with_order(order: usize) -> Self {
        Self { order, ..Self::default() }
    }

    /// Number of child slots per node, always one more than the number of key slots.
    pub fn num_children(&self) -> usize {
        self.order + 1
    }

    /// Encoded size in bytes of one node: address, parent, child addresses, keys, and
    /// frequencies, all fixed width. Independent of node content.
    pub fn encoded_size(&self) -> usize {
        8 + 8 + 8 * self.num_children() + 8 * self.order + 4 * self.order
    }

    /// Validates the config. Splitting a full node of `order` keys must leave at least one
    /// key on each side of the median, which requires an order of at least 3.
    pub fn validate(&self) -> Result<()> {
        if self.order < 3 {
            return Err(Error::Internal(format!("Order must be at least 3, got {}", self.order)));
        }
        if self.cache_size < 1 {
            return Err(Error::Internal("Cache size must be at least 1".into()));
        }
        if self.encoded_size() > self.block_size {
            return Err(Error::Internal(format!(
                "Encoded node size {} exceeds block size {}",
                self.encoded_size(),
                self.block_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use more_asserts::assert_le;

    #[test]
    fn default_fits_block() {
        let config = TreeConfig::default();
        assert_le!(config.encoded_size(), config.block_size);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn default_sizing() {
        let config = TreeConfig::default();
        assert_eq!(config.order, 4);
        assert_eq!(config.num_children(), 5);
        // address + parent + 5 children + 4 keys + 4 frequencies
        assert_eq!(config.encoded_size(), 8 + 8 + 40 + 32 + 16);
    }

    #[test]
    fn rejects_small_order() {
        assert!(TreeConfig::with_order(2).validate().is_err());
        assert_eq!(TreeConfig::with_order(3).validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_cache() {
        let config = TreeConfig { cache_size: 0, ..TreeConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_oversized_node() {
        let config = TreeConfig { order: 4, block_size: 64, cache_size: 10 };
        assert!(config.validate().is_err());
    }
}
