use crate::error::Result;
use crate::storage_engine::Tree;

/// Cross-tree aggregates. These drive one tree's traversal against another tree's point
/// lookups and add no tree state of their own. An absent key counts as frequency 0.
impl Tree {
    /// Euclidean distance between this tree's frequency vector and another's. Only keys
    /// present in `self` contribute a term: keys unique to `other` are never visited, so
    /// the distance is one-sided and not symmetric. Callers relying on a symmetric metric
    /// must evaluate both directions themselves.
    pub fn euclidean_distance(&mut self, other: &mut Tree) -> Result<f64> {
        let mut sum = 0.0;
        for (key, frequency) in self.entries()? {
            let other_frequency = other.search(key)?.unwrap_or(0);
            let d = frequency as f64 - other_frequency as f64;
            sum += d * d;
        }
        Ok(sum.sqrt())
    }

    /// Cosine similarity between the two frequency vectors, indexed by the union of keys
    /// with 0 for absent keys. Keys on one side only contribute nothing to the dot
    /// product, so iterating this tree's entries covers the whole numerator; both norms
    /// cover their full trees. Returns 0.0 when either tree is empty.
    pub fn cosine_similarity(&mut self, other: &mut Tree) -> Result<f64> {
        let mut dot = 0.0;
        let mut norm_self = 0.0;
        for (key, frequency) in self.entries()? {
            let f = frequency as f64;
            dot += f * other.search(key)?.unwrap_or(0) as f64;
            norm_self += f * f;
        }
        let mut norm_other = 0.0;
        for (_, frequency) in other.entries()? {
            let f = frequency as f64;
            norm_other += f * f;
        }
        if norm_self == 0.0 || norm_other == 0.0 {
            return Ok(0.0);
        }
        Ok(dot / (norm_self.sqrt() * norm_other.sqrt()))
    }
}
