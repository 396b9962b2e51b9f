//! Session-scoped string interner.
//!
//! Substation, voltage-level and bay names repeat across every connectivity
//! node path, index key and graph node. Interning them into one pool makes
//! equality cheap (pointer-equal `Arc<str>` clones) and keeps the memory
//! footprint proportional to the number of distinct names. The pool lives as
//! long as the session; the handles are `Send + Sync`, so moving a graph to
//! another thread only clones reference counts.

use std::collections::HashSet;
use std::sync::Arc;

/// Deduplicating pool of immutable strings.
#[derive(Debug, Default)]
pub struct Interner {
    pool: HashSet<Arc<str>>,
}

impl Interner {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the pooled handle for `s`, inserting it on first sight.
    pub fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.pool.get(s) {
            return Arc::clone(existing);
        }
        let handle: Arc<str> = Arc::from(s);
        self.pool.insert(Arc::clone(&handle));
        handle
    }

    /// Number of distinct strings in the pool.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}
