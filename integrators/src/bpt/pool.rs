//! Path Vertex Pool

use bumpalo::Bump;
use core::{stat_inc, stat_memory_counter, stat_register_fns};

stat_memory_counter!("Memory/Path vertex pools", VERTEX_POOL_MEMORY, pool_stats_memory);
stat_register_fns!(pool_stats_memory);

/// Per-worker arena for subpath vertices. Subpaths borrow the arena, so
/// `release()` can only be called once every subpath of the sample is gone.
#[derive(Default)]
pub struct VertexPool {
    arena: Bump,
}

impl VertexPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        register_stats();
        Self::default()
    }

    /// Returns the arena new subpaths allocate from.
    pub fn arena(&self) -> &Bump {
        &self.arena
    }

    /// Returns the number of bytes currently held by the arena.
    pub fn allocated_bytes(&self) -> usize {
        self.arena.allocated_bytes()
    }

    /// Reset the bump pointer. The memory is kept for the next sample.
    pub fn release(&mut self) {
        self.arena.reset();
    }
}

impl Drop for VertexPool {
    fn drop(&mut self) {
        stat_inc!(VERTEX_POOL_MEMORY, self.arena.allocated_bytes() as u64);
    }
}
