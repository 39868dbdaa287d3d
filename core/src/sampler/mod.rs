//! Sampler

use crate::geometry::*;
use crate::lm::*;
use crate::registry::Component;

/// Source of uniform random numbers consumed by renderers. A sampler is owned
/// by a single worker; clones with distinct seeds produce independent streams.
pub trait Sampler: Send + Sync {
    /// Reinitialize the stream from a seed.
    ///
    /// * `seed` - The seed.
    fn set_seed(&mut self, seed: u32);

    /// Returns the next uniformly distributed value in [0, 1).
    fn next(&mut self) -> Float;

    /// Returns a new sampler of the same type and configuration seeded with
    /// `seed`.
    ///
    /// * `seed` - The seed.
    fn clone_with_seed(&self, seed: u32) -> Box<dyn Sampler>;

    /// Returns the next two values in [0, 1)^2.
    fn next_vec2(&mut self) -> Vector2f {
        let u = self.next();
        let v = self.next();
        Vector2f::new(u, v)
    }

    /// Returns the next uniformly distributed integer. The default draws from
    /// `next()`.
    fn next_u32(&mut self) -> u32 {
        (self.next() * 4294967296.0) as u32
    }
}

/// A sampler whose stream can be replayed from a given draw index.
pub trait RewindableSampler: Sampler {
    /// Returns the number of values drawn since the last reseed.
    fn sample_index(&self) -> u64;

    /// Reseed with the initial seed and skip `index` draws so the next value
    /// equals the value originally drawn at position `index`.
    ///
    /// * `index` - Draw index to rewind to.
    fn rewind(&mut self, index: u64);

    /// Returns a new rewindable sampler of the same type and configuration
    /// seeded with `seed`.
    ///
    /// * `seed` - The seed.
    fn clone_rewindable(&self, seed: u32) -> Box<dyn RewindableSampler>;
}

impl Component for dyn Sampler {
    const INTERFACE: &'static str = "sampler";
}

impl Component for dyn RewindableSampler {
    const INTERFACE: &'static str = "rewindable_sampler";
}
