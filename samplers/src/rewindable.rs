//! Rewindable Sampler.

use crate::random::rng_from_params;
use core::error::*;
use core::lm::*;
use core::paramset::*;
use core::registry::*;
use core::rng::*;
use core::sampler::*;

/// A random sampler that counts its draws so the stream can be replayed from
/// any earlier position.
pub struct RewindableRandomSampler {
    /// Generator type used for clones.
    rng_type: RngType,

    /// Seed of the current stream.
    seed: u32,

    /// The random number generator.
    rng: Box<dyn Random>,

    /// Number of values drawn since the last reseed.
    index: u64,
}

impl RewindableRandomSampler {
    /// Create a new `RewindableRandomSampler`.
    ///
    /// * `rng_type` - Generator implementation.
    /// * `seed`     - Initial seed.
    pub fn new(rng_type: RngType, seed: u32) -> Self {
        Self {
            rng_type,
            seed,
            rng: rng_type.create(seed),
            index: 0,
        }
    }
}

impl Sampler for RewindableRandomSampler {
    fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
        self.rng.set_seed(seed);
        self.index = 0;
    }

    fn next(&mut self) -> Float {
        self.index += 1;
        self.rng.next_float()
    }

    fn clone_with_seed(&self, seed: u32) -> Box<dyn Sampler> {
        Box::new(Self::new(self.rng_type, seed))
    }
}

impl RewindableSampler for RewindableRandomSampler {
    fn sample_index(&self) -> u64 {
        self.index
    }

    fn rewind(&mut self, index: u64) {
        self.set_seed(self.seed);
        for _ in 0..index {
            self.next();
        }
    }

    fn clone_rewindable(&self, seed: u32) -> Box<dyn RewindableSampler> {
        Box::new(Self::new(self.rng_type, seed))
    }
}

/// Create a rewindable sampler from parameters.
///
/// * `params`    - Parameter set; `rng` defaults to "standardmt", `seed` to 1.
/// * `_registry` - Unused.
pub fn create_rewindable_sampler(
    params: &ParamSet,
    _registry: &ComponentRegistry,
) -> Result<Box<dyn RewindableSampler>> {
    let (rng_type, seed) = rng_from_params(params)?;
    Ok(Box::new(RewindableRandomSampler::new(rng_type, seed)))
}

/// Create a rewindable sampler from parameters for use as a plain sampler.
///
/// * `params`    - Parameter set; `rng` defaults to "standardmt", `seed` to 1.
/// * `_registry` - Unused.
pub fn create_rewindable_sampler_as_sampler(
    params: &ParamSet,
    _registry: &ComponentRegistry,
) -> Result<Box<dyn Sampler>> {
    let (rng_type, seed) = rng_from_params(params)?;
    Ok(Box::new(RewindableRandomSampler::new(rng_type, seed)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn rewind_replays_the_stream(seed in 0..1000u32, index in 0..200u64) {
            let mut s = RewindableRandomSampler::new(RngType::StandardMt, seed);
            let values: Vec<Float> = (0..250).map(|_| s.next()).collect();
            prop_assert_eq!(s.sample_index(), 250);

            s.rewind(index);
            prop_assert_eq!(s.sample_index(), index);
            prop_assert_eq!(s.next(), values[index as usize]);
        }
    }

    #[test]
    fn reseeding_resets_the_index() {
        let mut s = RewindableRandomSampler::new(RngType::Sfmt, 5);
        s.next();
        s.next();
        s.set_seed(6);
        assert_eq!(s.sample_index(), 0);
        let mut other = s.clone_rewindable(6);
        assert_eq!(s.next(), other.next());
    }
}
