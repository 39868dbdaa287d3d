//! Random Sampler.

use core::error::*;
use core::lm::*;
use core::paramset::*;
use core::registry::*;
use core::rng::*;
use core::sampler::*;

/// Draws independent uniform numbers from a pseudo random number generator.
pub struct RandomSampler {
    /// Generator type used for clones.
    rng_type: RngType,

    /// The random number generator.
    rng: Box<dyn Random>,
}

impl RandomSampler {
    /// Create a new `RandomSampler`.
    ///
    /// * `rng_type` - Generator implementation.
    /// * `seed`     - Initial seed.
    pub fn new(rng_type: RngType, seed: u32) -> Self {
        Self {
            rng_type,
            rng: rng_type.create(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn set_seed(&mut self, seed: u32) {
        self.rng.set_seed(seed);
    }

    fn next(&mut self) -> Float {
        self.rng.next_float()
    }

    fn clone_with_seed(&self, seed: u32) -> Box<dyn Sampler> {
        Box::new(Self::new(self.rng_type, seed))
    }

    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }
}

/// Reads the generator type and seed shared by the samplers.
///
/// * `params` - Parameter set; `rng` defaults to "standardmt", `seed` to 1.
pub(crate) fn rng_from_params(params: &ParamSet) -> Result<(RngType, u32)> {
    let rng_type = params.find_one_enum::<RngType>("rng", "standardmt")?;
    let seed = params.find_one_int("seed", 1) as u32;
    Ok((rng_type, seed))
}

/// Create a random sampler from parameters.
///
/// * `params`    - Parameter set; see `rng_from_params()`.
/// * `_registry` - Unused.
pub fn create_random_sampler(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn Sampler>> {
    let (rng_type, seed) = rng_from_params(params)?;
    debug!("Random sampler using {:?} seeded with {}", rng_type, seed);
    Ok(Box::new(RandomSampler::new(rng_type, seed)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_gives_same_stream() {
        let mut a = RandomSampler::new(RngType::Sfmt, 7);
        let mut b = a.clone_with_seed(7);
        for _ in 0..100 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn values_are_in_unit_interval() {
        let mut s = RandomSampler::new(RngType::StandardMt, 3);
        for _ in 0..10000 {
            let v = s.next();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn reseeding_restarts_the_stream() {
        let mut s = RandomSampler::new(RngType::StandardMt, 11);
        let first: Vec<Float> = (0..8).map(|_| s.next()).collect();
        s.set_seed(11);
        let again: Vec<Float> = (0..8).map(|_| s.next()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn unknown_generator_is_rejected() {
        let params = ParamSet::new().with_string("rng", "lcg");
        assert!(create_random_sampler(&params, &ComponentRegistry::new()).is_err());
    }
}
