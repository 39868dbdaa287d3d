//! Random Number Generators

mod mt19937;
mod sfmt19937;

// Re-export
pub use mt19937::*;
pub use sfmt19937::*;

use crate::error::*;
use crate::geometry::*;
use crate::lm::*;
use crate::paramset::*;
use crate::registry::*;
use std::str::FromStr;

/// A repeatable stream of uniformly distributed 32-bit integers.
pub trait Random: Send + Sync {
    /// Reinitialize the state from a seed.
    ///
    /// * `seed` - The seed.
    fn set_seed(&mut self, seed: u32);

    /// Returns the next uniformly distributed u32 value.
    fn next_u32(&mut self) -> u32;

    /// Returns a boxed copy of the generator in its current state.
    fn clone_box(&self) -> Box<dyn Random>;

    /// Returns a uniformly distributed value in [0, 1) with 53 random bits.
    fn next_f64(&mut self) -> f64 {
        let a = (self.next_u32() >> 5) as f64;
        let b = (self.next_u32() >> 6) as f64;
        (a * 67108864.0 + b) * (1.0 / 9007199254740992.0)
    }

    /// Returns a uniformly distributed `Float` in [0, 1).
    fn next_float(&mut self) -> Float {
        min(self.next_f64() as Float, ONE_MINUS_EPSILON)
    }

    /// Returns a pair of uniformly distributed values in [0, 1)^2.
    fn next_vec2(&mut self) -> Vector2f {
        let u = self.next_float();
        let v = self.next_float();
        Vector2f::new(u, v)
    }
}

/// Random number generator implementations that can be selected by name.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RngType {
    /// Standard Mersenne Twister.
    #[default]
    StandardMt,

    /// SIMD-oriented Fast Mersenne Twister.
    Sfmt,
}

impl RngType {
    /// Names accepted by `from_str`.
    pub const NAMES: [&'static str; 2] = ["standardmt", "sfmt"];

    /// Create a seeded generator.
    ///
    /// * `seed` - The seed.
    pub fn create(&self, seed: u32) -> Box<dyn Random> {
        match self {
            Self::StandardMt => Box::new(Mt19937::new(seed)),
            Self::Sfmt => Box::new(Sfmt19937::new(seed)),
        }
    }
}

impl FromStr for RngType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standardmt" => Ok(Self::StandardMt),
            "sfmt" => Ok(Self::Sfmt),
            _ => Err(Error::config(format!("unknown random number generator '{}'", s))),
        }
    }
}

impl Component for dyn Random {
    const INTERFACE: &'static str = "rng";
}

/// Register the generators under their names.
///
/// * `registry` - The registry.
pub fn register(registry: &mut ComponentRegistry) {
    registry.register::<dyn Random>("standardmt", create_standard_mt);
    registry.register::<dyn Random>("sfmt", create_sfmt);
}

/// Create a Mersenne Twister seeded with the `seed` parameter.
///
/// * `params`    - Parameters.
/// * `_registry` - Unused.
fn create_standard_mt(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn Random>> {
    Ok(RngType::StandardMt.create(params.find_one_int("seed", 1) as u32))
}

/// Create an SFMT seeded with the `seed` parameter.
///
/// * `params`    - Parameters.
/// * `_registry` - Unused.
fn create_sfmt(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn Random>> {
    Ok(RngType::Sfmt.create(params.find_one_int("seed", 1) as u32))
}

/// Derive a well mixed 32-bit seed from a base seed and a stream index.
///
/// * `base`  - Base seed.
/// * `index` - Stream index.
pub fn derive_seed(base: u32, index: u64) -> u32 {
    // SplitMix64 finalizer.
    let mut z = ((base as u64) << 32 | (index & 0xffff_ffff)) ^ (index >> 32).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;
    (z ^ (z >> 32)) as u32
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse() {
        for name in RngType::NAMES {
            assert!(name.parse::<RngType>().is_ok());
        }
        assert!("pcg".parse::<RngType>().is_err());
    }

    #[test]
    fn floats_are_in_unit_interval_with_sane_mean() {
        for t in [RngType::StandardMt, RngType::Sfmt] {
            let mut rng = t.create(42);
            let n = 100_000;
            let mut sum = 0.0;
            for _ in 0..n {
                let u = rng.next_float();
                assert!((0.0..1.0).contains(&u));
                sum += u;
            }
            let mean = sum / n as Float;
            assert!((mean - 0.5).abs() < 0.01, "{:?} mean {}", t, mean);
        }
    }

    #[test]
    fn generators_are_registered_by_name() {
        let mut registry = ComponentRegistry::new();
        register(&mut registry);
        let params = ParamSet::new().with_int("seed", 5);
        let mut a = registry.create::<dyn Random>("sfmt", &params).unwrap();
        let mut b = RngType::Sfmt.create(5);
        assert_eq!(a.next_u32(), b.next_u32());
        assert_eq!(registry.names::<dyn Random>(), vec!["sfmt", "standardmt"]);
    }

    #[test]
    fn derived_seeds_differ_per_index() {
        let a = derive_seed(1, 0);
        let b = derive_seed(1, 1);
        let c = derive_seed(2, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, derive_seed(1, 0));
    }
}
