//! Mersenne Twister

use super::Random;

const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_b0df;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7fff_ffff;

/// The standard 32-bit MT19937 generator.
#[derive(Clone)]
pub struct Mt19937 {
    mt: [u32; N],
    mti: usize,
}

impl Mt19937 {
    /// Create a seeded generator.
    ///
    /// * `seed` - The seed.
    pub fn new(seed: u32) -> Self {
        let mut rng = Self { mt: [0; N], mti: N };
        rng.set_seed(seed);
        rng
    }

    fn generate(&mut self) {
        let mag01 = [0, MATRIX_A];
        for kk in 0..N {
            let y = (self.mt[kk] & UPPER_MASK) | (self.mt[(kk + 1) % N] & LOWER_MASK);
            self.mt[kk] = self.mt[(kk + M) % N] ^ (y >> 1) ^ mag01[(y & 1) as usize];
        }
        self.mti = 0;
    }
}

impl Random for Mt19937 {
    fn set_seed(&mut self, seed: u32) {
        self.mt[0] = seed;
        for i in 1..N {
            let prev = self.mt[i - 1];
            self.mt[i] = 1_812_433_253u32.wrapping_mul(prev ^ (prev >> 30)).wrapping_add(i as u32);
        }
        self.mti = N;
    }

    fn next_u32(&mut self) -> u32 {
        if self.mti >= N {
            self.generate();
        }

        let mut y = self.mt[self.mti];
        self.mti += 1;

        // Tempering
        y ^= y >> 11;
        y ^= (y << 7) & 0x9d2c_5680;
        y ^= (y << 15) & 0xefc6_0000;
        y ^= y >> 18;
        y
    }

    fn clone_box(&self) -> Box<dyn Random> {
        Box::new(self.clone())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
