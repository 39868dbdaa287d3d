//! SIMD-oriented Fast Mersenne Twister

use super::Random;

const MEXP: usize = 19937;
const N: usize = MEXP / 128 + 1;
const N32: usize = N * 4;
const POS1: usize = 122;
const SL1: u32 = 18;
const SL2: u32 = 1;
const SR1: u32 = 11;
const SR2: u32 = 1;
const MSK: [u32; 4] = [0xdfff_ffef, 0xddfe_cb7f, 0xbffa_ffff, 0xbfff_fff6];
const PARITY: [u32; 4] = [0x0000_0001, 0x0000_0000, 0x0000_0000, 0x13c9_e684];

/// SFMT19937. The state is kept as 128-bit words; lanes are processed with
/// `u128` shifts which the compiler lowers to SIMD shuffles.
#[derive(Clone)]
pub struct Sfmt19937 {
    state: [[u32; 4]; N],
    idx: usize,
}

#[inline(always)]
fn to_u128(w: &[u32; 4]) -> u128 {
    (w[0] as u128) | (w[1] as u128) << 32 | (w[2] as u128) << 64 | (w[3] as u128) << 96
}

#[inline(always)]
fn from_u128(v: u128) -> [u32; 4] {
    [v as u32, (v >> 32) as u32, (v >> 64) as u32, (v >> 96) as u32]
}

#[inline(always)]
fn recursion(a: &[u32; 4], b: &[u32; 4], c: &[u32; 4], d: &[u32; 4]) -> [u32; 4] {
    let x = from_u128(to_u128(a) << (SL2 * 8));
    let y = from_u128(to_u128(c) >> (SR2 * 8));
    let mut r = [0u32; 4];
    for i in 0..4 {
        r[i] = a[i] ^ x[i] ^ ((b[i] >> SR1) & MSK[i]) ^ y[i] ^ (d[i] << SL1);
    }
    r
}

impl Sfmt19937 {
    /// Create a seeded generator.
    ///
    /// * `seed` - The seed.
    pub fn new(seed: u32) -> Self {
        let mut rng = Self {
            state: [[0; 4]; N],
            idx: N32,
        };
        rng.set_seed(seed);
        rng
    }

    fn word(&self, i: usize) -> u32 {
        self.state[i / 4][i % 4]
    }

    fn word_mut(&mut self, i: usize) -> &mut u32 {
        &mut self.state[i / 4][i % 4]
    }

    fn period_certification(&mut self) {
        let mut inner = 0u32;
        for (i, p) in PARITY.iter().enumerate() {
            inner ^= self.word(i) & p;
        }
        let mut shift = 16;
        while shift > 0 {
            inner ^= inner >> shift;
            shift >>= 1;
        }
        if inner & 1 == 1 {
            return;
        }

        for (i, p) in PARITY.iter().enumerate() {
            let mut work = 1u32;
            for _ in 0..32 {
                if work & p != 0 {
                    *self.word_mut(i) ^= work;
                    return;
                }
                work <<= 1;
            }
        }
    }

    fn generate_all(&mut self) {
        let mut r1 = self.state[N - 2];
        let mut r2 = self.state[N - 1];
        for i in 0..N {
            let j = if i < N - POS1 { i + POS1 } else { i + POS1 - N };
            let r = recursion(&self.state[i], &self.state[j], &r1, &r2);
            self.state[i] = r;
            r1 = r2;
            r2 = r;
        }
    }
}

impl Random for Sfmt19937 {
    fn set_seed(&mut self, seed: u32) {
        *self.word_mut(0) = seed;
        for i in 1..N32 {
            let prev = self.word(i - 1);
            *self.word_mut(i) = 1_812_433_253u32.wrapping_mul(prev ^ (prev >> 30)).wrapping_add(i as u32);
        }
        self.idx = N32;
        self.period_certification();
    }

    fn next_u32(&mut self) -> u32 {
        if self.idx >= N32 {
            self.generate_all();
            self.idx = 0;
        }
        let r = self.word(self.idx);
        self.idx += 1;
        r
    }

    fn clone_box(&self) -> Box<dyn Random> {
        Box::new(self.clone())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_continues_identically() {
        let mut a = Sfmt19937::new(1234);
        for _ in 0..1000 {
            a.next_u32();
        }
        let mut b = a.clone_box();
        for _ in 0..2000 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn seeds_give_distinct_streams() {
        let mut a = Sfmt19937::new(1);
        let mut b = Sfmt19937::new(2);
        let va: Vec<u32> = (0..8).map(|_| a.next_u32()).collect();
        let vb: Vec<u32> = (0..8).map(|_| b.next_u32()).collect();
        assert_ne!(va, vb);
    }

    #[test]
    fn state_size_matches_period() {
        assert_eq!(N32, 624);
    }
}
