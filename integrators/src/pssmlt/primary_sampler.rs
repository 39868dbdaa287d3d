//! Primary Sample Space Sampler

use core::error::*;
use core::lm::*;
use core::rng::*;
use core::sampler::*;
use std::fmt;
use std::str::FromStr;

/// Small step mutation of a single primary sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MutationKernel {
    /// Exponentially distributed offsets between s1 and s2 with a random sign.
    Kelemen,

    /// Normal offsets with standard deviation s2, wrapped around [0, 1).
    Gaussian,

    /// Normal offsets in logit space. Not symmetric, so each mutation
    /// reports its proposal density ratio.
    Logit,
}

impl FromStr for MutationKernel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "kelemen" => Ok(Self::Kelemen),
            "gaussian" => Ok(Self::Gaussian),
            "logit" => Ok(Self::Logit),
            _ => Err(Error::config(format!(
                "unknown mutation '{}' (expected kelemen, gaussian or logit)",
                s
            ))),
        }
    }
}

impl fmt::Display for MutationKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kelemen => write!(f, "kelemen"),
            Self::Gaussian => write!(f, "gaussian"),
            Self::Logit => write!(f, "logit"),
        }
    }
}

/// Logit space coordinates stay inside (0, 1).
const LOGIT_CLAMP: Float = 1e-9;

/// A primary sample and the time it was last brought up to date.
#[derive(Copy, Clone, Debug, Default)]
struct PrimarySample {
    value: Float,
    modify: u64,
}

/// A sampler whose values are the coordinates of a point in primary sample
/// space. Coordinates are mutated lazily when they are requested, so paths
/// of any length can be mutated. `accept()` and `reject()` finish a mutation.
pub struct PrimarySampleSpaceSampler {
    /// Small step kernel.
    kernel: MutationKernel,

    /// Minimum kernel size.
    s1: Float,

    /// Maximum kernel size.
    s2: Float,

    /// -ln(s2 / s1).
    log_ratio: Float,

    /// Random numbers driving the mutations.
    rng: Box<dyn Random>,

    /// Replays a stored path while restoring a seed path.
    restore: Option<Box<dyn RewindableSampler>>,

    /// Number of accepted mutations.
    time: u64,

    /// Time of the last accepted large step.
    large_step_time: u64,

    /// The mutation in progress is a large step.
    large_step: bool,

    /// Index of the next coordinate.
    current: usize,

    /// Coordinates of the current state.
    u: Vec<PrimarySample>,

    /// Coordinates changed by the mutation in progress.
    backup: Vec<(usize, PrimarySample)>,

    /// Product of the reverse / forward proposal densities of the mutation in
    /// progress.
    proposal_ratio: Float,
}

impl PrimarySampleSpaceSampler {
    /// Create a sampler at the origin of primary sample space.
    ///
    /// * `kernel` - Small step kernel.
    /// * `s1`     - Minimum kernel size.
    /// * `s2`     - Maximum kernel size.
    /// * `rng`    - Random numbers driving the mutations.
    pub fn new(kernel: MutationKernel, s1: Float, s2: Float, rng: Box<dyn Random>) -> Self {
        Self {
            kernel,
            s1,
            s2,
            log_ratio: -(s2 / s1).ln(),
            rng,
            restore: None,
            time: 0,
            large_step_time: 0,
            large_step: false,
            current: 0,
            u: vec![],
            backup: vec![],
            proposal_ratio: 1.0,
        }
    }

    /// Select a large step (all coordinates resampled) or a small step for
    /// the next mutation.
    ///
    /// * `enable` - Use a large step.
    pub fn enable_large_step(&mut self, enable: bool) {
        self.large_step = enable;
    }

    /// Returns `true` if the mutation in progress is a large step.
    pub fn is_large_step(&self) -> bool {
        self.large_step
    }

    /// Returns the ratio T(y → x) / T(x → y) of the mutation in progress.
    /// It is 1 for symmetric kernels.
    pub fn proposal_ratio(&self) -> Float {
        self.proposal_ratio
    }

    /// Returns the number of coordinates in the current state.
    pub fn num_coordinates(&self) -> usize {
        self.u.len()
    }

    /// Make the mutated state current.
    pub fn accept(&mut self) {
        if self.large_step {
            self.large_step_time = self.time;
        }
        self.time += 1;
        self.backup.clear();
        self.current = 0;
        self.proposal_ratio = 1.0;
    }

    /// Return to the state before the mutation.
    pub fn reject(&mut self) {
        for (i, sample) in self.backup.drain(..) {
            self.u[i] = sample;
        }
        self.current = 0;
        self.proposal_ratio = 1.0;
    }

    /// Draw new coordinates from `sampler` until `end_restore()`. Used to
    /// start the chain on a path found by a rewindable sampler.
    ///
    /// * `sampler` - Sampler positioned at the start of the stored path.
    pub fn begin_restore(&mut self, sampler: Box<dyn RewindableSampler>) {
        self.restore = Some(sampler);
    }

    /// Stop drawing coordinates from the restore sampler.
    pub fn end_restore(&mut self) {
        self.restore = None;
        self.current = 0;
    }

    fn uniform(&mut self) -> Float {
        match self.restore.as_mut() {
            Some(sampler) => sampler.next(),
            None => self.rng.next_float(),
        }
    }

    fn primary_sample(&mut self, i: usize) -> Float {
        while i >= self.u.len() {
            let value = self.uniform();
            self.u.push(PrimarySample { value, modify: 0 });
        }

        if self.u[i].modify < self.time {
            if self.large_step {
                self.backup.push((i, self.u[i]));
                self.u[i] = PrimarySample {
                    value: self.uniform(),
                    modify: self.time,
                };
            } else {
                // Coordinates untouched since the last accepted large step
                // are independent of everything before it.
                if self.u[i].modify < self.large_step_time {
                    self.u[i] = PrimarySample {
                        value: self.uniform(),
                        modify: self.large_step_time,
                    };
                }

                // Catch up with mutations skipped while the coordinate was
                // unused.
                while self.u[i].modify + 1 < self.time {
                    self.u[i].value = self.mutate(self.u[i].value).0;
                    self.u[i].modify += 1;
                }

                self.backup.push((i, self.u[i]));
                let (value, ratio) = self.mutate(self.u[i].value);
                self.u[i].value = value;
                self.u[i].modify += 1;
                self.proposal_ratio *= ratio;
            }
        }

        self.u[i].value
    }

    /// Mutate a coordinate. Returns the new value and the proposal density
    /// ratio T(new → old) / T(old → new).
    fn mutate(&mut self, value: Float) -> (Float, Float) {
        match self.kernel {
            MutationKernel::Kelemen => {
                let u = self.rng.next_float();
                let positive = u < 0.5;
                let u = if positive { u * 2.0 } else { 2.0 * (u - 0.5) };
                let dv = self.s2 * (self.log_ratio * u).exp();
                let v = if positive { value + dv } else { value - dv };
                (wrap_unit(v), 1.0)
            }
            MutationKernel::Gaussian => {
                let v = value + self.s2 * self.normal();
                (wrap_unit(v), 1.0)
            }
            MutationKernel::Logit => {
                let x = clamp(value, LOGIT_CLAMP, 1.0 - LOGIT_CLAMP);
                let y = logistic(logit(x) + 4.0 * self.s2 * self.normal());
                let y = clamp(y, LOGIT_CLAMP, 1.0 - LOGIT_CLAMP);
                (y, (y * (1.0 - y)) / (x * (1.0 - x)))
            }
        }
    }

    /// Standard normal deviate by inversion.
    fn normal(&mut self) -> Float {
        std::f64::consts::SQRT_2 * erf_inv(2.0 * self.rng.next_float() - 1.0)
    }
}

impl Sampler for PrimarySampleSpaceSampler {
    fn set_seed(&mut self, seed: u32) {
        self.rng.set_seed(seed);
        self.time = 0;
        self.large_step_time = 0;
        self.large_step = false;
        self.current = 0;
        self.u.clear();
        self.backup.clear();
        self.proposal_ratio = 1.0;
    }

    fn next(&mut self) -> Float {
        let i = self.current;
        self.current += 1;
        self.primary_sample(i)
    }

    fn clone_with_seed(&self, seed: u32) -> Box<dyn Sampler> {
        let mut rng = self.rng.clone_box();
        rng.set_seed(seed);
        Box::new(Self::new(self.kernel, self.s1, self.s2, rng))
    }
}

/// Wrap a value into [0, 1).
#[inline]
fn wrap_unit(v: Float) -> Float {
    let w = v - v.floor();
    if w >= 1.0 {
        0.0
    } else {
        w
    }
}

#[inline]
fn logit(x: Float) -> Float {
    (x / (1.0 - x)).ln()
}

#[inline]
fn logistic(x: Float) -> Float {
    1.0 / (1.0 + (-x).exp())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;
    use samplers::RewindableRandomSampler;

    fn sampler(kernel: MutationKernel) -> PrimarySampleSpaceSampler {
        PrimarySampleSpaceSampler::new(kernel, 1.0 / 1024.0, 1.0 / 64.0, RngType::StandardMt.create(11))
    }

    fn draw(s: &mut PrimarySampleSpaceSampler, n: usize) -> Vec<Float> {
        (0..n).map(|_| s.next()).collect()
    }

    #[test]
    fn reject_restores_the_state() {
        let mut s = sampler(MutationKernel::Kelemen);
        let initial = draw(&mut s, 8);
        s.accept();

        s.enable_large_step(false);
        let mutated = draw(&mut s, 8);
        assert_ne!(mutated, initial);
        s.reject();

        s.enable_large_step(true);
        draw(&mut s, 8);
        s.reject();

        // Nothing was accepted, so the next small step starts from `initial`.
        s.enable_large_step(false);
        let again = draw(&mut s, 8);
        for (a, b) in again.iter().zip(initial.iter()) {
            let d = (a - b).abs();
            let d = d.min(1.0 - d);
            assert!(d <= 1.0 / 64.0 + 1e-12);
        }
    }

    #[test]
    fn accepted_small_steps_stay_close() {
        let mut s = sampler(MutationKernel::Kelemen);
        let mut prev = draw(&mut s, 4);
        s.accept();
        for _ in 0..20 {
            let next = draw(&mut s, 4);
            for (a, b) in next.iter().zip(prev.iter()) {
                let d = (a - b).abs();
                let d = d.min(1.0 - d);
                assert!(d >= 1.0 / 1024.0 - 1e-12 && d <= 1.0 / 64.0 + 1e-12);
            }
            s.accept();
            prev = next;
        }
    }

    #[test]
    fn lazily_mutated_coordinates_catch_up() {
        let mut s = sampler(MutationKernel::Gaussian);
        draw(&mut s, 2);
        s.accept();
        for _ in 0..5 {
            draw(&mut s, 1);
            s.accept();
        }
        assert_eq!(s.num_coordinates(), 2);
        let v = draw(&mut s, 2);
        assert!(v.iter().all(|x| (0.0..1.0).contains(x)));
    }

    #[test]
    fn restore_replays_a_rewindable_stream() {
        let mut rewindable = RewindableRandomSampler::new(RngType::StandardMt, 5);
        for _ in 0..7 {
            rewindable.next();
        }
        let index = rewindable.sample_index();
        let expected: Vec<Float> = (0..6).map(|_| rewindable.next()).collect();

        let mut replay = rewindable.clone_rewindable(5);
        replay.rewind(index);
        let mut s = sampler(MutationKernel::Kelemen);
        s.begin_restore(replay);
        let restored = draw(&mut s, 6);
        s.end_restore();
        assert_eq!(restored, expected);
    }

    #[test]
    fn symmetric_kernels_have_unit_proposal_ratio() {
        for kernel in [MutationKernel::Kelemen, MutationKernel::Gaussian] {
            let mut s = sampler(kernel);
            draw(&mut s, 4);
            s.accept();
            draw(&mut s, 4);
            assert!(approx_eq!(f64, s.proposal_ratio(), 1.0, ulps = 2));
        }
    }

    #[test]
    fn kernel_names_parse() {
        for kernel in [MutationKernel::Kelemen, MutationKernel::Gaussian, MutationKernel::Logit] {
            assert_eq!(kernel.to_string().parse::<MutationKernel>().unwrap(), kernel);
        }
        assert!("metropolis".parse::<MutationKernel>().is_err());
    }

    proptest! {
        #[test]
        fn mutations_stay_in_the_unit_interval(v in 0.0..1.0f64, seed in 0..100u32) {
            for kernel in [MutationKernel::Kelemen, MutationKernel::Gaussian, MutationKernel::Logit] {
                let mut s = PrimarySampleSpaceSampler::new(
                    kernel, 1.0 / 1024.0, 1.0 / 64.0, RngType::StandardMt.create(seed));
                let (w, ratio) = s.mutate(v);
                prop_assert!((0.0..1.0).contains(&w));
                prop_assert!(ratio > 0.0 && ratio.is_finite());
            }
        }
    }
}
