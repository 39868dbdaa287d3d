//! Primary Sample Space Metropolis Light Transport

use crate::bpt::{register_path_stats, MisWeight};
use crate::common::*;
use core::error::*;
use core::experiment::*;
use core::film::*;
use core::lm::*;
use core::paramset::*;
use core::registry::*;
use core::renderer::*;
use core::rng::*;
use core::sampler::*;
use core::sampling::*;
use core::scene::*;
use core::scheduler::*;
use core::{stat_inc, stat_percent, stat_register_fns};
use std::fmt;
use std::str::FromStr;

mod path_sampler;
mod primary_sampler;

// Re-export.
pub use path_sampler::*;
pub use primary_sampler::*;

stat_percent!("Integrator/PSSMLT acceptance", N_ACCEPTED, N_PROPOSED, pssmlt_stats_acceptance);
stat_register_fns!(pssmlt_stats_acceptance);

/// How a Markov chain turns its states into film contributions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PssmltEstimator {
    /// Splat the state after each mutation with weight b / I.
    Normal,

    /// Mean value substitution: current and proposed states both splat,
    /// weighted by the acceptance probability.
    MeanValueSubstitution,

    /// Mean value substitution combined with large steps by MIS.
    MeanValueSubstitutionLargeStepMis,
}

impl FromStr for PssmltEstimator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normal" => Ok(Self::Normal),
            "mvs" => Ok(Self::MeanValueSubstitution),
            "mvs_mis" => Ok(Self::MeanValueSubstitutionLargeStepMis),
            _ => Err(Error::config(format!(
                "unknown estimator '{}' (expected normal, mvs or mvs_mis)",
                s
            ))),
        }
    }
}

impl fmt::Display for PssmltEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::MeanValueSubstitution => write!(f, "mvs"),
            Self::MeanValueSubstitutionLargeStepMis => write!(f, "mvs_mis"),
        }
    }
}

/// PSSMLT parameters.
#[derive(Copy, Clone, Debug)]
pub struct PssmltConfig {
    /// Path sampler.
    pub path_sampler: PathSamplerType,

    /// Estimator.
    pub estimator: PssmltEstimator,

    /// Small step kernel.
    pub mutation: MutationKernel,

    /// Number of bootstrap samples.
    pub num_seed_samples: u64,

    /// Probability of a large step.
    pub large_step_prob: Float,

    /// Minimum small step size.
    pub kernel_size_s1: Float,

    /// Maximum small step size.
    pub kernel_size_s2: Float,

    /// Generator driving mutations and acceptance.
    pub rng: RngType,
}

impl Default for PssmltConfig {
    fn default() -> Self {
        Self {
            path_sampler: PathSamplerType::PathTracing,
            estimator: PssmltEstimator::MeanValueSubstitutionLargeStepMis,
            mutation: MutationKernel::Kelemen,
            num_seed_samples: 10000,
            large_step_prob: 0.1,
            kernel_size_s1: 1.0 / 1024.0,
            kernel_size_s2: 1.0 / 64.0,
            rng: RngType::StandardMt,
        }
    }
}

impl PssmltConfig {
    /// Read `path_sampler`, `estimator`, `mutation`, `num_seed_samples`,
    /// `large_step_prob`, `kernel_size_s1`, `kernel_size_s2` and `rng`.
    ///
    /// * `params` - Parameter set.
    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let default = Self::default();

        let num_seed_samples = params.find_one_int("num_seed_samples", default.num_seed_samples as Int);
        if num_seed_samples <= 0 {
            return Err(Error::config(format!(
                "num_seed_samples {} must be positive",
                num_seed_samples
            )));
        }
        let large_step_prob = params.find_one_float("large_step_prob", default.large_step_prob);
        if !(0.0..=1.0).contains(&large_step_prob) {
            return Err(Error::config(format!(
                "large_step_prob {} must be in [0, 1]",
                large_step_prob
            )));
        }
        let kernel_size_s1 = params.find_one_positive_float("kernel_size_s1", default.kernel_size_s1)?;
        let kernel_size_s2 = params.find_one_positive_float("kernel_size_s2", default.kernel_size_s2)?;
        if kernel_size_s1 > kernel_size_s2 {
            return Err(Error::config(format!(
                "kernel_size_s1 {} exceeds kernel_size_s2 {}",
                kernel_size_s1, kernel_size_s2
            )));
        }

        Ok(Self {
            path_sampler: params.find_one_enum::<PathSamplerType>("path_sampler", "pt")?,
            estimator: params.find_one_enum::<PssmltEstimator>("estimator", "mvs_mis")?,
            mutation: params.find_one_enum::<MutationKernel>("mutation", "kelemen")?,
            num_seed_samples: num_seed_samples as u64,
            large_step_prob,
            kernel_size_s1,
            kernel_size_s2,
            rng: params.find_one_enum::<RngType>("rng", "standardmt")?,
        })
    }
}

/// A path found during bootstrap: where its samples start in the rewindable
/// stream and its scalar contribution.
#[derive(Copy, Clone, Debug)]
struct SeedCandidate {
    index: u64,
    luminance: Float,
}

/// Result of the bootstrap phase.
struct Bootstrap {
    /// Seed of the rewindable stream.
    seed: u32,

    /// Candidates with non-zero contribution.
    candidates: Vec<SeedCandidate>,

    /// Distribution over candidates proportional to their contribution.
    distribution: DiscreteDistribution1D,

    /// Normalization b, the mean scalar contribution.
    b: Float,
}

/// Primary sample space Metropolis light transport. One Markov chain per
/// worker explores primary sample space; chains start from paths selected
/// among bootstrap samples proportionally to their contribution.
pub struct PssmltRenderer {
    /// Parameters.
    config: PssmltConfig,

    /// Russian roulette depth and maximum path length.
    limits: PathLimits,

    /// MIS weight of the bidirectional path sampler.
    mis: Box<dyn MisWeight>,

    /// Prototype of the bootstrap sampler.
    rewindable: Box<dyn RewindableSampler>,
}

impl PssmltRenderer {
    /// Create a new PSSMLT renderer.
    ///
    /// * `config`     - Parameters.
    /// * `limits`     - Russian roulette depth and maximum path length.
    /// * `mis`        - MIS weight of the bidirectional path sampler.
    /// * `rewindable` - Prototype of the bootstrap sampler.
    pub fn new(
        config: PssmltConfig,
        limits: PathLimits,
        mis: Box<dyn MisWeight>,
        rewindable: Box<dyn RewindableSampler>,
    ) -> Self {
        register_stats();
        register_path_stats();
        Self {
            config,
            limits,
            mis,
            rewindable,
        }
    }

    /// Sample candidate seed paths and estimate b.
    fn bootstrap(&self, scene: &Scene, seed: u32) -> Bootstrap {
        info!("Sampling {} seed candidates", self.config.num_seed_samples);

        let mut sampler = self.rewindable.clone_rewindable(seed);
        let mut path_sampler = PathSampler::new(self.config.path_sampler, self.limits, self.mis.as_ref());
        let mut splats = Splats::default();
        let mut candidates = vec![];
        let mut sum = 0.0;
        for _ in 0..self.config.num_seed_samples {
            let index = sampler.sample_index();
            path_sampler.sample_and_evaluate(scene, sampler.as_mut(), &mut splats);
            let luminance = splats.sum_luminance();
            if luminance > 0.0 && luminance.is_finite() {
                sum += luminance;
                candidates.push(SeedCandidate { index, luminance });
            }
        }

        let weights: Vec<Float> = candidates.iter().map(|c| c.luminance).collect();
        let b = sum / self.config.num_seed_samples as Float;
        info!("{} seed candidates, b = {}", candidates.len(), b);
        Bootstrap {
            seed,
            candidates,
            distribution: DiscreteDistribution1D::from_weights(&weights),
            b,
        }
    }

    /// Create the chain of worker `k`, starting from a bootstrap candidate.
    fn create_chain<'a>(
        &'a self,
        scene: &'a Scene,
        bootstrap: &Bootstrap,
        k: usize,
        seed: u32,
    ) -> Result<PssmltChain<'a>> {
        let mut rng = self.config.rng.create(seed);
        let candidate = bootstrap.candidates[bootstrap.distribution.sample(rng.next_float())];

        let mut primary = PrimarySampleSpaceSampler::new(
            self.config.mutation,
            self.config.kernel_size_s1,
            self.config.kernel_size_s2,
            self.config.rng.create(derive_seed(seed, 1)),
        );
        let mut path_sampler = PathSampler::new(self.config.path_sampler, self.limits, self.mis.as_ref());
        let mut current = Splats::default();

        // Replay the candidate path as the initial state.
        let mut restore = self.rewindable.clone_rewindable(bootstrap.seed);
        restore.rewind(candidate.index);
        primary.begin_restore(restore);
        path_sampler.sample_and_evaluate(scene, &mut primary, &mut current);
        primary.end_restore();
        primary.accept();

        let luminance = current.sum_luminance();
        if (luminance - candidate.luminance).abs() > EPS {
            return Err(Error::Fatal(format!(
                "chain {} failed to reconstruct its seed path (I = {}, expected {})",
                k, luminance, candidate.luminance
            )));
        }
        debug!("Chain {} starts at sample {} with I = {}", k, candidate.index, luminance);

        Ok(PssmltChain {
            scene,
            config: self.config,
            b: bootstrap.b,
            rng,
            primary,
            path_sampler,
            current,
            proposed: Splats::default(),
            num_accepted: 0,
            num_proposed: 0,
        })
    }
}

impl Renderer for PssmltRenderer {
    fn name(&self) -> &'static str {
        "pssmlt"
    }

    fn render(&self, ctx: &RenderContext, film: &mut Film) -> Result<()> {
        let bootstrap = self.bootstrap(ctx.scene, derive_seed(ctx.config.seed, u64::MAX));
        let num_chains = max(ctx.config.num_threads, 1);
        if bootstrap.candidates.is_empty() || bootstrap.b == 0.0 {
            warn!("No seed path carries light; the image is black");
            return Ok(());
        }
        if bootstrap.candidates.len() < num_chains {
            debug!(
                "{} chains share {} seed candidates",
                num_chains,
                bootstrap.candidates.len()
            );
        }
        info!(
            "PSSMLT with {} path sampler, {} estimator and {} mutations",
            self.config.path_sampler, self.config.estimator, self.config.mutation
        );

        let num_mutations = render_chains(ctx, film, |k, seed| {
            self.create_chain(ctx.scene, &bootstrap, k, seed)
        })?;
        normalize_film(film, num_mutations);
        Ok(())
    }
}

/// A Markov chain in primary sample space.
struct PssmltChain<'a> {
    scene: &'a Scene,
    config: PssmltConfig,
    b: Float,
    rng: Box<dyn Random>,
    primary: PrimarySampleSpaceSampler,
    path_sampler: PathSampler<'a>,
    current: Splats,
    proposed: Splats,
    num_accepted: u64,
    num_proposed: u64,
}

impl<'a> MarkovChain for PssmltChain<'a> {
    fn step(&mut self, film: &mut dyn FilmSink) {
        let large_step = self.rng.next_float() < self.config.large_step_prob;
        self.primary.enable_large_step(large_step);
        self.path_sampler
            .sample_and_evaluate(self.scene, &mut self.primary, &mut self.proposed);

        let current_i = self.current.sum_luminance();
        let proposed_i = self.proposed.sum_luminance();
        let a = if current_i == 0.0 {
            1.0
        } else {
            let ratio = proposed_i / current_i * self.primary.proposal_ratio();
            if ratio.is_finite() {
                min(1.0, ratio)
            } else {
                0.0
            }
        };
        let accept = self.rng.next_float() < a;
        self.num_proposed += 1;
        stat_inc!(N_PROPOSED, 1);

        let b = self.b;
        let p_large = self.config.large_step_prob;
        match self.config.estimator {
            PssmltEstimator::MeanValueSubstitution => {
                if proposed_i > 0.0 {
                    self.current.accumulate(film, (1.0 - a) * b / current_i);
                    self.proposed.accumulate(film, a * b / proposed_i);
                } else {
                    self.current.accumulate(film, b / current_i);
                }
            }
            PssmltEstimator::MeanValueSubstitutionLargeStepMis => {
                let large = if large_step { 1.0 } else { 0.0 };
                self.current.accumulate(film, (1.0 - a) / (current_i / b + p_large));
                self.proposed.accumulate(film, (a + large) / (proposed_i / b + p_large));
            }
            PssmltEstimator::Normal => {
                let (state, i) = if accept {
                    (&self.proposed, proposed_i)
                } else {
                    (&self.current, current_i)
                };
                state.accumulate(film, b / i);
            }
        }

        if accept {
            self.primary.accept();
            std::mem::swap(&mut self.current, &mut self.proposed);
            self.num_accepted += 1;
            stat_inc!(N_ACCEPTED, 1);
        } else {
            self.primary.reject();
        }
    }

    fn report(&self, payload: &mut Payload) {
        if self.num_proposed > 0 {
            payload.insert(
                "pssmlt_acceptance_ratio",
                self.num_accepted as Float / self.num_proposed as Float,
            );
        }
    }
}

/// Create a PSSMLT renderer from parameters. See `PssmltConfig::from_params()`
/// and `PathLimits::from_params()`; `mis` (default "power") selects the MIS
/// weight of the bidirectional path sampler and the bootstrap sampler is the
/// registered "rewindable" sampler.
///
/// * `params`   - Parameter set.
/// * `registry` - The registry.
pub fn create_pssmlt_renderer(params: &ParamSet, registry: &ComponentRegistry) -> Result<Box<dyn Renderer>> {
    let config = PssmltConfig::from_params(params)?;
    let limits = PathLimits::from_params(params)?;
    let mis_name = params.find_one_string("mis", "power".to_string());
    let mis = registry.create::<dyn MisWeight>(&mis_name, params)?;
    let rewindable = registry.create::<dyn RewindableSampler>("rewindable", params)?;
    Ok(Box::new(PssmltRenderer::new(config, limits, mis, rewindable)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpt::PowerMisWeight;
    use crate::test_scenes::*;
    use core::geometry::Vector2f;
    use core::spectrum::Spectrum;
    use samplers::RewindableRandomSampler;

    fn renderer(config: PssmltConfig) -> PssmltRenderer {
        PssmltRenderer::new(
            config,
            PathLimits::default(),
            Box::new(PowerMisWeight::new(2.0)),
            Box::new(RewindableRandomSampler::new(RngType::StandardMt, 1)),
        )
    }

    #[test]
    fn config_defaults() {
        let config = PssmltConfig::from_params(&ParamSet::new()).unwrap();
        assert_eq!(config.path_sampler, PathSamplerType::PathTracing);
        assert_eq!(config.estimator, PssmltEstimator::MeanValueSubstitutionLargeStepMis);
        assert_eq!(config.mutation, MutationKernel::Kelemen);
        assert_eq!(config.num_seed_samples, 10000);
        assert_eq!(config.large_step_prob, 0.1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = [
            ParamSet::new().with_string("estimator", "mean"),
            ParamSet::new().with_string("mutation", "uniform"),
            ParamSet::new().with_float("large_step_prob", 1.5),
            ParamSet::new().with_int("num_seed_samples", 0),
            ParamSet::new()
                .with_float("kernel_size_s1", 0.1)
                .with_float("kernel_size_s2", 0.01),
        ];
        for params in bad.iter() {
            assert!(matches!(PssmltConfig::from_params(params), Err(Error::Config(_))));
        }
    }

    #[test]
    fn bootstrap_estimates_the_mean_contribution() {
        // Every eye path under a constant sky carries albedo * radiance.
        let scene = environment_scene(0.5, 1.0);
        let config = PssmltConfig {
            num_seed_samples: 2000,
            ..PssmltConfig::default()
        };
        let bootstrap = renderer(config).bootstrap(&scene, 3);
        assert!(!bootstrap.candidates.is_empty());
        assert!((bootstrap.b - 0.5).abs() < 0.1, "b = {}", bootstrap.b);
    }

    #[test]
    fn chains_reconstruct_their_seed_paths() {
        let scene = area_light_scene(0.5, 1.0);
        let config = PssmltConfig {
            num_seed_samples: 500,
            ..PssmltConfig::default()
        };
        let renderer = renderer(config);
        let bootstrap = renderer.bootstrap(&scene, 3);
        for k in 0..4 {
            let chain = renderer.create_chain(&scene, &bootstrap, k, 100 + k as u32).unwrap();
            assert!(chain.current.sum_luminance() > 0.0);
        }
    }

    #[test]
    fn estimators_converge_under_a_constant_sky() {
        let scene = environment_scene(0.5, 1.0);
        for estimator in [
            PssmltEstimator::Normal,
            PssmltEstimator::MeanValueSubstitution,
            PssmltEstimator::MeanValueSubstitutionLargeStepMis,
        ] {
            let config = PssmltConfig {
                estimator,
                num_seed_samples: 2000,
                large_step_prob: 0.3,
                ..PssmltConfig::default()
            };
            let film = render(&renderer(config), &scene, 4, 64);
            let mean = mean_luminance(&film);
            assert!((mean - 0.5).abs() < 0.1, "{} mean {}", estimator, mean);
            assert!(film.pixels().iter().all(|p| p.is_finite()));
        }
    }

    #[test]
    fn chains_may_outnumber_seed_candidates() {
        let scene = environment_scene(0.5, 1.0);
        let config = PssmltConfig {
            num_seed_samples: 3,
            ..PssmltConfig::default()
        };
        let renderer = renderer(config);
        let bootstrap = renderer.bootstrap(&scene, 3);
        assert!(!bootstrap.candidates.is_empty());
        assert!(bootstrap.candidates.len() <= 3);

        let scheduler = SchedulerConfig {
            num_threads: 8,
            ..scheduler_config(4)
        };
        let experiments = Experiments::new();
        let ctx = RenderContext::new(&scene, &scheduler, &experiments);
        let mut film = Film::new(4, 4);
        renderer.render(&ctx, &mut film).unwrap();
        assert!(mean_luminance(&film) > 0.0);
        assert!(film.pixels().iter().all(|p| p.is_finite()));
    }

    /// Splats one unit per step at the film center and panics after
    /// `fail_after` steps.
    struct FailingChain {
        steps: u64,
        fail_after: u64,
    }

    impl MarkovChain for FailingChain {
        fn step(&mut self, film: &mut dyn FilmSink) {
            if self.steps == self.fail_after {
                panic!("chain stopped after {} steps", self.steps);
            }
            film.accumulate_contribution(&Vector2f::new(0.5, 0.5), &Spectrum::ONE);
            self.steps += 1;
        }
    }

    #[test]
    fn failed_chains_keep_their_contributions() {
        let scene = area_light_scene(0.5, 1.0);
        let scheduler = SchedulerConfig {
            num_threads: 1,
            samples_per_block: 4,
            ..scheduler_config(16)
        };
        let experiments = Experiments::new();
        let ctx = RenderContext::new(&scene, &scheduler, &experiments);
        let mut film = Film::new(2, 2);

        // The chain fails in its third block.
        let result = render_chains(&ctx, &mut film, |_k, _seed| {
            Ok(FailingChain {
                steps: 0,
                fail_after: 10,
            })
        });
        assert!(matches!(result, Err(Error::Fatal(_))));

        let total = film.pixels().iter().fold(Spectrum::ZERO, |a, p| a + *p);
        assert_eq!(total, Spectrum::splat(10.0));
    }

    #[test]
    fn bidirectional_path_sampler_renders() {
        let scene = area_light_scene(0.5, 1.0);
        let config = PssmltConfig {
            path_sampler: PathSamplerType::Bidirectional,
            num_seed_samples: 1000,
            ..PssmltConfig::default()
        };
        let film = render(&renderer(config), &scene, 4, 16);
        assert!(mean_luminance(&film) > 0.0);
        assert!(film.pixels().iter().all(|p| p.is_finite()));
    }
}
