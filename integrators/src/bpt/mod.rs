//! Bidirectional Path Tracing

use crate::common::*;
use core::bsdf::*;
use core::error::*;
use core::film::*;
use core::geometry::*;
use core::lm::*;
use core::paramset::*;
use core::registry::*;
use core::renderer::*;
use core::sampler::*;
use core::scene::*;
use core::scheduler::*;
use core::spectrum::*;
use core::{stat_counter, stat_inc, stat_register_fns};

mod fullpath;
mod mis;
mod pool;
mod subpath;

// Re-export.
pub use fullpath::*;
pub use mis::*;
pub use pool::*;
pub use subpath::*;

stat_counter!("Integrator/BPT strategies evaluated", N_STRATEGIES, bpt_stats_strategies);
stat_counter!("Integrator/BPT zero contributions", N_ZERO_STRATEGIES, bpt_stats_zero);
stat_register_fns!(bpt_stats_strategies, bpt_stats_zero);

/// Register the statistics of subpath tracing and strategy evaluation. Call
/// it from renderer constructors.
pub(crate) fn register_path_stats() {
    register_stats();
    pool::register_stats();
    subpath::register_stats();
}

/// A strategy contribution produced by `connect_subpaths()`.
#[derive(Copy, Clone, Debug)]
pub struct StrategyContribution {
    /// Number of light subpath vertices.
    pub s: usize,

    /// Number of eye subpath vertices.
    pub t: usize,

    /// Raster position.
    pub raster: Vector2f,

    /// Contribution without MIS weight.
    pub unweighted: Spectrum,

    /// MIS weight.
    pub weight: Float,
}

/// Evaluate every strategy (s, t) with t >= 1 that combines a prefix of the
/// light subpath with a prefix of the eye subpath.
///
/// * `scene`  - The scene.
/// * `light`  - Light subpath.
/// * `eye`    - Eye subpath.
/// * `limits` - Full paths longer than `limits.max_vertices` are skipped.
/// * `mis`    - MIS weight.
/// * `splat`  - Receives the non-zero contributions.
pub fn connect_subpaths<F>(
    scene: &Scene,
    light: &Subpath,
    eye: &Subpath,
    limits: &PathLimits,
    mis: &dyn MisWeight,
    mut splat: F,
) where
    F: FnMut(&StrategyContribution),
{
    let n_l = light.len();
    let n_e = eye.len();
    for n in 2..=n_l + n_e {
        if limits.max_vertices.map_or(false, |m| n > m) {
            break;
        }
        let s_min = n.saturating_sub(n_e);
        let s_max = min(n_l, n - 1);
        for s in s_min..=s_max {
            let t = n - s;
            stat_inc!(N_STRATEGIES, 1);
            let path = FullPath::new(s, t, &light.vertices, &eye.vertices, eye.raster);
            match path.evaluate_unweighted_contribution(scene) {
                Some((raster, unweighted)) => splat(&StrategyContribution {
                    s,
                    t,
                    raster,
                    unweighted,
                    weight: mis.evaluate(&path),
                }),
                None => stat_inc!(N_ZERO_STRATEGIES, 1),
            }
        }
    }
}

/// Layout of the auxiliary film layers written in experimental mode. Layer
/// s (M + 1) + t holds the unweighted contributions of strategy (s, t) for
/// s, t <= M; optional per-length layers follow and hold the weighted
/// contributions of all strategies with n vertices for 2 <= n <= 2M.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StrategyLayers {
    /// Maximum number of subpath vertices M with a layer.
    pub max_subpath_vertices: usize,

    /// Add per-length layers.
    pub per_length: bool,
}

impl StrategyLayers {
    fn num_strategy_layers(&self) -> usize {
        (self.max_subpath_vertices + 1) * (self.max_subpath_vertices + 1)
    }

    /// Returns the total number of layers.
    pub fn len(&self) -> usize {
        let lengths = if self.per_length {
            2 * self.max_subpath_vertices - 1
        } else {
            0
        };
        self.num_strategy_layers() + lengths
    }

    /// Returns `true` if there are no layers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the layer of strategy (s, t).
    pub fn strategy_layer(&self, s: usize, t: usize) -> Option<usize> {
        let m = self.max_subpath_vertices;
        if s <= m && t <= m {
            Some(s * (m + 1) + t)
        } else {
            None
        }
    }

    /// Returns the layer of full paths with `n` vertices.
    pub fn length_layer(&self, n: usize) -> Option<usize> {
        if self.per_length && n >= 2 && n <= 2 * self.max_subpath_vertices {
            Some(self.num_strategy_layers() + n - 2)
        } else {
            None
        }
    }

    /// Returns the layer names by index.
    pub fn names(&self) -> Vec<String> {
        let m = self.max_subpath_vertices;
        let mut names: Vec<String> = (0..self.num_strategy_layers())
            .map(|i| format!("s{:02}t{:02}", i / (m + 1), i % (m + 1)))
            .collect();
        if self.per_length {
            names.extend((2..=2 * m).map(|n| format!("l{:03}", n)));
        }
        names
    }
}

/// Bidirectional path tracer. Every sample traces one light and one eye
/// subpath and combines all their prefixes with multiple importance sampling.
pub struct BptRenderer {
    /// Russian roulette depth and maximum path length.
    limits: PathLimits,

    /// MIS weight.
    mis: Box<dyn MisWeight>,

    /// Prototype sampler.
    sampler: Box<dyn Sampler>,

    /// Per-strategy layers in experimental mode.
    layers: Option<StrategyLayers>,
}

impl BptRenderer {
    /// Create a new bidirectional path tracer.
    ///
    /// * `limits`  - Russian roulette depth and maximum path length.
    /// * `mis`     - MIS weight.
    /// * `sampler` - Prototype sampler.
    /// * `layers`  - Per-strategy layers in experimental mode.
    pub fn new(
        limits: PathLimits,
        mis: Box<dyn MisWeight>,
        sampler: Box<dyn Sampler>,
        layers: Option<StrategyLayers>,
    ) -> Self {
        register_path_stats();
        Self {
            limits,
            mis,
            sampler,
            layers,
        }
    }
}

impl Renderer for BptRenderer {
    fn name(&self) -> &'static str {
        "bpt"
    }

    fn render(&self, ctx: &RenderContext, film: &mut Film) -> Result<()> {
        info!("Bidirectional path tracing with '{}' MIS weights", self.mis.name());
        if let Some(layers) = &self.layers {
            film.allocate_layers(layers.len());
        }
        let num_samples = render_pixels(ctx, film, self.sampler.as_ref(), || {
            Ok(BptProcess {
                scene: ctx.scene,
                renderer: self,
                pool: VertexPool::new(),
            })
        })?;
        normalize_film(film, num_samples);
        Ok(())
    }

    fn layer_names(&self) -> Vec<String> {
        self.layers.map_or_else(Vec::new, |l| l.names())
    }
}

/// Per-worker state.
struct BptProcess<'a> {
    scene: &'a Scene,
    renderer: &'a BptRenderer,
    pool: VertexPool,
}

impl<'a> RenderProcess for BptProcess<'a> {
    fn process_sample(&mut self, sampler: &mut dyn Sampler, footprint: &PixelFootprint, film: &mut dyn FilmSink) {
        let r = self.renderer;
        let raster = footprint.sample(&sampler.next_vec2());
        {
            let arena = self.pool.arena();
            let light = Subpath::sample(arena, self.scene, sampler, TransportDirection::LE, &r.limits, None);
            let eye = Subpath::sample(arena, self.scene, sampler, TransportDirection::EL, &r.limits, Some(raster));

            connect_subpaths(self.scene, &light, &eye, &r.limits, r.mis.as_ref(), |c| {
                let weighted = c.unweighted * c.weight;
                film.accumulate_contribution(&c.raster, &weighted);
                if let Some(layers) = &r.layers {
                    if let Some(layer) = layers.strategy_layer(c.s, c.t) {
                        film.accumulate_layer(layer, &c.raster, &c.unweighted);
                    }
                    if let Some(layer) = layers.length_layer(c.s + c.t) {
                        film.accumulate_layer(layer, &c.raster, &weighted);
                    }
                }
            });
        }
        self.pool.release();
    }
}

/// Create a bidirectional path tracer from parameters.
///
/// * `params`   - Parameter set; `mis` selects the MIS weight (default
///                "power"), `enable_experimental_mode` turns on per-strategy
///                layers for subpaths of up to `max_subpath_num_vertices`
///                (default 3) vertices and `per_length_layers` adds one layer
///                per path length. See also `PathLimits::from_params()` and
///                `create_sampler()`.
/// * `registry` - The registry.
pub fn create_bpt_renderer(params: &ParamSet, registry: &ComponentRegistry) -> Result<Box<dyn Renderer>> {
    let mut limits = PathLimits::from_params(params)?;
    let mis_name = params.find_one_string("mis", "power".to_string());
    let mis = registry.create::<dyn MisWeight>(&mis_name, params)?;
    let sampler = create_sampler(params, registry)?;

    let layers = if params.find_one_bool("enable_experimental_mode", false) {
        let m = params.find_one_int("max_subpath_num_vertices", 3);
        if m < 1 {
            return Err(Error::config(format!("max_subpath_num_vertices {} must be positive", m)));
        }
        // Strategies with layers are not cut short by Russian roulette.
        limits.rr_depth = max(limits.rr_depth, m as usize);
        Some(StrategyLayers {
            max_subpath_vertices: m as usize,
            per_length: params.find_one_bool("per_length_layers", false),
        })
    } else {
        None
    };

    Ok(Box::new(BptRenderer::new(limits, mis, sampler, layers)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
