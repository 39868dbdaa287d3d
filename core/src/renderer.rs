//! Renderer

use crate::error::*;
use crate::experiment::*;
use crate::film::*;
use crate::registry::*;
use crate::scene::*;
use crate::scheduler::*;

/// Everything a renderer reads while rendering. Shared by all workers.
#[derive(Copy, Clone)]
pub struct RenderContext<'a> {
    /// The scene.
    pub scene: &'a Scene,

    /// Scheduler configuration.
    pub config: &'a SchedulerConfig,

    /// Attached experiments.
    pub experiments: &'a Experiments,
}

impl<'a> RenderContext<'a> {
    /// Create a context.
    ///
    /// * `scene`       - The scene.
    /// * `config`      - Scheduler configuration.
    /// * `experiments` - Attached experiments.
    pub fn new(scene: &'a Scene, config: &'a SchedulerConfig, experiments: &'a Experiments) -> Self {
        Self {
            scene,
            config,
            experiments,
        }
    }
}

/// A light transport algorithm. The renderer picks a scheduler, accumulates
/// into `film` and leaves it normalized to radiance.
pub trait Renderer: Send + Sync {
    /// Returns the renderer name.
    fn name(&self) -> &'static str;

    /// Render the scene. On `Err(Error::Fatal)` the film holds whatever was
    /// merged before the failure.
    ///
    /// * `ctx`  - Render context.
    /// * `film` - The film.
    fn render(&self, ctx: &RenderContext, film: &mut Film) -> Result<()>;

    /// Returns the names of the auxiliary film layers the renderer fills,
    /// indexed by layer.
    fn layer_names(&self) -> Vec<String> {
        vec![]
    }
}

impl Component for dyn Renderer {
    const INTERFACE: &'static str = "renderer";
}

/// Rescale a film by W·H / N so that each pixel holds the mean of its
/// samples.
///
/// * `film`        - The film.
/// * `num_samples` - Number of samples N taken over the whole film.
pub fn normalize_film(film: &mut Film, num_samples: u64) {
    if num_samples == 0 {
        warn!("No samples were taken");
        return;
    }
    let w = (film.width() * film.height()) as f64 / num_samples as f64;
    film.rescale(w);
}
