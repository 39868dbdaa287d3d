//! Light Tracer

use crate::bpt::*;
use crate::common::*;
use core::bsdf::*;
use core::error::*;
use core::film::*;
use core::paramset::*;
use core::registry::*;
use core::renderer::*;
use core::sampler::*;
use core::scene::*;
use core::scheduler::*;

/// Traces light subpaths and connects every vertex to the camera, i.e. the
/// t = 1 strategies of bidirectional path tracing without MIS. Pixels only
/// decide how many paths are traced.
pub struct LightTracer {
    /// Russian roulette depth and maximum path length.
    limits: PathLimits,

    /// Prototype sampler.
    sampler: Box<dyn Sampler>,
}

impl LightTracer {
    /// Create a new light tracer.
    ///
    /// * `limits`  - Russian roulette depth and maximum path length.
    /// * `sampler` - Prototype sampler.
    pub fn new(limits: PathLimits, sampler: Box<dyn Sampler>) -> Self {
        register_path_stats();
        Self { limits, sampler }
    }
}

impl Renderer for LightTracer {
    fn name(&self) -> &'static str {
        "lighttrace"
    }

    fn render(&self, ctx: &RenderContext, film: &mut Film) -> Result<()> {
        let num_samples = render_pixels(ctx, film, self.sampler.as_ref(), || {
            Ok(LightTraceProcess {
                scene: ctx.scene,
                limits: self.limits,
                pool: VertexPool::new(),
            })
        })?;
        normalize_film(film, num_samples);
        Ok(())
    }
}

struct LightTraceProcess<'a> {
    scene: &'a Scene,
    limits: PathLimits,
    pool: VertexPool,
}

impl<'a> RenderProcess for LightTraceProcess<'a> {
    fn process_sample(&mut self, sampler: &mut dyn Sampler, _footprint: &PixelFootprint, film: &mut dyn FilmSink) {
        let camera_only = PathLimits {
            rr_depth: self.limits.rr_depth,
            max_vertices: Some(1),
        };
        {
            let arena = self.pool.arena();
            let light = Subpath::sample(arena, self.scene, sampler, TransportDirection::LE, &self.limits, None);
            let eye = Subpath::sample(arena, self.scene, sampler, TransportDirection::EL, &camera_only, None);
            let num_light = if eye.is_empty() { 0 } else { light.len() };
            for s in 1..=num_light {
                if !self.limits.allows(s) {
                    break;
                }
                let path = FullPath::new(s, 1, &light.vertices, &eye.vertices, None);
                if let Some((raster, c)) = path.evaluate_unweighted_contribution(self.scene) {
                    film.accumulate_contribution(&raster, &c);
                }
            }
        }
        self.pool.release();
    }
}

/// Create a light tracer from parameters. See `PathLimits::from_params()` and
/// `create_sampler()`.
///
/// * `params`   - Parameter set.
/// * `registry` - The registry.
pub fn create_light_tracer(params: &ParamSet, registry: &ComponentRegistry) -> Result<Box<dyn Renderer>> {
    let limits = PathLimits::from_params(params)?;
    let sampler = create_sampler(params, registry)?;
    Ok(Box::new(LightTracer::new(limits, sampler)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathTracer;
    use crate::test_scenes::*;
    use core::rng::RngType;
    use samplers::RandomSampler;

    #[test]
    fn agrees_with_path_tracing() {
        let scene = area_light_scene(0.5, 1.0);
        let lt = LightTracer::new(
            PathLimits::default(),
            Box::new(RandomSampler::new(RngType::StandardMt, 3)),
        );
        let pt = PathTracer::new(
            PathLimits::default(),
            Box::new(RandomSampler::new(RngType::StandardMt, 4)),
        );
        let a = mean_luminance(&render(&lt, &scene, 4, 1024));
        let b = mean_luminance(&render(&pt, &scene, 4, 256));
        assert!(b > 0.0);
        assert!((a - b).abs() < 0.2 * b, "lighttrace {} pt {}", a, b);
    }

    #[test]
    fn path_length_limit_keeps_only_emitters() {
        // Two vertex paths connect the light to the camera, which looks at
        // the floor only.
        let scene = area_light_scene(0.5, 1.0);
        let lt = LightTracer::new(
            PathLimits {
                rr_depth: 1,
                max_vertices: Some(2),
            },
            Box::new(RandomSampler::new(RngType::StandardMt, 3)),
        );
        let film = render(&lt, &scene, 4, 16);
        assert!(film.pixels().iter().all(|p| p.is_black()));
    }
}
