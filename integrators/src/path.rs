//! Path Tracer

use crate::common::*;
use core::bsdf::*;
use core::error::*;
use core::film::*;
use core::geometry::*;
use core::light::*;
use core::lm::*;
use core::paramset::*;
use core::pdf::*;
use core::registry::*;
use core::renderer::*;
use core::sampler::*;
use core::sampling::*;
use core::scene::*;
use core::scheduler::*;
use core::spectrum::*;
use core::{stat_dist, stat_int_distribution, stat_register_fns};

stat_int_distribution!("Integrator/Path tracer vertices", PATH_LENGTH, path_stats_length);
stat_register_fns!(path_stats_length);

/// Implements path tracing with next event estimation. Light hit by BSDF
/// sampling and light sampled explicitly are combined with the power
/// heuristic.
pub struct PathTracer {
    /// Russian roulette depth and maximum path length.
    limits: PathLimits,

    /// Prototype sampler.
    sampler: Box<dyn Sampler>,
}

impl PathTracer {
    /// Create a new `PathTracer`.
    ///
    /// * `limits`  - Russian roulette depth and maximum path length.
    /// * `sampler` - Prototype sampler.
    pub fn new(limits: PathLimits, sampler: Box<dyn Sampler>) -> Self {
        register_stats();
        Self { limits, sampler }
    }
}

impl Renderer for PathTracer {
    fn name(&self) -> &'static str {
        "pt"
    }

    fn render(&self, ctx: &RenderContext, film: &mut Film) -> Result<()> {
        let limits = self.limits;
        let num_samples = render_pixels(ctx, film, self.sampler.as_ref(), || {
            Ok(PathProcess {
                scene: ctx.scene,
                limits,
            })
        })?;
        normalize_film(film, num_samples);
        Ok(())
    }
}

struct PathProcess<'a> {
    scene: &'a Scene,
    limits: PathLimits,
}

impl<'a> RenderProcess for PathProcess<'a> {
    fn process_sample(&mut self, sampler: &mut dyn Sampler, footprint: &PixelFootprint, film: &mut dyn FilmSink) {
        let raster = footprint.sample(&sampler.next_vec2());
        let l = estimate_radiance(self.scene, sampler, &self.limits, &raster);
        film.accumulate_contribution(&raster, &l);
    }
}

/// Trace one eye path through a raster position and return the radiance
/// estimate.
///
/// * `scene`   - The scene.
/// * `sampler` - Random numbers.
/// * `limits`  - Russian roulette depth and maximum path length.
/// * `raster`  - Raster position in [0, 1]^2.
pub fn estimate_radiance<S: Sampler + ?Sized>(
    scene: &Scene,
    sampler: &mut S,
    limits: &PathLimits,
    raster: &Vector2f,
) -> Spectrum {
    let camera = scene.camera();

    // Sample position on the camera.
    let (geom_e, pdf_p) = match camera.sample_position(&sampler.next_vec2()) {
        Some(s) if !s.1.is_zero() => s,
        _ => return Spectrum::ZERO,
    };
    let we0 = camera.evaluate_position(&geom_e) / pdf_p.v;

    // Sample the primary ray through the raster position.
    let query = BsdfSampleQuery {
        bsdf_type: BsdfType::EYE_DIRECTION,
        sample: *raster,
        u_comp: 0.0,
        transport_dir: TransportDirection::EL,
        wi: Vector3f::ZERO,
    };
    let (result, we1) = match camera.sample_and_estimate_direction(&query, &geom_e) {
        Some(r) => r,
        None => return Spectrum::ZERO,
    };

    let mut l = Spectrum::ZERO;
    let mut throughput = we0 * we1;
    let mut ray = Ray::spawn(geom_e.p, result.wo);
    let mut prev_geom = geom_e;
    let mut prev_pdf = result.pdf;
    let mut specular_bounce = true;
    let mut num_vertices = 1_usize;

    loop {
        debug!("Path tracer vertex {}, L = {}, throughput = {}", num_vertices, l, throughput);

        // Find the next vertex or add radiance from the environment.
        let isect = match scene.intersect(&mut ray) {
            Some(isect) => isect,
            None => {
                if let Some(env) = scene.environment_light() {
                    if let Some(geom) = env.environment_geometry(&ray) {
                        let w = implicit_weight(scene, env, &geom, &prev_geom, &prev_pdf, specular_bounce);
                        l += throughput * emitted_radiance(env, &geom, &-ray.d) * w;
                    }
                }
                num_vertices += 1;
                break;
            }
        };
        num_vertices += 1;
        let geom = isect.geom;
        let wi = -ray.d;

        // Light hit by BSDF sampling.
        if let Some(light) = isect.light() {
            let w = implicit_weight(scene, light, &geom, &prev_geom, &prev_pdf, specular_bounce);
            l += throughput * emitted_radiance(light, &geom, &wi) * w;
        }

        let bsdf = match isect.bsdf() {
            Some(bsdf) => bsdf,
            None => break,
        };
        if !limits.allows(num_vertices) {
            break;
        }

        // Next event estimation. Perfectly specular surfaces cannot connect.
        if !bsdf.degenerated() {
            l += throughput * estimate_direct(scene, sampler, bsdf, &geom, &wi);
        }

        // Sample BSDF to get the new path direction.
        let query = BsdfSampleQuery {
            bsdf_type: BsdfType::ALL_BSDF,
            sample: sampler.next_vec2(),
            u_comp: sampler.next(),
            transport_dir: TransportDirection::EL,
            wi,
        };
        let (result, fs) = match bsdf.sample_and_estimate_direction(&query, &geom) {
            Some(r) => r,
            None => break,
        };
        throughput *= fs;
        if !usable_throughput(&throughput) {
            break;
        }

        // Possibly terminate the path with Russian roulette.
        if num_vertices > limits.rr_depth {
            let q = min(0.5, throughput.luminance());
            if sampler.next() > q {
                break;
            }
            throughput = throughput / q;
        }

        specular_bounce = bsdf.degenerated();
        prev_pdf = result.pdf;
        prev_geom = geom;
        ray = Ray::spawn(geom.p, result.wo);
    }

    stat_dist!(PATH_LENGTH, num_vertices as i64);
    l
}

/// Returns Le(x → w) at a point on a light.
pub(crate) fn emitted_radiance(light: &dyn Light, geom: &SurfaceGeometry, wo: &Vector3f) -> Spectrum {
    let query = BsdfEvalQuery::new(BsdfType::LIGHT_DIRECTION, TransportDirection::LE, Vector3f::ZERO, *wo);
    light.evaluate_position(geom) * light.evaluate_direction(&query, geom)
}

/// MIS weight of a light hit by BSDF sampling against next event estimation.
fn implicit_weight(
    scene: &Scene,
    light: &dyn Light,
    geom: &SurfaceGeometry,
    prev_geom: &SurfaceGeometry,
    prev_pdf: &PdfEval,
    specular_bounce: bool,
) -> Float {
    if specular_bounce {
        return 1.0;
    }
    let pdf_bsdf = prev_pdf.convert_to_area(prev_geom, geom).v;
    let pdf_light = light.evaluate_position_pdf(geom).v * scene.light_selection_pdf(light).v;
    power_heuristic(pdf_bsdf, pdf_light)
}

/// Sample a point on a light and estimate the radiance it scatters at `geom`
/// towards `wi`, MIS weighted against BSDF sampling.
fn estimate_direct<S: Sampler + ?Sized>(
    scene: &Scene,
    sampler: &mut S,
    bsdf: &dyn GeneralizedBsdf,
    geom: &SurfaceGeometry,
    wi: &Vector3f,
) -> Spectrum {
    let (light, pdf_sel) = scene.sample_light_selection(sampler.next());
    let (geom_l, pdf_p) = match light.sample_position(&sampler.next_vec2()) {
        Some(s) => s,
        None => return Spectrum::ZERO,
    };
    let pdf_light = pdf_p.v * pdf_sel.v;
    if pdf_light == 0.0 {
        return Spectrum::ZERO;
    }

    let d = (geom_l.p - geom.p).normalize();
    let bsdf_query = BsdfEvalQuery::new(BsdfType::ALL_BSDF, TransportDirection::EL, *wi, d);
    let fs = bsdf.evaluate_direction(&bsdf_query, geom);
    if fs.is_black() {
        return Spectrum::ZERO;
    }
    let le1 = light.evaluate_direction(
        &BsdfEvalQuery::new(BsdfType::LIGHT_DIRECTION, TransportDirection::LE, Vector3f::ZERO, -d),
        &geom_l,
    );
    if le1.is_black() {
        return Spectrum::ZERO;
    }
    let g = generalized_geometry_term(geom, &geom_l);
    if g == 0.0 || !scene.visible(&geom.p, &geom_l.p) {
        return Spectrum::ZERO;
    }

    let w = if light.degenerated() || geom_l.degenerated {
        1.0
    } else {
        let pdf_bsdf = bsdf
            .evaluate_direction_pdf(&bsdf_query, geom)
            .convert_to_area(geom, &geom_l)
            .v;
        power_heuristic(pdf_light, pdf_bsdf)
    };
    let le0 = light.evaluate_position(&geom_l);
    fs * le1 * le0 * (g * w / pdf_light)
}

/// Create a path tracer from parameters. See `PathLimits::from_params()` and
/// `create_sampler()`.
///
/// * `params`   - Parameter set.
/// * `registry` - The registry.
pub fn create_path_tracer(params: &ParamSet, registry: &ComponentRegistry) -> Result<Box<dyn Renderer>> {
    let limits = PathLimits::from_params(params)?;
    let sampler = create_sampler(params, registry)?;
    Ok(Box::new(PathTracer::new(limits, sampler)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpt::*;
    use crate::test_scenes::*;
    use core::experiment::Experiments;
    use core::rng::RngType;
    use samplers::RandomSampler;

    fn path_tracer(limits: PathLimits) -> PathTracer {
        PathTracer::new(limits, Box::new(RandomSampler::new(RngType::StandardMt, 1)))
    }

    #[test]
    fn environment_lit_floor_converges() {
        let scene = environment_scene(0.5, 1.0);
        let film = render(&path_tracer(PathLimits::default()), &scene, 8, 16);
        let mean = mean_luminance(&film);
        assert!((mean - 0.5).abs() < 0.1, "mean {}", mean);
    }

    #[test]
    fn direct_light_is_seen_without_bounces() {
        // A two vertex path can only see emitters; the floor is dark.
        let scene = area_light_scene(0.5, 1.0);
        let limits = PathLimits {
            rr_depth: 1,
            max_vertices: Some(2),
        };
        let film = render(&path_tracer(limits), &scene, 4, 4);
        assert!(film.pixels().iter().all(|p| p.is_black()));
    }

    #[test]
    fn agrees_with_bidirectional_path_tracing() {
        let scene = area_light_scene(0.5, 1.0);
        let pt = render(&path_tracer(PathLimits::default()), &scene, 4, 256);
        let bpt = BptRenderer::new(
            PathLimits::default(),
            Box::new(PowerMisWeight::new(2.0)),
            Box::new(RandomSampler::new(RngType::StandardMt, 2)),
            None,
        );
        let bpt = render(&bpt, &scene, 4, 256);
        let a = mean_luminance(&pt);
        let b = mean_luminance(&bpt);
        assert!(a > 0.0);
        assert!((a - b).abs() < 0.1 * a, "pt {} bpt {}", a, b);
    }

    fn render_with_threads(scene: &Scene, num_threads: usize) -> Film {
        let config = SchedulerConfig {
            num_threads,
            ..scheduler_config(8)
        };
        let experiments = Experiments::new();
        let ctx = RenderContext::new(scene, &config, &experiments);
        let mut film = Film::new(8, 8);
        path_tracer(PathLimits::default()).render(&ctx, &mut film).unwrap();
        film
    }

    #[test]
    fn result_does_not_depend_on_thread_count() {
        let scene = area_light_scene(0.5, 1.0);
        let one = render_with_threads(&scene, 1);
        let four = render_with_threads(&scene, 4);
        assert!(mean_luminance(&one) > 0.0);
        assert_eq!(one.pixels(), four.pixels());
    }

    /// Adds one unit to the pixel it samples.
    struct UnitProcess;

    impl RenderProcess for UnitProcess {
        fn process_sample(&mut self, _sampler: &mut dyn Sampler, footprint: &PixelFootprint, film: &mut dyn FilmSink) {
            film.accumulate_contribution(&footprint.center(), &Spectrum::ONE);
        }
    }

    #[test]
    fn time_limit_stops_at_a_pass_boundary() {
        let scene = area_light_scene(0.5, 1.0);
        let config = SchedulerConfig {
            mode: TerminationMode::Time,
            time_limit: 0.05,
            ..scheduler_config(1)
        };
        let experiments = Experiments::new();
        let ctx = RenderContext::new(&scene, &config, &experiments);
        let mut film = Film::new(6, 5);
        let sampler = RandomSampler::new(RngType::StandardMt, 1);
        let num_samples = render_pixels(&ctx, &mut film, &sampler, || Ok(UnitProcess)).unwrap();

        // Every pass covers each pixel once.
        let passes = num_samples / 30;
        assert!(passes >= 1);
        assert_eq!(num_samples % 30, 0);
        let expected = Spectrum::splat(passes as Float);
        assert!(film.pixels().iter().all(|p| *p == expected));
    }

    #[test]
    fn factory_reads_limits() {
        let registry = {
            let mut r = ComponentRegistry::new();
            samplers::register(&mut r);
            r
        };
        let params = ParamSet::new().with_int("max_path_vertices", 1);
        assert!(create_path_tracer(&params, &registry).is_err());
        assert!(create_path_tracer(&ParamSet::new(), &registry).is_ok());
    }
}
