//! Photon Mapping

mod kernel;
mod photon_map;
mod tracing;

// Re-export.
pub use kernel::*;
pub use photon_map::*;
pub use tracing::*;

use crate::common::*;
use crate::path::emitted_radiance;
use core::bsdf::*;
use core::error::*;
use core::film::*;
use core::geometry::*;
use core::lm::*;
use core::paramset::*;
use core::registry::*;
use core::renderer::*;
use core::rng::derive_seed;
use core::sampler::*;
use core::scene::*;
use core::scheduler::*;
use core::spectrum::*;

/// The first non-specular surface an eye path reaches, where radiance is
/// estimated from photons.
pub struct VisiblePoint<'s> {
    /// Surface geometry.
    pub geom: SurfaceGeometry,

    /// Direction towards the camera side of the path.
    pub wi: Vector3f,

    /// Scattering at the surface.
    pub bsdf: &'s dyn GeneralizedBsdf,

    /// Importance carried to the surface.
    pub throughput: Spectrum,
}

impl<'s> VisiblePoint<'s> {
    /// Returns the photon contribution f_s(wi, photon.wi) · Φ scaled by the
    /// throughput of the eye path.
    ///
    /// * `photon` - The photon.
    pub fn photon_contribution(&self, photon: &Photon) -> Spectrum {
        let query = BsdfEvalQuery::new(BsdfType::ALL_BSDF, TransportDirection::EL, self.wi, photon.wi);
        let fs = self.bsdf.evaluate_direction(&query, &self.geom);
        if fs.is_black() {
            return Spectrum::ZERO;
        }
        self.throughput * fs * photon.throughput
    }
}

/// Trace an eye path through a raster position across specular surfaces.
/// Returns the emission picked up on the way and the first non-specular
/// surface, if any.
///
/// * `scene`   - The scene.
/// * `sampler` - Random numbers.
/// * `limits`  - Russian roulette depth and maximum path length.
/// * `raster`  - Raster position in [0, 1]^2.
pub fn trace_visible_point<'s, S: Sampler + ?Sized>(
    scene: &'s Scene,
    sampler: &mut S,
    limits: &PathLimits,
    raster: &Vector2f,
) -> (Spectrum, Option<VisiblePoint<'s>>) {
    let camera = scene.camera();
    let (geom_e, pdf_p) = match camera.sample_position(&sampler.next_vec2()) {
        Some(s) if !s.1.is_zero() => s,
        _ => return (Spectrum::ZERO, None),
    };
    let query = BsdfSampleQuery {
        bsdf_type: BsdfType::EYE_DIRECTION,
        sample: *raster,
        u_comp: 0.0,
        transport_dir: TransportDirection::EL,
        wi: Vector3f::ZERO,
    };
    let (result, we1) = match camera.sample_and_estimate_direction(&query, &geom_e) {
        Some(r) => r,
        None => return (Spectrum::ZERO, None),
    };

    let mut l = Spectrum::ZERO;
    let mut throughput = camera.evaluate_position(&geom_e) / pdf_p.v * we1;
    let mut ray = Ray::spawn(geom_e.p, result.wo);
    let mut num_vertices = 1;

    loop {
        let isect = match scene.intersect(&mut ray) {
            Some(isect) => isect,
            None => {
                if let Some(env) = scene.environment_light() {
                    if let Some(geom) = env.environment_geometry(&ray) {
                        l += throughput * emitted_radiance(env, &geom, &-ray.d);
                    }
                }
                return (l, None);
            }
        };
        num_vertices += 1;
        let wi = -ray.d;

        // Emitters seen directly or through specular surfaces.
        if let Some(light) = isect.light() {
            l += throughput * emitted_radiance(light, &isect.geom, &wi);
        }

        let bsdf = match isect.bsdf() {
            Some(bsdf) => bsdf,
            None => return (l, None),
        };
        if !bsdf.bsdf_types().intersects(BsdfType::SPECULAR) {
            let vp = VisiblePoint {
                geom: isect.geom,
                wi,
                bsdf,
                throughput,
            };
            return (l, Some(vp));
        }
        if !limits.allows(num_vertices) {
            return (l, None);
        }

        let query = BsdfSampleQuery {
            bsdf_type: BsdfType::ALL_BSDF,
            sample: sampler.next_vec2(),
            u_comp: sampler.next(),
            transport_dir: TransportDirection::EL,
            wi,
        };
        let (result, fs) = match bsdf.sample_and_estimate_direction(&query, &isect.geom) {
            Some(r) => r,
            None => return (l, None),
        };
        throughput *= fs;
        if !usable_throughput(&throughput) {
            return (l, None);
        }
        ray = Ray::spawn(isect.geom.p, result.wo);
    }
}

/// Photon mapping parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PhotonMappingConfig {
    /// Number of light paths traced.
    pub num_photon_trace_samples: u64,

    /// Maximum number of stored photons.
    pub max_photons: usize,

    /// Number of photons gathered per query.
    pub num_nn_query_photons: usize,

    /// Maximum gather distance.
    pub max_nn_query_dist: Float,

    /// Splat stored photons over the image.
    pub visualize_photons: bool,
}

impl Default for PhotonMappingConfig {
    fn default() -> Self {
        Self {
            num_photon_trace_samples: 100_000,
            max_photons: 1_000_000,
            num_nn_query_photons: 50,
            max_nn_query_dist: 0.1,
            visualize_photons: false,
        }
    }
}

impl PhotonMappingConfig {
    /// Read `num_photon_trace_samples`, `max_photons`,
    /// `num_nn_query_photons`, `max_nn_query_dist` and `visualize_photons`.
    ///
    /// * `params` - Parameter set.
    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let default = Self::default();
        let num_photon_trace_samples = params.find_one_int(
            "num_photon_trace_samples",
            default.num_photon_trace_samples as Int,
        );
        let max_photons = params.find_one_int("max_photons", default.max_photons as Int);
        let num_nn_query_photons = params.find_one_int("num_nn_query_photons", default.num_nn_query_photons as Int);
        if num_photon_trace_samples < 1 || max_photons < 1 || num_nn_query_photons < 1 {
            return Err(Error::config(format!(
                "photon counts must be positive (num_photon_trace_samples {}, max_photons {}, num_nn_query_photons {})",
                num_photon_trace_samples, max_photons, num_nn_query_photons
            )));
        }
        let max_nn_query_dist = params.find_one_positive_float("max_nn_query_dist", default.max_nn_query_dist)?;
        Ok(Self {
            num_photon_trace_samples: num_photon_trace_samples as u64,
            max_photons: max_photons as usize,
            num_nn_query_photons: num_nn_query_photons as usize,
            max_nn_query_dist,
            visualize_photons: params.find_one_bool("visualize_photons", default.visualize_photons),
        })
    }
}

/// Photon mapping. A photon map is built from light paths before rendering;
/// eye paths are traced to their first non-specular surface where radiance
/// is estimated from the nearest photons.
pub struct PhotonMappingRenderer {
    /// Parameters.
    config: PhotonMappingConfig,

    /// Russian roulette depth and maximum path length.
    limits: PathLimits,

    /// Prototype sampler.
    sampler: Box<dyn Sampler>,

    /// Empty photon map of the selected implementation.
    photon_map: Box<dyn PhotonMap>,

    /// Density estimation kernel.
    kernel: Box<dyn PhotonDensityKernel>,
}

impl PhotonMappingRenderer {
    /// Create a new photon mapping renderer.
    ///
    /// * `config`     - Parameters.
    /// * `limits`     - Russian roulette depth and maximum path length.
    /// * `sampler`    - Prototype sampler.
    /// * `photon_map` - Photon map implementation.
    /// * `kernel`     - Density estimation kernel.
    pub fn new(
        config: PhotonMappingConfig,
        limits: PathLimits,
        sampler: Box<dyn Sampler>,
        photon_map: Box<dyn PhotonMap>,
        kernel: Box<dyn PhotonDensityKernel>,
    ) -> Self {
        Self {
            config,
            limits,
            sampler,
            photon_map,
            kernel,
        }
    }

    /// Mark every photon visible from the camera in red.
    fn visualize_photons(&self, scene: &Scene, map: &dyn PhotonMap, film: &mut Film) {
        let camera = scene.camera();
        let eye = match camera.sample_position(&Vector2f::new(0.5, 0.5)) {
            Some((geom, _)) => geom.p,
            None => return,
        };
        let red = Spectrum::new(1.0, 0.0, 0.0);
        for photon in map.photons() {
            let d = (photon.p - eye).normalize();
            if let Some(raster) = camera.ray_to_raster(&eye, &d) {
                film.record_contribution(&raster, &red);
            }
        }
    }
}

impl Renderer for PhotonMappingRenderer {
    fn name(&self) -> &'static str {
        "pm"
    }

    fn render(&self, ctx: &RenderContext, film: &mut Film) -> Result<()> {
        let seed = derive_seed(ctx.config.seed, u64::MAX);
        let trace = trace_photons(
            ctx,
            self.sampler.as_ref(),
            &self.limits,
            self.config.num_photon_trace_samples,
            self.config.max_photons,
            seed,
        );
        let num_paths = trace.num_paths;
        let mut map = self.photon_map.clone_empty();
        map.build(trace.photons);
        info!("Built {} photon map with {} photons", map.name(), map.len());

        let map = map.as_ref();
        let num_samples = render_pixels(ctx, film, self.sampler.as_ref(), || {
            Ok(PhotonMappingProcess {
                scene: ctx.scene,
                renderer: self,
                map,
                num_paths,
                query: KnnQuery::new(self.config.num_nn_query_photons),
            })
        })?;
        normalize_film(film, num_samples);

        if self.config.visualize_photons {
            info!("Visualizing photon map");
            self.visualize_photons(ctx.scene, map, film);
        }
        Ok(())
    }
}

struct PhotonMappingProcess<'a> {
    scene: &'a Scene,
    renderer: &'a PhotonMappingRenderer,
    map: &'a dyn PhotonMap,
    num_paths: u64,
    query: KnnQuery,
}

impl<'a> RenderProcess for PhotonMappingProcess<'a> {
    fn process_sample(&mut self, sampler: &mut dyn Sampler, footprint: &PixelFootprint, film: &mut dyn FilmSink) {
        let raster = footprint.sample(&sampler.next_vec2());
        let (mut l, vp) = trace_visible_point(self.scene, sampler, &self.renderer.limits, &raster);

        if let Some(vp) = vp.filter(|_| self.num_paths > 0) {
            let max_dist = self.renderer.config.max_nn_query_dist;
            let max_dist2 = self.query.collect(self.map, &vp.geom.p, max_dist * max_dist);
            let photons = self.map.photons();
            for (_, i) in self.query.iter() {
                let photon = &photons[i];
                let k = self.renderer.kernel.evaluate(&vp.geom.p, photon, max_dist2);
                let density = k / (max_dist2 * self.num_paths as Float);
                l += vp.photon_contribution(photon) * density;
            }
        }

        film.accumulate_contribution(&raster, &l);
    }
}

/// Create a photon mapping renderer from parameters. See
/// `PhotonMappingConfig::from_params()`; `photon_map` (default "kdtree") and
/// `kernel` (default "simpson") select the components.
///
/// * `params`   - Parameter set.
/// * `registry` - The registry.
pub fn create_photon_mapping_renderer(params: &ParamSet, registry: &ComponentRegistry) -> Result<Box<dyn Renderer>> {
    let config = PhotonMappingConfig::from_params(params)?;
    let limits = PathLimits::from_params(params)?;
    let sampler = create_sampler(params, registry)?;
    let photon_map = create_photon_map(params, registry)?;
    let kernel_name = params.find_one_string("kernel", "simpson".to_string());
    let kernel = registry.create::<dyn PhotonDensityKernel>(&kernel_name, params)?;
    if config.visualize_photons {
        warn!("Photon visualization is enabled");
    }
    Ok(Box::new(PhotonMappingRenderer::new(
        config, limits, sampler, photon_map, kernel,
    )))
}

/// Create the photon map selected by `photon_map` (default "kdtree").
///
/// * `params`   - Parameter set.
/// * `registry` - The registry.
pub fn create_photon_map(params: &ParamSet, registry: &ComponentRegistry) -> Result<Box<dyn PhotonMap>> {
    let name = params.find_one_string("photon_map", "kdtree".to_string());
    registry.create::<dyn PhotonMap>(&name, params)
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

    fn registry() -> ComponentRegistry {
        let mut r = ComponentRegistry::new();
        samplers::register(&mut r);
        crate::register(&mut r);
        r
    }

    fn photon_mapper(map: Box<dyn PhotonMap>, num_paths: u64) -> PhotonMappingRenderer {
        let config = PhotonMappingConfig {
            num_photon_trace_samples: num_paths,
            ..PhotonMappingConfig::default()
        };
        PhotonMappingRenderer::new(
            config,
            PathLimits::default(),
            Box::new(RandomSampler::new(RngType::StandardMt, 5)),
            map,
            Box::new(SimpsonKernel),
        )
    }

    #[test]
    fn config_defaults_and_validation() {
        let config = PhotonMappingConfig::from_params(&ParamSet::new()).unwrap();
        assert_eq!(config, PhotonMappingConfig::default());
        assert_eq!(config.num_nn_query_photons, 50);

        let params = ParamSet::new().with_float("max_nn_query_dist", 0.5);
        let config = PhotonMappingConfig::from_params(&params).unwrap();
        assert_eq!(config.max_nn_query_dist, 0.5);

        let bad = ParamSet::new().with_int("max_photons", 0);
        assert!(matches!(PhotonMappingConfig::from_params(&bad), Err(Error::Config(_))));
        let bad = ParamSet::new().with_float("max_nn_query_dist", -1.0);
        assert!(PhotonMappingConfig::from_params(&bad).is_err());
    }

    #[test]
    fn agrees_with_path_tracing() {
        let scene = area_light_scene(0.5, 1.0);
        let pm = photon_mapper(Box::new(KdTreePhotonMap::new()), 100_000);
        let pt = PathTracer::new(
            PathLimits::default(),
            Box::new(RandomSampler::new(RngType::StandardMt, 6)),
        );
        let a = mean_luminance(&render(&pm, &scene, 4, 16));
        let b = mean_luminance(&render(&pt, &scene, 4, 256));
        assert!(b > 0.0);
        assert!((a - b).abs() < 0.15 * b, "pm {} pt {}", a, b);
    }

    #[test]
    fn photon_map_implementations_render_alike() {
        let scene = area_light_scene(0.5, 1.0);
        let a = render(&photon_mapper(Box::new(KdTreePhotonMap::new()), 20_000), &scene, 4, 4);
        let b = render(&photon_mapper(Box::new(NaivePhotonMap::new()), 20_000), &scene, 4, 4);
        for (x, y) in a.pixels().iter().zip(b.pixels().iter()) {
            assert!((x.luminance() - y.luminance()).abs() < 1e-9);
        }
    }

    #[test]
    fn factory_selects_components() {
        let registry = registry();
        let params = ParamSet::new()
            .with_string("photon_map", "naive")
            .with_string("kernel", "cone");
        assert_eq!(create_photon_mapping_renderer(&params, &registry).unwrap().name(), "pm");
        let params = ParamSet::new().with_string("kernel", "box");
        assert!(create_photon_mapping_renderer(&params, &registry).is_err());
    }
}
