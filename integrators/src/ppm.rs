//! Progressive Photon Mapping

use crate::common::*;
use crate::pm::*;
use core::error::*;
use core::experiment::*;
use core::film::*;
use core::lm::*;
use core::paramset::*;
use core::registry::*;
use core::renderer::*;
use core::rng::derive_seed;
use core::sampler::*;
use core::scene::*;
use core::scheduler::*;
use core::spectrum::*;
use core::{stat_dist, stat_float_distribution, stat_register_fns};
use crossbeam_channel::bounded;
use itertools::iproduct;
use std::thread;
use std::time::Instant;

stat_float_distribution!("Integrator/PPM final radius", FINAL_RADIUS, ppm_stats_radius);
stat_register_fns!(ppm_stats_radius);

/// Measurement points updated per work item.
const POINTS_PER_CHUNK: usize = 1024;

/// Progressive photon mapping parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PpmConfig {
    /// Initial gather radius; derived from the scene bounds when not
    /// positive.
    pub initial_radius: Float,

    /// Fraction of new photons kept per pass, in (0, 1).
    pub alpha: Float,

    /// Light paths traced per pass.
    pub num_photons_per_pass: u64,

    /// Number of passes in `TerminationMode::Samples`.
    pub num_passes: usize,
}

impl Default for PpmConfig {
    fn default() -> Self {
        Self {
            initial_radius: 0.0,
            alpha: 0.7,
            num_photons_per_pass: 100_000,
            num_passes: 10,
        }
    }
}

impl PpmConfig {
    /// Read `initial_radius`, `alpha`, `num_photons_per_pass` and
    /// `num_passes`.
    ///
    /// * `params` - Parameter set.
    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let default = Self::default();
        let alpha = params.find_one_float("alpha", default.alpha);
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(Error::config(format!("alpha {} must be in (0, 1)", alpha)));
        }
        let num_photons_per_pass = params.find_one_int("num_photons_per_pass", default.num_photons_per_pass as Int);
        let num_passes = params.find_one_int("num_passes", default.num_passes as Int);
        if num_photons_per_pass < 1 || num_passes < 1 {
            return Err(Error::config(format!(
                "num_photons_per_pass {} and num_passes {} must be positive",
                num_photons_per_pass, num_passes
            )));
        }
        Ok(Self {
            initial_radius: params.find_one_float("initial_radius", default.initial_radius),
            alpha,
            num_photons_per_pass: num_photons_per_pass as u64,
            num_passes: num_passes as usize,
        })
    }
}

/// A pixel sample and the photon statistics gathered around its visible
/// point.
struct MeasurementPoint<'s> {
    /// Pixel index.
    pixel: usize,

    /// Emission seen along the eye path.
    direct: Spectrum,

    /// Visible point, `None` if the eye path escaped.
    vp: Option<VisiblePoint<'s>>,

    /// Squared gather radius R².
    radius2: Float,

    /// Accumulated photon count N.
    n: Float,

    /// Accumulated reflected flux τ.
    tau: Spectrum,
}

impl<'s> MeasurementPoint<'s> {
    /// Add the photons of one pass within the current radius, then shrink
    /// the radius with R² ← R² (N + αM) / (N + M).
    fn gather(&mut self, map: &dyn PhotonMap, alpha: Float) {
        let vp = match &self.vp {
            Some(vp) => vp,
            None => return,
        };
        let mut m = 0.0;
        let mut phi = Spectrum::ZERO;
        map.collect_in_radius(&vp.geom.p, self.radius2, &mut |photon: &Photon| {
            m += 1.0;
            phi += vp.photon_contribution(photon);
        });
        if m == 0.0 {
            return;
        }
        let n = self.n + alpha * m;
        let ratio = n / (self.n + m);
        self.radius2 *= ratio;
        self.tau = (self.tau + phi) * ratio;
        self.n = n;
    }

    /// Returns the radiance estimate after `num_paths` light paths.
    fn radiance(&self, num_paths: u64) -> Spectrum {
        if self.vp.is_none() || num_paths == 0 || self.radius2 <= 0.0 {
            return self.direct;
        }
        self.direct + self.tau / (PI * self.radius2 * num_paths as Float)
    }
}

/// Progressive photon mapping. Visible points are found once; every pass
/// traces new photons into a fresh photon map and shrinks the gather radius
/// of each point.
pub struct ProgressivePhotonMappingRenderer {
    /// Parameters.
    config: PpmConfig,

    /// Russian roulette depth and maximum path length.
    limits: PathLimits,

    /// Prototype sampler.
    sampler: Box<dyn Sampler>,

    /// Empty photon map of the selected implementation.
    photon_map: Box<dyn PhotonMap>,
}

impl ProgressivePhotonMappingRenderer {
    /// Create a new progressive photon mapping renderer.
    ///
    /// * `config`     - Parameters.
    /// * `limits`     - Russian roulette depth and maximum path length.
    /// * `sampler`    - Prototype sampler.
    /// * `photon_map` - Photon map implementation.
    pub fn new(config: PpmConfig, limits: PathLimits, sampler: Box<dyn Sampler>, photon_map: Box<dyn PhotonMap>) -> Self {
        register_stats();
        Self {
            config,
            limits,
            sampler,
            photon_map,
        }
    }

    /// Trace `spp` eye paths per pixel, one image row per work item.
    fn generate_measurement_points<'s>(
        &self,
        ctx: &RenderContext<'s>,
        film: &Film,
        radius2: Float,
    ) -> Vec<MeasurementPoint<'s>> {
        let (width, height) = (film.width(), film.height());
        let spp = max(ctx.config.num_samples, 1) as usize;
        let num_threads = max(ctx.config.num_threads, 1);
        let seed = ctx.config.seed;
        let scene: &'s Scene = ctx.scene;
        let mut rows: Vec<Vec<MeasurementPoint<'s>>> = (0..height).map(|_| vec![]).collect();

        thread::scope(|scope| {
            let (tx_collector, rx_collector) = bounded::<(usize, Vec<MeasurementPoint<'s>>)>(num_threads);
            let (tx_worker, rx_worker) = bounded::<usize>(num_threads);

            // Spawn collector thread.
            let rows = &mut rows;
            scope.spawn(move || {
                for (y, points) in rx_collector.iter() {
                    rows[y] = points;
                }
            });

            // Spawn worker threads.
            for _ in 0..num_threads {
                let rx_worker = rx_worker.clone();
                let tx_collector = tx_collector.clone();
                let sampler = self.sampler.as_ref();
                let limits = &self.limits;
                scope.spawn(move || {
                    for y in rx_worker.iter() {
                        let mut sampler = sampler.clone_with_seed(derive_seed(seed, y as u64));
                        let mut points = Vec::with_capacity(width * spp);
                        for (x, _) in iproduct!(0..width, 0..spp) {
                            let footprint = PixelFootprint { x, y, width, height };
                            let raster = footprint.sample(&sampler.next_vec2());
                            let (direct, vp) = trace_visible_point(scene, sampler.as_mut(), limits, &raster);
                            points.push(MeasurementPoint {
                                pixel: y * width + x,
                                direct,
                                vp,
                                radius2,
                                n: 0.0,
                                tau: Spectrum::ZERO,
                            });
                        }
                        if tx_collector.send((y, points)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(rx_worker); // Drop extra since we've cloned one for each worker.
            drop(tx_collector);

            // Send work.
            for y in 0..height {
                if tx_worker.send(y).is_err() {
                    break;
                }
            }
        });

        rows.into_iter().flatten().collect()
    }
}

/// Update every measurement point with the photons of one pass.
fn gather_photons(points: &mut [MeasurementPoint], map: &dyn PhotonMap, alpha: Float, num_threads: usize) {
    thread::scope(|scope| {
        let (tx_worker, rx_worker) = bounded::<&mut [MeasurementPoint]>(num_threads);

        // Spawn worker threads.
        for _ in 0..num_threads {
            let rx_worker = rx_worker.clone();
            scope.spawn(move || {
                for chunk in rx_worker.iter() {
                    for point in chunk.iter_mut() {
                        point.gather(map, alpha);
                    }
                }
            });
        }
        drop(rx_worker); // Drop extra since we've cloned one for each worker.

        // Send work.
        for chunk in points.chunks_mut(POINTS_PER_CHUNK) {
            if tx_worker.send(chunk).is_err() {
                break;
            }
        }
    });
}

impl Renderer for ProgressivePhotonMappingRenderer {
    fn name(&self) -> &'static str {
        "ppm"
    }

    fn render(&self, ctx: &RenderContext, film: &mut Film) -> Result<()> {
        let config = ctx.config;
        let num_threads = max(config.num_threads, 1);
        let radius = if self.config.initial_radius > 0.0 {
            self.config.initial_radius
        } else {
            let (_, r) = ctx.scene.bounds().bounding_sphere();
            let r = 0.01 * r;
            info!("Using initial radius {}", r);
            r
        };
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(Error::config(format!("invalid initial radius {}", radius)));
        }

        ctx.experiments.notify(ExperimentEvent::RenderStarted, &Payload::new());
        let start = Instant::now();
        let deadline = config.deadline(start);
        let mut points = self.generate_measurement_points(ctx, film, radius * radius);
        info!("Generated {} measurement points", points.len());

        let progress = match deadline {
            None => create_progress_bar(self.config.num_passes as u64, "passes", config.quiet),
            Some(_) => create_progress_bar(100, "%", config.quiet),
        };
        let mut num_paths = 0_u64;
        for pass in 0.. {
            let done = match deadline {
                None => pass >= self.config.num_passes,
                Some(d) => pass > 0 && Instant::now() >= d,
            };
            if done {
                break;
            }
            debug!("Photon pass {}", pass);

            let seed = derive_seed(derive_seed(config.seed, u64::MAX), pass as u64);
            let trace = trace_photons(
                ctx,
                self.sampler.as_ref(),
                &self.limits,
                self.config.num_photons_per_pass,
                usize::MAX,
                seed,
            );
            num_paths += trace.num_paths;
            let mut map = self.photon_map.clone_empty();
            map.build(trace.photons);
            gather_photons(&mut points, map.as_ref(), self.config.alpha, num_threads);

            let fraction = match deadline {
                None => {
                    progress.inc(1);
                    (pass + 1) as Float / self.config.num_passes as Float
                }
                Some(_) => {
                    let p = min(1.0, start.elapsed().as_secs_f64() / config.time_limit);
                    progress.set_position((p * 100.0) as u64);
                    p
                }
            };
            if !ctx.experiments.is_empty() {
                let payload = Payload::from([("pass", (pass + 1) as Float), ("progress", fraction)]);
                ctx.experiments.notify(ExperimentEvent::ProgressUpdated, &payload);
            }
        }
        progress.finish_and_clear();

        for point in points.iter() {
            film.accumulate_pixel(point.pixel, &point.radiance(num_paths));
            if point.vp.is_some() {
                stat_dist!(FINAL_RADIUS, point.radius2.sqrt());
            }
        }
        normalize_film(film, points.len() as u64);
        ctx.experiments.notify(ExperimentEvent::RenderFinished, &Payload::new());
        Ok(())
    }
}

/// Create a progressive photon mapping renderer from parameters. See
/// `PpmConfig::from_params()` and `create_photon_map()`.
///
/// * `params`   - Parameter set.
/// * `registry` - The registry.
pub fn create_progressive_photon_mapping_renderer(
    params: &ParamSet,
    registry: &ComponentRegistry,
) -> Result<Box<dyn Renderer>> {
    let config = PpmConfig::from_params(params)?;
    let limits = PathLimits::from_params(params)?;
    let sampler = create_sampler(params, registry)?;
    let photon_map = create_photon_map(params, registry)?;
    Ok(Box::new(ProgressivePhotonMappingRenderer::new(
        config, limits, sampler, photon_map,
    )))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
