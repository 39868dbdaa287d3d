//! Photon Tracing

use super::photon_map::Photon;
use crate::bpt::sample_emitter_position;
use crate::common::*;
use core::bsdf::*;
use core::geometry::*;
use core::lm::*;
use core::renderer::*;
use core::rng::derive_seed;
use core::sampler::*;
use core::scene::*;
use core::scheduler::create_progress_bar;
use core::{report_stats, stat_counter, stat_inc, stat_register_fns};
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

stat_counter!("Integrator/Photon light paths traced", LIGHT_PATHS, photon_stats_paths);
stat_counter!("Integrator/Photons stored", PHOTONS_STORED, photon_stats_stored);
stat_register_fns!(photon_stats_paths, photon_stats_stored);

/// Light paths traced per work item.
const PATHS_PER_CHUNK: u64 = 4096;

/// Photons stored by tracing light paths.
pub struct PhotonTrace {
    /// The photons in light path order.
    pub photons: Vec<Photon>,

    /// Number of light paths the photons were drawn from, including paths
    /// that stored nothing.
    pub num_paths: u64,
}

/// Photons of one work item with the end offset of each traced path.
struct TracedChunk {
    index: usize,
    photons: Vec<Photon>,
    path_ends: Vec<usize>,
}

/// Trace up to `num_paths` light paths in parallel and store a photon at
/// every non-specular surface they hit. Tracing stops when `max_photons`
/// photons are stored. The result only depends on `seed`, not on the number
/// of threads.
///
/// * `ctx`         - Render context.
/// * `sampler`     - Prototype sampler.
/// * `limits`      - Russian roulette depth and maximum path length.
/// * `num_paths`   - Number of light paths.
/// * `max_photons` - Maximum number of photons.
/// * `seed`        - Seed of the photon pass.
pub fn trace_photons(
    ctx: &RenderContext,
    sampler: &dyn Sampler,
    limits: &PathLimits,
    num_paths: u64,
    max_photons: usize,
    seed: u32,
) -> PhotonTrace {
    register_stats();

    let scene = ctx.scene;
    let num_chunks = ((num_paths + PATHS_PER_CHUNK - 1) / PATHS_PER_CHUNK) as usize;
    let num_threads = max(ctx.config.num_threads, 1);
    let stored = AtomicUsize::new(0);
    let progress = create_progress_bar(num_chunks as u64, "photon chunks", ctx.config.quiet);
    let mut chunks: Vec<Option<TracedChunk>> = (0..num_chunks).map(|_| None).collect();

    thread::scope(|scope| {
        let (tx_collector, rx_collector) = bounded::<TracedChunk>(num_threads);
        let (tx_worker, rx_worker) = bounded::<usize>(num_threads);

        // Spawn collector thread.
        let chunks = &mut chunks;
        let progress = &progress;
        scope.spawn(move || {
            for chunk in rx_collector.iter() {
                let index = chunk.index;
                chunks[index] = Some(chunk);
                progress.inc(1);
            }
        });

        // Spawn worker threads.
        for _ in 0..num_threads {
            let rx_worker = rx_worker.clone();
            let tx_collector = tx_collector.clone();
            let stored = &stored;
            scope.spawn(move || {
                for index in rx_worker.iter() {
                    let begin = index as u64 * PATHS_PER_CHUNK;
                    let end = min(begin + PATHS_PER_CHUNK, num_paths);
                    let mut sampler = sampler.clone_with_seed(derive_seed(seed, index as u64));
                    let mut chunk = TracedChunk {
                        index,
                        photons: vec![],
                        path_ends: vec![],
                    };
                    for _ in begin..end {
                        trace_photon_path(scene, sampler.as_mut(), limits, &mut chunk.photons, max_photons);
                        chunk.path_ends.push(chunk.photons.len());
                        if chunk.photons.len() >= max_photons {
                            break;
                        }
                    }
                    stored.fetch_add(chunk.photons.len(), Ordering::Relaxed);
                    if tx_collector.send(chunk).is_err() {
                        break;
                    }
                }
                report_stats!();
            });
        }
        drop(rx_worker); // Drop extra since we've cloned one for each worker.
        drop(tx_collector);

        // Send work until enough photons are stored.
        for index in 0..num_chunks {
            if stored.load(Ordering::Relaxed) >= max_photons {
                break;
            }
            if tx_worker.send(index).is_err() {
                break;
            }
        }
    });
    progress.finish_and_clear();

    // Merge in path order and cut at the first path reaching the limit.
    let mut photons = Vec::with_capacity(min(max_photons, stored.load(Ordering::Relaxed)));
    let mut traced = 0_u64;
    'merge: for chunk in chunks.into_iter().flatten() {
        let mut start = 0;
        for end in chunk.path_ends {
            traced += 1;
            let take = min(end - start, max_photons - photons.len());
            photons.extend_from_slice(&chunk.photons[start..start + take]);
            start = end;
            if photons.len() >= max_photons {
                break 'merge;
            }
        }
    }
    if photons.is_empty() && traced > 0 {
        warn!("No photons were stored from {} light paths", traced);
    }
    info!("Traced {} light paths and stored {} photons", traced, photons.len());
    stat_inc!(LIGHT_PATHS, traced as i64);
    stat_inc!(PHOTONS_STORED, photons.len() as i64);

    PhotonTrace {
        photons,
        num_paths: traced,
    }
}

/// Trace one light path and push a photon at every non-specular surface it
/// hits, stopping early once `photons` holds `max_photons`. Russian roulette
/// continues with probability min(1, lum(next) / lum(current)).
///
/// * `scene`       - The scene.
/// * `sampler`     - Random numbers.
/// * `limits`      - Russian roulette depth and maximum path length.
/// * `photons`     - Receives the photons.
/// * `max_photons` - Maximum number of photons.
pub fn trace_photon_path<S: Sampler + ?Sized>(
    scene: &Scene,
    sampler: &mut S,
    limits: &PathLimits,
    photons: &mut Vec<Photon>,
    max_photons: usize,
) {
    let (light, pdf_sel) = scene.sample_light_selection(sampler.next());
    let (mut geom, pdf_p, le0, mut bsdf) = match sample_emitter_position(light, &sampler.next_vec2(), pdf_sel.v) {
        Some(s) => s,
        None => return,
    };
    let mut throughput = le0 / pdf_p.v;
    let mut bsdf_type = BsdfType::ALL_EMITTER;
    let mut wi = Vector3f::ZERO;
    let mut num_vertices = 1;

    while limits.allows(num_vertices) {
        let query = BsdfSampleQuery {
            bsdf_type,
            sample: sampler.next_vec2(),
            u_comp: sampler.next(),
            transport_dir: TransportDirection::LE,
            wi,
        };
        let (result, fs) = match bsdf.sample_and_estimate_direction(&query, &geom) {
            Some(r) => r,
            None => break,
        };
        let next = throughput * fs;
        if !usable_throughput(&next) {
            break;
        }
        if num_vertices > limits.rr_depth {
            let q = min(1.0, next.luminance() / throughput.luminance());
            if sampler.next() > q {
                break;
            }
            throughput = next / q;
        } else {
            throughput = next;
        }

        let mut ray = Ray::spawn(geom.p, result.wo);
        let isect = match scene.intersect(&mut ray) {
            Some(isect) => isect,
            None => break,
        };
        let next_bsdf = match isect.bsdf() {
            Some(b) => b,
            None => break,
        };
        num_vertices += 1;

        if !next_bsdf.bsdf_types().intersects(BsdfType::SPECULAR) {
            photons.push(Photon {
                p: isect.geom.p,
                wi: -ray.d,
                throughput,
                depth: num_vertices - 2,
            });
            if photons.len() >= max_photons {
                break;
            }
        }

        geom = isect.geom;
        wi = -ray.d;
        bsdf = next_bsdf;
        bsdf_type = BsdfType::ALL;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_scenes::*;
    use core::experiment::Experiments;
    use core::rng::RngType;
    use core::scheduler::SchedulerConfig;
    use samplers::RandomSampler;

    fn trace(num_threads: usize, num_paths: u64, max_photons: usize) -> PhotonTrace {
        let scene = area_light_scene(0.5, 1.0);
        let config = SchedulerConfig {
            num_threads,
            ..scheduler_config(1)
        };
        let experiments = Experiments::new();
        let ctx = RenderContext::new(&scene, &config, &experiments);
        let sampler = RandomSampler::new(RngType::StandardMt, 1);
        trace_photons(&ctx, &sampler, &PathLimits::default(), num_paths, max_photons, 11)
    }

    #[test]
    fn photons_do_not_depend_on_thread_count() {
        let a = trace(1, 10_000, usize::MAX);
        let b = trace(3, 10_000, usize::MAX);
        assert_eq!(a.num_paths, 10_000);
        assert_eq!(a.num_paths, b.num_paths);
        assert_eq!(a.photons.len(), b.photons.len());
        assert!(a.photons.iter().zip(b.photons.iter()).all(|(x, y)| x.p == y.p));
    }

    #[test]
    fn tracing_stops_at_photon_limit() {
        let all = trace(2, 10_000, usize::MAX);
        let capped = trace(2, 10_000, 1000);
        assert_eq!(capped.photons.len(), 1000);
        assert!(capped.num_paths < all.num_paths);
        assert!(capped.photons.iter().zip(all.photons.iter()).all(|(x, y)| x.p == y.p));
    }

    #[test]
    fn photon_flux_matches_light_power() {
        // Every path leaves the light and stores its first photon on the floor
        // or the light itself; the first bounce flux per path equals the
        // power reaching the floor.
        let t = trace(2, 20_000, usize::MAX);
        let first: Float = t
            .photons
            .iter()
            .filter(|p| p.depth == 0)
            .map(|p| p.throughput.luminance())
            .sum::<Float>()
            / t.num_paths as Float;
        assert!(first > 0.0);
        assert!(first <= PI * 4.0 * 1.01, "flux {}", first);
    }
}
