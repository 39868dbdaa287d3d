//! Pixel Scheduler

use super::*;
use crate::renderer::RenderContext;
use crate::report_stats;
use crate::rng::derive_seed;
use crossbeam_channel::bounded;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

/// Tile layout of a film.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileGrid {
    /// Film width.
    pub width: usize,

    /// Film height.
    pub height: usize,

    /// Tile edge length.
    pub tile_size: usize,

    /// Number of tiles in x.
    pub tiles_x: usize,

    /// Number of tiles in y.
    pub tiles_y: usize,
}

impl TileGrid {
    /// Create a tile grid.
    ///
    /// * `width`     - Film width.
    /// * `height`    - Film height.
    /// * `tile_size` - Tile edge length.
    pub fn new(width: usize, height: usize, tile_size: usize) -> Self {
        let tile_size = max(tile_size, 1);
        Self {
            width,
            height,
            tile_size,
            tiles_x: (width + tile_size - 1) / tile_size,
            tiles_y: (height + tile_size - 1) / tile_size,
        }
    }

    /// Returns the number of tiles.
    pub fn len(&self) -> usize {
        self.tiles_x * self.tiles_y
    }

    /// Returns `true` if the film has no pixels.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the pixels of a tile in scanline order.
    ///
    /// * `tile` - Tile index.
    pub fn pixels(&self, tile: usize) -> impl Iterator<Item = PixelFootprint> + '_ {
        let x0 = (tile % self.tiles_x) * self.tile_size;
        let y0 = (tile / self.tiles_x) * self.tile_size;
        let x1 = min(x0 + self.tile_size, self.width);
        let y1 = min(y0 + self.tile_size, self.height);
        (y0..y1).flat_map(move |y| {
            (x0..x1).map(move |x| PixelFootprint {
                x,
                y,
                width: self.width,
                height: self.height,
            })
        })
    }

    /// Returns the number of pixels in a tile.
    ///
    /// * `tile` - Tile index.
    pub fn tile_pixel_count(&self, tile: usize) -> u64 {
        let x0 = (tile % self.tiles_x) * self.tile_size;
        let y0 = (tile / self.tiles_x) * self.tile_size;
        let w = min(x0 + self.tile_size, self.width) - x0;
        let h = min(y0 + self.tile_size, self.height) - y0;
        (w * h) as u64
    }
}

/// A unit of work: one tile in one pass.
#[derive(Copy, Clone, Debug)]
struct PixelTask {
    /// Global task index; tasks are merged in this order.
    index: u64,

    /// Tile index.
    tile: usize,
}

/// Render a film tile by tile. Each task renders every pixel of one tile with
/// `spp` samples per pixel using a sampler seeded from the task index.
///
/// In `TerminationMode::Samples` there is one pass with `num_samples`
/// samples per pixel. In `TerminationMode::Time` passes of one sample per
/// pixel are issued until the deadline; the pass in flight at the deadline is
/// completed so every pixel receives the same number of samples.
///
/// At most `4 * num_threads` tasks are queued, rendering or waiting to be
/// merged at any time, so memory does not grow with the sample count.
///
/// Returns the number of pixel samples taken. The film is not rescaled.
///
/// * `ctx`            - Render context.
/// * `film`           - Receives the merged tiles.
/// * `sampler`        - Prototype sampler, cloned per task.
/// * `create_process` - Creates the per-worker render state.
pub fn render_pixels<P, F>(ctx: &RenderContext, film: &mut Film, sampler: &dyn Sampler, create_process: F) -> Result<u64>
where
    P: RenderProcess,
    F: Fn() -> Result<P> + Sync,
{
    let config = ctx.config;
    let grid = TileGrid::new(film.width(), film.height(), config.tile_size);
    let num_tiles = grid.len() as u64;
    if num_tiles == 0 {
        return Ok(0);
    }
    let spp = match config.mode {
        TerminationMode::Samples => config.num_samples,
        TerminationMode::Time => 1,
    };
    let num_threads = max(config.num_threads, 1);

    info!(
        "Rendering {}x{} tiles of {} pixels with {} threads ({} mode)",
        grid.tiles_x, grid.tiles_y, grid.tile_size, num_threads, config.mode
    );

    let start = Instant::now();
    let deadline = config.deadline(start);
    let progress = match config.mode {
        TerminationMode::Samples => create_progress_bar(num_tiles, "tiles", config.quiet),
        TerminationMode::Time => create_progress_bar(100, "%", config.quiet),
    };
    ctx.experiments.notify(ExperimentEvent::RenderStarted, &Payload::new());

    let cancel = AtomicBool::new(false);
    let window = 4 * num_threads;
    let (task_tx, task_rx) = bounded::<PixelTask>(num_threads * 2);
    let (result_tx, result_rx) = bounded::<Result<(u64, FilmTile)>>(window);

    // One credit per task in flight. The merger returns a credit for every
    // merged tile.
    let (credit_tx, credit_rx) = bounded::<()>(window);
    for _ in 0..window {
        let _ = credit_tx.send(());
    }

    let mut merged_tasks = 0_u64;
    let mut num_samples = 0_u64;
    let mut failure: Option<Error> = None;

    std::thread::scope(|scope| {
        // Feeder.
        let cancel = &cancel;
        scope.spawn(move || {
            let mut pass = 0_u64;
            loop {
                if pass > 0 && deadline.map_or(true, |d| Instant::now() >= d) {
                    break;
                }
                for tile in 0..num_tiles {
                    if credit_rx.recv().is_err() || cancel.load(Ordering::Relaxed) {
                        return;
                    }
                    let task = PixelTask {
                        index: pass * num_tiles + tile,
                        tile: tile as usize,
                    };
                    if task_tx.send(task).is_err() {
                        return;
                    }
                }
                pass += 1;
            }
        });

        // Workers.
        for thread in 0..num_threads {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let create_process = &create_process;
            let grid = &grid;
            let prototype = sampler.clone_with_seed(config.seed);
            scope.spawn(move || {
                let mut process = match create_process() {
                    Ok(p) => p,
                    Err(e) => {
                        cancel.store(true, Ordering::Relaxed);
                        let _ = result_tx.send(Err(e));
                        return;
                    }
                };
                debug!("Worker {} started", thread);

                for task in task_rx.iter() {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let seed = derive_seed(config.seed, task.index);
                    let rendered = catch_unwind(AssertUnwindSafe(|| {
                        render_tile(&mut process, prototype.as_ref(), grid, task, seed, spp)
                    }));
                    let result = rendered
                        .map(|tile| (task.index, tile))
                        .map_err(|panic| panic_error(&format!("tile {}", task.tile), panic));
                    if result.is_err() {
                        cancel.store(true, Ordering::Relaxed);
                    }
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }

                debug!("Worker {} finished", thread);
                report_stats!();
            });
        }
        drop(task_rx);
        drop(result_tx);

        // Merge tiles in task order. Dropping the credits after a failure
        // stops the feeder.
        let mut credit_tx = Some(credit_tx);
        let mut pending = BTreeMap::new();
        for result in result_rx.iter() {
            match result {
                Ok((index, tile)) => {
                    pending.insert(index, tile);
                }
                Err(e) => {
                    error!("{}", e);
                    failure.get_or_insert(e);
                    credit_tx = None;
                    continue;
                }
            }
            while let Some(tile) = pending.remove(&merged_tasks) {
                if let Err(e) = tile.merge_into(film) {
                    cancel.store(true, Ordering::Relaxed);
                    failure.get_or_insert(e);
                    credit_tx = None;
                    break;
                }
                num_samples += grid.tile_pixel_count((merged_tasks % num_tiles) as usize) * spp;
                merged_tasks += 1;
                if let Some(credits) = credit_tx.as_ref() {
                    let _ = credits.send(());
                }

                let fraction = match config.mode {
                    TerminationMode::Samples => {
                        progress.set_position(merged_tasks);
                        merged_tasks as Float / num_tiles as Float
                    }
                    TerminationMode::Time => {
                        let p = config.time_progress(start);
                        progress.set_position((p * 100.0) as u64);
                        p
                    }
                };
                if !ctx.experiments.is_empty() {
                    let payload = Payload::from([("block", merged_tasks as Float), ("progress", fraction)]);
                    ctx.experiments.notify(ExperimentEvent::ProgressUpdated, &payload);
                }
            }
        }
        if !pending.is_empty() {
            warn!("Dropping {} tiles rendered after a failure", pending.len());
        }
    });

    progress.finish_and_clear();
    ctx.experiments.notify(ExperimentEvent::RenderFinished, &Payload::new());

    if let Some(e) = failure {
        error!("Render operation has been canceled");
        return Err(e);
    }

    info!(
        "Rendering completed in {:.3} seconds ({} passes, {} samples)",
        start.elapsed().as_secs_f64(),
        merged_tasks / num_tiles,
        num_samples
    );
    Ok(num_samples)
}

/// Render one task.
///
/// * `process` - Per-worker render state.
/// * `sampler` - Prototype sampler.
/// * `grid`    - Tile layout.
/// * `task`    - The task.
/// * `seed`    - Sampler seed of the task.
/// * `spp`     - Samples per pixel.
fn render_tile<P: RenderProcess>(
    process: &mut P,
    sampler: &dyn Sampler,
    grid: &TileGrid,
    task: PixelTask,
    seed: u32,
    spp: u64,
) -> FilmTile {
    let mut tile_sampler = sampler.clone_with_seed(seed);
    let mut film_tile = FilmTile::new(grid.width, grid.height);
    {
        let mut sink = CheckedSink::new(&mut film_tile);
        for footprint in grid.pixels(task.tile) {
            for _ in 0..spp {
                process.process_sample(tile_sampler.as_mut(), &footprint, &mut sink);
            }
        }
        sink.finish(&format!("tile {}", task.tile));
    }
    film_tile
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiles_cover_the_film_once() {
        let grid = TileGrid::new(37, 20, 16);
        assert_eq!((grid.tiles_x, grid.tiles_y), (3, 2));

        let mut seen = vec![0; 37 * 20];
        for tile in 0..grid.len() {
            let pixels: Vec<_> = grid.pixels(tile).collect();
            assert_eq!(pixels.len() as u64, grid.tile_pixel_count(tile));
            for p in pixels {
                seen[p.y * 37 + p.x] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }
}
