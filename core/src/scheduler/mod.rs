//! Render Scheduling
//!
//! Two schedulers drive renderers over worker threads:
//!
//! * `render_pixels()` splits the film into tiles. Each tile is rendered by
//!   a fresh `RenderProcess` with a sampler seeded from the tile index, into
//!   a `FilmTile` that is merged in tile order. The result does not depend on
//!   the number of threads.
//! * `render_chains()` runs one `MarkovChain` per worker, each splatting into
//!   its own film replica. Replicas are summed when all chains are done.

use crate::error::*;
use crate::experiment::*;
use crate::film::*;
use crate::geometry::*;
use crate::lm::*;
use crate::paramset::*;
use crate::sampler::*;
use crate::spectrum::*;
use crate::{stat_counter, stat_inc, stat_register_fns};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

mod mcmc;
mod pixel;

// Re-export.
pub use mcmc::*;
pub use pixel::*;

stat_counter!("Integrator/Discarded NaN or infinite samples", DISCARDED_SAMPLES, scheduler_stats_discarded);
stat_counter!("Integrator/Discarded negative samples", NEGATIVE_SAMPLES, scheduler_stats_negative);
stat_register_fns!(scheduler_stats_discarded, scheduler_stats_negative);

/// When a render stops.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TerminationMode {
    /// After the sample budget is exhausted.
    Samples,

    /// After the time budget expires.
    Time,
}

impl FromStr for TerminationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "samples" => Ok(Self::Samples),
            "time" => Ok(Self::Time),
            _ => Err(Error::config(format!("unknown termination mode '{}' (expected samples or time)", s))),
        }
    }
}

impl fmt::Display for TerminationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Samples => write!(f, "samples"),
            Self::Time => write!(f, "time"),
        }
    }
}

/// Scheduler configuration.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Termination mode.
    pub mode: TerminationMode,

    /// Samples per pixel, or mutations per pixel for Markov chain renderers.
    pub num_samples: u64,

    /// Time budget in seconds for `TerminationMode::Time`.
    pub time_limit: Float,

    /// Number of worker threads.
    pub num_threads: usize,

    /// Tile edge length in pixels.
    pub tile_size: usize,

    /// Mutations per block for Markov chain renderers.
    pub samples_per_block: u64,

    /// Base seed.
    pub seed: u32,

    /// Suppress the progress bar.
    pub quiet: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: TerminationMode::Samples,
            num_samples: 16,
            time_limit: 10.0,
            num_threads: num_cpus::get(),
            tile_size: 16,
            samples_per_block: 100,
            seed: 1,
            quiet: false,
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration from parameters. Recognized names are `mode`,
    /// `num_samples`, `time_limit`, `num_threads` (0 or less counts back from
    /// the number of logical CPUs), `tile_size`, `samples_per_block`, `seed`
    /// and `quiet`.
    ///
    /// * `params` - Parameters.
    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let default = Self::default();

        let mode = params.find_one_enum::<TerminationMode>("mode", "samples")?;
        let num_samples = positive_int(params, "num_samples", default.num_samples as Int)? as u64;
        let time_limit = params.find_one_positive_float("time_limit", default.time_limit)?;
        let tile_size = positive_int(params, "tile_size", default.tile_size as Int)? as usize;
        let samples_per_block = positive_int(params, "samples_per_block", default.samples_per_block as Int)? as u64;

        let cpus = num_cpus::get() as Int;
        let num_threads = match params.find_one_int("num_threads", 0) {
            n if n <= 0 => max(1, cpus + n),
            n if n > cpus => {
                warn!("Num threads > max logical CPUs {}", cpus);
                cpus
            }
            n => n,
        } as usize;

        Ok(Self {
            mode,
            num_samples,
            time_limit,
            num_threads,
            tile_size,
            samples_per_block,
            seed: params.find_one_int("seed", default.seed as Int) as u32,
            quiet: params.find_one_bool("quiet", false),
        })
    }

    /// Returns the wall clock deadline for a render started at `start`, if
    /// the render is time limited.
    ///
    /// * `start` - Start of the render.
    pub fn deadline(&self, start: Instant) -> Option<Instant> {
        match self.mode {
            TerminationMode::Samples => None,
            TerminationMode::Time => Some(start + Duration::from_secs_f64(self.time_limit)),
        }
    }

    /// Returns the progress in [0, 1] for a time limited render.
    ///
    /// * `start` - Start of the render.
    fn time_progress(&self, start: Instant) -> Float {
        min(start.elapsed().as_secs_f64() / self.time_limit, 1.0)
    }
}

/// Returns a positive integer parameter.
///
/// * `params`  - Parameters.
/// * `name`    - Parameter name.
/// * `default` - Default value.
fn positive_int(params: &ParamSet, name: &str, default: Int) -> Result<Int> {
    match params.find_one_int(name, default) {
        v if v > 0 => Ok(v),
        v => Err(Error::config(format!("'{}' must be positive, got {}", name, v))),
    }
}

/// The area of one pixel in raster space. Pixel rows are counted from the
/// bottom of the film.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PixelFootprint {
    /// Column.
    pub x: usize,

    /// Row.
    pub y: usize,

    /// Film width.
    pub width: usize,

    /// Film height.
    pub height: usize,
}

impl PixelFootprint {
    /// Returns the raster position of a point in the pixel.
    ///
    /// * `u` - Position within the pixel in [0, 1)^2.
    pub fn sample(&self, u: &Vector2f) -> Vector2f {
        Vector2f::new(
            (self.x as Float + u.x) / self.width as Float,
            (self.y as Float + u.y) / self.height as Float,
        )
    }

    /// Returns the raster position of the pixel center.
    pub fn center(&self) -> Vector2f {
        self.sample(&Vector2f::new(0.5, 0.5))
    }
}

/// Per-worker state of a pixel driven renderer.
pub trait RenderProcess: Send {
    /// Take one sample in a pixel. Contributions may land on any pixel of
    /// the film.
    ///
    /// * `sampler`   - The sampler of the current tile.
    /// * `footprint` - The pixel.
    /// * `film`      - Receives contributions.
    fn process_sample(&mut self, sampler: &mut dyn Sampler, footprint: &PixelFootprint, film: &mut dyn FilmSink);
}

/// A film sink that drops NaN, infinite and negative contributions before
/// they reach the film. Counts are logged once when the sink is finished.
pub struct CheckedSink<'a> {
    inner: &'a mut dyn FilmSink,
    invalid: u64,
    negative: u64,
}

impl<'a> CheckedSink<'a> {
    /// Wrap a sink.
    ///
    /// * `inner` - The sink receiving valid contributions.
    pub fn new(inner: &'a mut dyn FilmSink) -> Self {
        register_stats();
        Self {
            inner,
            invalid: 0,
            negative: 0,
        }
    }

    /// Returns `true` if the contribution may be added to the film.
    ///
    /// * `c` - The contribution.
    fn accept(&mut self, c: &Spectrum) -> bool {
        if !c.is_finite() {
            self.invalid += 1;
            stat_inc!(DISCARDED_SAMPLES, 1);
            false
        } else if c.luminance() < -EPS_LARGE {
            self.negative += 1;
            stat_inc!(NEGATIVE_SAMPLES, 1);
            false
        } else {
            true
        }
    }

    /// Log the number of dropped contributions.
    ///
    /// * `what` - Name of the unit of work, e.g. "tile 12".
    pub fn finish(self, what: &str) {
        if self.invalid > 0 {
            error!("{}: discarded {} not-a-number or infinite contributions", what, self.invalid);
        }
        if self.negative > 0 {
            warn!("{}: discarded {} negative contributions", what, self.negative);
        }
    }
}

impl<'a> FilmSink for CheckedSink<'a> {
    fn accumulate_contribution(&mut self, raster: &Vector2f, c: &Spectrum) {
        if self.accept(c) {
            self.inner.accumulate_contribution(raster, c);
        }
    }

    fn accumulate_layer(&mut self, layer: usize, raster: &Vector2f, c: &Spectrum) {
        if self.accept(c) {
            self.inner.accumulate_layer(layer, raster, c);
        }
    }
}

/// Create the progress bar shown while rendering.
///
/// * `len`   - Number of steps.
/// * `what`  - Label shown next to the bar.
/// * `quiet` - Hide the bar.
pub fn create_progress_bar(len: u64, what: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new(len);
    progress.set_draw_target(ProgressDrawTarget::stderr_with_hz(4));
    let template = format!("[{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos:>7}}/{{len:7}} {what} {{msg}}");
    match ProgressStyle::with_template(&template) {
        Ok(style) => progress.set_style(style.progress_chars("=>-")),
        Err(e) => warn!("Invalid progress template: {}", e),
    }
    progress
}

/// Returns a fatal error describing a worker panic.
///
/// * `what`  - Name of the unit of work.
/// * `panic` - The panic payload.
pub(crate) fn panic_error(what: &str, panic: Box<dyn std::any::Any + Send>) -> Error {
    let msg = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    Error::Fatal(format!("{} panicked: {}", what, msg))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_params() {
        let params = ParamSet::new()
            .with_string("mode", "time")
            .with_float("time_limit", 2.5)
            .with_int("num_threads", 1)
            .with_int("seed", 7);
        let config = SchedulerConfig::from_params(&params).unwrap();
        assert_eq!(config.mode, TerminationMode::Time);
        assert_eq!(config.time_limit, 2.5);
        assert_eq!(config.num_threads, 1);
        assert_eq!(config.seed, 7);
        assert_eq!(config.tile_size, 16);
        assert_eq!(config.samples_per_block, 100);
        assert!(config.deadline(Instant::now()).is_some());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad_mode = ParamSet::new().with_string("mode", "forever");
        assert!(matches!(SchedulerConfig::from_params(&bad_mode), Err(Error::Config(_))));

        let bad_tile = ParamSet::new().with_int("tile_size", 0);
        assert!(SchedulerConfig::from_params(&bad_tile).is_err());

        let bad_time = ParamSet::new().with_float("time_limit", -1.0);
        assert!(SchedulerConfig::from_params(&bad_time).is_err());
    }

    #[test]
    fn non_positive_thread_counts_count_back_from_cpus() {
        let params = ParamSet::new().with_int("num_threads", -1000);
        assert_eq!(SchedulerConfig::from_params(&params).unwrap().num_threads, 1);
    }

    #[test]
    fn footprint_covers_its_pixel() {
        let fp = PixelFootprint { x: 3, y: 1, width: 4, height: 2 };
        assert_eq!(fp.sample(&Vector2f::new(0.0, 0.0)), Vector2f::new(0.75, 0.5));
        assert_eq!(fp.center(), Vector2f::new(0.875, 0.75));
    }

    #[test]
    fn checked_sink_drops_invalid_contributions() {
        let mut film = Film::new(1, 1);
        {
            let mut sink = CheckedSink::new(&mut film);
            let r = Vector2f::new(0.5, 0.5);
            sink.accumulate_contribution(&r, &Spectrum::ONE);
            sink.accumulate_contribution(&r, &Spectrum::new(Float::NAN, 0.0, 0.0));
            sink.accumulate_contribution(&r, &Spectrum::splat(Float::INFINITY));
            sink.accumulate_contribution(&r, &Spectrum::splat(-1.0));
            assert_eq!((sink.invalid, sink.negative), (2, 1));
            sink.finish("test");
        }
        assert_eq!(film.pixel(0, 0), Spectrum::ONE);
    }
}
