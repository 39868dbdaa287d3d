//! Application related stuff

use crate::error::*;
use crate::lm::Float;
use crate::paramset::*;
use clap::Parser;

lazy_static! {
    /// The global application options.
    pub static ref OPTIONS: Options = Options::parse();
}

/// System wide options.
#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Options {
    /// Number of threads to use for rendering.
    #[clap(
        long = "nthreads",
        short = 't',
        value_name = "NUM",
        default_value_t = 0,
        help = "Use specified number of threads for rendering (0 uses all logical CPUs)."
    )]
    n_threads: usize,

    /// Suppress all text output other than error messages.
    #[clap(long, help = "Suppress all text output other than error messages.")]
    pub quiet: bool,

    /// Path to the image file.
    #[clap(
        long = "outfile",
        short = 'o',
        value_name = "FILE",
        default_value = "result.exr",
        help = "Write the final image to the given filename."
    )]
    pub image_file: String,

    /// Built-in scene to render.
    #[clap(
        long = "scene",
        short = 's',
        value_name = "NAME",
        default_value = "cornell",
        help = "Built-in scene to render (quad, cornell, env)."
    )]
    pub scene: String,

    /// Renderer to use.
    #[clap(
        long = "renderer",
        short = 'r',
        value_name = "NAME",
        default_value = "pt",
        help = "Renderer (pt, lighttrace, bpt, pssmlt, pm, ppm)."
    )]
    pub renderer: String,

    /// Acceleration structure to use.
    #[clap(
        long = "accel",
        value_name = "NAME",
        default_value = "qbvh",
        help = "Acceleration structure (qbvh, bvh, naive)."
    )]
    pub accel: String,

    /// Termination mode.
    #[clap(
        long = "mode",
        value_name = "MODE",
        default_value = "samples",
        help = "Terminate after a sample budget (samples) or a time budget (time)."
    )]
    pub mode: String,

    /// Sample budget.
    #[clap(
        long = "samples",
        short = 'n',
        value_name = "NUM",
        default_value_t = 16,
        help = "Samples per pixel, or mutations per pixel for pssmlt."
    )]
    pub samples: u64,

    /// Time budget.
    #[clap(
        long = "time",
        value_name = "SECONDS",
        default_value_t = 10.0,
        help = "Time budget in seconds when --mode=time."
    )]
    pub time_limit: Float,

    /// Base seed.
    #[clap(long = "seed", value_name = "NUM", default_value_t = 1, help = "Base random seed.")]
    pub seed: u32,

    /// Image width.
    #[clap(long = "width", value_name = "NUM", default_value_t = 256, help = "Image width in pixels.")]
    pub width: usize,

    /// Image height.
    #[clap(long = "height", value_name = "NUM", default_value_t = 256, help = "Image height in pixels.")]
    pub height: usize,

    /// Tile size.
    #[clap(
        long = "tilesize",
        short = 'p',
        value_name = "NUM",
        default_value_t = 16,
        help = "Size in pixels of square tiles rendered per thread."
    )]
    pub tile_size: usize,

    /// Extra renderer parameters.
    #[clap(
        long = "param",
        value_name = "KEY=VALUE",
        help = "Renderer parameter, e.g. --param mis=balance. May be repeated."
    )]
    pub params: Vec<String>,

    /// Experiments to attach.
    #[clap(
        long = "experiment",
        value_name = "NAME",
        help = "Attach an experiment (progressplot, pssmltacceptanceratio). May be repeated."
    )]
    pub experiments: Vec<String>,
}

impl Options {
    /// Returns the number of threads to use.
    pub fn threads(&self) -> usize {
        let max_threads = num_cpus::get();
        match self.n_threads {
            0 => max_threads,
            n if n > max_threads => {
                warn!("Num threads > max logical CPUs {}", max_threads);
                max_threads
            }
            n => n,
        }
    }

    /// Returns the renderer parameters given with `--param`.
    pub fn renderer_params(&self) -> Result<ParamSet> {
        parse_key_values(&self.params)
    }
}

/// Parse `key=value` pairs into a `ParamSet`. Values are stored as the
/// narrowest type they parse as: bool, integer, float, then string.
///
/// * `pairs` - The pairs.
pub fn parse_key_values(pairs: &[String]) -> Result<ParamSet> {
    let mut params = ParamSet::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::config(format!("expected KEY=VALUE, got '{}'", pair)))?;
        let (key, value) = (key.trim(), value.trim());
        if let Ok(b) = value.parse::<bool>() {
            params.add_bool(key, &[b]);
        } else if let Ok(i) = value.parse::<i32>() {
            params.add_int(key, &[i]);
            params.add_float(key, &[i as Float]);
        } else if let Ok(f) = value.parse::<Float>() {
            params.add_float(key, &[f]);
        } else {
            params.add_string(key, &[value.to_string()]);
        }
    }
    Ok(params)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
