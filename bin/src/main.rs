#[macro_use]
extern crate log;

use api::*;
use core::app::*;
use core::error::*;
use core::film::Film;
use core::lm::Int;
use core::paramset::ParamSet;
use core::print_stats;
use core::scheduler::SchedulerConfig;
use std::path::Path;

fn main() {
    // Initialize `env_logger`. `--quiet` only lets warnings through unless
    // `RUST_LOG` says otherwise.
    let default_level = if OPTIONS.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = render(&OPTIONS) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn render(options: &Options) -> Result<()> {
    let scheduler = SchedulerConfig::from_params(
        &ParamSet::new()
            .with_string("mode", &options.mode)
            .with_int("num_samples", options.samples as Int)
            .with_float("time_limit", options.time_limit)
            .with_int("num_threads", options.threads() as Int)
            .with_int("tile_size", options.tile_size as Int)
            .with_int("seed", options.seed as Int)
            .with_bool("quiet", options.quiet),
    )?;
    let renderer = RendererConfig::with_params(&options.renderer, options.renderer_params()?);
    let mut job = RenderJob::new(&renderer)?;
    job.add_observers_by_name(&options.experiments, &ParamSet::new())?;

    if options.width == 0 || options.height == 0 {
        return Err(Error::config(format!("invalid image size {}x{}", options.width, options.height)));
    }
    let mut film = Film::new(options.width, options.height);

    let mut desc = builtin_scene(&options.scene)?;
    desc.set_accelerator(&options.accel, ParamSet::new());
    let scene = desc.build(registry(), film.aspect())?;

    // The film is written even when rendering fails part way.
    let result = job.render(&scene, &scheduler, &mut film);
    film.save(&options.image_file)?;
    info!("Wrote '{}'", options.image_file);

    let names = job.renderer().layer_names();
    for (layer, name) in names.iter().enumerate().take(film.num_layers()) {
        let path = layer_path(&options.image_file, name);
        film.rescale_and_save_layer(layer, &path, 1.0)?;
        debug!("Wrote '{}'", path);
    }

    if !options.quiet {
        print_stats!();
    }
    result
}

/// Returns `<stem>_<name>.<ext>` next to the image file.
fn layer_path(image_file: &str, name: &str) -> String {
    let path = Path::new(image_file);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("result");
    let file = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{name}.{ext}"),
        None => format!("{stem}_{name}"),
    };
    path.with_file_name(file).to_string_lossy().into_owned()
}
