//! API
//!
//! Scene descriptions, the component registry with every bundled
//! implementation, and the `render()` entry point.

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

mod builtin;
mod mesh_loader;
mod scene_desc;

// Re-export.
pub use builtin::*;
pub use mesh_loader::*;
pub use scene_desc::*;

use core::error::*;
use core::experiment::{Experiment, Experiments};
use core::film::Film;
use core::paramset::ParamSet;
use core::registry::ComponentRegistry;
use core::renderer::{RenderContext, Renderer};
use core::scene::Scene;
use core::scheduler::SchedulerConfig;
use std::time::Instant;

lazy_static! {
    /// Registry holding every bundled implementation.
    static ref REGISTRY: ComponentRegistry = {
        let mut registry = ComponentRegistry::new();
        core::rng::register(&mut registry);
        core::experiment::register(&mut registry);
        accelerators::register(&mut registry);
        cameras::register(&mut registry);
        integrators::register(&mut registry);
        lights::register(&mut registry);
        materials::register(&mut registry);
        samplers::register(&mut registry);
        registry
    };
}

/// Returns the registry holding every bundled implementation.
pub fn registry() -> &'static ComponentRegistry {
    &REGISTRY
}

/// Renderer name and parameters.
#[derive(Clone, Debug, Default)]
pub struct RendererConfig {
    /// Renderer name, e.g. "pt" or "bpt".
    pub name: String,

    /// Renderer parameters.
    pub params: ParamSet,
}

impl RendererConfig {
    /// A renderer with default parameters.
    ///
    /// * `name` - Renderer name.
    pub fn new(name: &str) -> Self {
        Self::with_params(name, ParamSet::new())
    }

    /// A renderer with parameters.
    ///
    /// * `name`   - Renderer name.
    /// * `params` - Renderer parameters.
    pub fn with_params(name: &str, params: ParamSet) -> Self {
        Self {
            name: name.to_string(),
            params,
        }
    }
}

/// A configured renderer with the observers attached to it.
pub struct RenderJob {
    /// The renderer.
    renderer: Box<dyn Renderer>,

    /// Observers notified of progress.
    experiments: Experiments,
}

impl RenderJob {
    /// Create the renderer. Fails on an unknown renderer or invalid
    /// parameters before any work is done.
    ///
    /// * `config` - Renderer name and parameters.
    pub fn new(config: &RendererConfig) -> Result<Self> {
        let renderer = registry().create::<dyn Renderer>(&config.name, &config.params)?;
        Ok(Self {
            renderer,
            experiments: Experiments::new(),
        })
    }

    /// Attach a progress observer.
    ///
    /// * `observer` - The observer.
    pub fn add_observer(&mut self, observer: Box<dyn Experiment>) {
        debug!("Attaching observer '{}'", observer.name());
        self.experiments.add(observer);
    }

    /// Attach observers by registered name.
    ///
    /// * `names`  - Observer names.
    /// * `params` - Parameters passed to every observer.
    pub fn add_observers_by_name(&mut self, names: &[String], params: &ParamSet) -> Result<()> {
        for name in names {
            self.add_observer(registry().create::<dyn Experiment>(name, params)?);
        }
        Ok(())
    }

    /// Returns the renderer.
    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    /// Render into `film`. Observer reports are written once rendering
    /// stops, also after a fatal error.
    ///
    /// * `scene`     - The scene.
    /// * `scheduler` - Scheduler configuration.
    /// * `film`      - The film.
    pub fn render(&self, scene: &Scene, scheduler: &SchedulerConfig, film: &mut Film) -> Result<()> {
        info!(
            "Rendering {}x{} with '{}' on {} threads ({} mode)",
            film.width(),
            film.height(),
            self.renderer.name(),
            scheduler.num_threads,
            scheduler.mode
        );
        let start = Instant::now();
        let result = self.renderer.render(&RenderContext::new(scene, scheduler, &self.experiments), film);
        match &result {
            Ok(()) => info!("Rendering finished in {:.3}s", start.elapsed().as_secs_f64()),
            Err(e) => error!("Rendering aborted after {:.3}s: {}", start.elapsed().as_secs_f64(), e),
        }
        result.and(self.experiments.save_reports())
    }
}

/// Render a scene with a renderer picked by name.
///
/// * `scene`     - The scene.
/// * `renderer`  - Renderer name and parameters.
/// * `scheduler` - Scheduler configuration.
/// * `film`      - The film.
pub fn render(scene: &Scene, renderer: &RendererConfig, scheduler: &SchedulerConfig, film: &mut Film) -> Result<()> {
    RenderJob::new(renderer)?.render(scene, scheduler, film)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use core::accelerator::Accelerator;
    use core::bsdf::GeneralizedBsdf;
    use core::camera::Camera;
    use core::experiment::{ExperimentEvent, Payload};
    use core::light::Light;
    use std::sync::{Arc, Mutex};

    #[test]
    fn registry_covers_every_component() {
        let r = registry();
        assert_eq!(r.names::<dyn Accelerator>(), vec!["bvh", "naive", "qbvh"]);
        assert_eq!(r.names::<dyn GeneralizedBsdf>(), vec!["dielectric", "diffuse", "mirror"]);
        assert_eq!(r.names::<dyn Light>(), vec!["area", "directional", "env.bitmap", "env.const"]);
        assert_eq!(r.names::<dyn Camera>(), vec!["perspective", "thinlens"]);
        assert_eq!(
            r.names::<dyn Renderer>(),
            vec!["bpt", "lighttrace", "pm", "ppm", "pssmlt", "pt"]
        );
    }

    #[test]
    fn unknown_renderer_fails_before_rendering() {
        assert!(matches!(RenderJob::new(&RendererConfig::new("mlt")), Err(Error::Config(_))));
        let bad = RendererConfig::with_params("bpt", ParamSet::new().with_string("mis", "max"));
        assert!(RenderJob::new(&bad).is_err());
    }

    /// Counts the events it receives.
    struct EventLog(Arc<Mutex<Vec<ExperimentEvent>>>);

    impl Experiment for EventLog {
        fn name(&self) -> &'static str {
            "eventlog"
        }

        fn notify(&self, event: ExperimentEvent, _payload: &Payload) {
            if let Ok(mut events) = self.0.lock() {
                events.push(event);
            }
        }

        fn report(&self) -> String {
            String::new()
        }
    }

    #[test]
    fn observers_see_start_and_finish() {
        let events = Arc::new(Mutex::new(vec![]));
        let mut job = RenderJob::new(&RendererConfig::new("pt")).unwrap();
        job.add_observer(Box::new(EventLog(Arc::clone(&events))));

        let mut film = Film::new(4, 4);
        let scene = environment_scene().build(registry(), film.aspect()).unwrap();
        let config = SchedulerConfig {
            num_samples: 2,
            num_threads: 2,
            quiet: true,
            ..SchedulerConfig::default()
        };
        job.render(&scene, &config, &mut film).unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.first(), Some(&ExperimentEvent::RenderStarted));
        assert_eq!(events.last(), Some(&ExperimentEvent::RenderFinished));
    }
}
