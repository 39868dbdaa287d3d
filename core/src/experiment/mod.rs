//! Experiments
//!
//! Experiments observe a render. Renderers and schedulers publish typed
//! events with a small payload table; experiments record what they need
//! and dump it as a text table when the render finishes.

use crate::error::*;
use crate::lm::*;
use crate::paramset::*;
use crate::registry::*;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};

mod progress_plot;
mod pssmlt_acceptance_ratio;

// Re-export.
pub use progress_plot::*;
pub use pssmlt_acceptance_ratio::*;

/// Events published during a render.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExperimentEvent {
    /// Rendering is about to start.
    RenderStarted,

    /// A block of samples was finished by a worker.
    SampleFinished,

    /// Overall progress changed.
    ProgressUpdated,

    /// Rendering finished.
    RenderFinished,
}

impl fmt::Display for ExperimentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RenderStarted => write!(f, "RenderStarted"),
            Self::SampleFinished => write!(f, "SampleFinished"),
            Self::ProgressUpdated => write!(f, "ProgressUpdated"),
            Self::RenderFinished => write!(f, "RenderFinished"),
        }
    }
}

/// Named values that come with an event, e.g. "progress" or "sample".
pub type Payload = HashMap<&'static str, Float>;

/// An observer of the render.
pub trait Experiment: Send + Sync {
    /// Returns the experiment name.
    fn name(&self) -> &'static str;

    /// Handle an event. Called from the scheduler thread and from workers.
    ///
    /// * `event`   - The event.
    /// * `payload` - Values attached to the event.
    fn notify(&self, event: ExperimentEvent, payload: &Payload);

    /// Returns the recorded data as a whitespace separated text table.
    fn report(&self) -> String;

    /// Returns the file the report is written to when the render finishes.
    fn output_path(&self) -> Option<&str> {
        None
    }
}

impl Component for dyn Experiment {
    const INTERFACE: &'static str = "experiment";
}

/// Register the bundled experiments.
///
/// * `registry` - The registry.
pub fn register(registry: &mut ComponentRegistry) {
    registry.register::<dyn Experiment>("progressplot", create_progress_plot);
    registry.register::<dyn Experiment>("pssmltacceptanceratio", create_pssmlt_acceptance_ratio);
}

/// The set of experiments attached to a render.
#[derive(Default)]
pub struct Experiments {
    experiments: Vec<Box<dyn Experiment>>,
}

impl Experiments {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create experiments by name.
    ///
    /// * `names`    - Experiment names.
    /// * `params`   - Parameters passed to every experiment.
    /// * `registry` - The registry.
    pub fn from_names(names: &[String], params: &ParamSet, registry: &ComponentRegistry) -> Result<Self> {
        let mut experiments = Self::new();
        for name in names {
            experiments.add(registry.create::<dyn Experiment>(name, params)?);
        }
        Ok(experiments)
    }

    /// Attach an experiment.
    ///
    /// * `experiment` - The experiment.
    pub fn add(&mut self, experiment: Box<dyn Experiment>) {
        self.experiments.push(experiment);
    }

    /// Returns `true` if nothing is attached. Publishers skip building
    /// payloads in that case.
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Returns the attached experiments.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Experiment> {
        self.experiments.iter().map(|e| e.as_ref())
    }

    /// Publish an event to every experiment.
    ///
    /// * `event`   - The event.
    /// * `payload` - Values attached to the event.
    pub fn notify(&self, event: ExperimentEvent, payload: &Payload) {
        for e in self.experiments.iter() {
            e.notify(event, payload);
        }
    }

    /// Write the report of every experiment that has an output path.
    pub fn save_reports(&self) -> Result<()> {
        for e in self.experiments.iter() {
            if let Some(path) = e.output_path() {
                let report = e.report();
                info!("Saving {} to {}", e.name(), path);
                let mut file = BufWriter::new(File::create(path)?);
                file.write_all(report.as_bytes())?;
                file.flush()?;
                info!("Successfully saved {} entries", report.lines().count());
            }
        }
        Ok(())
    }
}

/// Returns a payload value, or 0 if absent.
///
/// * `payload` - The payload.
/// * `name`    - Value name.
#[inline]
pub(crate) fn payload_value(payload: &Payload, name: &str) -> Float {
    payload.get(name).copied().unwrap_or(0.0)
}

/// Returns the output path parameter; an empty string disables writing.
///
/// * `params`  - Parameters.
/// * `default` - Default path.
fn output_path_param(params: &ParamSet, default: &str) -> Option<String> {
    let path = params.find_one_string("output_path", default.to_string());
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

/// Returns the recording frequency parameter.
///
/// * `params` - Parameters.
fn frequency_param(params: &ParamSet) -> Result<u64> {
    match params.find_one_int("frequency", 100) {
        f if f > 0 => Ok(f as u64),
        f => Err(Error::config(format!("'frequency' must be positive, got {}", f))),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experiments_are_created_by_name() {
        let mut registry = ComponentRegistry::new();
        register(&mut registry);

        let params = ParamSet::new().with_string("output_path", "");
        let names = vec!["progressplot".to_string(), "pssmltacceptanceratio".to_string()];
        let experiments = Experiments::from_names(&names, &params, &registry).unwrap();
        let found: Vec<&str> = experiments.iter().map(|e| e.name()).collect();
        assert_eq!(found, vec!["progressplot", "pssmltacceptanceratio"]);
        assert!(experiments.iter().all(|e| e.output_path().is_none()));
    }

    #[test]
    fn unknown_experiment_is_a_config_error() {
        let registry = ComponentRegistry::new();
        let r = Experiments::from_names(&["nope".to_string()], &ParamSet::new(), &registry);
        assert!(matches!(r, Err(Error::Config(_))));
    }

    #[test]
    fn zero_frequency_is_rejected() {
        let params = ParamSet::new().with_int("frequency", 0);
        assert!(frequency_param(&params).is_err());
    }
}
