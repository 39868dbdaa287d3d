//! Progress Plot

use super::*;
use std::sync::Mutex;
use std::time::Instant;

/// A recorded progress sample.
#[derive(Copy, Clone, Debug, PartialEq)]
struct ProgressRecord {
    /// Block counter at the time of the update.
    block: u64,

    /// Seconds since the render started.
    elapsed: Float,

    /// Progress in [0, 1].
    progress: Float,
}

/// Mutable state of the plot.
#[derive(Debug, Default)]
struct ProgressState {
    start: Option<Instant>,
    records: Vec<ProgressRecord>,
}

/// Records progress against wall clock time. Every `frequency` progress
/// updates one (block, elapsed seconds, progress) row is kept.
#[derive(Debug)]
pub struct ProgressPlot {
    frequency: u64,
    output_path: Option<String>,
    state: Mutex<ProgressState>,
}

impl ProgressPlot {
    /// Create a plot.
    ///
    /// * `frequency`   - Keep every n-th update.
    /// * `output_path` - Where the table is written at the end.
    pub fn new(frequency: u64, output_path: Option<String>) -> Self {
        Self {
            frequency: frequency.max(1),
            output_path,
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Returns the number of recorded rows.
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.records.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Experiment for ProgressPlot {
    fn name(&self) -> &'static str {
        "progressplot"
    }

    fn notify(&self, event: ExperimentEvent, payload: &Payload) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        match event {
            ExperimentEvent::RenderStarted => {
                state.records.clear();
                state.start = Some(Instant::now());
            }
            ExperimentEvent::ProgressUpdated => {
                let block = payload_value(payload, "block") as u64;
                if block % self.frequency == 0 {
                    let start = *state.start.get_or_insert_with(Instant::now);
                    let elapsed = start.elapsed().as_secs_f64();
                    let progress = payload_value(payload, "progress");
                    state.records.push(ProgressRecord { block, elapsed, progress });
                }
            }
            _ => {}
        }
    }

    fn report(&self) -> String {
        let Ok(state) = self.state.lock() else {
            return String::new();
        };
        state
            .records
            .iter()
            .map(|r| format!("{} {} {}\n", r.block, r.elapsed, r.progress))
            .collect()
    }

    fn output_path(&self) -> Option<&str> {
        self.output_path.as_deref()
    }
}

/// Create a progress plot from parameters (`frequency`, `output_path`).
///
/// * `params`    - Parameters.
/// * `_registry` - Unused.
pub fn create_progress_plot(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn Experiment>> {
    let frequency = frequency_param(params)?;
    let output_path = output_path_param(params, "progress.txt");
    Ok(Box::new(ProgressPlot::new(frequency, output_path)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
