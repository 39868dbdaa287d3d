//! PSSMLT Acceptance Ratio

use super::*;
use std::sync::Mutex;

/// A recorded acceptance ratio.
#[derive(Copy, Clone, Debug, PartialEq)]
struct AcceptanceRecord {
    /// Chain that reported the value.
    thread: u32,

    /// Number of mutations made by the chain so far.
    sample: u64,

    /// Accepted / proposed.
    ratio: Float,
}

/// Traces the running acceptance ratio of every Markov chain. A row is kept
/// whenever a chain reports a sample count that is a multiple of
/// `frequency`.
#[derive(Debug)]
pub struct PssmltAcceptanceRatio {
    frequency: u64,
    output_path: Option<String>,
    records: Mutex<Vec<AcceptanceRecord>>,
}

impl PssmltAcceptanceRatio {
    /// Create the experiment.
    ///
    /// * `frequency`   - Sample count granularity.
    /// * `output_path` - Where the table is written at the end.
    pub fn new(frequency: u64, output_path: Option<String>) -> Self {
        Self {
            frequency: frequency.max(1),
            output_path,
            records: Mutex::new(vec![]),
        }
    }
}

impl Experiment for PssmltAcceptanceRatio {
    fn name(&self) -> &'static str {
        "pssmltacceptanceratio"
    }

    fn notify(&self, event: ExperimentEvent, payload: &Payload) {
        let Ok(mut records) = self.records.lock() else {
            return;
        };
        match event {
            ExperimentEvent::RenderStarted => records.clear(),
            ExperimentEvent::SampleFinished => {
                let Some(ratio) = payload.get("pssmlt_acceptance_ratio") else {
                    return;
                };
                let sample = payload_value(payload, "sample") as u64;
                if sample % self.frequency == 0 {
                    records.push(AcceptanceRecord {
                        thread: payload_value(payload, "thread") as u32,
                        sample,
                        ratio: *ratio,
                    });
                }
            }
            _ => {}
        }
    }

    fn report(&self) -> String {
        let Ok(mut records) = self.records.lock() else {
            return String::new();
        };
        records.sort_by_key(|r| (r.thread, r.sample));
        records
            .iter()
            .map(|r| format!("{} {} {}\n", r.thread, r.sample, r.ratio))
            .collect()
    }

    fn output_path(&self) -> Option<&str> {
        self.output_path.as_deref()
    }
}

/// Create the experiment from parameters (`frequency`, `output_path`).
///
/// * `params`    - Parameters.
/// * `_registry` - Unused.
pub fn create_pssmlt_acceptance_ratio(
    params: &ParamSet,
    _registry: &ComponentRegistry,
) -> Result<Box<dyn Experiment>> {
    let frequency = frequency_param(params)?;
    let output_path = output_path_param(params, "pssmlttraceplot.txt");
    Ok(Box::new(PssmltAcceptanceRatio::new(frequency, output_path)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(thread: Float, sample: Float, ratio: Float) -> Payload {
        Payload::from([("thread", thread), ("sample", sample), ("pssmlt_acceptance_ratio", ratio)])
    }

    #[test]
    fn rows_are_grouped_by_chain() {
        let experiment = PssmltAcceptanceRatio::new(100, None);
        experiment.notify(ExperimentEvent::SampleFinished, &sample(1.0, 100.0, 0.25));
        experiment.notify(ExperimentEvent::SampleFinished, &sample(0.0, 200.0, 0.5));
        experiment.notify(ExperimentEvent::SampleFinished, &sample(0.0, 100.0, 0.75));
        experiment.notify(ExperimentEvent::SampleFinished, &sample(0.0, 150.0, 0.1));

        assert_eq!(experiment.report(), "0 100 0.75\n0 200 0.5\n1 100 0.25\n");
    }

    #[test]
    fn events_without_a_ratio_are_ignored() {
        let experiment = PssmltAcceptanceRatio::new(1, None);
        experiment.notify(ExperimentEvent::SampleFinished, &Payload::from([("sample", 1.0)]));
        assert!(experiment.report().is_empty());
    }
}
