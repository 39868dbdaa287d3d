//! Statistics Registration

use super::StatsAccumulator;
use std::sync::Mutex;
use std::sync::OnceLock;

/// Returns the global registrar for statistics.
pub fn stats_registrar() -> &'static Mutex<StatsRegistrar> {
    static DATA: OnceLock<Mutex<StatsRegistrar>> = OnceLock::new();
    DATA.get_or_init(|| Mutex::new(StatsRegistrar::default()))
}

/// Signature of the callbacks created by the `stat_*` macros.
pub type StatsFn = fn(&mut StatsAccumulator);

/// Registers callback functions that move thread local statistics into a
/// `StatsAccumulator`.
#[derive(Default)]
pub struct StatsRegistrar {
    /// Callback functions.
    stats_funcs: Vec<StatsFn>,
}

impl StatsRegistrar {
    /// Register a callback function for reporting statistics. Registering the
    /// same function twice has no effect.
    ///
    /// * `func` - A callback function that takes a `StatsAccumulator` to report statistics.
    pub fn register_stat_func(&mut self, func: StatsFn) {
        if !self.stats_funcs.iter().any(|f| *f as usize == func as usize) {
            self.stats_funcs.push(func);
        }
    }

    /// Call all callback functions for reporting statistics.
    ///
    /// * `accum` - The accumulator that receives the statistics.
    pub fn call_stat_funcs(&self, accum: &mut StatsAccumulator) {
        self.stats_funcs.iter().for_each(|func| {
            func(accum);
        });
    }
}
