//! Statistics Accumulator

use crate::lm;
use num_traits::{Num, Zero};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::ops::AddAssign;
use std::sync::Mutex;
use std::sync::OnceLock;

/// Return the global statistics accumulator.
pub fn stats_accumulator() -> &'static Mutex<StatsAccumulator> {
    static DATA: OnceLock<Mutex<StatsAccumulator>> = OnceLock::new();
    DATA.get_or_init(|| Mutex::new(StatsAccumulator::new()))
}

/// Distribution statistic.
#[derive(Default, Clone)]
pub struct StatsDistribution<T>
where
    T: Num + Default + Copy + Clone,
{
    /// Sum of all values.
    sum: T,

    /// Count of all values.
    count: u64,

    /// Minimum value.
    min: Option<T>,

    /// Maximum value.
    max: Option<T>,
}

impl<T> StatsDistribution<T>
where
    T: Num + Zero + PartialOrd + AddAssign + Default + Copy + Clone,
{
    /// Create a new instance of `StatsDistribution<T>`.
    ///
    /// * `sum`   - Sum of values.
    /// * `count` - Count of values.
    /// * `min`   - Minimum value.
    /// * `max`   - Maximum value.
    pub fn new(sum: T, count: u64, min: T, max: T) -> Self {
        Self {
            sum,
            count,
            min: Some(min),
            max: Some(max),
        }
    }

    /// Accumulate stats.
    ///
    /// * `sum`   - Sum of values.
    /// * `count` - Count of values.
    /// * `min`   - Minimum value.
    /// * `max`   - Maximum value.
    pub fn accumulate(&mut self, distrib: Self) {
        self.sum += distrib.sum;
        self.count += distrib.count;

        if let Some(v) = self.min.as_mut() {
            if let Some(min) = distrib.min {
                *v = lm::min(*v, min);
            }
        } else {
            self.min = distrib.min;
        }

        if let Some(v) = self.max.as_mut() {
            if let Some(max) = distrib.max {
                *v = lm::max(*v, max);
            }
        } else {
            self.max = distrib.max;
        }
    }

    /// Report a sample value.
    ///
    /// * `val`  - Sample value.
    pub fn report(&mut self, val: T) {
        self.sum += val;
        self.count += 1;

        if let Some(v) = self.min.as_mut() {
            *v = lm::min(*v, val);
        } else {
            self.min = Some(val);
        }

        if let Some(v) = self.max.as_mut() {
            *v = lm::max(*v, val);
        } else {
            self.max = Some(val);
        }
    }

    /// Clear stats.
    pub fn clear(&mut self) {
        self.sum = T::zero();
        self.count = 0;
        self.min = None;
        self.max = None;
    }
}

/// Aggregate different types of statistics.
pub struct StatsAccumulator {
    /// Counters.
    counters: HashMap<String, i64>,

    /// Memory counters.
    memory_counters: HashMap<String, u64>,

    /// Integer distribution.
    int_distribution: HashMap<String, StatsDistribution<i64>>,

    /// Float distribution.
    float_distribution: HashMap<String, StatsDistribution<f64>>,

    /// Percentages.
    percentages: HashMap<String, (i64, i64)>,

    /// Ratios.
    ratios: HashMap<String, (i64, i64)>,
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAccumulator {
    /// Create a new instance of `StatsAccumulator`.
    pub fn new() -> Self {
        Self {
            counters: HashMap::new(),
            memory_counters: HashMap::new(),
            int_distribution: HashMap::new(),
            float_distribution: HashMap::new(),
            percentages: HashMap::new(),
            ratios: HashMap::new(),
        }
    }

    /// Accumulates a counter value.
    ///
    /// * `name` - Statistic name.
    /// * `val`  - Counter value.
    pub fn report_counter(&mut self, name: &str, val: i64) {
        if let Some(v) = self.counters.get_mut(name) {
            *v += val;
        } else {
            self.counters.insert(name.to_string(), val);
        }
    }

    /// Accumulates a memory counter value.
    ///
    /// * `name` - Statistic name.
    /// * `val`  - Memory counter value.
    pub fn report_memory_counter(&mut self, name: &str, val: u64) {
        if let Some(v) = self.memory_counters.get_mut(name) {
            *v += val;
        } else {
            self.memory_counters.insert(name.to_string(), val);
        }
    }

    /// Accumulates integer point distribution samples.
    ///
    /// * `name`    - Statistic name.
    /// * `distrib` - Distribution.
    pub fn report_int_distribution(&mut self, name: &str, distrib: StatsDistribution<i64>) {
        if let Some(v) = self.int_distribution.get_mut(name) {
            v.accumulate(distrib);
        } else {
            self.int_distribution.insert(name.to_string(), distrib);
        }
    }

    /// Accumulates floating point distribution samples.
    ///
    /// * `name`  - Statistic name.
    /// * `distrib` - Distribution.
    pub fn report_float_distribution(&mut self, name: &str, distrib: StatsDistribution<f64>) {
        if let Some(v) = self.float_distribution.get_mut(name) {
            v.accumulate(distrib);
        } else {
            self.float_distribution.insert(name.to_string(), distrib);
        }
    }

    /// Accumulates a percentage value.
    ///
    /// * `name`  - Statistic name.
    /// * `num`   - Numerator (actual count).
    /// * `denom` - Denominator (total count).
    pub fn report_percentage(&mut self, name: &str, num: i64, denom: i64) {
        if let Some(v) = self.percentages.get_mut(name) {
            v.0 += num;
            v.1 += denom;
        } else {
            self.percentages.insert(name.to_string(), (num, denom));
        }
    }

    /// Accumulates a ratio value.
    ///
    /// * `name`  - Statistic name.
    /// * `num`   - Numerator.
    /// * `denom` - Denominator.
    pub fn report_ratio(&mut self, name: &str, num: i64, denom: i64) {
        if let Some(v) = self.ratios.get_mut(name) {
            v.0 += num;
            v.1 += denom;
        } else {
            self.ratios.insert(name.to_string(), (num, denom));
        }
    }

    /// Returns the accumulated value of a counter.
    ///
    /// * `name` - Statistic name.
    pub fn counter(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Returns the accumulated numerator and denominator of a ratio.
    ///
    /// * `name` - Statistic name.
    pub fn ratio(&self, name: &str) -> (i64, i64) {
        self.ratios.get(name).copied().unwrap_or((0, 0))
    }

    /// Formats the report grouped by category.
    pub fn report(&self) -> String {
        let mut to_print: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut push = |k: &str, s: String| {
            let (category, title) = get_category_and_title(k);
            to_print.entry(category).or_default().push(s.replace("{title}", &title));
        };

        for (k, v) in self.counters.iter().filter(|(_, v)| **v != 0) {
            push(k, format!("{{title}}  {v:12}"));
        }

        for (k, v) in self.memory_counters.iter().filter(|(_, v)| **v != 0) {
            let kb = *v as f64 / 1024.0;
            let s = if kb < 1024.0 {
                format!("{{title}}  {kb:9.2} kB")
            } else if kb < 1024.0 * 1024.0 {
                format!("{{title}}  {:9.2} MiB", kb / 1024.0)
            } else {
                format!("{{title}}  {:9.2} GiB", kb / (1024.0 * 1024.0))
            };
            push(k, s);
        }

        for (k, v) in self.int_distribution.iter().filter(|(_, v)| v.count != 0) {
            let mn = v.min.unwrap_or(i64::MAX);
            let mx = v.max.unwrap_or(i64::MIN);
            let avg = v.sum as f64 / v.count as f64;
            push(k, format!("{{title}}  {avg:.3} avg [range {mn} - {mx}]"));
        }

        for (k, v) in self.float_distribution.iter().filter(|(_, v)| v.count != 0) {
            let mn = v.min.unwrap_or(f64::MAX);
            let mx = v.max.unwrap_or(f64::MIN);
            let avg = v.sum / v.count as f64;
            push(k, format!("{{title}}  {avg:.3} avg [range {mn} - {mx}]"));
        }

        for (k, &(num, denom)) in self.percentages.iter().filter(|(_, v)| v.1 != 0) {
            let pct = (100.0 * num as f64) / denom as f64;
            push(k, format!("{{title}}  {num:12} / {denom:12} ({pct:.2}%)"));
        }

        for (k, &(num, denom)) in self.ratios.iter().filter(|(_, v)| v.1 != 0) {
            let r = num as f64 / denom as f64;
            push(k, format!("{{title}}  {num:12} / {denom:12} ({r:.2}x)"));
        }

        let mut out = String::from("Statistics:\n");
        for (category, mut items) in to_print {
            items.sort();
            let _ = writeln!(out, "  {category}");
            for item in items {
                let _ = writeln!(out, "    {item}");
            }
        }
        out
    }

    /// Clear the accumulated statistics.
    pub fn clear(&mut self) {
        self.counters.clear();
        self.memory_counters.clear();
        self.int_distribution.clear();
        self.float_distribution.clear();
        self.percentages.clear();
        self.ratios.clear();
    }
}

/// Splits a statistic name at the first `/` as the separator and returns category and title. If there is no `/`, then
/// category is the empty string.
///
/// * `s` - The statistic name to split.
fn get_category_and_title(s: &str) -> (String, String) {
    if let Some(slash) = s.find('/') {
        (s[..slash].to_string(), format!("{:<42}", &s[slash + 1..]))
    } else {
        (String::new(), format!("{:<42}", s))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_across_reports() {
        let mut accum = StatsAccumulator::new();
        accum.report_counter("Acceleration/Rays cast", 3);
        accum.report_counter("Acceleration/Rays cast", 4);
        accum.report_ratio("PSSMLT/Acceptance", 1, 2);
        accum.report_ratio("PSSMLT/Acceptance", 2, 2);
        assert_eq!(accum.counter("Acceleration/Rays cast"), 7);
        assert_eq!(accum.ratio("PSSMLT/Acceptance"), (3, 4));

        let report = accum.report();
        assert!(report.contains("Acceleration"));
        assert!(report.contains("Rays cast"));
    }

    #[test]
    fn distributions_track_range() {
        let mut d = StatsDistribution::<i64>::default();
        d.report(3);
        d.report(-1);
        let mut total = StatsDistribution::<i64>::default();
        total.accumulate(d);
        assert_eq!(total.min, Some(-1));
        assert_eq!(total.max, Some(3));
        assert_eq!(total.count, 2);
    }
}
