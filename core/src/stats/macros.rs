//! Macros
//!
//! Every `stat_*` macro declares one or two thread local cells plus a
//! callback that moves the cell contents into a `StatsAccumulator` and
//! resets them. Titles use `/` to separate categories, e.g.
//! "Transport/Paths traced". Register the callbacks with
//! `stat_register_fns!` and flush worker threads with `report_stats!`.

/// Declare a thread local cell and a callback that hands its value to the
/// accumulator. Shared by the public `stat_*` macros.
#[doc(hidden)]
#[macro_export]
macro_rules! __stat_cell {
    ($ty: ty, $init: expr, $var: ident, $stats_func: ident, |$accum: ident, $val: ident| $report: expr, |$cell: ident| $reset: expr) => {
        thread_local! {
            pub(crate) static $var: std::cell::RefCell<$ty> = std::cell::RefCell::new($init);
        }

        pub(crate) fn $stats_func($accum: &mut $crate::stats::StatsAccumulator) {
            let $val = $var.with(|c| c.borrow().clone());
            $report;
            $var.with(|$cell| $reset);
        }
    };
}

/// Thread local `i64` counter.
///
/// * `$title`      - Statistic title.
/// * `$var`        - Thread local variable incremented with `stat_inc!`.
/// * `$stats_func` - Callback to pass to `stat_register_fns!`.
#[macro_export]
macro_rules! stat_counter {
    ($title: expr, $var: ident, $stats_func: ident $(,)?) => {
        $crate::__stat_cell!(
            i64,
            0,
            $var,
            $stats_func,
            |accum, val| accum.report_counter($title, val),
            |c| *c.borrow_mut() = 0
        );
    };
}

/// Thread local byte counter.
///
/// * `$title`      - Statistic title.
/// * `$var`        - Thread local variable incremented with `stat_inc!`.
/// * `$stats_func` - Callback to pass to `stat_register_fns!`.
#[macro_export]
macro_rules! stat_memory_counter {
    ($title: expr, $var: ident, $stats_func: ident $(,)?) => {
        $crate::__stat_cell!(
            u64,
            0,
            $var,
            $stats_func,
            |accum, val| accum.report_memory_counter($title, val),
            |c| *c.borrow_mut() = 0
        );
    };
}

/// Thread local distribution of integer samples, fed with `stat_dist!`.
#[macro_export]
macro_rules! stat_int_distribution {
    ($title: expr, $var: ident, $stats_func: ident $(,)?) => {
        $crate::__stat_cell!(
            $crate::stats::StatsDistribution<i64>,
            $crate::stats::StatsDistribution::default(),
            $var,
            $stats_func,
            |accum, val| accum.report_int_distribution($title, val),
            |c| c.borrow_mut().clear()
        );
    };
}

/// Thread local distribution of float samples, fed with `stat_dist!`.
#[macro_export]
macro_rules! stat_float_distribution {
    ($title: expr, $var: ident, $stats_func: ident $(,)?) => {
        $crate::__stat_cell!(
            $crate::stats::StatsDistribution<f64>,
            $crate::stats::StatsDistribution::default(),
            $var,
            $stats_func,
            |accum, val| accum.report_float_distribution($title, val),
            |c| c.borrow_mut().clear()
        );
    };
}

/// Pair of thread local counters reported as `num / denom` in percent.
///
/// * `$title`      - Statistic title.
/// * `$var_num`    - Numerator, the events of interest.
/// * `$var_denom`  - Denominator, all events.
/// * `$stats_func` - Callback to pass to `stat_register_fns!`.
#[macro_export]
macro_rules! stat_percent {
    ($title: expr, $var_num: ident, $var_denom: ident, $stats_func: ident $(,)?) => {
        $crate::__stat_pair!(report_percentage, $title, $var_num, $var_denom, $stats_func);
    };
}

/// Pair of thread local counters reported as a ratio `num / denom`.
#[macro_export]
macro_rules! stat_ratio {
    ($title: expr, $var_num: ident, $var_denom: ident, $stats_func: ident $(,)?) => {
        $crate::__stat_pair!(report_ratio, $title, $var_num, $var_denom, $stats_func);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __stat_pair {
    ($method: ident, $title: expr, $var_num: ident, $var_denom: ident, $stats_func: ident) => {
        thread_local! {
            pub(crate) static $var_num: std::cell::RefCell<i64> = std::cell::RefCell::new(0);
            pub(crate) static $var_denom: std::cell::RefCell<i64> = std::cell::RefCell::new(0);
        }

        pub(crate) fn $stats_func(accum: &mut $crate::stats::StatsAccumulator) {
            let num = $var_num.with(|c| c.replace(0));
            let denom = $var_denom.with(|c| c.replace(0));
            accum.$method($title, num, denom);
        }
    };
}

/// Add to a counter declared with `stat_counter!`, `stat_memory_counter!`,
/// `stat_percent!` or `stat_ratio!`.
#[macro_export]
macro_rules! stat_inc {
    ($var: ident, $e: expr) => {
        $var.with(|c| *c.borrow_mut() += $e);
    };
}

/// Add a sample to a distribution.
#[macro_export]
macro_rules! stat_dist {
    ($var: ident, $e: expr) => {
        $var.with(|c| c.borrow_mut().report($e));
    };
}

/// Define `register_stats()` for the calling module. It hands the listed
/// callbacks to the global registrar the first time it runs; call it from
/// constructors, not from per-sample code.
#[macro_export]
macro_rules! stat_register_fns {
    ($($stat_func: ident),+ $(,)?) => {
        pub(crate) fn register_stats() {
            static REGISTERED: std::sync::Once = std::sync::Once::new();
            REGISTERED.call_once(|| {
                if let Ok(mut sr) = $crate::stats::stats_registrar().lock() {
                    $( sr.register_stat_func($stat_func); )+
                }
            });
        }
    };
}

/// Move the calling thread's statistics into the global accumulator. Worker
/// threads call this before they exit.
#[macro_export]
macro_rules! report_stats {
    () => {{
        if let (Ok(mut accum), Ok(sr)) = (
            $crate::stats::stats_accumulator().lock(),
            $crate::stats::stats_registrar().lock(),
        ) {
            sr.call_stat_funcs(&mut accum);
        }
    }};
}

/// Print the accumulated statistics to stdout.
#[macro_export]
macro_rules! print_stats {
    () => {{
        if let Ok(accum) = $crate::stats::stats_accumulator().lock() {
            print!("{}", accum.report());
        }
    }};
}

/// Discard the accumulated statistics.
#[macro_export]
macro_rules! clear_stats {
    () => {{
        if let Ok(mut accum) = $crate::stats::stats_accumulator().lock() {
            accum.clear();
        }
    }};
}
