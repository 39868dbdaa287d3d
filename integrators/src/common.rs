//! Common

use core::error::*;
use core::paramset::*;
use core::registry::*;
use core::sampler::*;
use core::spectrum::*;

/// Path length limits shared by the path based renderers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PathLimits {
    /// Number of vertices after which Russian roulette starts.
    pub rr_depth: usize,

    /// Maximum number of vertices of a subpath or a full path; `None` for
    /// unbounded paths.
    pub max_vertices: Option<usize>,
}

impl Default for PathLimits {
    fn default() -> Self {
        Self {
            rr_depth: 1,
            max_vertices: None,
        }
    }
}

impl PathLimits {
    /// Read `rr_depth` (default 1) and `max_path_vertices` (default -1 for
    /// unbounded paths).
    ///
    /// * `params` - Parameter set.
    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let rr_depth = params.find_one_int("rr_depth", 1);
        if rr_depth < 0 {
            return Err(Error::config(format!("rr_depth {} must not be negative", rr_depth)));
        }
        let max_vertices = match params.find_one_int("max_path_vertices", -1) {
            n if n < 0 => None,
            n if n < 2 => {
                return Err(Error::config(format!("max_path_vertices {} must be at least 2", n)));
            }
            n => Some(n as usize),
        };
        Ok(Self {
            rr_depth: rr_depth as usize,
            max_vertices,
        })
    }

    /// Returns `true` if a path with `n` vertices may be extended.
    ///
    /// * `n` - Current number of vertices.
    pub fn allows(&self, n: usize) -> bool {
        self.max_vertices.map_or(true, |m| n < m)
    }
}

/// Create the prototype sampler of a pixel driven renderer. The sampler is
/// selected with `sampler` (default "random") and receives the same
/// parameters.
///
/// * `params`   - Parameter set.
/// * `registry` - The registry.
pub fn create_sampler(params: &ParamSet, registry: &ComponentRegistry) -> Result<Box<dyn Sampler>> {
    let name = params.find_one_string("sampler", "random".to_string());
    registry.create::<dyn Sampler>(&name, params)
}

/// Returns `true` if a throughput can be carried on. NaN or infinite
/// throughputs terminate the path.
///
/// * `throughput` - Path throughput.
#[inline]
pub fn usable_throughput(throughput: &Spectrum) -> bool {
    throughput.is_finite() && !throughput.is_black()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_default_to_unbounded() {
        let limits = PathLimits::from_params(&ParamSet::new()).unwrap();
        assert_eq!(limits, PathLimits::default());
        assert!(limits.allows(1000));
    }

    #[test]
    fn limits_bound_the_vertex_count() {
        let params = ParamSet::new().with_int("rr_depth", 3).with_int("max_path_vertices", 4);
        let limits = PathLimits::from_params(&params).unwrap();
        assert_eq!(limits.rr_depth, 3);
        assert!(limits.allows(3));
        assert!(!limits.allows(4));
    }

    #[test]
    fn invalid_limits_are_config_errors() {
        let negative = ParamSet::new().with_int("rr_depth", -1);
        let short = ParamSet::new().with_int("max_path_vertices", 1);
        assert!(matches!(PathLimits::from_params(&negative), Err(Error::Config(_))));
        assert!(matches!(PathLimits::from_params(&short), Err(Error::Config(_))));
    }

    #[test]
    fn nan_throughput_is_unusable() {
        assert!(usable_throughput(&Spectrum::ONE));
        assert!(!usable_throughput(&Spectrum::ZERO));
        assert!(!usable_throughput(&Spectrum::new(f64::NAN, 1.0, 1.0)));
    }
}
