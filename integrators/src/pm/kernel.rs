//! Photon Density Estimation Kernels

use super::photon_map::Photon;
use core::error::*;
use core::geometry::*;
use core::lm::*;
use core::paramset::*;
use core::registry::*;

/// Filter weighting photons by their distance to the query point. Divided by
/// the squared search radius a kernel integrates to about one over the disk
/// of that radius.
pub trait PhotonDensityKernel: Send + Sync {
    /// Returns the kernel name.
    fn name(&self) -> &'static str;

    /// Evaluate the kernel for a photon within the search radius.
    ///
    /// * `p`         - Query point.
    /// * `photon`    - The photon.
    /// * `max_dist2` - Squared search radius.
    fn evaluate(&self, p: &Vector3f, photon: &Photon, max_dist2: Float) -> Float;
}

impl Component for dyn PhotonDensityKernel {
    const INTERFACE: &'static str = "pm_kernel";
}

/// Cone filter with slope constant k = 1.1.
#[derive(Copy, Clone, Debug, Default)]
pub struct ConeKernel;

impl ConeKernel {
    const K: Float = 1.1;
}

impl PhotonDensityKernel for ConeKernel {
    fn name(&self) -> &'static str {
        "cone"
    }

    fn evaluate(&self, p: &Vector3f, photon: &Photon, max_dist2: Float) -> Float {
        let dist = (*p - photon.p).length();
        let t = 1.0 - dist / (Self::K * max_dist2.sqrt());
        t / (1.0 - 2.0 / (3.0 * Self::K)) * INV_PI
    }
}

/// Gaussian filter.
#[derive(Copy, Clone, Debug, Default)]
pub struct GaussianKernel;

impl GaussianKernel {
    const ALPHA: Float = 1.818;
    const BETA: Float = 1.953;
}

impl PhotonDensityKernel for GaussianKernel {
    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn evaluate(&self, p: &Vector3f, photon: &Photon, max_dist2: Float) -> Float {
        let dist2 = (*p - photon.p).length_squared();
        let t = 1.0 - (-Self::BETA * dist2 / (2.0 * max_dist2)).exp();
        Self::ALPHA * (1.0 - t / (1.0 - (-Self::BETA).exp())) * INV_PI
    }
}

/// Simpson's kernel 3/π (1 - d²/r²)².
#[derive(Copy, Clone, Debug, Default)]
pub struct SimpsonKernel;

impl PhotonDensityKernel for SimpsonKernel {
    fn name(&self) -> &'static str {
        "simpson"
    }

    fn evaluate(&self, p: &Vector3f, photon: &Photon, max_dist2: Float) -> Float {
        let s = 1.0 - (photon.p - *p).length_squared() / max_dist2;
        3.0 * INV_PI * s * s
    }
}

/// Create a cone kernel.
///
/// * `_params`   - Parameter set (unused).
/// * `_registry` - The registry (unused).
pub fn create_cone_kernel(_params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn PhotonDensityKernel>> {
    Ok(Box::new(ConeKernel))
}

/// Create a Gaussian kernel.
///
/// * `_params`   - Parameter set (unused).
/// * `_registry` - The registry (unused).
pub fn create_gaussian_kernel(
    _params: &ParamSet,
    _registry: &ComponentRegistry,
) -> Result<Box<dyn PhotonDensityKernel>> {
    Ok(Box::new(GaussianKernel))
}

/// Create Simpson's kernel.
///
/// * `_params`   - Parameter set (unused).
/// * `_registry` - The registry (unused).
pub fn create_simpson_kernel(
    _params: &ParamSet,
    _registry: &ComponentRegistry,
) -> Result<Box<dyn PhotonDensityKernel>> {
    Ok(Box::new(SimpsonKernel))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    /// Integrate k / r² over the disk of radius r with the midpoint rule.
    fn integrate_over_disk(kernel: &dyn PhotonDensityKernel, r: Float) -> Float {
        let n = 10_000;
        let dr = r / n as Float;
        let p = Vector3f::ZERO;
        (0..n)
            .map(|i| {
                let rho = (i as Float + 0.5) * dr;
                let photon = Photon {
                    p: Vector3f::new(rho, 0.0, 0.0),
                    ..Photon::default()
                };
                kernel.evaluate(&p, &photon, r * r) / (r * r) * 2.0 * PI * rho * dr
            })
            .sum()
    }

    #[test]
    fn cone_and_simpson_are_normalized() {
        for r in [0.1, 1.0, 3.0] {
            assert!(approx_eq!(f64, integrate_over_disk(&ConeKernel, r), 1.0, epsilon = 1e-4));
            assert!(approx_eq!(f64, integrate_over_disk(&SimpsonKernel, r), 1.0, epsilon = 1e-4));
        }
    }

    #[test]
    fn gaussian_is_nearly_normalized() {
        let v = integrate_over_disk(&GaussianKernel, 0.5);
        assert!((v - 1.0).abs() < 0.1, "integral {}", v);
    }

    #[test]
    fn kernels_decrease_with_distance() {
        let kernels: [&dyn PhotonDensityKernel; 3] = [&ConeKernel, &GaussianKernel, &SimpsonKernel];
        for kernel in kernels {
            let near = Photon {
                p: Vector3f::new(0.1, 0.0, 0.0),
                ..Photon::default()
            };
            let far = Photon {
                p: Vector3f::new(0.9, 0.0, 0.0),
                ..Photon::default()
            };
            let a = kernel.evaluate(&Vector3f::ZERO, &near, 1.0);
            let b = kernel.evaluate(&Vector3f::ZERO, &far, 1.0);
            assert!(a > b && b >= 0.0, "{} {} {}", kernel.name(), a, b);
        }
    }
}
