//! Common

use crate::geometry::*;
use crate::lm::*;
use crate::pdf::*;

/// Uniformly sample a direction on the hemisphere about the z-axis.
///
/// * `u` - The random sample point.
pub fn uniform_sample_hemisphere(u: &Vector2f) -> Vector3f {
    let z = u[0];
    let r = max(0.0, 1.0 - z * z).sqrt();
    let phi = TWO_PI * u[1];
    Vector3f::new(r * phi.cos(), r * phi.sin(), z)
}

/// Returns the PDF for uniformly sampling a direction from a hemisphere.
#[inline]
pub fn uniform_hemisphere_pdf() -> PdfEval {
    PdfEval::new(INV_TWO_PI, ProbabilityMeasure::SolidAngle)
}

/// Uniformly sample a direction from a sphere.
///
/// * `u` - The random sample point.
pub fn uniform_sample_sphere(u: &Vector2f) -> Vector3f {
    let z = 1.0 - 2.0 * u[0];
    let r = max(0.0, 1.0 - z * z).sqrt();
    let phi = TWO_PI * u[1];
    Vector3f::new(r * phi.cos(), r * phi.sin(), z)
}

/// Returns the PDF for uniformly sampling a direction from a sphere.
#[inline]
pub fn uniform_sphere_pdf() -> PdfEval {
    PdfEval::new(INV_FOUR_PI, ProbabilityMeasure::SolidAngle)
}

/// Sample a point on a unit disk by mapping from a unit square to the unit
/// circle. The concentric mapping takes points in [-1, 1]^2 to unit disk by
/// uniformly mapping concentric squares to concentric circles.
///
/// * `u` - The random sample point.
pub fn concentric_sample_disk(u: &Vector2f) -> Vector2f {
    // Map uniform random numbers to [-1,1]^2.
    let u_offset = 2.0 * *u - Vector2f::new(1.0, 1.0);

    // Handle degeneracy at the origin.
    if u_offset.x == 0.0 && u_offset.y == 0.0 {
        return Vector2f::zero();
    }

    // Apply concentric mapping to point
    let (r, theta) = if abs(u_offset.x) > abs(u_offset.y) {
        (u_offset.x, PI_OVER_FOUR * (u_offset.y / u_offset.x))
    } else {
        (u_offset.y, PI_OVER_TWO - PI_OVER_FOUR * (u_offset.x / u_offset.y))
    };

    r * Vector2f::new(theta.cos(), theta.sin())
}

/// Returns the PDF of `concentric_sample_disk` on the unit disk.
#[inline]
pub fn concentric_disk_pdf() -> PdfEval {
    PdfEval::new(INV_PI, ProbabilityMeasure::Area)
}

/// Uniformly sample barycentric coordinates `(b1, b2)` on a triangle. The
/// point is `p0 * (1 - b1 - b2) + p1 * b1 + p2 * b2`.
///
/// * `u` - The random sample point.
pub fn uniform_sample_triangle(u: &Vector2f) -> Vector2f {
    let su0 = max(0.0, u[0]).sqrt();
    Vector2f::new(1.0 - su0, u[1] * su0)
}

/// Sample a direction on a hemisphere using cosine-weighted sampling.
///
/// * `u` - The random sample point.
#[inline]
pub fn cosine_sample_hemisphere(u: &Vector2f) -> Vector3f {
    let d = concentric_sample_disk(u);
    let z = max(0.0, 1.0 - d.x * d.x - d.y * d.y).sqrt();
    Vector3f::new(d.x, d.y, z)
}

/// Returns the solid angle PDF for cosine-weighted hemisphere sampling.
///
/// * `d` - Local direction.
#[inline]
pub fn cosine_hemisphere_pdf(d: &Vector3f) -> PdfEval {
    PdfEval::new(INV_PI * cos_theta_z_up(d), ProbabilityMeasure::SolidAngle)
}

/// Returns the projected solid angle PDF for cosine-weighted hemisphere
/// sampling; it is the constant 1/π.
#[inline]
pub fn cosine_hemisphere_pdf_projected() -> PdfEval {
    PdfEval::new(INV_PI, ProbabilityMeasure::ProjectedSolidAngle)
}

/// Weight samples using the balance heuristic.
///
/// * `f_pdf` - First sampling distribution.
/// * `g_pdf` - Second sampling distribution.
#[inline]
pub fn balance_heuristic(f_pdf: Float, g_pdf: Float) -> Float {
    if f_pdf + g_pdf == 0.0 {
        0.0
    } else {
        f_pdf / (f_pdf + g_pdf)
    }
}

/// Weight samples using the power heuristic with β = 2.
///
/// * `f_pdf` - First sampling distribution.
/// * `g_pdf` - Second sampling distribution.
#[inline]
pub fn power_heuristic(f_pdf: Float, g_pdf: Float) -> Float {
    let f = f_pdf * f_pdf;
    let g = g_pdf * g_pdf;
    if f + g == 0.0 {
        0.0
    } else {
        f / (f + g)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::*;

    const N: usize = 1_000_000;

    fn fraction<F: Fn(&Vector2f) -> bool>(pred: F) -> Float {
        let mut rng = Mt19937::new(17);
        let hits = (0..N).filter(|_| pred(&rng.next_vec2())).count();
        hits as Float / N as Float
    }

    fn assert_within_one_percent(estimate: Float, expected: Float) {
        assert!(
            (estimate - expected).abs() <= 0.01 * expected,
            "{} vs {}",
            estimate,
            expected
        );
    }

    #[test]
    fn disk_is_uniform_in_area() {
        // Monte Carlo estimate of the unit disk area from the inner disk of
        // radius 1/2 which covers a quarter of it.
        let f = fraction(|u| concentric_sample_disk(u).length_squared() < 0.25);
        assert_within_one_percent(0.25 * PI / f, PI);
    }

    #[test]
    fn sphere_is_uniform_in_solid_angle() {
        // The cap z > 1/2 has area π.
        let f = fraction(|u| uniform_sample_sphere(u).z > 0.5);
        assert_within_one_percent(PI / f, FOUR_PI);
    }

    #[test]
    fn hemisphere_is_uniform_in_solid_angle() {
        let f = fraction(|u| uniform_sample_hemisphere(u).z > 0.5);
        assert_within_one_percent(PI / f, TWO_PI);
    }

    #[test]
    fn cosine_hemisphere_matches_projected_area() {
        // Projected solid angle of the cone θ < 60° is π sin²(60°) = 3π/4 out
        // of π for the whole hemisphere.
        let f = fraction(|u| cosine_sample_hemisphere(u).z > 0.5);
        assert_within_one_percent(0.75 * PI / f, PI);
    }

    #[test]
    fn triangle_is_uniform_in_area() {
        // The sub-triangle where b1 + b2 < 1/2 covers a quarter of the area.
        let f = fraction(|u| {
            let b = uniform_sample_triangle(u);
            b.x + b.y < 0.5
        });
        assert_within_one_percent(0.125 / f, 0.5);
    }

    #[test]
    fn heuristics_sum_to_one() {
        assert!((power_heuristic(0.3, 0.7) + power_heuristic(0.7, 0.3) - 1.0).abs() < 1e-12);
        assert!((balance_heuristic(0.3, 0.7) + balance_heuristic(0.7, 0.3) - 1.0).abs() < 1e-12);
        assert_eq!(power_heuristic(0.0, 0.0), 0.0);
    }
}
