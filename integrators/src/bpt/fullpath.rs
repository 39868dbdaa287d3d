//! Full Path

use super::subpath::*;
use core::bsdf::*;
use core::geometry::*;
use core::lm::*;
use core::pdf::*;
use core::scene::*;
use core::spectrum::*;

/// A full path made by connecting the first `s` vertices of a light subpath
/// with the first `t` vertices of an eye subpath. Vertices are numbered
/// x_0 (on the light side) to x_{s+t-1} (the eye endpoint).
pub struct FullPath<'a, 's> {
    /// Number of light subpath vertices.
    pub s: usize,

    /// Number of eye subpath vertices.
    pub t: usize,

    /// Light subpath vertices.
    light: &'a [PathVertex<'s>],

    /// Eye subpath vertices.
    eye: &'a [PathVertex<'s>],

    /// Raster position of the eye subpath.
    raster: Option<Vector2f>,

    /// Directional densities at x_{s-1} after connecting.
    pdf_dl: PerDirection<PdfEval>,

    /// Directional densities at x_s after connecting.
    pdf_de: PerDirection<PdfEval>,
}

impl<'a, 's> FullPath<'a, 's> {
    /// Connect two subpaths. Requires `s + t >= 2`, `t >= 1`, `s <= light.len()`
    /// and `t <= eye.len()`.
    ///
    /// * `s`      - Number of light subpath vertices.
    /// * `t`      - Number of eye subpath vertices.
    /// * `light`  - Light subpath vertices.
    /// * `eye`    - Eye subpath vertices.
    /// * `raster` - Raster position of the eye subpath.
    pub fn new(
        s: usize,
        t: usize,
        light: &'a [PathVertex<'s>],
        eye: &'a [PathVertex<'s>],
        raster: Option<Vector2f>,
    ) -> Self {
        debug_assert!(s + t >= 2 && t >= 1 && s <= light.len() && t <= eye.len());

        let mut pdf_dl = PerDirection::<PdfEval>::default();
        let mut pdf_de = PerDirection::<PdfEval>::default();
        let z = &eye[t - 1];
        let z_prev = if t >= 2 { Some(&eye[t - 2]) } else { None };

        if s == 0 {
            if let (Some(l), Some(zp)) = (z.light, z_prev) {
                pdf_de[TransportDirection::LE] = if zp.geom.degenerated {
                    PdfEval::zero(ProbabilityMeasure::ProjectedSolidAngle)
                } else {
                    let q = BsdfEvalQuery::new(BsdfType::LIGHT_DIRECTION, TransportDirection::LE, Vector3f::ZERO, z.wi);
                    l.evaluate_direction_pdf(&q, &z.geom)
                };
            }
        } else {
            let y = &light[s - 1];
            let y_prev = if s >= 2 { Some(&light[s - 2]) } else { None };
            let yz = (z.geom.p - y.geom.p).normalize();

            pdf_dl[TransportDirection::LE] = y.bsdf.evaluate_direction_pdf(
                &BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::LE, y.wi, yz),
                &y.geom,
            );
            if y_prev.is_some() {
                pdf_dl[TransportDirection::EL] = y.bsdf.evaluate_direction_pdf(
                    &BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::EL, yz, y.wi),
                    &y.geom,
                );
            }

            pdf_de[TransportDirection::EL] = z.bsdf.evaluate_direction_pdf(
                &BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::EL, z.wi, -yz),
                &z.geom,
            );
            if z_prev.is_some() {
                pdf_de[TransportDirection::LE] = z.bsdf.evaluate_direction_pdf(
                    &BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::LE, -yz, z.wi),
                    &z.geom,
                );
            }
        }

        Self {
            s,
            t,
            light,
            eye,
            raster,
            pdf_dl,
            pdf_de,
        }
    }

    /// Returns the number of vertices.
    pub fn len(&self) -> usize {
        self.s + self.t
    }

    /// Returns `true` if the path has no vertices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns vertex x_i.
    ///
    /// * `i` - Vertex index in [0, s + t).
    pub fn vertex(&self, i: usize) -> &PathVertex<'s> {
        if i < self.s {
            &self.light[i]
        } else {
            &self.eye[self.t - 1 - (i - self.s)]
        }
    }

    /// Returns the density of sampling the direction leaving x_i towards
    /// x_{i+1} (`LE`) or x_{i-1} (`EL`).
    ///
    /// * `i`   - Vertex index.
    /// * `dir` - Transport direction.
    fn direction_pdf(&self, i: usize, dir: TransportDirection) -> PdfEval {
        if self.s > 0 && i == self.s - 1 {
            self.pdf_dl[dir]
        } else if i == self.s {
            self.pdf_de[dir]
        } else {
            self.vertex(i).pdf_d[dir]
        }
    }

    fn geometry_term(&self, i: usize, j: usize) -> Float {
        generalized_geometry_term(&self.vertex(i).geom, &self.vertex(j).geom)
    }

    /// Evaluate the contribution C*_{s,t} without MIS weight together with
    /// the raster position it belongs to. Returns `None` when the strategy
    /// cannot connect the subpaths or the contribution is zero.
    ///
    /// * `scene` - The scene.
    pub fn evaluate_unweighted_contribution(&self, scene: &Scene) -> Option<(Vector2f, Spectrum)> {
        let s = self.s;
        let t = self.t;
        let z = &self.eye[t - 1];

        let alpha_l = if s == 0 { Spectrum::ONE } else { self.light[s - 1].throughput };
        let alpha_e = z.throughput;

        let c = if s == 0 {
            // The eye subpath hit a light.
            let light = z.light?;
            let le0 = light.evaluate_position(&z.geom);
            let q = BsdfEvalQuery::new(BsdfType::ALL_EMITTER, TransportDirection::LE, Vector3f::ZERO, z.wi);
            le0 * light.evaluate_direction(&q, &z.geom)
        } else {
            let y = &self.light[s - 1];
            if y.degenerated() || z.degenerated() || z.kind == VertexKind::Environment {
                return None;
            }
            let yz = (z.geom.p - y.geom.p).normalize();
            let fs_l = y.bsdf.evaluate_direction(
                &BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::LE, y.wi, yz),
                &y.geom,
            );
            if fs_l.is_black() {
                return None;
            }
            let fs_e = z.bsdf.evaluate_direction(
                &BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::EL, z.wi, -yz),
                &z.geom,
            );
            if fs_e.is_black() {
                return None;
            }
            let g = generalized_geometry_term(&y.geom, &z.geom);
            if g == 0.0 || !scene.visible(&y.geom.p, &z.geom.p) {
                return None;
            }
            fs_l * fs_e * g
        };

        let contribution = alpha_l * c * alpha_e;
        if contribution.is_black() {
            return None;
        }

        let raster = if t == 1 {
            let y = &self.light[s - 1];
            scene.camera().ray_to_raster(&z.geom.p, &(y.geom.p - z.geom.p).normalize())?
        } else {
            self.raster?
        };
        Some((raster, contribution))
    }

    /// Returns `true` if strategy `i` cannot sample the path, i.e. p_i is
    /// zero regardless of the stored densities.
    ///
    /// * `i` - Strategy index in [0, s + t].
    pub fn fullpath_pdf_is_zero(&self, i: usize) -> bool {
        let n = self.len();
        if i == self.s {
            false
        } else if i == 0 {
            let x0 = self.vertex(0);
            x0.light.is_none() || x0.geom.degenerated
        } else if i == n {
            // The aperture is not part of the scene geometry.
            true
        } else {
            self.vertex(i - 1).degenerated() || self.vertex(i).degenerated()
        }
    }

    /// Evaluate the area measure density p_i of sampling the path with `i`
    /// light subpath vertices by forming the product of every factor.
    ///
    /// * `i` - Strategy index in [0, s + t].
    pub fn evaluate_fullpath_pdf(&self, i: usize) -> Float {
        let n = self.len();
        if i > 0 && i < n && (self.vertex(i - 1).degenerated() || self.vertex(i).degenerated()) {
            return 0.0;
        }
        if i == n {
            return 0.0;
        }

        let mut p = 1.0;
        if i > 0 {
            p *= self.vertex(0).pdf_p.v;
            for j in 0..i - 1 {
                p *= self.direction_pdf(j, TransportDirection::LE).v * self.geometry_term(j, j + 1);
            }
        }
        if i < n {
            p *= self.vertex(n - 1).pdf_p.v;
            for j in (i + 1..n).rev() {
                p *= self.direction_pdf(j, TransportDirection::EL).v * self.geometry_term(j, j - 1);
            }
        }

        if p > INFINITY * 1e-7 || p.is_nan() {
            0.0
        } else {
            p
        }
    }

    /// Evaluate p_{i+1} / p_i from the factors the two densities do not
    /// share. Returns 0 when the denominator vanishes.
    ///
    /// * `i` - Strategy index in [0, s + t).
    pub fn evaluate_fullpath_pdf_ratio(&self, i: usize) -> Float {
        let n = self.len();
        let (num, denom) = if i == 0 {
            (
                self.vertex(0).pdf_p.v,
                self.direction_pdf(1, TransportDirection::EL).v * self.geometry_term(1, 0),
            )
        } else if i == n - 1 {
            (
                self.direction_pdf(n - 2, TransportDirection::LE).v * self.geometry_term(n - 2, n - 1),
                self.vertex(n - 1).pdf_p.v,
            )
        } else {
            (
                self.direction_pdf(i - 1, TransportDirection::LE).v * self.geometry_term(i - 1, i),
                self.direction_pdf(i + 1, TransportDirection::EL).v * self.geometry_term(i + 1, i),
            )
        };

        if abs(denom) < EPS {
            0.0
        } else {
            num / denom
        }
    }
}
