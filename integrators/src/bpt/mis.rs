//! MIS Weights

use super::fullpath::*;
use core::error::*;
use core::lm::*;
use core::paramset::*;
use core::registry::*;

/// Multiple importance sampling weight of a bidirectional strategy.
pub trait MisWeight: Send + Sync {
    /// Returns the name of the weighting scheme.
    fn name(&self) -> &'static str;

    /// Evaluate the weight of the strategy that produced `path`, i.e. w_{s,t}
    /// with s = `path.s`.
    ///
    /// * `path` - The full path.
    fn evaluate(&self, path: &FullPath) -> Float;
}

impl Component for dyn MisWeight {
    const INTERFACE: &'static str = "mis";
}

/// Uniform weight over the strategies that can sample the path.
#[derive(Copy, Clone, Debug, Default)]
pub struct SimpleMisWeight;

impl MisWeight for SimpleMisWeight {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn evaluate(&self, path: &FullPath) -> Float {
        let n = (0..=path.len()).filter(|&i| !path.fullpath_pdf_is_zero(i)).count();
        1.0 / n as Float
    }
}

/// Power heuristic w_s = p_s^β / Σ p_i^β evaluated with ratios of
/// neighbouring densities. β = 1 is the balance heuristic.
#[derive(Copy, Clone, Debug)]
pub struct PowerMisWeight {
    /// Exponent.
    pub beta: Float,
}

impl PowerMisWeight {
    /// Create a new power heuristic.
    ///
    /// * `beta` - Exponent.
    pub fn new(beta: Float) -> Self {
        Self { beta }
    }
}

impl MisWeight for PowerMisWeight {
    fn name(&self) -> &'static str {
        if self.beta == 1.0 {
            "balance"
        } else {
            "power"
        }
    }

    fn evaluate(&self, path: &FullPath) -> Float {
        let n = path.len();
        let s = path.s;

        // p_s is formed only when a zero density forces a restart.
        let mut ps: Option<Float> = None;
        let mut anchor = |i: usize| -> Float {
            let ps = *ps.get_or_insert_with(|| path.evaluate_fullpath_pdf(s));
            if ps == 0.0 {
                0.0
            } else {
                path.evaluate_fullpath_pdf(i) / ps
            }
        };

        let mut sum = 1.0;

        // Strategies with fewer light vertices.
        let mut pi_div_ps = 1.0;
        let mut prev_pdf_is_zero = false;
        for i in (0..s).rev() {
            if path.fullpath_pdf_is_zero(i) {
                prev_pdf_is_zero = true;
                continue;
            }
            if prev_pdf_is_zero {
                pi_div_ps = anchor(i);
                prev_pdf_is_zero = false;
            } else {
                let ratio = path.evaluate_fullpath_pdf_ratio(i);
                if ratio == 0.0 {
                    break;
                }
                pi_div_ps /= ratio;
            }
            sum += pi_div_ps.powf(self.beta);
        }

        // Strategies with more light vertices.
        pi_div_ps = 1.0;
        prev_pdf_is_zero = false;
        for i in s..n {
            if path.fullpath_pdf_is_zero(i + 1) {
                prev_pdf_is_zero = true;
                continue;
            }
            if prev_pdf_is_zero {
                pi_div_ps = anchor(i + 1);
                prev_pdf_is_zero = false;
            } else {
                let ratio = path.evaluate_fullpath_pdf_ratio(i);
                if ratio == 0.0 {
                    break;
                }
                pi_div_ps *= ratio;
            }
            sum += pi_div_ps.powf(self.beta);
        }

        1.0 / sum
    }
}

/// Power heuristic evaluated by forming every density p_i. Reference for
/// `PowerMisWeight`.
#[derive(Copy, Clone, Debug)]
pub struct PowerNaiveMisWeight {
    /// Exponent.
    pub beta: Float,
}

impl MisWeight for PowerNaiveMisWeight {
    fn name(&self) -> &'static str {
        "powernaive"
    }

    fn evaluate(&self, path: &FullPath) -> Float {
        let ps = path.evaluate_fullpath_pdf(path.s);
        if ps == 0.0 {
            return 0.0;
        }
        let sum: Float = (0..=path.len())
            .filter(|&i| !path.fullpath_pdf_is_zero(i))
            .map(|i| (path.evaluate_fullpath_pdf(i) / ps).powf(self.beta))
            .sum();
        1.0 / sum
    }
}

/// Create the uniform weight.
///
/// * `_params`   - Unused.
/// * `_registry` - Unused.
pub fn create_simple_mis_weight(_params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn MisWeight>> {
    Ok(Box::new(SimpleMisWeight))
}

/// Create the balance heuristic.
///
/// * `_params`   - Unused.
/// * `_registry` - Unused.
pub fn create_balance_mis_weight(_params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn MisWeight>> {
    Ok(Box::new(PowerMisWeight::new(1.0)))
}

/// Create the power heuristic.
///
/// * `params`    - Parameter set; `beta_coeff` defaults to 2.
/// * `_registry` - Unused.
pub fn create_power_mis_weight(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn MisWeight>> {
    let beta = params.find_one_positive_float("beta_coeff", 2.0)?;
    Ok(Box::new(PowerMisWeight::new(beta)))
}

/// Create the naive power heuristic.
///
/// * `params`    - Parameter set; `beta_coeff` defaults to 2.
/// * `_registry` - Unused.
pub fn create_power_naive_mis_weight(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn MisWeight>> {
    let beta = params.find_one_positive_float("beta_coeff", 2.0)?;
    Ok(Box::new(PowerNaiveMisWeight { beta }))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::subpath::*;
    use super::*;
    use crate::test_scenes::*;
    use cameras::{PerspectiveCamera, ProjectiveCameraData};
    use core::bsdf::*;
    use core::camera::Camera;
    use core::geometry::*;
    use core::light::{Emitter, Light};
    use core::pdf::*;
    use core::spectrum::Spectrum;
    use float_cmp::approx_eq;
    use lights::{AreaLight, ConstantEnvironmentLight};
    use materials::{DielectricBsdf, DiffuseBsdf, MirrorBsdf};
    use proptest::prelude::*;

    /// Objects a four vertex path runs through: light, floor, wall, camera.
    struct Fixture {
        light: Box<dyn Light>,
        environment: bool,
        light_surface: DiffuseBsdf,
        floor: DiffuseBsdf,
        wall: Box<dyn GeneralizedBsdf>,
        camera: PerspectiveCamera,
        points: [SurfaceGeometry; 4],
    }

    /// Free parameters of a random path.
    struct Layout {
        /// (x, z) on the ceiling.
        light: (Float, Float),
        /// (x, z) on the floor.
        floor: (Float, Float),
        /// (x, y) on the wall.
        wall: (Float, Float),
        /// 0 diffuse, 1 mirror, 2 dielectric.
        material: usize,
        /// (cos theta, phi / 2 pi) of the environment point, replacing the
        /// ceiling light.
        environment: Option<(Float, Float)>,
    }

    impl Fixture {
        fn new(wall: Box<dyn GeneralizedBsdf>) -> Self {
            let points = [
                SurfaceGeometry::with_normal(Vector3f::new(-0.2, 1.0, 0.1), -Vector3f::Y),
                SurfaceGeometry::with_normal(Vector3f::new(0.3, 0.0, 0.2), Vector3f::Y),
                SurfaceGeometry::with_normal(Vector3f::new(0.2, 0.4, -1.0), Vector3f::Z),
                SurfaceGeometry::degenerated(Vector3f::new(0.0, 0.5, 3.0)),
            ];
            Self::build(ceiling_light(), false, wall, points)
        }

        fn random(layout: &Layout) -> Self {
            let wall: Box<dyn GeneralizedBsdf> = match layout.material {
                0 => Box::new(DiffuseBsdf::new(Spectrum::splat(0.6))),
                1 => Box::new(MirrorBsdf::new(Spectrum::ONE)),
                _ => Box::new(DielectricBsdf::new(Spectrum::ONE, Spectrum::ONE, 1.0, 1.5)),
            };
            let (light, x0) = match layout.environment {
                Some((cos_theta, u)) => {
                    let center = Vector3f::new(0.0, 0.5, 0.0);
                    let radius = 5.0;
                    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
                    let phi = u * TWO_PI;
                    let d = Vector3f::new(sin_theta * phi.cos(), cos_theta, sin_theta * phi.sin());
                    let mut env = ConstantEnvironmentLight::new(Spectrum::ONE);
                    env.configure_world(center, radius);
                    (
                        Box::new(env) as Box<dyn Light>,
                        SurfaceGeometry::with_normal(center + d * radius, -d),
                    )
                }
                None => (
                    ceiling_light(),
                    SurfaceGeometry::with_normal(Vector3f::new(layout.light.0, 1.0, layout.light.1), -Vector3f::Y),
                ),
            };
            let points = [
                x0,
                SurfaceGeometry::with_normal(Vector3f::new(layout.floor.0, 0.0, layout.floor.1), Vector3f::Y),
                SurfaceGeometry::with_normal(Vector3f::new(layout.wall.0, layout.wall.1, -1.0), Vector3f::Z),
                SurfaceGeometry::degenerated(Vector3f::new(0.0, 0.5, 3.0)),
            ];
            Self::build(light, layout.environment.is_some(), wall, points)
        }

        fn build(
            light: Box<dyn Light>,
            environment: bool,
            wall: Box<dyn GeneralizedBsdf>,
            points: [SurfaceGeometry; 4],
        ) -> Self {
            let view = Transform::look_at(&Vector3f::new(0.0, 0.5, 3.0), &Vector3f::new(0.0, 0.5, 0.0), &Vector3f::Y)
                .unwrap();
            let mut camera = PerspectiveCamera::new(ProjectiveCameraData::new(90.0, 1.0).unwrap());
            camera.register_transform(&view.inverse());
            Self {
                light,
                environment,
                light_surface: DiffuseBsdf::new(Spectrum::splat(0.5)),
                floor: DiffuseBsdf::new(Spectrum::splat(0.7)),
                wall,
                camera,
                points,
            }
        }

        fn direction(&self, from: usize, to: usize) -> Vector3f {
            (self.points[to].p - self.points[from].p).normalize()
        }

        /// The vertex x_i as it is stored when x_0..x_{s-1} come from a light
        /// subpath and x_s..x_3 from an eye subpath.
        fn vertex(&self, i: usize, s: usize) -> PathVertex<'_> {
            let on_light_side = i < s;
            let dir = if on_light_side { TransportDirection::LE } else { TransportDirection::EL };
            let endpoint = i == 0 && on_light_side || i == 3;
            let prev = if on_light_side { i.checked_sub(1) } else { Some(i + 1).filter(|&j| j < 4) };
            let next = if on_light_side {
                Some(i + 1).filter(|&j| j < s)
            } else {
                i.checked_sub(1).filter(|&j| j >= s)
            };

            let bsdf: &dyn GeneralizedBsdf = match i {
                0 if endpoint => self.light.as_generalized_bsdf(),
                0 => &self.light_surface,
                1 => &self.floor,
                2 => self.wall.as_ref(),
                _ => self.camera.as_generalized_bsdf(),
            };
            let pdf_p = match i {
                0 => self.light.evaluate_position_pdf(&self.points[0]),
                3 => self.camera.evaluate_position_pdf(&self.points[3]),
                _ => PdfEval::zero(ProbabilityMeasure::Area),
            };
            let wi = prev.map_or(Vector3f::ZERO, |j| self.direction(i, j));
            let wo = next.map_or(Vector3f::ZERO, |j| self.direction(i, j));

            let mut pdf_d = PerDirection::<PdfEval>::default();
            if next.is_some() {
                let mask = if endpoint { BsdfType::ALL_EMITTER } else { BsdfType::ALL };
                let fwd = BsdfEvalQuery::new(mask, dir, wi, wo);
                pdf_d[dir] = bsdf.evaluate_direction_pdf(&fwd, &self.points[i]);
                if !endpoint {
                    pdf_d[dir.opposite()] = bsdf.evaluate_direction_pdf(&fwd.reversed(), &self.points[i]);
                }
            }

            PathVertex {
                kind: if endpoint {
                    VertexKind::Endpoint
                } else if i == 0 && self.environment {
                    VertexKind::Environment
                } else {
                    VertexKind::Intermediate
                },
                transport_dir: dir,
                geom: self.points[i],
                wi,
                wo,
                bsdf,
                light: if i == 0 { Some(self.light.as_ref()) } else { None },
                camera: if i == 3 { Some(&self.camera as &dyn Camera) } else { None },
                pdf_p,
                pdf_d,
                q: 1.0,
                throughput: Spectrum::ONE,
                sampled_type: BsdfType::empty(),
            }
        }

        fn subpaths(&self, s: usize) -> (Vec<PathVertex<'_>>, Vec<PathVertex<'_>>) {
            let light = (0..s).map(|i| self.vertex(i, s)).collect();
            let eye = (s..4).rev().map(|i| self.vertex(i, s)).collect();
            (light, eye)
        }

        fn weights(&self, mis: &dyn MisWeight) -> Vec<Float> {
            (0..4)
                .map(|s| {
                    let (light, eye) = self.subpaths(s);
                    mis.evaluate(&FullPath::new(s, 4 - s, &light, &eye, None))
                })
                .collect()
        }
    }

    fn ceiling_light() -> Box<dyn Light> {
        let mut light = AreaLight::new(Spectrum::splat(4.0));
        light.register_meshes(&[(&ceiling(), &Transform::IDENTITY)]).unwrap();
        Box::new(light)
    }

    fn diffuse_fixture() -> Fixture {
        Fixture::new(Box::new(DiffuseBsdf::new(Spectrum::splat(0.6))))
    }

    #[test]
    fn every_strategy_can_sample_a_diffuse_path() {
        let fixture = diffuse_fixture();
        for s in 0..4 {
            let (light, eye) = fixture.subpaths(s);
            let path = FullPath::new(s, 4 - s, &light, &eye, None);
            for i in 0..4 {
                assert!(!path.fullpath_pdf_is_zero(i), "s = {}, i = {}", s, i);
                assert!(path.evaluate_fullpath_pdf(i) > 0.0, "s = {}, i = {}", s, i);
            }
            assert!(path.fullpath_pdf_is_zero(4));
        }
    }

    #[test]
    fn densities_do_not_depend_on_the_strategy() {
        let fixture = diffuse_fixture();
        let (light, eye) = fixture.subpaths(0);
        let reference = FullPath::new(0, 4, &light, &eye, None);
        for s in 1..4 {
            let (light, eye) = fixture.subpaths(s);
            let path = FullPath::new(s, 4 - s, &light, &eye, None);
            for i in 0..4 {
                let p = path.evaluate_fullpath_pdf(i);
                let q = reference.evaluate_fullpath_pdf(i);
                assert!(approx_eq!(f64, p, q, epsilon = 1e-9 * q), "s = {}, i = {}: {} != {}", s, i, p, q);
            }
        }
    }

    #[test]
    fn ratios_match_naive_densities() {
        let fixture = diffuse_fixture();
        let (light, eye) = fixture.subpaths(2);
        let path = FullPath::new(2, 2, &light, &eye, None);
        for i in 0..3 {
            let naive = path.evaluate_fullpath_pdf(i + 1) / path.evaluate_fullpath_pdf(i);
            let ratio = path.evaluate_fullpath_pdf_ratio(i);
            assert!(approx_eq!(f64, ratio, naive, epsilon = 1e-9 * naive), "i = {}", i);
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let fixture = diffuse_fixture();
        let schemes: Vec<Box<dyn MisWeight>> = vec![
            Box::new(SimpleMisWeight),
            Box::new(PowerMisWeight::new(1.0)),
            Box::new(PowerMisWeight::new(2.0)),
            Box::new(PowerNaiveMisWeight { beta: 2.0 }),
        ];
        for mis in schemes.iter() {
            let sum: Float = fixture.weights(mis.as_ref()).iter().sum();
            assert!(approx_eq!(f64, sum, 1.0, epsilon = 1e-6), "{}: {}", mis.name(), sum);
        }
    }

    #[test]
    fn iterative_power_heuristic_matches_naive() {
        let fixture = diffuse_fixture();
        for beta in &[1.0, 2.0, 3.0] {
            let iterative = fixture.weights(&PowerMisWeight::new(*beta));
            let naive = fixture.weights(&PowerNaiveMisWeight { beta: *beta });
            for (a, b) in iterative.iter().zip(naive.iter()) {
                assert!(approx_eq!(f64, *a, *b, epsilon = 1e-6 * b), "beta {}: {} != {}", beta, a, b);
            }
        }
    }

    #[test]
    fn specular_vertices_leave_one_strategy() {
        // With a mirror on the wall only strategies that do not connect at the
        // wall can sample the path.
        let fixture = Fixture::new(Box::new(MirrorBsdf::new(Spectrum::ONE)));
        let (light, eye) = fixture.subpaths(1);
        let path = FullPath::new(1, 3, &light, &eye, None);
        assert!(path.fullpath_pdf_is_zero(2));
        assert!(path.fullpath_pdf_is_zero(3));
        assert!(!path.fullpath_pdf_is_zero(1));

        for mis in &[PowerMisWeight::new(2.0), PowerMisWeight::new(1.0)] {
            let w1 = mis.evaluate(&path);
            assert!(w1 > 0.0 && w1 <= 1.0);
        }
        let simple = SimpleMisWeight.evaluate(&path);
        assert!(approx_eq!(f64, simple, 0.5, epsilon = 1e-12));
    }

    #[test]
    fn factories_read_the_exponent() {
        let params = ParamSet::new().with_float("beta_coeff", 3.0);
        let registry = ComponentRegistry::new();
        let power = create_power_mis_weight(&params, &registry).unwrap();
        assert_eq!(power.name(), "power");
        let balance = create_balance_mis_weight(&params, &registry).unwrap();
        assert_eq!(balance.name(), "balance");
        let bad = ParamSet::new().with_float("beta_coeff", -1.0);
        assert!(create_power_mis_weight(&bad, &registry).is_err());
    }

    proptest! {
        #[test]
        fn weights_sum_to_one_over_random_paths(
            light in (-0.5..0.5f64, -0.5..0.5f64),
            floor in (-0.8..0.8f64, -0.8..0.8f64),
            wall in (-0.8..0.8f64, 0.1..0.9f64),
            material in 0usize..3,
            environment in prop::option::of((0.2..1.0f64, 0.0..1.0f64)),
        ) {
            let fixture = Fixture::random(&Layout { light, floor, wall, material, environment });
            let schemes: Vec<Box<dyn MisWeight>> = vec![
                Box::new(SimpleMisWeight),
                Box::new(PowerMisWeight::new(1.0)),
                Box::new(PowerMisWeight::new(2.0)),
                Box::new(PowerNaiveMisWeight { beta: 2.0 }),
            ];

            // Only strategies that can produce the path carry weight.
            let (light_path, eye_path) = fixture.subpaths(0);
            let reference = FullPath::new(0, 4, &light_path, &eye_path, None);
            let strategies: Vec<usize> = (0..4).filter(|&s| reference.evaluate_fullpath_pdf(s) > 0.0).collect();
            prop_assert!(strategies.contains(&0) && strategies.contains(&1));
            if material == 0 {
                prop_assert_eq!(strategies.len(), 4);
            }

            for mis in schemes.iter() {
                let weights = fixture.weights(mis.as_ref());
                let sum: Float = strategies.iter().map(|&s| weights[s]).sum();
                prop_assert!(approx_eq!(f64, sum, 1.0, epsilon = 1e-6), "{}: {}", mis.name(), sum);
            }

            for beta in &[1.0, 2.0, 3.0] {
                let iterative = fixture.weights(&PowerMisWeight::new(*beta));
                let naive = fixture.weights(&PowerNaiveMisWeight { beta: *beta });
                for &s in strategies.iter() {
                    let (a, b) = (iterative[s], naive[s]);
                    prop_assert!(approx_eq!(f64, a, b, epsilon = 1e-6 * b + 1e-12), "beta {}, s = {}: {} != {}", beta, s, a, b);
                }
            }
        }
    }
}
