//! Subpath

use crate::common::*;
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use core::bsdf::*;
use core::camera::*;
use core::geometry::*;
use core::light::*;
use core::lm::*;
use core::pdf::*;
use core::sampler::*;
use core::scene::*;
use core::spectrum::*;
use core::{stat_counter, stat_dist, stat_inc, stat_int_distribution, stat_register_fns};

stat_counter!("Integrator/Subpaths terminated by NaN", NAN_SUBPATHS, subpath_stats_nan);
stat_int_distribution!("Integrator/Subpath vertices", SUBPATH_LENGTH, subpath_stats_length);
stat_register_fns!(subpath_stats_nan, subpath_stats_length);

/// Where a path vertex lies.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VertexKind {
    /// First vertex of a subpath, on a light or on the camera aperture.
    Endpoint,

    /// A surface hit.
    Intermediate,

    /// A point on the world sphere where an eye subpath escaped into the
    /// environment.
    Environment,
}

/// A vertex of a subpath. Besides the geometry the vertex stores the
/// densities full paths need to evaluate every sampling strategy without
/// re-sampling.
#[derive(Clone)]
pub struct PathVertex<'s> {
    /// Vertex kind.
    pub kind: VertexKind,

    /// Transport direction of the subpath the vertex belongs to.
    pub transport_dir: TransportDirection,

    /// Surface geometry.
    pub geom: SurfaceGeometry,

    /// Direction to the previous vertex; zero at endpoints.
    pub wi: Vector3f,

    /// Direction to the next vertex; zero at the last vertex.
    pub wo: Vector3f,

    /// Directional scattering at the vertex. Endpoints use their emitter.
    pub bsdf: &'s dyn GeneralizedBsdf,

    /// Light at the vertex.
    pub light: Option<&'s dyn Light>,

    /// Camera at the vertex.
    pub camera: Option<&'s dyn Camera>,

    /// Positional density of the vertex as an emitter, including the light
    /// selection probability. Zero for vertices that do not emit.
    pub pdf_p: PdfEval,

    /// Directional densities of `wo` (for `transport_dir`) and of `wi` (for
    /// the opposite direction).
    pub pdf_d: PerDirection<PdfEval>,

    /// Russian roulette continuation probability applied after the vertex.
    pub q: Float,

    /// Throughput of the prefix up to and excluding scattering at the vertex.
    pub throughput: Spectrum,

    /// Component sampled at the vertex.
    pub sampled_type: BsdfType,
}

impl<'s> PathVertex<'s> {
    /// Returns `true` if the directional distribution at the vertex is a
    /// Dirac delta.
    pub fn degenerated(&self) -> bool {
        self.bsdf.degenerated()
    }
}

/// A light or eye subpath. Vertices live in a `VertexPool` arena.
pub struct Subpath<'p, 's> {
    /// Transport direction.
    pub transport_dir: TransportDirection,

    /// The vertices starting with the endpoint.
    pub vertices: BumpVec<'p, PathVertex<'s>>,

    /// Raster position the eye subpath was traced through.
    pub raster: Option<Vector2f>,
}

impl<'p, 's> Subpath<'p, 's> {
    /// Trace a subpath.
    ///
    /// * `arena`         - Arena for the vertices.
    /// * `scene`         - The scene.
    /// * `sampler`       - Random numbers.
    /// * `transport_dir` - `LE` for light subpaths, `EL` for eye subpaths.
    /// * `limits`        - Russian roulette depth and maximum vertex count.
    /// * `raster`        - Raster position for eye subpaths; drawn from the
    ///                     sampler when `None`.
    pub fn sample<S: Sampler + ?Sized>(
        arena: &'p Bump,
        scene: &'s Scene,
        sampler: &mut S,
        transport_dir: TransportDirection,
        limits: &PathLimits,
        raster: Option<Vector2f>,
    ) -> Self {
        let mut subpath = Self {
            transport_dir,
            vertices: BumpVec::new_in(arena),
            raster: None,
        };
        if let Some(endpoint) = subpath.sample_endpoint(scene, sampler, raster) {
            subpath.vertices.push(endpoint);
            subpath.extend(scene, sampler, limits);
        }
        stat_dist!(SUBPATH_LENGTH, subpath.vertices.len() as i64);
        subpath
    }

    /// Returns the number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns `true` if the subpath has no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    fn sample_endpoint<S: Sampler + ?Sized>(
        &mut self,
        scene: &'s Scene,
        sampler: &mut S,
        raster: Option<Vector2f>,
    ) -> Option<PathVertex<'s>> {
        let (geom, pdf_p, le0, bsdf, light, camera) = match self.transport_dir {
            TransportDirection::EL => {
                self.raster = Some(raster.unwrap_or_else(|| sampler.next_vec2()));
                let camera = scene.camera();
                let (geom, pdf_p, we0, bsdf) = sample_emitter_position(camera, &sampler.next_vec2(), 1.0)?;
                (geom, pdf_p, we0, bsdf, None, Some(camera))
            }
            TransportDirection::LE => {
                let (light, sel) = scene.sample_light_selection(sampler.next());
                let (geom, pdf_p, le0, bsdf) = sample_emitter_position(light, &sampler.next_vec2(), sel.v)?;
                (geom, pdf_p, le0, bsdf, Some(light), None)
            }
        };
        let throughput = le0 / pdf_p.v;

        Some(PathVertex {
            kind: VertexKind::Endpoint,
            transport_dir: self.transport_dir,
            geom,
            wi: Vector3f::ZERO,
            wo: Vector3f::ZERO,
            bsdf,
            light,
            camera,
            pdf_p,
            pdf_d: PerDirection::default(),
            q: 1.0,
            throughput,
            sampled_type: BsdfType::empty(),
        })
    }

    fn extend<S: Sampler + ?Sized>(&mut self, scene: &'s Scene, sampler: &mut S, limits: &PathLimits) {
        let dir = self.transport_dir;
        let rr_reference = max(limits.rr_depth, 1);

        loop {
            let index = self.vertices.len() - 1;

            // Russian roulette at intermediate vertices.
            let q = if index >= rr_reference && self.vertices[index].kind == VertexKind::Intermediate {
                let reference = self.vertices[rr_reference].throughput.luminance();
                let q = if reference > 0.0 {
                    min(1.0, self.vertices[index].throughput.luminance() / reference)
                } else {
                    1.0
                };
                if sampler.next() > q {
                    break;
                }
                q
            } else {
                1.0
            };

            if !limits.allows(self.vertices.len()) {
                break;
            }

            // Sample the next direction.
            let v = &mut self.vertices[index];
            let endpoint = v.kind == VertexKind::Endpoint;
            let query = BsdfSampleQuery {
                bsdf_type: if endpoint { BsdfType::ALL_EMITTER } else { BsdfType::ALL },
                sample: match (endpoint, dir, self.raster) {
                    (true, TransportDirection::EL, Some(raster)) => raster,
                    _ => sampler.next_vec2(),
                },
                u_comp: sampler.next(),
                transport_dir: dir,
                wi: v.wi,
            };
            let (result, weight) = match v.bsdf.sample_and_estimate_direction(&query, &v.geom) {
                Some(r) => r,
                None => break,
            };
            v.q = q;
            v.wo = result.wo;
            v.sampled_type = result.sampled_type;
            v.pdf_d[dir] = result.pdf;
            if !endpoint {
                let reverse = BsdfEvalQuery::from_sample(&query, &result).reversed();
                v.pdf_d[dir.opposite()] = v.bsdf.evaluate_direction_pdf(&reverse, &v.geom);
            }

            let throughput = v.throughput * weight / q;
            if !throughput.is_finite() {
                stat_inc!(NAN_SUBPATHS, 1);
                warn!("Terminating {:?} subpath with throughput {}", dir, throughput);
                break;
            }
            if throughput.is_black() {
                break;
            }

            // Find the next vertex.
            let mut ray = Ray::spawn(v.geom.p, result.wo);
            let isect = match scene.intersect(&mut ray) {
                Some(isect) => isect,
                None => {
                    if dir == TransportDirection::EL {
                        if let Some(vertex) = environment_vertex(scene, &ray, throughput) {
                            self.vertices.push(vertex);
                        }
                    }
                    break;
                }
            };
            let bsdf = match isect.bsdf() {
                Some(bsdf) => bsdf,
                None => break,
            };
            let light = isect.light();
            let pdf_p = match light {
                Some(l) => {
                    let mut pdf = l.evaluate_position_pdf(&isect.geom);
                    pdf.v *= scene.light_selection_pdf(l).v;
                    pdf
                }
                None => PdfEval::zero(ProbabilityMeasure::Area),
            };

            self.vertices.push(PathVertex {
                kind: VertexKind::Intermediate,
                transport_dir: dir,
                geom: isect.geom,
                wi: -ray.d,
                wo: Vector3f::ZERO,
                bsdf,
                light,
                camera: isect.camera(),
                pdf_p,
                pdf_d: PerDirection::default(),
                q: 1.0,
                throughput,
                sampled_type: BsdfType::empty(),
            });
        }
    }
}

/// Sample a position on an emitter. Returns the geometry, the positional
/// density scaled by the selection probability, the positional emission and
/// the directional distribution of the emitter.
///
/// * `emitter` - The emitter.
/// * `u`       - Sample.
/// * `pdf_sel` - Probability of having selected the emitter.
pub(crate) fn sample_emitter_position<'s, E: Emitter + ?Sized>(
    emitter: &'s E,
    u: &Vector2f,
    pdf_sel: Float,
) -> Option<(SurfaceGeometry, PdfEval, Spectrum, &'s dyn GeneralizedBsdf)> {
    let (geom, mut pdf_p) = emitter.sample_position(u)?;
    pdf_p.v *= pdf_sel;
    if pdf_p.is_zero() {
        return None;
    }
    let e0 = emitter.evaluate_position(&geom);
    Some((geom, pdf_p, e0, emitter.as_generalized_bsdf()))
}

/// Returns the vertex on the world sphere where a ray escapes into the
/// environment, or `None` without an environment light.
///
/// * `scene`      - The scene.
/// * `ray`        - The escaping ray.
/// * `throughput` - Throughput of the prefix.
fn environment_vertex<'s>(scene: &'s Scene, ray: &Ray, throughput: Spectrum) -> Option<PathVertex<'s>> {
    let env = scene.environment_light()?;
    let geom = env.environment_geometry(ray)?;
    let mut pdf_p = env.evaluate_position_pdf(&geom);
    pdf_p.v *= scene.light_selection_pdf(env).v;
    Some(PathVertex {
        kind: VertexKind::Environment,
        transport_dir: TransportDirection::EL,
        geom,
        wi: -ray.d,
        wo: Vector3f::ZERO,
        bsdf: env.as_generalized_bsdf(),
        light: Some(env),
        camera: None,
        pdf_p,
        pdf_d: PerDirection::default(),
        q: 1.0,
        throughput,
        sampled_type: BsdfType::empty(),
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpt::VertexPool;
    use crate::test_scenes::*;
    use core::rng::RngType;
    use float_cmp::approx_eq;
    use samplers::RandomSampler;

    #[test]
    fn light_subpaths_start_on_the_light() {
        let scene = area_light_scene(0.5, 1.0);
        let pool = VertexPool::new();
        let mut sampler = RandomSampler::new(RngType::StandardMt, 3);
        for _ in 0..32 {
            let subpath = Subpath::sample(
                pool.arena(),
                &scene,
                &mut sampler,
                TransportDirection::LE,
                &PathLimits::default(),
                None,
            );
            let x0 = &subpath.vertices[0];
            assert_eq!(x0.kind, VertexKind::Endpoint);
            assert!(x0.light.is_some());
            assert!(approx_eq!(f64, x0.geom.p.y, 1.0, epsilon = 1e-12));
            assert_eq!(x0.pdf_p.measure, ProbabilityMeasure::Area);
            assert!(approx_eq!(f64, x0.pdf_p.v, 0.25, epsilon = 1e-12));
            assert!(subpath.raster.is_none());

            // Light leaves the ceiling downwards and can only hit the floor.
            if subpath.len() > 1 {
                assert!(subpath.vertices[1].geom.p.y.abs() < 1e-9);
                assert!(x0.pdf_d[TransportDirection::LE].v > 0.0);
            }
        }
    }

    #[test]
    fn eye_subpaths_go_through_the_raster_position() {
        let scene = area_light_scene(0.5, 1.0);
        let pool = VertexPool::new();
        let mut sampler = RandomSampler::new(RngType::StandardMt, 5);
        let raster = Vector2f::new(0.25, 0.75);
        let subpath = Subpath::sample(
            pool.arena(),
            &scene,
            &mut sampler,
            TransportDirection::EL,
            &PathLimits::default(),
            Some(raster),
        );
        assert_eq!(subpath.raster, Some(raster));
        let z0 = &subpath.vertices[0];
        assert!(z0.camera.is_some());
        assert_eq!(z0.pdf_p.measure, ProbabilityMeasure::Discrete);
        assert!(approx_eq!(f64, z0.throughput[0], 1.0, epsilon = 1e-12));

        let z1 = &subpath.vertices[1];
        assert_eq!(z1.kind, VertexKind::Intermediate);
        let back = scene.camera().ray_to_raster(&z0.geom.p, &(z1.geom.p - z0.geom.p)).unwrap();
        assert!(approx_eq!(f64, back.x, raster.x, epsilon = 1e-9));
        assert!(approx_eq!(f64, back.y, raster.y, epsilon = 1e-9));
    }

    #[test]
    fn intermediate_vertices_store_both_densities() {
        let scene = area_light_scene(0.8, 1.0);
        let pool = VertexPool::new();
        let mut sampler = RandomSampler::new(RngType::StandardMt, 11);
        for _ in 0..32 {
            let subpath = Subpath::sample(
                pool.arena(),
                &scene,
                &mut sampler,
                TransportDirection::EL,
                &PathLimits::default(),
                None,
            );
            let n = subpath.len();
            for v in subpath.vertices.iter().take(n - 1).skip(1) {
                assert!(v.pdf_d[TransportDirection::EL].v > 0.0);
                assert!(v.pdf_d[TransportDirection::LE].v > 0.0);
                assert!(v.q > 0.0 && v.q <= 1.0);
            }
        }
    }

    #[test]
    fn vertex_count_is_bounded() {
        let scene = area_light_scene(1.0, 1.0);
        let pool = VertexPool::new();
        let mut sampler = RandomSampler::new(RngType::StandardMt, 13);
        let limits = PathLimits {
            rr_depth: 100,
            max_vertices: Some(3),
        };
        for _ in 0..32 {
            let subpath = Subpath::sample(pool.arena(), &scene, &mut sampler, TransportDirection::LE, &limits, None);
            assert!(subpath.len() <= 3);
        }
    }

    #[test]
    fn escaping_eye_subpaths_end_in_the_environment() {
        let scene = environment_scene(0.5, 1.0);
        let pool = VertexPool::new();
        let mut sampler = RandomSampler::new(RngType::StandardMt, 17);
        let limits = PathLimits {
            rr_depth: 100,
            max_vertices: None,
        };
        let subpath = Subpath::sample(pool.arena(), &scene, &mut sampler, TransportDirection::EL, &limits, None);

        // Camera, floor, then the floor reflects into the sky.
        assert_eq!(subpath.len(), 3);
        let last = &subpath.vertices[2];
        assert_eq!(last.kind, VertexKind::Environment);
        assert!(last.light.is_some());
        assert!(last.pdf_p.v > 0.0);
        assert!(approx_eq!(f64, (last.geom.p - scene.bounds().centroid()).length(), 200.0_f64.sqrt(), epsilon = 1e-6));
    }
}
