//! Scene

use crate::accelerator::*;
use crate::camera::*;
use crate::error::*;
use crate::geometry::*;
use crate::light::*;
use crate::lm::*;
use crate::pdf::*;
use crate::primitive::*;
use crate::sampling::*;
use crate::{stat_counter, stat_inc, stat_register_fns};
use std::sync::Arc;

stat_counter!("Acceleration/Rays cast", N_RAYS, ray_stats);
stat_register_fns!(ray_stats);

/// The renderable scene: primitives, the acceleration structure over their
/// triangles, and the emitters found on them.
pub struct Scene {
    /// Primitives.
    primitives: Vec<Primitive>,

    /// Acceleration structure.
    accel: Box<dyn Accelerator>,

    /// Distinct lights.
    lights: Vec<ArcLight>,

    /// Light selection distribution by emitted power.
    light_distribution: DiscreteDistribution1D,

    /// Index of the environment light.
    environment: Option<usize>,

    /// The camera.
    camera: ArcCamera,

    /// Bounding box of all triangles.
    bounds: Bounds3f,
}

impl Scene {
    /// Assemble a scene and build its acceleration structure. Fails when the
    /// scene has no camera, more than one camera, more than one environment
    /// light, or no light at all.
    ///
    /// * `primitives` - The primitives.
    /// * `accel`      - Unbuilt acceleration structure.
    pub fn new(primitives: Vec<Primitive>, mut accel: Box<dyn Accelerator>) -> Result<Self> {
        register_stats();

        let mut cameras = primitives.iter().filter_map(|p| p.camera.clone());
        let camera = cameras
            .next()
            .ok_or_else(|| Error::config("scene has no camera"))?;
        if cameras.next().is_some() {
            return Err(Error::config("scene has more than one camera"));
        }

        let mut lights: Vec<ArcLight> = vec![];
        for light in primitives.iter().filter_map(|p| p.light.as_ref()) {
            if !lights.iter().any(|l| Arc::ptr_eq(l, light)) {
                lights.push(Arc::clone(light));
            }
        }
        if lights.is_empty() {
            return Err(Error::config("scene has no light"));
        }

        let mut env = lights.iter().enumerate().filter(|(_, l)| l.environment()).map(|(i, _)| i);
        let environment = env.next();
        if env.next().is_some() {
            return Err(Error::config("scene has more than one environment light"));
        }

        let mut light_distribution = DiscreteDistribution1D::new();
        for light in lights.iter() {
            light_distribution.add(light.power());
        }
        if light_distribution.normalize() <= 0.0 {
            return Err(Error::config("total emitted power of the scene is zero"));
        }

        let bounds = primitives
            .iter()
            .filter_map(|p| p.mesh.as_ref().map(|m| m.world_bounds(&p.transform)))
            .fold(Bounds3f::EMPTY, |b, pb| b.union(&pb));

        accel.build(&primitives)?;
        info!(
            "Scene: {} primitives, {} lights{}",
            primitives.len(),
            lights.len(),
            if environment.is_some() { " (with environment)" } else { "" }
        );

        Ok(Self {
            primitives,
            accel,
            lights,
            light_distribution,
            environment,
            camera,
            bounds,
        })
    }

    /// Find the closest intersection of a ray with the scene. On a hit
    /// `ray.max_t` is set to the hit distance.
    ///
    /// * `ray` - The ray.
    pub fn intersect(&self, ray: &mut Ray) -> Option<Intersection<'_>> {
        stat_inc!(N_RAYS, 1);
        let hit = self.accel.intersect(ray)?;
        let primitive = &self.primitives[hit.primitive];
        let mut geom = primitive.surface_geometry(hit.face, &hit.b)?;
        geom.p = ray.at(hit.t);
        Some(Intersection {
            geom,
            primitive,
            primitive_index: hit.primitive,
            face: hit.face,
            b: hit.b,
            t: hit.t,
        })
    }

    /// Returns `true` if the segment between two points is unoccluded.
    ///
    /// * `p1` - First point.
    /// * `p2` - Second point.
    pub fn visible(&self, p1: &Vector3f, p2: &Vector3f) -> bool {
        match Ray::shadow(*p1, *p2) {
            Some(mut ray) => {
                stat_inc!(N_RAYS, 1);
                self.accel.intersect(&mut ray).is_none()
            }
            None => false,
        }
    }

    /// Returns the primitives.
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Returns the camera.
    pub fn camera(&self) -> &dyn Camera {
        self.camera.as_ref()
    }

    /// Returns the distinct lights.
    pub fn lights(&self) -> &[ArcLight] {
        &self.lights
    }

    /// Returns the environment light if the scene has one.
    pub fn environment_light(&self) -> Option<&dyn Light> {
        self.environment.map(|i| self.lights[i].as_ref())
    }

    /// Returns the bounding box of all triangles.
    pub fn bounds(&self) -> Bounds3f {
        self.bounds
    }

    /// Select a light proportionally to its power.
    ///
    /// * `u` - Uniform random number.
    pub fn sample_light_selection(&self, u: Float) -> (&dyn Light, PdfEval) {
        let i = self.light_distribution.sample(u);
        (
            self.lights[i].as_ref(),
            PdfEval::new(self.light_distribution.pdf(i), ProbabilityMeasure::Discrete),
        )
    }

    /// Returns the probability of selecting a light. Lights that are not part
    /// of the scene have probability zero.
    ///
    /// * `light` - The light.
    pub fn light_selection_pdf(&self, light: &dyn Light) -> PdfEval {
        let p = light as *const dyn Light as *const u8;
        match self.lights.iter().position(|l| Arc::as_ptr(l) as *const u8 == p) {
            Some(i) => PdfEval::new(self.light_distribution.pdf(i), ProbabilityMeasure::Discrete),
            None => PdfEval::zero(ProbabilityMeasure::Discrete),
        }
    }
}
