//! Naive Accelerator

use crate::triaccel::*;
use core::accelerator::*;
use core::error::*;
use core::geometry::*;
use core::paramset::*;
use core::primitive::*;
use core::registry::*;

/// Tests every triangle against every ray. Used as the reference for the
/// hierarchies.
#[derive(Clone, Debug, Default)]
pub struct NaiveAccel {
    /// Triangle test records.
    triangles: Vec<TriAccel>,
}

impl NaiveAccel {
    /// Create an empty accelerator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of triangles.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// Returns `true` if there are no triangles.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

impl Accelerator for NaiveAccel {
    fn build(&mut self, primitives: &[Primitive]) -> Result<()> {
        let triangles = collect_triangles(primitives);
        self.triangles = build_tri_accels(&triangles);
        info!("Naive accelerator created for {} triangles", self.triangles.len());
        Ok(())
    }

    fn intersect(&self, ray: &mut Ray) -> Option<TriangleHit> {
        let mut result = None;
        for tri in self.triangles.iter() {
            if let Some(hit) = tri.hit(ray) {
                ray.max_t = hit.t;
                result = Some(hit);
            }
        }
        result
    }
}

/// Create a naive accelerator.
///
/// * `_params`   - Unused.
/// * `_registry` - Unused.
pub fn create_naive_accel(_params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn Accelerator>> {
    Ok(Box::new(NaiveAccel::new()))
}
