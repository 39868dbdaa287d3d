//! Environment Lights

use core::bsdf::*;
use core::error::*;
use core::geometry::*;
use core::image_io::*;
use core::light::*;
use core::lm::*;
use core::paramset::*;
use core::pdf::*;
use core::registry::*;
use core::sampling::*;
use core::spectrum::*;

/// Sphere bounding the scene. Environment lights emit inwards from it.
#[derive(Copy, Clone, Debug, Default)]
struct WorldSphere {
    center: Vector3f,
    radius: Float,
}

impl WorldSphere {
    fn area(&self) -> Float {
        FOUR_PI * self.radius * self.radius
    }

    fn sample(&self, u: &Vector2f) -> Option<(SurfaceGeometry, PdfEval)> {
        if self.radius <= 0.0 {
            return None;
        }
        let d = uniform_sample_sphere(u);
        Some((
            SurfaceGeometry::with_normal(self.center + d * self.radius, -d),
            self.pdf(),
        ))
    }

    fn pdf(&self) -> PdfEval {
        if self.radius > 0.0 {
            PdfEval::new(1.0 / self.area(), ProbabilityMeasure::Area)
        } else {
            PdfEval::zero(ProbabilityMeasure::Area)
        }
    }
}

/// Returns `true` if light leaves the sphere point inwards along `wo`.
fn emits_inwards(bsdf_type: BsdfType, dir: TransportDirection, geom: &SurfaceGeometry, wo: &Vector3f) -> bool {
    bsdf_type.matches(BsdfType::LIGHT_DIRECTION) && dir == TransportDirection::LE && wo.dot(&geom.gn) > 0.0
}

/// Uniform radiance arriving from every direction.
#[derive(Clone, Debug)]
pub struct ConstantEnvironmentLight {
    /// Radiance.
    pub le: Spectrum,

    sphere: WorldSphere,
}

impl ConstantEnvironmentLight {
    /// Create a new `ConstantEnvironmentLight`.
    ///
    /// * `le` - Radiance.
    pub fn new(le: Spectrum) -> Self {
        Self {
            le,
            sphere: WorldSphere::default(),
        }
    }
}

impl GeneralizedBsdf for ConstantEnvironmentLight {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::LIGHT_DIRECTION
    }

    fn sample_direction(&self, query: &BsdfSampleQuery, geom: &SurfaceGeometry) -> Option<BsdfSampleResult> {
        if !query.bsdf_type.matches(BsdfType::LIGHT_DIRECTION) || query.transport_dir != TransportDirection::LE {
            return None;
        }
        let local_wo = cosine_sample_hemisphere(&query.sample);
        Some(BsdfSampleResult {
            sampled_type: BsdfType::LIGHT_DIRECTION,
            wo: geom.to_world(&local_wo),
            pdf: cosine_hemisphere_pdf_projected(),
        })
    }

    fn evaluate_direction(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> Spectrum {
        if emits_inwards(query.bsdf_type, query.transport_dir, geom, &query.wo) {
            Spectrum::splat(INV_PI)
        } else {
            Spectrum::ZERO
        }
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval {
        if emits_inwards(query.bsdf_type, query.transport_dir, geom, &query.wo) {
            cosine_hemisphere_pdf_projected()
        } else {
            PdfEval::zero(ProbabilityMeasure::ProjectedSolidAngle)
        }
    }
}

impl Emitter for ConstantEnvironmentLight {
    fn sample_position(&self, sample: &Vector2f) -> Option<(SurfaceGeometry, PdfEval)> {
        self.sphere.sample(sample)
    }

    fn evaluate_position(&self, _geom: &SurfaceGeometry) -> Spectrum {
        self.le * PI
    }

    fn evaluate_position_pdf(&self, _geom: &SurfaceGeometry) -> PdfEval {
        self.sphere.pdf()
    }

    fn as_generalized_bsdf(&self) -> &dyn GeneralizedBsdf {
        self
    }
}

impl Light for ConstantEnvironmentLight {
    fn power(&self) -> Float {
        self.le.luminance() * PI * self.sphere.area()
    }

    fn environment(&self) -> bool {
        true
    }

    fn configure_world(&mut self, center: Vector3f, radius: Float) {
        self.sphere = WorldSphere { center, radius };
    }

    fn environment_geometry(&self, ray: &Ray) -> Option<SurfaceGeometry> {
        exit_sphere(ray, &self.sphere.center, self.sphere.radius)
    }
}

/// Maps a direction to latitude-longitude coordinates in [0, 1]^2. The
/// direction `+y` maps to the top row.
///
/// * `w` - Unit direction.
pub fn direction_to_lat_long(w: &Vector3f) -> Vector2f {
    let mut phi = w.x.atan2(w.z);
    if phi < 0.0 {
        phi += TWO_PI;
    }
    let theta = clamp(w.y, -1.0, 1.0).acos();
    Vector2f::new(phi * INV_TWO_PI, theta * INV_PI)
}

/// Maps latitude-longitude coordinates back to a unit direction.
///
/// * `uv` - Coordinates in [0, 1]^2.
pub fn lat_long_to_direction(uv: &Vector2f) -> Vector3f {
    let phi = uv.x * TWO_PI;
    let theta = uv.y * PI;
    let sin_theta = theta.sin();
    Vector3f::new(sin_theta * phi.sin(), theta.cos(), sin_theta * phi.cos())
}

/// Radiance from a latitude-longitude image, importance sampled by luminance.
#[derive(Clone, Debug)]
pub struct BitmapEnvironmentLight {
    /// The environment map.
    image: RGBImage,

    /// Radiance multiplier.
    scale: Float,

    /// Pixel selection proportional to luminance times sin(theta).
    distribution: DiscreteDistribution2D,

    /// Solid angle weighted average luminance.
    average_luminance: Float,

    sphere: WorldSphere,
}

impl BitmapEnvironmentLight {
    /// Create a new `BitmapEnvironmentLight`.
    ///
    /// * `image` - Latitude-longitude environment map.
    /// * `scale` - Radiance multiplier.
    pub fn new(image: RGBImage, scale: Float) -> Result<Self> {
        if image.width == 0 || image.height == 0 {
            return Err(Error::config("environment map is empty"));
        }

        let mut weights = Vec::with_capacity(image.width * image.height);
        let mut total_sin = 0.0;
        for y in 0..image.height {
            let sin_theta = ((y as Float + 0.5) / image.height as Float * PI).sin();
            total_sin += sin_theta * image.width as Float;
            for x in 0..image.width {
                weights.push(max(0.0, image.pixel(x, y).luminance()) * sin_theta);
            }
        }
        let total: Float = weights.iter().sum();
        if total <= 0.0 {
            return Err(Error::config("environment map has no emission"));
        }

        let distribution = DiscreteDistribution2D::new(&weights, image.width, image.height);
        debug!(
            "Environment map {}x{} with average luminance {}",
            image.width,
            image.height,
            total / total_sin
        );
        Ok(Self {
            average_luminance: scale * total / total_sin,
            image,
            scale,
            distribution,
            sphere: WorldSphere::default(),
        })
    }

    /// Returns the radiance seen when looking along `w`.
    ///
    /// * `w` - Unit direction pointing away from the scene.
    pub fn lookup(&self, w: &Vector3f) -> Spectrum {
        let uv = direction_to_lat_long(w);
        let x = min((uv.x * self.image.width as Float) as usize, self.image.width - 1);
        let y = min((uv.y * self.image.height as Float) as usize, self.image.height - 1);
        self.image.pixel(x, y) * self.scale
    }

    /// Returns the solid angle density of sampling the look direction `w`.
    fn direction_pdf(&self, w: &Vector3f) -> Float {
        let uv = direction_to_lat_long(w);
        let sin_theta = (uv.y * PI).sin();
        if sin_theta <= 0.0 {
            return 0.0;
        }
        self.distribution.pdf_continuous(&uv) / (2.0 * PI * PI * sin_theta)
    }
}

impl GeneralizedBsdf for BitmapEnvironmentLight {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::LIGHT_DIRECTION
    }

    fn sample_direction(&self, query: &BsdfSampleQuery, geom: &SurfaceGeometry) -> Option<BsdfSampleResult> {
        if !query.bsdf_type.matches(BsdfType::LIGHT_DIRECTION) || query.transport_dir != TransportDirection::LE {
            return None;
        }
        let (uv, pdf_uv) = self.distribution.sample_continuous(query.sample.x, query.sample.y);
        let sin_theta = (uv.y * PI).sin();
        if pdf_uv == 0.0 || sin_theta <= 0.0 {
            return None;
        }

        // Light travels opposite to the look direction.
        let wo = -lat_long_to_direction(&uv);
        let cos = wo.dot(&geom.gn);
        if cos <= 0.0 {
            return None;
        }
        let pdf_w = pdf_uv / (2.0 * PI * PI * sin_theta);
        Some(BsdfSampleResult {
            sampled_type: BsdfType::LIGHT_DIRECTION,
            wo,
            pdf: PdfEval::new(pdf_w / cos, ProbabilityMeasure::ProjectedSolidAngle),
        })
    }

    fn evaluate_direction(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> Spectrum {
        if emits_inwards(query.bsdf_type, query.transport_dir, geom, &query.wo) {
            self.lookup(&-query.wo) * INV_PI
        } else {
            Spectrum::ZERO
        }
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval {
        if emits_inwards(query.bsdf_type, query.transport_dir, geom, &query.wo) {
            let cos = query.wo.dot(&geom.gn);
            PdfEval::new(self.direction_pdf(&-query.wo) / cos, ProbabilityMeasure::ProjectedSolidAngle)
        } else {
            PdfEval::zero(ProbabilityMeasure::ProjectedSolidAngle)
        }
    }
}

impl Emitter for BitmapEnvironmentLight {
    fn sample_position(&self, sample: &Vector2f) -> Option<(SurfaceGeometry, PdfEval)> {
        self.sphere.sample(sample)
    }

    fn evaluate_position(&self, _geom: &SurfaceGeometry) -> Spectrum {
        Spectrum::splat(PI)
    }

    fn evaluate_position_pdf(&self, _geom: &SurfaceGeometry) -> PdfEval {
        self.sphere.pdf()
    }

    fn as_generalized_bsdf(&self) -> &dyn GeneralizedBsdf {
        self
    }
}

impl Light for BitmapEnvironmentLight {
    fn power(&self) -> Float {
        self.average_luminance * PI * self.sphere.area()
    }

    fn environment(&self) -> bool {
        true
    }

    fn configure_world(&mut self, center: Vector3f, radius: Float) {
        self.sphere = WorldSphere { center, radius };
    }

    fn environment_geometry(&self, ray: &Ray) -> Option<SurfaceGeometry> {
        exit_sphere(ray, &self.sphere.center, self.sphere.radius)
    }
}

/// Create a constant environment light from parameters.
///
/// * `params`    - Parameter set; `luminance` is required.
/// * `_registry` - Unused.
pub fn create_constant_environment_light(
    params: &ParamSet,
    _registry: &ComponentRegistry,
) -> Result<Box<dyn Light>> {
    let le = params.get_spectrum("luminance")?;
    if le.has_negative() {
        return Err(Error::config(format!("negative luminance {}", le)));
    }
    Ok(Box::new(ConstantEnvironmentLight::new(le)))
}

/// Create a bitmap environment light from parameters.
///
/// * `params`    - Parameter set; `path` is required, `scale` defaults to 1.
/// * `_registry` - Unused.
pub fn create_bitmap_environment_light(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn Light>> {
    let path = params.get_string("path")?;
    let scale = params.find_one_positive_float("scale", 1.0)?;
    let image = read_image(&path).map_err(|e| {
        error!("Failed to load environment map {}: {}", path, e);
        Error::missing_asset("environment map", path.as_str())
    })?;
    Ok(Box::new(BitmapEnvironmentLight::new(image, scale)?))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
