//! Built-in Scenes

use crate::mesh_loader::RawMesh;
use crate::scene_desc::*;
use core::error::*;
use core::geometry::*;
use core::lm::*;
use core::paramset::ParamSet;
use core::spectrum::Spectrum;

/// Names of the built-in scenes.
pub const BUILTIN_SCENES: [&str; 3] = ["quad", "cornell", "env"];

/// Reflectance of the diffuse quad in the `quad` and `env` scenes.
pub const QUAD_ALBEDO: Float = 0.8;

/// Emitted radiance of the light in the `quad` and `env` scenes.
pub const QUAD_LUMINANCE: Float = 1.0;

/// Returns a built-in scene by name.
///
/// * `name` - One of `BUILTIN_SCENES`.
pub fn builtin_scene(name: &str) -> Result<SceneDesc> {
    match name {
        "quad" => Ok(quad_scene()),
        "cornell" => Ok(cornell_scene()),
        "env" => Ok(environment_scene()),
        _ => Err(Error::config(format!(
            "unknown scene '{}' (expected one of {})",
            name,
            BUILTIN_SCENES.join(", ")
        ))),
    }
}

/// A quad from four corners. The front side follows the right hand rule.
fn quad(corners: [[Float; 3]; 4]) -> MeshDesc {
    MeshDesc::Raw(RawMesh {
        positions: corners.iter().flatten().copied().collect(),
        faces: vec![vec![0, 1, 2, 3]],
        ..RawMesh::default()
    })
}

/// The square [-h, h]^2 in the plane y = `y` facing +y.
fn floor_quad(h: Float, y: Float) -> MeshDesc {
    quad([[-h, y, -h], [-h, y, h], [h, y, h], [h, y, -h]])
}

/// The square [-h, h]^2 in the plane y = `y` facing -y.
fn ceiling_quad(h: Float, y: Float) -> MeshDesc {
    quad([[-h, y, -h], [h, y, -h], [h, y, h], [-h, y, h]])
}

/// A latitude-longitude sphere with outward normals.
///
/// * `center` - Center.
/// * `radius` - Radius.
/// * `slices` - Segments around the y axis.
/// * `stacks` - Segments from pole to pole.
pub fn uv_sphere(center: Vector3f, radius: Float, slices: u32, stacks: u32) -> RawMesh {
    let mut raw = RawMesh::default();
    for i in 0..=stacks {
        let theta = PI * i as Float / stacks as Float;
        for j in 0..=slices {
            let phi = 2.0 * PI * j as Float / slices as Float;
            let n = Vector3f::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
            let p = center + n * radius;
            raw.positions.extend_from_slice(&[p.x, p.y, p.z]);
            raw.normals.extend_from_slice(&[n.x, n.y, n.z]);
        }
    }

    let row = slices + 1;
    for i in 0..stacks {
        for j in 0..slices {
            let a = i * row + j;
            let b = a + row;
            // Skip the triangles that collapse at the poles.
            if i != 0 {
                raw.faces.push(vec![a, a + 1, b]);
            }
            if i != stacks - 1 {
                raw.faces.push(vec![a + 1, b + 1, b]);
            }
        }
    }
    raw
}

fn diffuse(r: Spectrum) -> ParamSet {
    ParamSet::new().with_spectrum("diffuse_reflectance", r)
}

fn luminance(le: Spectrum) -> ParamSet {
    ParamSet::new().with_spectrum("luminance", le)
}

/// A camera at `eye` looking at `center`.
fn camera_node(eye: Vector3f, center: Vector3f, up: Vector3f) -> SceneNode {
    SceneNode::new("camera")
        .with_transform(NodeTransform::LookAt { eye, center, up })
        .with_camera("camera")
}

/// A 2x2 diffuse quad under a 20x20 area light one unit above it, seen from
/// halfway between them. The irradiance at the quad's center is within 1%
/// of that of an infinite light, so the image converges to about
/// `QUAD_LUMINANCE * QUAD_ALBEDO`.
pub fn quad_scene() -> SceneDesc {
    let mut desc = SceneDesc::new();
    desc.add_mesh("quad", floor_quad(1.0, 0.0))
        .add_mesh("light", ceiling_quad(10.0, 1.0))
        .add_bsdf("white", "diffuse", diffuse(Spectrum::splat(QUAD_ALBEDO)))
        .add_bsdf("black", "diffuse", diffuse(Spectrum::ZERO))
        .add_light("light", "area", luminance(Spectrum::splat(QUAD_LUMINANCE)))
        .add_camera("camera", "perspective", ParamSet::new().with_float("fovy", 30.0));
    desc.add_node(SceneNode::new("quad").with_mesh("quad").with_bsdf("white"))
        .add_node(SceneNode::new("light").with_mesh("light").with_bsdf("black").with_light("light"))
        .add_node(camera_node(Vector3f::new(0.0, 0.5, 0.0), Vector3f::ZERO, -Vector3f::Z));
    desc
}

/// The Cornell box: red and green side walls, a small area light under the
/// ceiling, a mirror sphere and a glass sphere.
pub fn cornell_scene() -> SceneDesc {
    let white = Spectrum::new(0.75, 0.75, 0.75);
    let red = Spectrum::new(0.75, 0.25, 0.25);
    let green = Spectrum::new(0.25, 0.75, 0.25);

    let mut desc = SceneDesc::new();
    desc.add_mesh("floor", floor_quad(1.0, -1.0))
        .add_mesh("ceiling", ceiling_quad(1.0, 1.0))
        .add_mesh("back", quad([[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0]]))
        .add_mesh("left", quad([[-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0], [-1.0, -1.0, 1.0]]))
        .add_mesh("right", quad([[1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0]]))
        .add_mesh("light", ceiling_quad(0.25, 0.99))
        .add_mesh("sphere", MeshDesc::Raw(uv_sphere(Vector3f::ZERO, 1.0, 32, 16)))
        .add_bsdf("white", "diffuse", diffuse(white))
        .add_bsdf("red", "diffuse", diffuse(red))
        .add_bsdf("green", "diffuse", diffuse(green))
        .add_bsdf("black", "diffuse", diffuse(Spectrum::ZERO))
        .add_bsdf("mirror", "mirror", ParamSet::new())
        .add_bsdf(
            "glass",
            "dielectric",
            ParamSet::new().with_float("external_ior", 1.0).with_float("internal_ior", 1.5),
        )
        .add_light("light", "area", luminance(Spectrum::splat(12.0)))
        .add_camera("camera", "perspective", ParamSet::new().with_float("fovy", 45.0));

    let sphere = |id: &str, bsdf: &str, x: Float, z: Float| {
        SceneNode::new(id)
            .with_transform(NodeTransform::Trs {
                translate: Vector3f::new(x, -0.65, z),
                rotate: None,
                scale: Vector3f::splat(0.35),
            })
            .with_mesh("sphere")
            .with_bsdf(bsdf)
    };

    desc.add_node(
        SceneNode::new("box")
            .with_child(SceneNode::new("floor").with_mesh("floor").with_bsdf("white"))
            .with_child(SceneNode::new("ceiling").with_mesh("ceiling").with_bsdf("white"))
            .with_child(SceneNode::new("back").with_mesh("back").with_bsdf("white"))
            .with_child(SceneNode::new("left").with_mesh("left").with_bsdf("red"))
            .with_child(SceneNode::new("right").with_mesh("right").with_bsdf("green")),
    )
    .add_node(SceneNode::new("light").with_mesh("light").with_bsdf("black").with_light("light"))
    .add_node(sphere("mirror_sphere", "mirror", -0.45, -0.35))
    .add_node(sphere("glass_sphere", "glass", 0.45, 0.25))
    .add_node(camera_node(Vector3f::new(0.0, 0.0, 3.4), Vector3f::ZERO, Vector3f::Y));
    desc
}

/// A 20x20 diffuse quad under a constant environment, seen from above. The
/// image converges to `QUAD_LUMINANCE * QUAD_ALBEDO`.
pub fn environment_scene() -> SceneDesc {
    let mut desc = SceneDesc::new();
    desc.add_mesh("quad", floor_quad(10.0, 0.0))
        .add_bsdf("white", "diffuse", diffuse(Spectrum::splat(QUAD_ALBEDO)))
        .add_light("sky", "env.const", luminance(Spectrum::splat(QUAD_LUMINANCE)))
        .add_camera("camera", "perspective", ParamSet::new().with_float("fovy", 30.0));
    desc.add_node(SceneNode::new("quad").with_mesh("quad").with_bsdf("white"))
        .add_node(SceneNode::new("sky").with_light("sky"))
        .add_node(camera_node(Vector3f::new(0.0, 1.0, 0.0), Vector3f::ZERO, -Vector3f::Z));
    desc
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
