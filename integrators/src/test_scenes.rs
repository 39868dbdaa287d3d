//! Small scenes shared by the renderer tests.

use accelerators::NaiveAccel;
use cameras::{PerspectiveCamera, ProjectiveCameraData};
use core::camera::Camera;
use core::experiment::Experiments;
use core::film::Film;
use core::geometry::*;
use core::light::Light;
use core::lm::*;
use core::mesh::TriangleMesh;
use core::primitive::Primitive;
use core::renderer::{RenderContext, Renderer};
use core::scene::Scene;
use core::scheduler::SchedulerConfig;
use core::spectrum::Spectrum;
use lights::{AreaLight, ConstantEnvironmentLight};
use materials::DiffuseBsdf;
use std::sync::Arc;

/// A quad from four corners in counter clockwise order around its normal.
pub fn quad(corners: [Vector3f; 4]) -> TriangleMesh {
    TriangleMesh::from_polygons(corners.to_vec(), vec![], vec![], &[vec![0, 1, 2, 3]]).unwrap()
}

/// The square [-h, h]^2 in the y = 0 plane facing +y.
pub fn floor(h: Float) -> TriangleMesh {
    quad([
        Vector3f::new(-h, 0.0, -h),
        Vector3f::new(-h, 0.0, h),
        Vector3f::new(h, 0.0, h),
        Vector3f::new(h, 0.0, -h),
    ])
}

/// The square [-1, 1]^2 in the y = 1 plane facing -y.
pub fn ceiling() -> TriangleMesh {
    quad([
        Vector3f::new(-1.0, 1.0, -1.0),
        Vector3f::new(1.0, 1.0, -1.0),
        Vector3f::new(1.0, 1.0, 1.0),
        Vector3f::new(-1.0, 1.0, 1.0),
    ])
}

/// A pinhole camera at `eye` looking straight down.
pub fn camera_looking_down(eye: Vector3f, fovy: Float) -> Primitive {
    let view = Transform::look_at(&eye, &(eye - Vector3f::Y), &-Vector3f::Z).unwrap();
    let mut camera = PerspectiveCamera::new(ProjectiveCameraData::new(fovy, 1.0).unwrap());
    camera.register_transform(&view.inverse());
    let mut primitive = Primitive::new("camera", Transform::IDENTITY);
    primitive.camera = Some(Arc::new(camera));
    primitive
}

fn diffuse_floor(h: Float, albedo: Float) -> Primitive {
    let mut primitive = Primitive::new("floor", Transform::IDENTITY);
    primitive.mesh = Some(Arc::new(floor(h)));
    primitive.bsdf = Some(Arc::new(DiffuseBsdf::new(Spectrum::splat(albedo))));
    primitive
}

/// A large diffuse floor under a constant environment, seen from above. Every
/// pixel converges to `albedo * le`.
pub fn environment_scene(albedo: Float, le: Float) -> Scene {
    let floor = diffuse_floor(10.0, albedo);
    let bounds = floor.mesh.as_ref().unwrap().world_bounds(&floor.transform);
    let (center, radius) = bounds.bounding_sphere();

    let mut light = ConstantEnvironmentLight::new(Spectrum::splat(le));
    light.configure_world(center, radius);
    let mut env = Primitive::new("env", Transform::IDENTITY);
    env.light = Some(Arc::new(light));

    let camera = camera_looking_down(Vector3f::new(0.0, 1.0, 0.0), 30.0);
    Scene::new(vec![floor, env, camera], Box::new(NaiveAccel::new())).unwrap()
}

/// A diffuse floor lit by a quad light of the same size one unit above it.
/// The camera sits halfway between them.
pub fn area_light_scene(albedo: Float, le: Float) -> Scene {
    let floor = diffuse_floor(1.0, albedo);

    let mesh = ceiling();
    let mut light = AreaLight::new(Spectrum::splat(le));
    light.register_meshes(&[(&mesh, &Transform::IDENTITY)]).unwrap();
    let mut ceiling = Primitive::new("light", Transform::IDENTITY);
    ceiling.mesh = Some(Arc::new(mesh));
    ceiling.light = Some(Arc::new(light));
    ceiling.bsdf = Some(Arc::new(DiffuseBsdf::new(Spectrum::splat(0.5))));

    let camera = camera_looking_down(Vector3f::new(0.0, 0.5, 0.0), 60.0);
    Scene::new(vec![floor, ceiling, camera], Box::new(NaiveAccel::new())).unwrap()
}

/// A quiet two thread configuration with `spp` samples per pixel.
pub fn scheduler_config(spp: u64) -> SchedulerConfig {
    SchedulerConfig {
        num_samples: spp,
        num_threads: 2,
        tile_size: 4,
        samples_per_block: 64,
        seed: 7,
        quiet: true,
        ..SchedulerConfig::default()
    }
}

/// Render a `size` x `size` film.
pub fn render(renderer: &dyn Renderer, scene: &Scene, size: usize, spp: u64) -> Film {
    let config = scheduler_config(spp);
    let experiments = Experiments::new();
    let ctx = RenderContext::new(scene, &config, &experiments);
    let mut film = Film::new(size, size);
    renderer.render(&ctx, &mut film).unwrap();
    film
}

/// Returns the mean luminance of a film.
pub fn mean_luminance(film: &Film) -> Float {
    film.pixels().iter().map(|p| p.luminance()).sum::<Float>() / film.pixels().len() as Float
}
