//! Scene Description

use crate::mesh_loader::*;
use core::accelerator::Accelerator;
use core::bsdf::*;
use core::camera::*;
use core::error::*;
use core::geometry::*;
use core::light::*;
use core::lm::*;
use core::mesh::TriangleMesh;
use core::paramset::*;
use core::primitive::Primitive;
use core::registry::ComponentRegistry;
use core::scene::Scene;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Local transformation of a scene node.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeTransform {
    /// No transformation.
    Identity,

    /// A row-major 4x4 matrix.
    Matrix([[Float; 4]; 4]),

    /// Scale, then rotate `angle` degrees about `axis`, then translate.
    Trs {
        translate: Vector3f,
        rotate: Option<(Vector3f, Float)>,
        scale: Vector3f,
    },

    /// Place a camera at `eye` looking at `center`. The node's local -z axis
    /// points at `center`.
    LookAt { eye: Vector3f, center: Vector3f, up: Vector3f },
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self::Identity
    }
}

impl NodeTransform {
    /// A translation.
    ///
    /// * `t` - Translation.
    pub fn translate(t: Vector3f) -> Self {
        Self::Trs {
            translate: t,
            rotate: None,
            scale: Vector3f::splat(1.0),
        }
    }

    /// Returns the transformation. Fails for singular matrices and
    /// degenerate look-at frames.
    pub fn to_transform(&self) -> Result<Transform> {
        match self {
            Self::Identity => Ok(Transform::IDENTITY),
            Self::Matrix(m) => Transform::from_matrix(Matrix4x4::new(*m))
                .ok_or_else(|| Error::config(format!("singular node transform {:?}", m))),
            Self::Trs {
                translate,
                rotate,
                scale,
            } => {
                let r = match rotate {
                    Some((axis, angle)) => {
                        if axis.length_squared() == 0.0 {
                            return Err(Error::config("rotation axis has zero length"));
                        }
                        Transform::rotate(*angle, axis)
                    }
                    None => Transform::IDENTITY,
                };
                if scale.x == 0.0 || scale.y == 0.0 || scale.z == 0.0 {
                    return Err(Error::config(format!("singular scale {:?}", scale)));
                }
                Ok(Transform::translate(translate) * r * Transform::scale(scale))
            }
            Self::LookAt { eye, center, up } => Transform::look_at(eye, center, up)
                .map(|view| view.inverse())
                .ok_or_else(|| Error::config("degenerate look-at transform")),
        }
    }
}

/// An implementation name with its parameters, resolved through the
/// component registry.
#[derive(Clone, Debug, Default)]
pub struct ComponentDesc {
    /// Implementation name, e.g. "diffuse" or "area".
    pub name: String,

    /// Parameters passed to the factory.
    pub params: ParamSet,
}

impl ComponentDesc {
    /// Create a new `ComponentDesc`.
    ///
    /// * `name`   - Implementation name.
    /// * `params` - Parameters.
    pub fn new(name: &str, params: ParamSet) -> Self {
        Self {
            name: name.to_string(),
            params,
        }
    }
}

/// Where a mesh comes from.
#[derive(Clone, Debug)]
pub enum MeshDesc {
    /// Inline data.
    Raw(RawMesh),

    /// A Wavefront OBJ file.
    Obj(String),
}

impl MeshDesc {
    /// Load the mesh.
    pub fn load(&self) -> Result<TriangleMesh> {
        match self {
            Self::Raw(raw) => load_raw_mesh(raw),
            Self::Obj(path) => load_obj(path),
        }
    }
}

/// A node of the scene tree. Asset references are ids into the tables of
/// the enclosing `SceneDesc`.
#[derive(Clone, Debug, Default)]
pub struct SceneNode {
    /// Node id.
    pub id: String,

    /// Transformation relative to the parent.
    pub transform: NodeTransform,

    /// Mesh id.
    pub mesh: Option<String>,

    /// BSDF id. Required when the node has a mesh.
    pub bsdf: Option<String>,

    /// Light id.
    pub light: Option<String>,

    /// Camera id.
    pub camera: Option<String>,

    /// Child nodes.
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// Create an empty node.
    ///
    /// * `id` - Node id.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    /// Set the local transformation.
    pub fn with_transform(mut self, transform: NodeTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Reference a mesh.
    pub fn with_mesh(mut self, id: &str) -> Self {
        self.mesh = Some(id.to_string());
        self
    }

    /// Reference a BSDF.
    pub fn with_bsdf(mut self, id: &str) -> Self {
        self.bsdf = Some(id.to_string());
        self
    }

    /// Reference a light.
    pub fn with_light(mut self, id: &str) -> Self {
        self.light = Some(id.to_string());
        self
    }

    /// Reference a camera.
    pub fn with_camera(mut self, id: &str) -> Self {
        self.camera = Some(id.to_string());
        self
    }

    /// Append a child node.
    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// Returns `true` if the node becomes a primitive.
    fn is_instance(&self) -> bool {
        self.mesh.is_some() || self.light.is_some() || self.camera.is_some()
    }
}

/// A node with its world transformation.
struct FlatNode<'a> {
    node: &'a SceneNode,
    transform: Transform,
}

/// Scene description: asset tables and the node tree that instances them.
#[derive(Clone, Debug)]
pub struct SceneDesc {
    /// Meshes by id.
    pub meshes: BTreeMap<String, MeshDesc>,

    /// BSDFs by id.
    pub bsdfs: BTreeMap<String, ComponentDesc>,

    /// Lights by id.
    pub lights: BTreeMap<String, ComponentDesc>,

    /// Cameras by id.
    pub cameras: BTreeMap<String, ComponentDesc>,

    /// Acceleration structure.
    pub accelerator: ComponentDesc,

    /// Radius of the sphere lights at infinity emit from. Defaults to the
    /// bounding sphere of the meshes.
    pub world_radius: Option<Float>,

    /// Root of the node tree.
    pub root: SceneNode,
}

impl Default for SceneDesc {
    fn default() -> Self {
        Self {
            meshes: BTreeMap::new(),
            bsdfs: BTreeMap::new(),
            lights: BTreeMap::new(),
            cameras: BTreeMap::new(),
            accelerator: ComponentDesc::new("qbvh", ParamSet::new()),
            world_radius: None,
            root: SceneNode::new("root"),
        }
    }
}

macro_rules! add_asset {
    ($func: ident, $table: ident, $kind: literal) => {
        /// Add or replace a component asset.
        ///
        /// * `id`     - Asset id.
        /// * `name`   - Implementation name.
        /// * `params` - Parameters.
        pub fn $func(&mut self, id: &str, name: &str, params: ParamSet) -> &mut Self {
            if self.$table.insert(id.to_string(), ComponentDesc::new(name, params)).is_some() {
                warn!("{} '{}' redefined", $kind, id);
            }
            self
        }
    };
}

impl SceneDesc {
    /// Create an empty description that uses the QBVH.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a mesh.
    ///
    /// * `id`   - Asset id.
    /// * `mesh` - Mesh source.
    pub fn add_mesh(&mut self, id: &str, mesh: MeshDesc) -> &mut Self {
        if self.meshes.insert(id.to_string(), mesh).is_some() {
            warn!("Mesh '{}' redefined", id);
        }
        self
    }

    add_asset!(add_bsdf, bsdfs, "BSDF");
    add_asset!(add_light, lights, "Light");
    add_asset!(add_camera, cameras, "Camera");

    /// Select the acceleration structure.
    ///
    /// * `name`   - Implementation name.
    /// * `params` - Parameters.
    pub fn set_accelerator(&mut self, name: &str, params: ParamSet) -> &mut Self {
        self.accelerator = ComponentDesc::new(name, params);
        self
    }

    /// Add a node under the root.
    ///
    /// * `node` - The node.
    pub fn add_node(&mut self, node: SceneNode) -> &mut Self {
        self.root.children.push(node);
        self
    }

    /// Assemble the scene. Every reference is checked before any component
    /// is created. Cameras without an explicit `aspect` get `aspect`.
    ///
    /// * `registry` - Component registry.
    /// * `aspect`   - Width / height of the film.
    pub fn build(&self, registry: &ComponentRegistry, aspect: Float) -> Result<Scene> {
        let mut nodes = vec![];
        flatten(&self.root, &Transform::IDENTITY, &mut nodes)?;
        self.validate(&nodes)?;

        // Load the meshes that are instanced.
        let mut meshes: HashMap<&str, Arc<TriangleMesh>> = HashMap::new();
        for id in nodes.iter().filter_map(|n| n.node.mesh.as_deref()) {
            if !meshes.contains_key(id) {
                let mesh = self.meshes[id].load()?;
                meshes.insert(id, Arc::new(mesh));
            }
        }

        let mut bsdfs: HashMap<&str, ArcBsdf> = HashMap::new();
        for id in nodes.iter().filter_map(|n| n.node.bsdf.as_deref()) {
            if !bsdfs.contains_key(id) {
                let desc = &self.bsdfs[id];
                let bsdf = registry.create::<dyn GeneralizedBsdf>(&desc.name, &desc.params)?;
                bsdfs.insert(id, Arc::from(bsdf));
            }
        }

        let bounds = nodes
            .iter()
            .filter_map(|n| n.node.mesh.as_deref().map(|id| meshes[id].world_bounds(&n.transform)))
            .fold(Bounds3f::EMPTY, |b, mb| b.union(&mb));
        let (center, sphere_radius) = bounds.bounding_sphere();
        let radius = match self.world_radius {
            Some(r) if r > 0.0 => r,
            Some(r) => return Err(Error::config(format!("world radius {} must be positive", r))),
            None if sphere_radius > 0.0 => sphere_radius,
            None => {
                warn!("Scene has no geometry; using a unit world radius");
                1.0
            }
        };

        // A light is created once and bound to the meshes of every node
        // that references it.
        let mut lights: HashMap<&str, ArcLight> = HashMap::new();
        for id in nodes.iter().filter_map(|n| n.node.light.as_deref()) {
            if lights.contains_key(id) {
                continue;
            }
            let desc = &self.lights[id];
            let mut light = registry.create::<dyn Light>(&desc.name, &desc.params)?;
            let bound: Vec<(&TriangleMesh, &Transform)> = nodes
                .iter()
                .filter(|n| n.node.light.as_deref() == Some(id))
                .filter_map(|n| {
                    n.node
                        .mesh
                        .as_deref()
                        .map(|m| (meshes[m].as_ref(), &n.transform))
                })
                .collect();
            light.register_meshes(&bound).map_err(|e| match e {
                Error::Config(msg) => Error::config(format!("light '{}': {}", id, msg)),
                e => e,
            })?;
            light.configure_world(center, radius);
            lights.insert(id, Arc::from(light));
        }

        let mut primitives = Vec::with_capacity(nodes.len());
        for n in nodes.iter().filter(|n| n.node.is_instance()) {
            let mut primitive = Primitive::new(&n.node.id, n.transform);
            primitive.mesh = n.node.mesh.as_deref().map(|id| Arc::clone(&meshes[id]));
            primitive.bsdf = n.node.bsdf.as_deref().map(|id| Arc::clone(&bsdfs[id]));
            primitive.light = n.node.light.as_deref().map(|id| Arc::clone(&lights[id]));
            if let Some(id) = n.node.camera.as_deref() {
                let desc = &self.cameras[id];
                let mut params = desc.params.clone();
                if !params.floats.contains_key("aspect") {
                    params.add_float("aspect", &[aspect]);
                }
                let mut camera = registry.create::<dyn Camera>(&desc.name, &params)?;
                camera.register_transform(&n.transform);
                primitive.camera = Some(Arc::from(camera));
            }
            primitives.push(primitive);
        }

        let accel = registry.create::<dyn Accelerator>(&self.accelerator.name, &self.accelerator.params)?;
        Scene::new(primitives, accel)
    }

    /// Check asset references, node ids and the mesh/BSDF pairing.
    fn validate(&self, nodes: &[FlatNode]) -> Result<()> {
        let mut ids: HashMap<&str, usize> = HashMap::new();
        for n in nodes.iter() {
            let node = n.node;
            *ids.entry(node.id.as_str()).or_insert(0) += 1;

            check_reference(&self.meshes, &node.mesh, "mesh")?;
            check_reference(&self.bsdfs, &node.bsdf, "bsdf")?;
            check_reference(&self.lights, &node.light, "light")?;
            check_reference(&self.cameras, &node.camera, "camera")?;

            if node.mesh.is_some() && node.bsdf.is_none() {
                return Err(Error::config(format!("node '{}' has a mesh but no bsdf", node.id)));
            }
        }
        for (id, count) in ids.into_iter().filter(|(_, c)| *c > 1) {
            warn!("Node id '{}' is used {} times", id, count);
        }
        Ok(())
    }
}

/// Fail with a missing asset error for a dangling reference.
fn check_reference<T>(table: &BTreeMap<String, T>, id: &Option<String>, kind: &'static str) -> Result<()> {
    match id {
        Some(id) if !table.contains_key(id) => Err(Error::missing_asset(kind, id.as_str())),
        _ => Ok(()),
    }
}

/// Collect the nodes of a tree in depth first order with their world
/// transformations M_world = M_parent · M_local.
fn flatten<'a>(node: &'a SceneNode, parent: &Transform, out: &mut Vec<FlatNode<'a>>) -> Result<()> {
    let local = node
        .transform
        .to_transform()
        .map_err(|e| Error::config(format!("node '{}': {}", node.id, e)))?;
    let transform = *parent * local;
    out.push(FlatNode { node, transform });
    for child in node.children.iter() {
        flatten(child, &transform, out)?;
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use core::spectrum::Spectrum;
    use float_cmp::approx_eq;

    fn quad_mesh() -> MeshDesc {
        MeshDesc::Raw(RawMesh {
            positions: vec![-1.0, 0.0, -1.0, -1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0, -1.0],
            faces: vec![vec![0, 1, 2, 3]],
            ..RawMesh::default()
        })
    }

    fn desc() -> SceneDesc {
        let mut desc = SceneDesc::new();
        desc.add_mesh("quad", quad_mesh())
            .add_bsdf(
                "white",
                "diffuse",
                ParamSet::new().with_spectrum("diffuse_reflectance", Spectrum::splat(0.8)),
            )
            .add_light("sky", "env.const", ParamSet::new().with_spectrum("luminance", Spectrum::ONE))
            .add_camera("cam", "perspective", ParamSet::new());
        desc.add_node(SceneNode::new("floor").with_mesh("quad").with_bsdf("white"))
            .add_node(SceneNode::new("env").with_light("sky"))
            .add_node(
                SceneNode::new("camera")
                    .with_transform(NodeTransform::LookAt {
                        eye: Vector3f::new(0.0, 2.0, 0.0),
                        center: Vector3f::ZERO,
                        up: Vector3f::Z,
                    })
                    .with_camera("cam"),
            );
        desc
    }

    #[test]
    fn builds_scene_from_tree() {
        let scene = desc().build(registry(), 1.0).unwrap();
        assert_eq!(scene.primitives().len(), 3);
        assert_eq!(scene.lights().len(), 1);
        assert!(scene.environment_light().is_some());
        let mut ray = Ray::new(Vector3f::new(0.2, 1.0, 0.3), -Vector3f::Y);
        let isect = scene.intersect(&mut ray).unwrap();
        assert!(approx_eq!(f64, isect.t, 1.0, epsilon = 1e-9));
        assert!(isect.bsdf().is_some());
    }

    #[test]
    fn world_transform_composes_parent_first() {
        let mut desc = desc();
        desc.root.children[0] = SceneNode::new("group")
            .with_transform(NodeTransform::translate(Vector3f::new(0.0, -1.0, 0.0)))
            .with_child(
                SceneNode::new("floor")
                    .with_transform(NodeTransform::Trs {
                        translate: Vector3f::ZERO,
                        rotate: None,
                        scale: Vector3f::splat(2.0),
                    })
                    .with_mesh("quad")
                    .with_bsdf("white"),
            );
        let scene = desc.build(registry(), 1.0).unwrap();
        let bounds = scene.bounds();
        assert!(approx_eq!(f64, bounds.p_min.y, -1.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, bounds.p_max.x, 2.0, epsilon = 1e-12));
    }

    #[test]
    fn rotation_is_in_degrees() {
        let t = NodeTransform::Trs {
            translate: Vector3f::new(1.0, 0.0, 0.0),
            rotate: Some((Vector3f::Z, 90.0)),
            scale: Vector3f::splat(1.0),
        }
        .to_transform()
        .unwrap();
        let p = t.transform_point(&Vector3f::X);
        assert!(approx_eq!(f64, p.x, 1.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, p.y, 1.0, epsilon = 1e-12));
    }

    #[test]
    fn singular_matrix_is_config_error() {
        assert!(matches!(
            NodeTransform::Matrix([[0.0; 4]; 4]).to_transform(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn dangling_references_are_missing_assets() {
        let mut d = desc();
        d.add_node(SceneNode::new("x").with_mesh("nope").with_bsdf("white"));
        assert!(matches!(d.build(registry(), 1.0), Err(Error::MissingAsset { kind: "mesh", .. })));

        let mut d = desc();
        d.add_node(SceneNode::new("x").with_mesh("quad").with_bsdf("nope"));
        assert!(matches!(d.build(registry(), 1.0), Err(Error::MissingAsset { kind: "bsdf", .. })));

        let mut d = desc();
        d.add_node(SceneNode::new("x").with_light("nope"));
        assert!(matches!(d.build(registry(), 1.0), Err(Error::MissingAsset { kind: "light", .. })));
    }

    #[test]
    fn mesh_without_bsdf_is_rejected() {
        let mut d = desc();
        d.add_node(SceneNode::new("x").with_mesh("quad"));
        assert!(matches!(d.build(registry(), 1.0), Err(Error::Config(_))));
    }

    #[test]
    fn unknown_implementation_is_config_error() {
        let mut d = desc();
        d.add_bsdf("white", "velvet", ParamSet::new());
        assert!(d.build(registry(), 1.0).is_err());
    }

    #[test]
    fn area_light_needs_a_mesh() {
        let mut d = desc();
        d.add_light("lamp", "area", ParamSet::new().with_spectrum("luminance", Spectrum::ONE));
        d.add_node(SceneNode::new("lamp").with_light("lamp"));
        assert!(matches!(d.build(registry(), 1.0), Err(Error::Config(_))));
    }
}
