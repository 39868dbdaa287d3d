//! Triangle Meshes

use crate::error::*;
use crate::geometry::*;
use crate::lm::*;

/// An indexed triangle mesh in object space. Normals and texture
/// coordinates are optional and, when present, indexed like positions.
#[derive(Clone, Debug, Default)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub positions: Vec<Vector3f>,

    /// Vertex normals.
    pub normals: Vec<Vector3f>,

    /// Texture coordinates.
    pub uvs: Vec<Vector2f>,

    /// Triangles as triples of vertex indices.
    pub faces: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Create a mesh and validate its indices.
    ///
    /// * `positions` - Vertex positions.
    /// * `normals`   - Vertex normals (empty or one per position).
    /// * `uvs`       - Texture coordinates (empty or one per position).
    /// * `faces`     - Triangles.
    pub fn new(
        positions: Vec<Vector3f>,
        normals: Vec<Vector3f>,
        uvs: Vec<Vector2f>,
        faces: Vec<[u32; 3]>,
    ) -> Result<Self> {
        let n = positions.len();
        if !normals.is_empty() && normals.len() != n {
            return Err(Error::mesh(format!("{} normals for {} positions", normals.len(), n)));
        }
        if !uvs.is_empty() && uvs.len() != n {
            return Err(Error::mesh(format!("{} texture coordinates for {} positions", uvs.len(), n)));
        }
        if let Some(face) = faces.iter().find(|f| f.iter().any(|&i| i as usize >= n)) {
            return Err(Error::mesh(format!("face {:?} references a missing vertex (of {})", face, n)));
        }
        Ok(Self {
            positions,
            normals,
            uvs,
            faces,
        })
    }

    /// Create a mesh from polygons given as vertex index lists. Each polygon
    /// with k >= 3 vertices is triangulated as a fan (0, i, i + 1).
    ///
    /// * `positions` - Vertex positions.
    /// * `normals`   - Vertex normals (empty or one per position).
    /// * `uvs`       - Texture coordinates (empty or one per position).
    /// * `polygons`  - Polygons.
    pub fn from_polygons(
        positions: Vec<Vector3f>,
        normals: Vec<Vector3f>,
        uvs: Vec<Vector2f>,
        polygons: &[Vec<u32>],
    ) -> Result<Self> {
        let mut faces = Vec::with_capacity(polygons.len());
        for polygon in polygons {
            if polygon.len() < 3 {
                return Err(Error::mesh(format!("polygon with {} vertices", polygon.len())));
            }
            for i in 1..polygon.len() - 1 {
                faces.push([polygon[0], polygon[i], polygon[i + 1]]);
            }
        }
        Self::new(positions, normals, uvs, faces)
    }

    /// Returns the number of triangles.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Returns `true` if the mesh carries vertex normals.
    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    /// Returns `true` if the mesh carries texture coordinates.
    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    /// Returns the positions of a triangle transformed to world space.
    ///
    /// * `face`      - Triangle index.
    /// * `transform` - Object to world transformation.
    pub fn world_triangle(&self, face: usize, transform: &Transform) -> [Vector3f; 3] {
        let [i0, i1, i2] = self.faces[face];
        [
            transform.transform_point(&self.positions[i0 as usize]),
            transform.transform_point(&self.positions[i1 as usize]),
            transform.transform_point(&self.positions[i2 as usize]),
        ]
    }

    /// Interpolate the shading normal and texture coordinates of a triangle
    /// at barycentric coordinates (u, v). Returns `None` for the normal if the
    /// mesh has no normals.
    ///
    /// * `face` - Triangle index.
    /// * `b`    - Barycentric coordinates of vertices 1 and 2.
    pub fn interpolate(&self, face: usize, b: &Vector2f) -> (Option<Vector3f>, Vector2f) {
        let [i0, i1, i2] = self.faces[face];
        let (i0, i1, i2) = (i0 as usize, i1 as usize, i2 as usize);
        let b0 = 1.0 - b.x - b.y;

        let n = if self.has_normals() {
            Some(self.normals[i0] * b0 + self.normals[i1] * b.x + self.normals[i2] * b.y)
        } else {
            None
        };

        let uv = if self.has_uvs() {
            self.uvs[i0] * b0 + self.uvs[i1] * b.x + self.uvs[i2] * b.y
        } else {
            Vector2f::new(b.x, b.y)
        };

        (n, uv)
    }

    /// Returns the total world space area.
    ///
    /// * `transform` - Object to world transformation.
    pub fn area(&self, transform: &Transform) -> Float {
        (0..self.num_faces())
            .map(|i| triangle_area(&self.world_triangle(i, transform)))
            .sum()
    }

    /// Returns the world space bounding box.
    ///
    /// * `transform` - Object to world transformation.
    pub fn world_bounds(&self, transform: &Transform) -> Bounds3f {
        self.positions
            .iter()
            .fold(Bounds3f::EMPTY, |b, p| b.union(&transform.transform_point(p)))
    }
}

/// Returns the area of a triangle.
///
/// * `p` - Vertex positions.
pub fn triangle_area(p: &[Vector3f; 3]) -> Float {
    0.5 * (p[1] - p[0]).cross(&(p[2] - p[0])).length()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
