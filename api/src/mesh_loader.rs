//! Mesh Loaders

use core::error::*;
use core::geometry::*;
use core::lm::*;
use core::mesh::TriangleMesh;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Mesh data given inline. Positions and normals are flat xyz triples,
/// texture coordinates flat uv pairs. Faces are polygons of 0-based vertex
/// indices and are triangulated as fans.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawMesh {
    /// Positions.
    pub positions: Vec<Float>,

    /// Normals (empty or one per position).
    pub normals: Vec<Float>,

    /// Texture coordinates (empty or one per position).
    pub uvs: Vec<Float>,

    /// Polygons.
    pub faces: Vec<Vec<u32>>,
}

/// Convert inline mesh data to a triangle mesh.
///
/// * `raw` - The mesh data.
pub fn load_raw_mesh(raw: &RawMesh) -> Result<TriangleMesh> {
    if raw.positions.len() % 3 != 0 {
        return Err(Error::mesh(format!("{} position values is not a multiple of 3", raw.positions.len())));
    }
    if raw.normals.len() % 3 != 0 {
        return Err(Error::mesh(format!("{} normal values is not a multiple of 3", raw.normals.len())));
    }
    if raw.uvs.len() % 2 != 0 {
        return Err(Error::mesh(format!("{} texture coordinate values is not a multiple of 2", raw.uvs.len())));
    }

    let positions = raw.positions.chunks_exact(3).map(|c| Vector3f::new(c[0], c[1], c[2])).collect();
    let normals = raw.normals.chunks_exact(3).map(|c| Vector3f::new(c[0], c[1], c[2])).collect();
    let uvs = raw.uvs.chunks_exact(2).map(|c| Vector2f::new(c[0], c[1])).collect();
    TriangleMesh::from_polygons(positions, normals, uvs, &raw.faces)
}

/// Load a Wavefront OBJ file.
///
/// * `path` - Path to the file.
pub fn load_obj(path: &str) -> Result<TriangleMesh> {
    let file = File::open(path).map_err(|e| {
        error!("Unable to open OBJ file '{}'. {}.", path, e);
        Error::missing_asset("mesh file", path)
    })?;
    let mesh = parse_obj(BufReader::new(file)).map_err(|e| match e {
        Error::Mesh(msg) => Error::mesh(format!("{}: {}", path, msg)),
        e => e,
    })?;
    info!("Loaded '{}': {} vertices, {} triangles", path, mesh.positions.len(), mesh.num_faces());
    Ok(mesh)
}

/// One corner of an OBJ face: position, texture coordinate and normal
/// indices, 0-based.
type Corner = (usize, Option<usize>, Option<usize>);

/// Parse the OBJ subset made of `v`, `vt`, `vn` and `f` statements. Other
/// statements are ignored. Indices are 1-based; negative indices count back
/// from the last element read so far. Corners sharing the same index triple
/// share a vertex.
///
/// * `reader` - Source of OBJ text.
pub fn parse_obj<R: BufRead>(reader: R) -> Result<TriangleMesh> {
    let mut obj_positions: Vec<Vector3f> = vec![];
    let mut obj_normals: Vec<Vector3f> = vec![];
    let mut obj_uvs: Vec<Vector2f> = vec![];

    let mut corners: HashMap<Corner, u32> = HashMap::new();
    let mut vertices: Vec<Corner> = vec![];
    let mut polygons: Vec<Vec<u32>> = vec![];

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = line_no + 1;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => obj_positions.push(parse_vector3(&mut tokens, line_no)?),
            Some("vn") => obj_normals.push(parse_vector3(&mut tokens, line_no)?),
            Some("vt") => {
                let u = parse_float(tokens.next(), line_no)?;
                let v = parse_float(tokens.next().or(Some("0")), line_no)?;
                obj_uvs.push(Vector2f::new(u, v));
            }
            Some("f") => {
                let mut polygon = vec![];
                for token in tokens {
                    let corner = parse_corner(
                        token,
                        line_no,
                        obj_positions.len(),
                        obj_uvs.len(),
                        obj_normals.len(),
                    )?;
                    let index = *corners.entry(corner).or_insert_with(|| {
                        vertices.push(corner);
                        (vertices.len() - 1) as u32
                    });
                    polygon.push(index);
                }
                if polygon.len() < 3 {
                    return Err(Error::mesh(format!("line {}: face with {} vertices", line_no, polygon.len())));
                }
                polygons.push(polygon);
            }
            Some(s) if s.starts_with('#') => {}
            Some(s) => debug!("Ignoring OBJ statement '{}' on line {}", s, line_no),
            None => {}
        }
    }

    if polygons.is_empty() {
        return Err(Error::mesh("no faces found"));
    }

    // If any corner lacks a normal or texture coordinate, ignore them entirely.
    let has_normals = vertices.iter().all(|(_, _, n)| n.is_some());
    let has_uvs = vertices.iter().all(|(_, t, _)| t.is_some());

    let positions = vertices.iter().map(|(p, _, _)| obj_positions[*p]).collect();
    let normals = if has_normals {
        vertices.iter().filter_map(|(_, _, n)| n.map(|n| obj_normals[n])).collect()
    } else {
        vec![]
    };
    let uvs = if has_uvs {
        vertices.iter().filter_map(|(_, t, _)| t.map(|t| obj_uvs[t])).collect()
    } else {
        vec![]
    };
    TriangleMesh::from_polygons(positions, normals, uvs, &polygons)
}

/// Parse three floats.
fn parse_vector3<'a, I: Iterator<Item = &'a str>>(tokens: &mut I, line_no: usize) -> Result<Vector3f> {
    let x = parse_float(tokens.next(), line_no)?;
    let y = parse_float(tokens.next(), line_no)?;
    let z = parse_float(tokens.next(), line_no)?;
    Ok(Vector3f::new(x, y, z))
}

fn parse_float(token: Option<&str>, line_no: usize) -> Result<Float> {
    let token = token.ok_or_else(|| Error::mesh(format!("line {}: missing value", line_no)))?;
    token
        .parse::<Float>()
        .map_err(|_| Error::mesh(format!("line {}: invalid number '{}'", line_no, token)))
}

/// Parse a face corner `v`, `v/vt`, `v//vn` or `v/vt/vn`.
fn parse_corner(token: &str, line_no: usize, num_v: usize, num_vt: usize, num_vn: usize) -> Result<Corner> {
    let mut parts = token.split('/');
    let v = resolve_index(parts.next(), line_no, num_v)?
        .ok_or_else(|| Error::mesh(format!("line {}: face corner '{}' has no vertex", line_no, token)))?;
    let vt = resolve_index(parts.next(), line_no, num_vt)?;
    let vn = resolve_index(parts.next(), line_no, num_vn)?;
    Ok((v, vt, vn))
}

/// Convert a 1-based or negative relative index to a 0-based one. Empty
/// fields resolve to `None`.
fn resolve_index(field: Option<&str>, line_no: usize, len: usize) -> Result<Option<usize>> {
    let field = match field {
        Some(f) if !f.is_empty() => f,
        _ => return Ok(None),
    };
    let i = field
        .parse::<i64>()
        .map_err(|_| Error::mesh(format!("line {}: invalid index '{}'", line_no, field)))?;
    let resolved = match i {
        i if i > 0 => i - 1,
        i if i < 0 => len as i64 + i,
        _ => return Err(Error::mesh(format!("line {}: index 0 is invalid", line_no))),
    };
    if resolved < 0 || resolved as usize >= len {
        return Err(Error::mesh(format!(
            "line {}: index {} out of range (of {})",
            line_no, i, len
        )));
    }
    Ok(Some(resolved as usize))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn obj(text: &str) -> Result<TriangleMesh> {
        parse_obj(Cursor::new(text))
    }

    #[test]
    fn raw_quad_is_triangulated_as_fan() {
        let raw = RawMesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            faces: vec![vec![0, 1, 2, 3]],
            ..RawMesh::default()
        };
        let mesh = load_raw_mesh(&raw).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert!(!mesh.has_normals());
    }

    #[test]
    fn raw_mesh_rejects_bad_arrays() {
        let raw = RawMesh {
            positions: vec![0.0, 0.0],
            faces: vec![vec![0, 1, 2]],
            ..RawMesh::default()
        };
        assert!(matches!(load_raw_mesh(&raw), Err(Error::Mesh(_))));

        let raw = RawMesh {
            positions: vec![0.0; 9],
            faces: vec![vec![0, 1, 5]],
            ..RawMesh::default()
        };
        assert!(matches!(load_raw_mesh(&raw), Err(Error::Mesh(_))));
    }

    #[test]
    fn obj_uses_one_based_indices() {
        let mesh = obj("# square\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n").unwrap();
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(mesh.positions[2], Vector3f::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn obj_negative_indices_are_relative() {
        let mesh = obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn obj_reads_normals_and_texture_coordinates() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nvn 0 0 1\nf 1/1/1 2/2/1 3/3/1\n";
        let mesh = obj(text).unwrap();
        assert!(mesh.has_normals());
        assert!(mesh.has_uvs());
        assert_eq!(mesh.normals[1], Vector3f::new(0.0, 0.0, 1.0));
        assert_eq!(mesh.uvs[2], Vector2f::new(0.0, 1.0));
    }

    #[test]
    fn obj_drops_partial_normals() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\nf 2 4 3\n";
        let mesh = obj(text).unwrap();
        assert!(!mesh.has_normals());
        assert_eq!(mesh.num_faces(), 2);
    }

    #[test]
    fn obj_corners_with_distinct_attributes_split_vertices() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvn 0 0 -1\nf 1//1 2//1 3//1\nf 1//2 3//2 2//2\n";
        let mesh = obj(text).unwrap();
        assert_eq!(mesh.positions.len(), 6);
    }

    #[test]
    fn obj_errors() {
        assert!(matches!(obj("v 0 0 0\nf 1 2 3\n"), Err(Error::Mesh(_))));
        assert!(matches!(obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n"), Err(Error::Mesh(_))));
        assert!(matches!(obj("v 0 0\n"), Err(Error::Mesh(_))));
        assert!(matches!(obj("v 0 0 0\n"), Err(Error::Mesh(_))));
        assert!(matches!(obj("v 0 0 0\nv 1 0 0\nf 1 2\n"), Err(Error::Mesh(_))));
    }

    #[test]
    fn missing_obj_file_is_missing_asset() {
        assert!(matches!(
            load_obj("/nonexistent/dir/mesh.obj"),
            Err(Error::MissingAsset { .. })
        ));
    }

    proptest! {
        #[test]
        fn obj_polygons_become_fans(n in 3_usize..16, relative in any::<bool>()) {
            let mut text = String::new();
            for i in 0..n {
                let phi = 2.0 * PI * i as Float / n as Float;
                text.push_str(&format!("v {} {} 0\n", phi.cos(), phi.sin()));
            }
            let corners: Vec<String> = (0..n)
                .map(|i| if relative { format!("{}", i as i64 - n as i64) } else { format!("{}", i + 1) })
                .collect();
            text.push_str(&format!("f {}\n", corners.join(" ")));

            let mesh = obj(&text).unwrap();
            prop_assert_eq!(mesh.num_faces(), n - 2);
            prop_assert!(mesh.faces.iter().all(|f| f[0] == 0));
            prop_assert!(mesh.faces.iter().enumerate().all(|(i, f)| f[1] == i as u32 + 1 && f[2] == i as u32 + 2));
        }
    }
}
