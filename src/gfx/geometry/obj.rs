//! Wavefront OBJ mesh source

use std::path::Path;

use cgmath::{InnerSpace, Vector3, Zero};

use super::{GeometryError, MeshData};

/// Loads every model of an OBJ file into one triangulated, single-index mesh
///
/// Files without (complete) vertex normals get smooth normals accumulated
/// from the faces around each vertex.
pub fn load_obj(path: &Path) -> Result<MeshData, GeometryError> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|source| GeometryError::Obj {
        path: path.display().to_string(),
        source,
    })?;

    let mut data = MeshData::default();
    for model in &models {
        let mesh = &model.mesh;
        let base = data.positions.len() as u32;

        let positions: Vec<[f32; 3]> = mesh
            .positions
            .chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect();
        let normals = if mesh.normals.len() == mesh.positions.len() {
            mesh.normals
                .chunks_exact(3)
                .map(|n| [n[0], n[1], n[2]])
                .collect()
        } else {
            log::debug!("'{}' has no vertex normals, computing them", model.name);
            vertex_normals(&positions, &mesh.indices)
        };

        data.positions.extend(positions);
        data.normals.extend(normals);
        data.indices.extend(mesh.indices.iter().map(|i| i + base));
    }

    Ok(data)
}

/// Area-weighted average of the face normals around each vertex
pub fn vertex_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut sums = vec![Vector3::zero(); positions.len()];

    for triangle in indices.chunks_exact(3) {
        let corners = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if corners.iter().any(|&i| i >= positions.len()) {
            continue;
        }
        let [a, b, c] = corners.map(|i| Vector3::from(positions[i]));
        // Unnormalized, so larger faces weigh more
        let face = (b - a).cross(c - a);
        for i in corners {
            sums[i] += face;
        }
    }

    sums.into_iter()
        .map(|sum| {
            if sum.magnitude2() > f32::EPSILON {
                sum.normalize().into()
            } else {
                [0.0, 1.0, 0.0]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const QUAD_WITHOUT_NORMALS: &str = "\
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
";

    #[test]
    fn computed_normals_face_the_winding() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let normals = vertex_normals(&positions, &[0, 1, 2]);
        for n in normals {
            assert_relative_eq!(Vector3::from(n), Vector3::new(0.0, 0.0, 1.0));
        }
    }

    #[test]
    fn unreferenced_vertex_gets_a_fallback_normal() {
        let positions = [[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [5.0, 5.0, 5.0]];
        let normals = vertex_normals(&positions, &[0, 1, 2]);
        assert_eq!(normals[3], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn loads_and_triangulates_obj() {
        let path = std::env::temp_dir().join(format!("shadeview-quad-{}.obj", std::process::id()));
        std::fs::write(&path, QUAD_WITHOUT_NORMALS).unwrap();

        let mesh = load_obj(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        mesh.validate("quad").unwrap();
        assert_relative_eq!(Vector3::from(mesh.normals[0]), Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_obj(Path::new("/nonexistent/shadeview/teapot.obj")).unwrap_err();
        assert!(matches!(err, GeometryError::Obj { .. }));
    }
}
