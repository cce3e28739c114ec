//! # Primitive Shape Generation
//!
//! Procedural meshes that need no asset files: a flat-shaded cube, a UV
//! sphere, and the inward-facing cube the sky is drawn on.

use super::MeshData;
use std::f32::consts::PI;

/// Unit cube centered at the origin, one quad per face with outward normals
pub fn cube() -> MeshData {
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        // (normal, u axis, v axis)
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut data = MeshData::default();
    for (normal, u, v) in faces {
        let base = data.positions.len() as u32;
        for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            data.positions.push([
                normal[0] * 0.5 + u[0] * su + v[0] * sv,
                normal[1] * 0.5 + u[1] * su + v[1] * sv,
                normal[2] * 0.5 + u[2] * su + v[2] * sv,
            ]);
            data.normals.push(normal);
        }
        // Counter-clockwise seen from outside
        data.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    data
}

/// UV sphere of radius 1.0 centered at the origin
///
/// # Arguments
/// * `longitude_segments` - Number of vertical segments (longitude lines)
/// * `latitude_segments` - Number of horizontal segments (latitude lines)
pub fn sphere(longitude_segments: u32, latitude_segments: u32) -> MeshData {
    let mut data = MeshData::default();

    let long_segs = longitude_segments.max(3);
    let lat_segs = latitude_segments.max(2);

    for lat in 0..=lat_segs {
        let theta = lat as f32 * PI / lat_segs as f32; // 0 to PI
        let (sin_theta, cos_theta) = theta.sin_cos();

        for long in 0..=long_segs {
            let phi = long as f32 * 2.0 * PI / long_segs as f32; // 0 to 2*PI
            let (sin_phi, cos_phi) = phi.sin_cos();

            let point = [sin_theta * cos_phi, cos_theta, sin_theta * sin_phi];
            data.positions.push(point);
            // Normal is same as position for unit sphere
            data.normals.push(point);
        }
    }

    for lat in 0..lat_segs {
        for long in 0..long_segs {
            let first = lat * (long_segs + 1) + long;
            let second = first + long_segs + 1;

            data.indices
                .extend_from_slice(&[first, first + 1, second, second, first + 1, second + 1]);
        }
    }

    data
}

/// The eight corners of a cube spanning [-1, 1] and its twelve triangles
///
/// Normals point inward since the cube is only ever seen from inside.
pub fn sky_cube() -> MeshData {
    let mut data = MeshData::default();
    for corner in 0..8u32 {
        let sign = |bit: u32| if corner & bit != 0 { 1.0 } else { -1.0 };
        let position = [sign(1), sign(2), sign(4)];
        let len = 3.0f32.sqrt();
        data.positions.push(position);
        data.normals
            .push([-position[0] / len, -position[1] / len, -position[2] / len]);
    }
    data.indices = vec![
        0, 2, 1, 1, 2, 3, // -z
        4, 5, 6, 5, 7, 6, // +z
        0, 1, 4, 1, 5, 4, // -y
        2, 6, 3, 3, 6, 7, // +y
        0, 4, 2, 2, 4, 6, // -x
        1, 3, 5, 3, 7, 5, // +x
    ];
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_flat_faces() {
        let cube = cube();
        assert_eq!(cube.positions.len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        cube.validate("cube").unwrap();
    }

    #[test]
    fn sphere_normals_are_unit_length() {
        let sphere = sphere(16, 8);
        sphere.validate("sphere").unwrap();
        for n in &sphere.normals {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn sky_cube_is_eight_corners_and_thirty_six_indices() {
        let sky = sky_cube();
        assert_eq!(sky.positions.len(), 8);
        assert_eq!(sky.indices.len(), 36);
        sky.validate("sky").unwrap();
    }
}
