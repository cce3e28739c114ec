//! Fitting transforms
//!
//! Meshes are authored at very different scales and orientations. Each one
//! carries a short list of steps that normalizes it into the viewer's frame.

use cgmath::{Matrix4, Rad, SquareMatrix, Vector3};
use serde::{Deserialize, Serialize};

/// One step of a fitting transform
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStep {
    /// Rotation about X, in radians
    RotateX(f32),
    RotateY(f32),
    RotateZ(f32),
    /// Uniform scale
    Scale(f32),
    Translate([f32; 3]),
}

impl FitStep {
    pub fn matrix(&self) -> Matrix4<f32> {
        match *self {
            FitStep::RotateX(angle) => Matrix4::from_angle_x(Rad(angle)),
            FitStep::RotateY(angle) => Matrix4::from_angle_y(Rad(angle)),
            FitStep::RotateZ(angle) => Matrix4::from_angle_z(Rad(angle)),
            FitStep::Scale(factor) => Matrix4::from_scale(factor),
            FitStep::Translate(offset) => Matrix4::from_translation(Vector3::from(offset)),
        }
    }
}

/// Composes steps left to right by post-multiplication, starting at identity
///
/// As with a matrix stack, the last step is the first one applied to a vertex.
pub fn compose(steps: &[FitStep]) -> Matrix4<f32> {
    steps
        .iter()
        .fold(Matrix4::identity(), |matrix, step| matrix * step.matrix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Point3, Transform};

    #[test]
    fn empty_fitting_is_identity() {
        assert_eq!(compose(&[]), Matrix4::identity());
    }

    #[test]
    fn later_steps_apply_first() {
        let sphere = compose(&[FitStep::Scale(0.5), FitStep::Translate([0.0, 1.0, 0.0])]);
        let origin = sphere.transform_point(Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(origin, Point3::new(0.0, 0.5, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn teapot_fitting_rotates_up_axis() {
        let teapot = compose(&[FitStep::RotateX(-std::f32::consts::FRAC_PI_2), FitStep::Scale(0.15)]);
        let up = teapot.transform_point(Point3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(up, Point3::new(0.0, 0.0, -0.15), epsilon = 1e-6);
    }

    #[test]
    fn steps_deserialize_from_toml_tables() {
        #[derive(Deserialize)]
        struct Wrapper {
            fitting: Vec<FitStep>,
        }
        let parsed: Wrapper =
            toml::from_str("fitting = [{ translate = [0.0, 1.0, 0.0] }, { scale = 0.02 }]")
                .unwrap();
        assert_eq!(
            parsed.fitting,
            vec![FitStep::Translate([0.0, 1.0, 0.0]), FitStep::Scale(0.02)]
        );
    }
}
