//! Per-frame matrices
//!
//! Everything is built in GL clip convention and then corrected for the
//! backend with [`GpuDevice::clip_space_correction`].
//!
//! [`GpuDevice::clip_space_correction`]: crate::gfx::device::GpuDevice::clip_space_correction

use cgmath::{Deg, Matrix, Matrix4, Point3, Rad, SquareMatrix, Transform, Vector3};
use serde::{Deserialize, Serialize};

use crate::gfx::scene::SceneState;

/// Camera, projection and clear settings of the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub clear_color: [f32; 4],
    pub camera_offset: [f32; 3],
    /// Tilt of the camera rig about X, in radians
    pub camera_tilt: f32,
    /// Light position before the orbit rotation
    pub light_anchor: [f32; 3],
    pub environment_unit: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fov: 35.0,
            near: 0.1,
            far: 1000.0,
            clear_color: [0.3, 0.3, 0.3, 1.0],
            camera_offset: [0.0, -1.0, -7.0],
            camera_tilt: 0.3,
            light_anchor: [0.0, 2.5, 3.0],
            environment_unit: 0,
        }
    }
}

/// Matrices shared by every pass of one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMatrices {
    pub projection: Matrix4<f32>,
    pub object_model_view: Matrix4<f32>,
    pub normal_matrix: Matrix4<f32>,
    /// Camera rig only; the sky ignores object rotation and fitting
    pub background_model_view: Matrix4<f32>,
    /// Light position in camera space
    pub light_position: Point3<f32>,
}

impl FrameMatrices {
    pub fn compute(
        settings: &RenderSettings,
        scene: &SceneState,
        fitting: Matrix4<f32>,
        viewport: (u32, u32),
        clip_correction: Matrix4<f32>,
    ) -> Self {
        let aspect = if viewport.1 == 0 {
            1.0
        } else {
            viewport.0 as f32 / viewport.1 as f32
        };
        let projection =
            clip_correction * perspective(settings.fov, aspect, settings.near, settings.far);

        let rig = camera_rig(settings);
        let light_model_view = rig * Matrix4::from_angle_y(Rad(scene.light_angle()));
        let light_position =
            light_model_view.transform_point(Point3::from(settings.light_anchor));

        let object_model_view = rig * Matrix4::from_angle_y(Rad(scene.object_angle())) * fitting;

        Self {
            projection,
            object_model_view,
            normal_matrix: normal_matrix(object_model_view),
            background_model_view: rig,
            light_position,
        }
    }
}

pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Matrix4<f32> {
    cgmath::perspective(Deg(fov_degrees), aspect, near, far)
}

/// Translate to the camera offset, then tilt about X
pub fn camera_rig(settings: &RenderSettings) -> Matrix4<f32> {
    Matrix4::from_translation(Vector3::from(settings.camera_offset))
        * Matrix4::from_angle_x(Rad(settings.camera_tilt))
}

/// Transpose of the inverse; identity for a singular model-view
pub fn normal_matrix(model_view: Matrix4<f32>) -> Matrix4<f32> {
    model_view
        .invert()
        .map(|inverse| inverse.transpose())
        .unwrap_or_else(Matrix4::identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::Vector4;

    #[test]
    fn light_sits_in_front_of_the_camera() {
        let frame = FrameMatrices::compute(
            &RenderSettings::default(),
            &SceneState::default(),
            Matrix4::identity(),
            (800, 600),
            Matrix4::identity(),
        );
        let (sin, cos) = 0.3f32.sin_cos();
        let expected = Point3::new(0.0, 2.5 * cos - 3.0 * sin - 1.0, 2.5 * sin + 3.0 * cos - 7.0);
        assert_relative_eq!(frame.light_position, expected, epsilon = 1e-5);
    }

    #[test]
    fn normal_matrix_is_inverse_transpose() {
        let mv = Matrix4::from_translation(Vector3::new(1.0, -2.0, -5.0))
            * Matrix4::from_angle_y(Rad(0.7))
            * Matrix4::from_nonuniform_scale(2.0, 0.5, 1.0);
        let n = normal_matrix(mv);
        assert_relative_eq!(n.transpose() * mv, Matrix4::identity(), epsilon = 1e-5);
    }

    #[test]
    fn singular_model_view_falls_back_to_identity() {
        assert_eq!(normal_matrix(Matrix4::from_scale(0.0)), Matrix4::identity());
    }

    #[test]
    fn projection_uses_viewport_aspect() {
        let settings = RenderSettings::default();
        let wide = FrameMatrices::compute(
            &settings,
            &SceneState::default(),
            Matrix4::identity(),
            (1600, 800),
            Matrix4::identity(),
        );
        let expected = perspective(35.0, 2.0, 0.1, 1000.0);
        assert_relative_eq!(wide.projection, expected);

        // A point at the near plane lands at GL depth -1
        let near = wide.projection * Vector4::new(0.0, 0.0, -0.1, 1.0);
        assert_relative_eq!(near.z / near.w, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn background_ignores_object_rotation_and_fitting() {
        let mut scene = SceneState::default();
        scene.set_animate_object(true);
        scene.advance(1000.0);
        let frame = FrameMatrices::compute(
            &RenderSettings::default(),
            &scene,
            Matrix4::from_scale(0.02),
            (800, 600),
            Matrix4::identity(),
        );
        assert_eq!(frame.background_model_view, camera_rig(&RenderSettings::default()));
        assert_ne!(frame.object_model_view, frame.background_model_view);
    }
}
