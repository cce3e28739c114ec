//! Keyboard controls
//!
//! Keys map to [`ViewerCommand`]s, which are applied to the scene between
//! frames.

use winit::keyboard::KeyCode;

use crate::gfx::{
    geometry::GeometryStore,
    scene::{SceneError, SceneState},
    shading::ShadingModelRegistry,
};

const LIGHT_POWER_STEP: f32 = 1.25;
const AMBIENT_STEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerCommand {
    SelectModel(usize),
    NextMesh,
    PreviousMesh,
    ToggleObjectAnimation,
    ToggleLightAnimation,
    ToggleLightMarker,
    ToggleBackground,
    /// Multiplies the light power
    ScaleLightPower(f32),
    /// Adds to the ambient intensity
    AdjustAmbient(f32),
    Exit,
}

impl ViewerCommand {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        let command = match code {
            KeyCode::Digit1 => ViewerCommand::SelectModel(0),
            KeyCode::Digit2 => ViewerCommand::SelectModel(1),
            KeyCode::Digit3 => ViewerCommand::SelectModel(2),
            KeyCode::Digit4 => ViewerCommand::SelectModel(3),
            KeyCode::Digit5 => ViewerCommand::SelectModel(4),
            KeyCode::Digit6 => ViewerCommand::SelectModel(5),
            KeyCode::Digit7 => ViewerCommand::SelectModel(6),
            KeyCode::Digit8 => ViewerCommand::SelectModel(7),
            KeyCode::Digit9 => ViewerCommand::SelectModel(8),
            KeyCode::KeyM => ViewerCommand::NextMesh,
            KeyCode::KeyN => ViewerCommand::PreviousMesh,
            KeyCode::KeyA => ViewerCommand::ToggleObjectAnimation,
            KeyCode::KeyL => ViewerCommand::ToggleLightAnimation,
            KeyCode::KeyP => ViewerCommand::ToggleLightMarker,
            KeyCode::KeyB => ViewerCommand::ToggleBackground,
            KeyCode::ArrowUp => ViewerCommand::ScaleLightPower(LIGHT_POWER_STEP),
            KeyCode::ArrowDown => ViewerCommand::ScaleLightPower(1.0 / LIGHT_POWER_STEP),
            KeyCode::BracketLeft => ViewerCommand::AdjustAmbient(-AMBIENT_STEP),
            KeyCode::BracketRight => ViewerCommand::AdjustAmbient(AMBIENT_STEP),
            KeyCode::Escape => ViewerCommand::Exit,
            _ => return None,
        };
        Some(command)
    }

    /// Applies the command to `scene`; [`ViewerCommand::Exit`] is left to the caller
    pub fn apply(
        self,
        scene: &mut SceneState,
        geometry: &GeometryStore,
        registry: &ShadingModelRegistry,
    ) -> Result<(), SceneError> {
        match self {
            ViewerCommand::SelectModel(index) => scene.select_model(index, registry)?,
            ViewerCommand::NextMesh | ViewerCommand::PreviousMesh => {
                if geometry.is_empty() {
                    return Err(SceneError::NoSuchMesh { index: 0, count: 0 });
                }
                let count = geometry.len();
                let next = if self == ViewerCommand::NextMesh {
                    (scene.mesh() + 1) % count
                } else {
                    (scene.mesh() + count - 1) % count
                };
                scene.select_mesh(next, geometry)?;
            }
            ViewerCommand::ToggleObjectAnimation => {
                scene.set_animate_object(!scene.animate_object())
            }
            ViewerCommand::ToggleLightAnimation => scene.set_animate_light(!scene.animate_light()),
            ViewerCommand::ToggleLightMarker => {
                scene.set_draw_light_marker(!scene.draw_light_marker())
            }
            ViewerCommand::ToggleBackground => scene.set_draw_background(!scene.draw_background()),
            ViewerCommand::ScaleLightPower(factor) => {
                scene.set_light_power(scene.light_power() * factor)?
            }
            ViewerCommand::AdjustAmbient(delta) => scene.set_ambient(scene.ambient() + delta),
            ViewerCommand::Exit => {}
        }
        log::debug!("Applied {:?}", self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{device::testing::RecordingDevice, geometry::primitives};
    use approx::assert_relative_eq;
    use cgmath::{Matrix4, SquareMatrix};

    fn fixtures() -> (GeometryStore, ShadingModelRegistry) {
        let mut device = RecordingDevice::new();
        let mut geometry = GeometryStore::new();
        for name in ["cube", "ball", "box"] {
            let data = if name == "ball" {
                primitives::sphere(8, 4)
            } else {
                primitives::cube()
            };
            geometry
                .add_mesh(&mut device, name, &data, Matrix4::identity())
                .unwrap();
        }
        let registry = ShadingModelRegistry::initialize(&mut device, &[]);
        (geometry, registry)
    }

    #[test]
    fn digits_select_models() {
        assert_eq!(
            ViewerCommand::from_key(KeyCode::Digit1),
            Some(ViewerCommand::SelectModel(0))
        );
        assert_eq!(
            ViewerCommand::from_key(KeyCode::Digit9),
            Some(ViewerCommand::SelectModel(8))
        );
        assert_eq!(ViewerCommand::from_key(KeyCode::Digit0), None);
        assert_eq!(ViewerCommand::from_key(KeyCode::Escape), Some(ViewerCommand::Exit));
    }

    #[test]
    fn mesh_cycling_wraps_both_ways() {
        let (geometry, registry) = fixtures();
        let mut scene = SceneState::default();

        ViewerCommand::PreviousMesh
            .apply(&mut scene, &geometry, &registry)
            .unwrap();
        assert_eq!(scene.mesh(), 2);
        ViewerCommand::NextMesh
            .apply(&mut scene, &geometry, &registry)
            .unwrap();
        assert_eq!(scene.mesh(), 0);
    }

    #[test]
    fn toggles_flip_flags() {
        let (geometry, registry) = fixtures();
        let mut scene = SceneState::default();

        for command in [
            ViewerCommand::ToggleObjectAnimation,
            ViewerCommand::ToggleLightMarker,
            ViewerCommand::ToggleBackground,
        ] {
            command.apply(&mut scene, &geometry, &registry).unwrap();
        }
        assert!(scene.animate_object());
        assert!(!scene.animate_light());
        assert!(scene.draw_light_marker());
        assert!(!scene.draw_background());
    }

    #[test]
    fn light_and_ambient_steps() {
        let (geometry, registry) = fixtures();
        let mut scene = SceneState::default();

        let up = ViewerCommand::from_key(KeyCode::ArrowUp).unwrap();
        up.apply(&mut scene, &geometry, &registry).unwrap();
        assert_relative_eq!(scene.light_power(), 6.25);

        let brighter = ViewerCommand::from_key(KeyCode::BracketRight).unwrap();
        brighter.apply(&mut scene, &geometry, &registry).unwrap();
        assert_relative_eq!(scene.ambient(), 0.15);

        let darker = ViewerCommand::AdjustAmbient(-1.0);
        darker.apply(&mut scene, &geometry, &registry).unwrap();
        assert_eq!(scene.ambient(), 0.0);
    }

    #[test]
    fn out_of_range_model_is_rejected() {
        let (geometry, registry) = fixtures();
        let mut scene = SceneState::default();

        let err = ViewerCommand::SelectModel(9)
            .apply(&mut scene, &geometry, &registry)
            .unwrap_err();
        assert_eq!(err, SceneError::ModelUnavailable { index: 9 });
        assert_eq!(scene.model(), 0);
    }
}
