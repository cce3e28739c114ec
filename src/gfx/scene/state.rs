use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::gfx::{geometry::GeometryStore, shading::ShadingModelRegistry};

/// Radians advanced per degree of configured speed
///
/// Kept at the rounded value the viewer has always used rather than exactly
/// `PI / 180`, so animation speeds stay the same.
pub const ANGLE_PER_DEGREE: f32 = 0.0175;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("light power must be a finite value above zero, got {0}")]
    InvalidLightPower(f32),
    #[error("no mesh {index} (only {count} loaded)")]
    NoSuchMesh { index: usize, count: usize },
    #[error("shading model {index} is unavailable")]
    ModelUnavailable { index: usize },
}

/// Initial scene parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    pub light_power: f32,
    pub diffuse_color: [f32; 3],
    pub ambient: f32,
    pub animate_object: bool,
    pub animate_light: bool,
    /// Degrees per second
    pub object_speed: f32,
    /// Degrees per second
    pub light_speed: f32,
    pub mesh: usize,
    pub model: usize,
    pub draw_light_marker: bool,
    pub draw_background: bool,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            light_power: 5.0,
            diffuse_color: [0.2392, 0.5216, 0.7765],
            ambient: 0.1,
            animate_object: false,
            animate_light: false,
            object_speed: 60.0,
            light_speed: 60.0,
            mesh: 0,
            model: 0,
            draw_light_marker: false,
            draw_background: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneState {
    light_power: f32,
    diffuse_color: [f32; 3],
    ambient: f32,
    object_angle: f32,
    light_angle: f32,
    animate_object: bool,
    animate_light: bool,
    object_speed: f32,
    light_speed: f32,
    mesh: usize,
    model: usize,
    draw_light_marker: bool,
    draw_background: bool,
}

impl Default for SceneState {
    fn default() -> Self {
        Self::new(&SceneSettings::default())
    }
}

impl SceneState {
    /// Builds the state from settings, sanitizing anything out of range
    pub fn new(settings: &SceneSettings) -> Self {
        let mut state = Self {
            light_power: SceneSettings::default().light_power,
            diffuse_color: [0.0; 3],
            ambient: 0.0,
            object_angle: 0.0,
            light_angle: 0.0,
            animate_object: settings.animate_object,
            animate_light: settings.animate_light,
            object_speed: settings.object_speed,
            light_speed: settings.light_speed,
            mesh: settings.mesh,
            model: settings.model,
            draw_light_marker: settings.draw_light_marker,
            draw_background: settings.draw_background,
        };
        if let Err(err) = state.set_light_power(settings.light_power) {
            log::warn!("Ignoring configured light power: {}", err);
        }
        state.set_diffuse_color(settings.diffuse_color);
        state.set_ambient(settings.ambient);
        state
    }

    /// Advances the animated angles by `elapsed_ms` of wall time
    pub fn advance(&mut self, elapsed_ms: f64) {
        let seconds = (elapsed_ms / 1000.0) as f32;
        if self.animate_object {
            self.object_angle =
                (self.object_angle + self.object_speed * ANGLE_PER_DEGREE * seconds).rem_euclid(TAU);
        }
        if self.animate_light {
            self.light_angle =
                (self.light_angle + self.light_speed * ANGLE_PER_DEGREE * seconds).rem_euclid(TAU);
        }
    }

    pub fn light_power(&self) -> f32 {
        self.light_power
    }

    pub fn set_light_power(&mut self, power: f32) -> Result<(), SceneError> {
        if !power.is_finite() || power <= 0.0 {
            return Err(SceneError::InvalidLightPower(power));
        }
        self.light_power = power;
        Ok(())
    }

    pub fn diffuse_color(&self) -> [f32; 3] {
        self.diffuse_color
    }

    /// Components are clamped to [0, 1]
    pub fn set_diffuse_color(&mut self, color: [f32; 3]) {
        self.diffuse_color = color.map(clamp_unit);
    }

    pub fn ambient(&self) -> f32 {
        self.ambient
    }

    /// Clamped to [0, 1]
    pub fn set_ambient(&mut self, ambient: f32) {
        self.ambient = clamp_unit(ambient);
    }

    pub fn object_angle(&self) -> f32 {
        self.object_angle
    }

    pub fn light_angle(&self) -> f32 {
        self.light_angle
    }

    pub fn animate_object(&self) -> bool {
        self.animate_object
    }

    pub fn set_animate_object(&mut self, animate: bool) {
        self.animate_object = animate;
    }

    pub fn animate_light(&self) -> bool {
        self.animate_light
    }

    pub fn set_animate_light(&mut self, animate: bool) {
        self.animate_light = animate;
    }

    pub fn draw_light_marker(&self) -> bool {
        self.draw_light_marker
    }

    pub fn set_draw_light_marker(&mut self, draw: bool) {
        self.draw_light_marker = draw;
    }

    pub fn draw_background(&self) -> bool {
        self.draw_background
    }

    pub fn set_draw_background(&mut self, draw: bool) {
        self.draw_background = draw;
    }

    /// Index of the active mesh in the geometry store
    pub fn mesh(&self) -> usize {
        self.mesh
    }

    pub fn select_mesh(&mut self, index: usize, geometry: &GeometryStore) -> Result<(), SceneError> {
        if index >= geometry.len() {
            return Err(SceneError::NoSuchMesh {
                index,
                count: geometry.len(),
            });
        }
        self.mesh = index;
        Ok(())
    }

    /// Index of the active shading model in the registry
    pub fn model(&self) -> usize {
        self.model
    }

    pub fn select_model(
        &mut self,
        index: usize,
        registry: &ShadingModelRegistry,
    ) -> Result<(), SceneError> {
        if !registry.is_selectable(index) {
            return Err(SceneError::ModelUnavailable { index });
        }
        self.model = index;
        Ok(())
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
