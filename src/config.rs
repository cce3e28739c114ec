//! # Viewer Configuration
//!
//! Everything the viewer needs at startup, read from a TOML file. Every
//! section is optional; missing values fall back to the built-in defaults.
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//!
//! [render]
//! fov = 45.0
//! on_frame_error = "halt"
//!
//! [[meshes]]
//! name = "teapot"
//! source = { obj = "assets/teapot.obj" }
//! fitting = [{ rotate_x = -1.5708 }, { scale = 0.15 }]
//!
//! [[constants]]
//! model = "phong"
//! slot = "exponent"
//! value = 80.0
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    animation::ErrorPolicy,
    gfx::{
        device::UniformValue,
        environment::CubeSources,
        geometry::{fitting::FitStep, obj, primitives, GeometryError, MeshData},
        rendering::RenderSettings,
        scene::SceneSettings,
        shading::{ConstantOverride, ShadingModel},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub render: RenderConfig,
    pub scene: SceneSettings,
    pub environment: Option<EnvironmentConfig>,
    pub meshes: Vec<MeshConfig>,
    pub constants: Vec<ConstantConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            title: "shadeview".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    #[serde(flatten)]
    pub settings: RenderSettings,
    pub on_frame_error: ErrorPolicy,
}

/// Directory holding the six cube faces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub faces: CubeSources,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    pub name: String,
    pub source: MeshSource,
    #[serde(default)]
    pub fitting: Vec<FitStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshSource {
    Obj(PathBuf),
    Primitive(Primitive),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Sphere,
    Cube,
}

impl MeshSource {
    pub fn load(&self) -> Result<MeshData, GeometryError> {
        match self {
            MeshSource::Obj(path) => obj::load_obj(path),
            MeshSource::Primitive(Primitive::Sphere) => Ok(primitives::sphere(48, 24)),
            MeshSource::Primitive(Primitive::Cube) => Ok(primitives::cube()),
        }
    }
}

/// A startup constant for one model's slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantConfig {
    pub model: ShadingModel,
    pub slot: String,
    pub value: ConstantValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Scalar(f32),
    Color([f32; 3]),
}

impl From<&ConstantConfig> for ConstantOverride {
    fn from(constant: &ConstantConfig) -> Self {
        let value = match constant.value {
            ConstantValue::Scalar(v) => UniformValue::F32(v),
            ConstantValue::Color(c) => UniformValue::Vec3(c),
        };
        ConstantOverride {
            model: constant.model,
            slot: constant.slot.clone(),
            value,
        }
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            name: "sphere".to_owned(),
            source: MeshSource::Primitive(Primitive::Sphere),
            fitting: vec![FitStep::Scale(0.5), FitStep::Translate([0.0, 1.0, 0.0])],
        }
    }
}

impl ViewerConfig {
    /// Reads a config file; relative paths inside it resolve against its directory
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let mut config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// The meshes to load; a built-in sphere when none are configured
    pub fn meshes(&self) -> Vec<MeshConfig> {
        if self.meshes.is_empty() {
            vec![MeshConfig::default()]
        } else {
            self.meshes.clone()
        }
    }

    pub fn constant_overrides(&self) -> Vec<ConstantOverride> {
        self.constants.iter().map(ConstantOverride::from).collect()
    }

    fn resolve_paths(&mut self, base: &Path) {
        for mesh in &mut self.meshes {
            if let MeshSource::Obj(path) = &mut mesh.source {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
        if let Some(environment) = &mut self.environment {
            if environment.root.is_relative() {
                environment.root = base.join(&environment.root);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[window]
width = 1280

[render]
fov = 45.0
on_frame_error = "halt"

[scene]
light_power = 8.0
draw_light_marker = true

[environment]
root = "sky"

[[meshes]]
name = "teapot"
source = { obj = "assets/teapot.obj" }
fitting = [{ rotate_x = -1.5708 }, { scale = 0.15 }]

[[meshes]]
name = "ball"
source = { primitive = "sphere" }

[[constants]]
model = "phong"
slot = "exponent"
value = 80.0

[[constants]]
model = "metallic"
slot = "specular_color"
value = [1.0, 0.8, 0.5]
"#;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ViewerConfig::parse("").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.render.settings.fov, 35.0);
        assert_eq!(config.render.on_frame_error, ErrorPolicy::Continue);
        assert!(config.environment.is_none());
        assert_eq!(config.meshes(), vec![MeshConfig::default()]);
    }

    #[test]
    fn sample_config_parses() {
        let config = ViewerConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 768);
        assert_eq!(config.render.settings.fov, 45.0);
        assert_eq!(config.render.settings.near, 0.1);
        assert_eq!(config.render.on_frame_error, ErrorPolicy::Halt);
        assert_eq!(config.scene.light_power, 8.0);
        assert!(config.scene.draw_light_marker);
        assert_eq!(
            config.environment.as_ref().unwrap().faces,
            CubeSources::default()
        );

        assert_eq!(config.meshes.len(), 2);
        assert_eq!(
            config.meshes[0].source,
            MeshSource::Obj(PathBuf::from("assets/teapot.obj"))
        );
        assert_eq!(
            config.meshes[0].fitting,
            vec![FitStep::RotateX(-1.5708), FitStep::Scale(0.15)]
        );
        assert_eq!(config.meshes[1].source, MeshSource::Primitive(Primitive::Sphere));
        assert!(config.meshes[1].fitting.is_empty());
    }

    #[test]
    fn shipped_viewer_config_parses() {
        let config = ViewerConfig::parse(include_str!("../viewer.toml")).unwrap();
        let names: Vec<_> = config.meshes.iter().map(|mesh| mesh.name.as_str()).collect();
        assert_eq!(names, ["teapot", "bunny", "rock", "sphere"]);
        assert_eq!(
            config.environment.as_ref().unwrap().root,
            PathBuf::from("assets/Yokohama2")
        );
        assert_eq!(config.constant_overrides().len(), 2);
    }

    #[test]
    fn constants_become_overrides() {
        let config = ViewerConfig::parse(SAMPLE).unwrap();
        let overrides = config.constant_overrides();
        assert_eq!(
            overrides,
            vec![
                ConstantOverride {
                    model: ShadingModel::Phong,
                    slot: "exponent".to_owned(),
                    value: UniformValue::F32(80.0),
                },
                ConstantOverride {
                    model: ShadingModel::Metallic,
                    slot: "specular_color".to_owned(),
                    value: UniformValue::Vec3([1.0, 0.8, 0.5]),
                },
            ]
        );
    }

    #[test]
    fn paths_resolve_against_the_config_directory() {
        let dir = std::env::temp_dir().join(format!("shadeview-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("viewer.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = ViewerConfig::load(&path).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(
            config.meshes[0].source,
            MeshSource::Obj(dir.join("assets/teapot.obj"))
        );
        assert_eq!(config.environment.unwrap().root, dir.join("sky"));
    }

    #[test]
    fn errors_name_the_file() {
        let missing = Path::new("/nonexistent/viewer.toml");
        let err = ViewerConfig::load(missing).unwrap_err();
        assert!(matches!(err, ConfigError::Io { ref path, .. } if path == missing));

        assert!(ViewerConfig::parse("[render]\non_frame_error = \"explode\"").is_err());
    }

    #[test]
    fn primitives_load_without_files() {
        let sphere = MeshSource::Primitive(Primitive::Sphere).load().unwrap();
        assert!(sphere.validate("sphere").is_ok());
        assert!(MeshSource::Obj(PathBuf::from("/nonexistent.obj"))
            .load()
            .is_err());
    }
}
