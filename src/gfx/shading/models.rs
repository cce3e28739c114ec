//! The shading models the viewer ships
//!
//! A model is nothing more than a fragment stage plus the constants it is
//! given once at startup. All of them share the same vertex stage except the
//! environment program, which draws the sky cube.

use serde::{Deserialize, Serialize};

use super::slots::Slot;
use crate::gfx::device::UniformValue;

const SHADING_VS: &str = include_str!("../shaders/shading_vs.wgsl");
const SKYBOX_VS: &str = include_str!("../shaders/skybox_vs.wgsl");

const WHITE: UniformValue = UniformValue::Vec3([1.0, 1.0, 1.0]);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadingModel {
    Lambertian,
    HalfLambert,
    BandedLambert,
    PhongSpecular,
    BlinnSpecular,
    Phong,
    BlinnPhong,
    Microfacet,
    Metallic,
    /// Dedicated sky cube program; registered last, never selectable
    Environment,
}

impl ShadingModel {
    /// Registration order; the environment program is always last
    pub const ALL: [ShadingModel; 10] = [
        ShadingModel::Lambertian,
        ShadingModel::HalfLambert,
        ShadingModel::BandedLambert,
        ShadingModel::PhongSpecular,
        ShadingModel::BlinnSpecular,
        ShadingModel::Phong,
        ShadingModel::BlinnPhong,
        ShadingModel::Microfacet,
        ShadingModel::Metallic,
        ShadingModel::Environment,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ShadingModel::Lambertian => "Lambertian",
            ShadingModel::HalfLambert => "Half-Lambert",
            ShadingModel::BandedLambert => "Banded Lambert",
            ShadingModel::PhongSpecular => "Phong specular",
            ShadingModel::BlinnSpecular => "Blinn specular",
            ShadingModel::Phong => "Phong",
            ShadingModel::BlinnPhong => "Blinn-Phong",
            ShadingModel::Microfacet => "Microfacet",
            ShadingModel::Metallic => "Metallic",
            ShadingModel::Environment => "Environment",
        }
    }

    pub fn vertex_source(self) -> &'static str {
        match self {
            ShadingModel::Environment => SKYBOX_VS,
            _ => SHADING_VS,
        }
    }

    pub fn fragment_source(self) -> &'static str {
        match self {
            ShadingModel::Lambertian => include_str!("../shaders/lambertian_fs.wgsl"),
            ShadingModel::HalfLambert => include_str!("../shaders/half_lambert_fs.wgsl"),
            ShadingModel::BandedLambert => include_str!("../shaders/banded_lambert_fs.wgsl"),
            ShadingModel::PhongSpecular => include_str!("../shaders/phong_specular_fs.wgsl"),
            ShadingModel::BlinnSpecular => include_str!("../shaders/blinn_specular_fs.wgsl"),
            ShadingModel::Phong => include_str!("../shaders/phong_fs.wgsl"),
            ShadingModel::BlinnPhong => include_str!("../shaders/blinn_phong_fs.wgsl"),
            ShadingModel::Microfacet => include_str!("../shaders/microfacet_fs.wgsl"),
            ShadingModel::Metallic => include_str!("../shaders/metallic_fs.wgsl"),
            ShadingModel::Environment => include_str!("../shaders/skybox_fs.wgsl"),
        }
    }

    /// Constants applied once when the program is registered
    pub fn default_constants(self) -> &'static [(Slot, UniformValue)] {
        match self {
            ShadingModel::PhongSpecular | ShadingModel::BlinnSpecular => {
                &[(Slot::SpecularColor, WHITE)]
            }
            ShadingModel::Phong | ShadingModel::BlinnPhong | ShadingModel::Metallic => &[
                (Slot::Exponent, UniformValue::F32(50.0)),
                (Slot::SpecularColor, WHITE),
            ],
            ShadingModel::Microfacet => &[
                (Slot::Ior, UniformValue::F32(5.0)),
                (Slot::Beta, UniformValue::F32(0.2)),
                (Slot::SpecularColor, WHITE),
            ],
            ShadingModel::Lambertian
            | ShadingModel::HalfLambert
            | ShadingModel::BandedLambert
            | ShadingModel::Environment => &[],
        }
    }
}
