//! Named bind slots and the per-program slot table

use crate::gfx::device::{GpuDevice, ProgramId, UniformLocation};

/// Every named slot a shading program may expose
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Projection,
    ModelView,
    NormalMatrix,
    LightPosition,
    LightPower,
    DiffuseColor,
    Ambient,
    Exponent,
    Ior,
    Beta,
    SpecularColor,
    EnvironmentMap,
    UseEnvironmentMap,
}

impl Slot {
    pub const ALL: [Slot; 13] = [
        Slot::Projection,
        Slot::ModelView,
        Slot::NormalMatrix,
        Slot::LightPosition,
        Slot::LightPower,
        Slot::DiffuseColor,
        Slot::Ambient,
        Slot::Exponent,
        Slot::Ior,
        Slot::Beta,
        Slot::SpecularColor,
        Slot::EnvironmentMap,
        Slot::UseEnvironmentMap,
    ];

    /// Slots a program must expose to be usable at all
    pub const REQUIRED: [Slot; 5] = [
        Slot::Projection,
        Slot::ModelView,
        Slot::NormalMatrix,
        Slot::LightPosition,
        Slot::LightPower,
    ];

    /// Name of the slot in shader source
    pub fn name(self) -> &'static str {
        match self {
            Slot::Projection => "p_matrix",
            Slot::ModelView => "mv_matrix",
            Slot::NormalMatrix => "n_matrix",
            Slot::LightPosition => "light_pos",
            Slot::LightPower => "light_power",
            Slot::DiffuseColor => "diffuse_color",
            Slot::Ambient => "ambient",
            Slot::Exponent => "exponent",
            Slot::Ior => "ior",
            Slot::Beta => "beta",
            Slot::SpecularColor => "specular_color",
            Slot::EnvironmentMap => "environment_map",
            Slot::UseEnvironmentMap => "use_environment_map",
        }
    }

    pub fn from_name(name: &str) -> Option<Slot> {
        Slot::ALL.into_iter().find(|slot| slot.name() == name)
    }
}

/// Locations of the slots one program exposes; absent slots stay `None`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlotTable {
    pub projection: Option<UniformLocation>,
    pub model_view: Option<UniformLocation>,
    pub normal_matrix: Option<UniformLocation>,
    pub light_position: Option<UniformLocation>,
    pub light_power: Option<UniformLocation>,
    pub diffuse_color: Option<UniformLocation>,
    pub ambient: Option<UniformLocation>,
    pub exponent: Option<UniformLocation>,
    pub ior: Option<UniformLocation>,
    pub beta: Option<UniformLocation>,
    pub specular_color: Option<UniformLocation>,
    pub environment_map: Option<UniformLocation>,
    pub use_environment_map: Option<UniformLocation>,
}

impl SlotTable {
    /// Looks every known slot up once; what the program lacks stays absent
    pub fn discover(device: &dyn GpuDevice, program: ProgramId) -> Self {
        let mut table = SlotTable::default();
        for slot in Slot::ALL {
            *table.field_mut(slot) = device.uniform_location(program, slot.name());
        }
        table
    }

    pub fn get(&self, slot: Slot) -> Option<UniformLocation> {
        match slot {
            Slot::Projection => self.projection,
            Slot::ModelView => self.model_view,
            Slot::NormalMatrix => self.normal_matrix,
            Slot::LightPosition => self.light_position,
            Slot::LightPower => self.light_power,
            Slot::DiffuseColor => self.diffuse_color,
            Slot::Ambient => self.ambient,
            Slot::Exponent => self.exponent,
            Slot::Ior => self.ior,
            Slot::Beta => self.beta,
            Slot::SpecularColor => self.specular_color,
            Slot::EnvironmentMap => self.environment_map,
            Slot::UseEnvironmentMap => self.use_environment_map,
        }
    }

    pub fn has(&self, slot: Slot) -> bool {
        self.get(slot).is_some()
    }

    /// Names of required slots the program does not expose
    pub fn missing_required(&self) -> Vec<&'static str> {
        Slot::REQUIRED
            .into_iter()
            .filter(|slot| !self.has(*slot))
            .map(Slot::name)
            .collect()
    }

    fn field_mut(&mut self, slot: Slot) -> &mut Option<UniformLocation> {
        match slot {
            Slot::Projection => &mut self.projection,
            Slot::ModelView => &mut self.model_view,
            Slot::NormalMatrix => &mut self.normal_matrix,
            Slot::LightPosition => &mut self.light_position,
            Slot::LightPower => &mut self.light_power,
            Slot::DiffuseColor => &mut self.diffuse_color,
            Slot::Ambient => &mut self.ambient,
            Slot::Exponent => &mut self.exponent,
            Slot::Ior => &mut self.ior,
            Slot::Beta => &mut self.beta,
            Slot::SpecularColor => &mut self.specular_color,
            Slot::EnvironmentMap => &mut self.environment_map,
            Slot::UseEnvironmentMap => &mut self.use_environment_map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for slot in Slot::ALL {
            assert_eq!(Slot::from_name(slot.name()), Some(slot));
        }
        assert_eq!(Slot::from_name("roughness"), None);
    }

    #[test]
    fn empty_table_misses_every_required_slot() {
        let table = SlotTable::default();
        assert_eq!(
            table.missing_required(),
            vec!["p_matrix", "mv_matrix", "n_matrix", "light_pos", "light_power"]
        );
    }
}
