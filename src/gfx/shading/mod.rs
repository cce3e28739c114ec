//! # Shading Model Registry
//!
//! Compiles one program per lighting algorithm, discovers which named slots
//! each program exposes and applies the per-model startup constants.
//!
//! Binding code never branches on which model a program implements. It asks
//! the program's [`SlotTable`] whether a slot exists and skips it otherwise,
//! so models with very different parameter sets share one draw path.

pub mod models;
pub mod slots;

pub use models::ShadingModel;
pub use slots::{Slot, SlotTable};

use crate::gfx::device::{
    AttributeLocation, CompileError, GpuDevice, ProgramId, UniformValue,
};

/// Errors raised while configuring or selecting shading programs
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShadingError {
    #[error("program '{program}' has no slot named '{slot}'")]
    UnknownSlot { program: String, slot: String },
    #[error("shading model {index} is unavailable")]
    ModelUnavailable { index: usize },
}

/// A compiled program and the slots it was found to expose
#[derive(Clone, Debug, PartialEq)]
pub struct ShadingProgram {
    pub id: ProgramId,
    pub model: ShadingModel,
    pub position: Option<AttributeLocation>,
    pub normal: Option<AttributeLocation>,
    pub slots: SlotTable,
}

impl ShadingProgram {
    pub fn label(&self) -> &'static str {
        self.model.label()
    }

    pub fn has_slot(&self, slot: Slot) -> bool {
        self.slots.has(slot)
    }
}

/// A startup constant supplied from outside (configuration)
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantOverride {
    pub model: ShadingModel,
    pub slot: String,
    pub value: UniformValue,
}

struct Registration {
    model: ShadingModel,
    program: Result<ShadingProgram, CompileError>,
}

/// Every registered program, in registration order
///
/// The last registration is the environment program used by the background
/// pass; every earlier one is a selectable shading model.
#[derive(Default)]
pub struct ShadingModelRegistry {
    registrations: Vec<Registration>,
}

impl ShadingModelRegistry {
    /// Registers every built-in model, the environment program last
    pub fn initialize(device: &mut dyn GpuDevice, overrides: &[ConstantOverride]) -> Self {
        let mut registry = ShadingModelRegistry::default();
        for model in ShadingModel::ALL {
            registry.register(
                device,
                model,
                model.vertex_source(),
                model.fragment_source(),
                overrides,
            );
        }
        log::info!(
            "{} of {} shading models available",
            registry.available_count(),
            registry.selectable_count()
        );
        registry
    }

    /// Compiles `model` from the given sources and applies its constants
    ///
    /// A program that fails to compile is recorded as unavailable.
    pub fn register(
        &mut self,
        device: &mut dyn GpuDevice,
        model: ShadingModel,
        vertex_source: &str,
        fragment_source: &str,
        overrides: &[ConstantOverride],
    ) {
        let program = Self::compile(device, model, vertex_source, fragment_source);
        match &program {
            Ok(program) => {
                let constants = model
                    .default_constants()
                    .iter()
                    .map(|(slot, value)| (slot.name(), *value))
                    .chain(
                        overrides
                            .iter()
                            .filter(|constant| constant.model == model)
                            .map(|constant| (constant.slot.as_str(), constant.value)),
                    );
                for (slot, value) in constants {
                    if let Err(err) = Self::set_constant(device, program, slot, value) {
                        log::warn!("Skipping constant: {}", err);
                    }
                }
                log::info!("Compiled shading model '{}'", model.label());
            }
            Err(err) => {
                log::error!("Shading model '{}' is unavailable: {}", model.label(), err);
            }
        }
        self.registrations.push(Registration { model, program });
    }

    /// Compiles and links a program, then binds its slots
    ///
    /// Fails if either stage fails, or if a required slot is missing.
    pub fn compile(
        device: &mut dyn GpuDevice,
        model: ShadingModel,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ShadingProgram, CompileError> {
        let id = device.compile_program(model.label(), vertex_source, fragment_source)?;
        let slots = Self::bind_slots(device, id);

        let missing = slots.missing_required();
        if !missing.is_empty() {
            return Err(CompileError::MissingSlots {
                label: model.label().to_owned(),
                slots: missing,
            });
        }

        Ok(ShadingProgram {
            id,
            model,
            position: device.attribute_location(id, "position"),
            normal: device.attribute_location(id, "normal"),
            slots,
        })
    }

    /// Records which of the named slots the program exposes
    pub fn bind_slots(device: &dyn GpuDevice, program: ProgramId) -> SlotTable {
        SlotTable::discover(device, program)
    }

    /// Uploads a constant into a named slot of `program`
    pub fn set_constant(
        device: &mut dyn GpuDevice,
        program: &ShadingProgram,
        slot: &str,
        value: UniformValue,
    ) -> Result<(), ShadingError> {
        let location = Slot::from_name(slot)
            .and_then(|slot| program.slots.get(slot))
            .ok_or_else(|| ShadingError::UnknownSlot {
                program: program.label().to_owned(),
                slot: slot.to_owned(),
            })?;
        device.set_uniform(location, value);
        Ok(())
    }

    /// Number of selectable models, available or not
    pub fn selectable_count(&self) -> usize {
        self.registrations.len().saturating_sub(1)
    }

    pub fn available_count(&self) -> usize {
        (0..self.selectable_count())
            .filter(|index| self.is_selectable(*index))
            .count()
    }

    pub fn is_selectable(&self, index: usize) -> bool {
        self.program(index).is_ok()
    }

    /// The selectable program at `index`
    pub fn program(&self, index: usize) -> Result<&ShadingProgram, ShadingError> {
        if index >= self.selectable_count() {
            return Err(ShadingError::ModelUnavailable { index });
        }
        self.registrations[index]
            .program
            .as_ref()
            .map_err(|_| ShadingError::ModelUnavailable { index })
    }

    pub fn model(&self, index: usize) -> Option<ShadingModel> {
        self.registrations.get(index).map(|entry| entry.model)
    }

    /// The last registered program, drawn by the background pass
    pub fn environment_program(&self) -> Option<&ShadingProgram> {
        self.registrations
            .last()
            .and_then(|entry| entry.program.as_ref().ok())
    }
}
