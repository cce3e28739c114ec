//! WGSL compile/link front end
//!
//! Parses and validates each stage with naga, then "links" a vertex and a
//! fragment module into a [`ProgramLayout`]: the named slots a program exposes,
//! their byte offsets inside the program's uniform block, its vertex attributes
//! and its texture/sampler bindings. Both device backends share this so slot
//! discovery behaves identically with and without a GPU.

use std::collections::BTreeMap;

use naga::{AddressSpace, Binding, Module, ScalarKind, TypeInner, VectorSize};

use super::{CompileError, ShaderStage, UniformValue};

/// Entry point name of every vertex stage
pub const VERTEX_ENTRY: &str = "vs_main";
/// Entry point name of every fragment stage
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Host-shareable type of a uniform struct member
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UniformKind {
    F32,
    I32,
    Vec3,
    Mat4,
}

impl UniformKind {
    /// Size in bytes inside the uniform block
    pub fn size(self) -> u32 {
        match self {
            UniformKind::F32 | UniformKind::I32 => 4,
            UniformKind::Vec3 => 12,
            UniformKind::Mat4 => 64,
        }
    }

    fn from_naga(inner: &TypeInner) -> Option<Self> {
        let float32 = naga::Scalar {
            kind: ScalarKind::Float,
            width: 4,
        };
        match *inner {
            TypeInner::Scalar(scalar) if scalar == float32 => Some(UniformKind::F32),
            TypeInner::Scalar(naga::Scalar {
                kind: ScalarKind::Sint,
                width: 4,
            }) => Some(UniformKind::I32),
            TypeInner::Vector {
                size: VectorSize::Tri,
                scalar,
            } if scalar == float32 => Some(UniformKind::Vec3),
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar,
            } if scalar == float32 => Some(UniformKind::Mat4),
            _ => None,
        }
    }
}

/// Where a named slot lives
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotBinding {
    /// Member of the program's uniform struct
    Member { offset: u32, kind: UniformKind },
    /// Cube texture global at the given group-0 binding
    Texture { binding: u32 },
}

/// A named slot discovered in a linked program
#[derive(Clone, Debug, PartialEq)]
pub struct SlotInfo {
    pub name: String,
    pub binding: SlotBinding,
}

impl SlotInfo {
    /// Whether `value` may be stored in this slot
    pub fn accepts(&self, value: &UniformValue) -> bool {
        match (self.binding, value) {
            (SlotBinding::Texture { .. }, UniformValue::TextureUnit(_)) => true,
            (SlotBinding::Member { kind, .. }, value) => matches!(
                (kind, value),
                (UniformKind::F32, UniformValue::F32(_))
                    | (UniformKind::I32, UniformValue::I32(_))
                    | (UniformKind::Vec3, UniformValue::Vec3(_))
                    | (UniformKind::Mat4, UniformValue::Mat4(_))
            ),
            _ => false,
        }
    }
}

/// A vertex input of the linked program
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: String,
    pub location: u32,
    pub components: u8,
}

/// Everything a backend needs to know about a linked program
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgramLayout {
    /// Group-0 binding of the uniform block, if the program has one
    pub uniform_binding: Option<u32>,
    /// Size in bytes of the uniform block (largest span across stages)
    pub uniform_size: u32,
    pub slots: Vec<SlotInfo>,
    pub attributes: Vec<AttributeInfo>,
    pub sampler_bindings: Vec<u32>,
}

impl ProgramLayout {
    pub fn slot_index(&self, name: &str) -> Option<u32> {
        self.slots
            .iter()
            .position(|slot| slot.name == name)
            .map(|index| index as u32)
    }

    pub fn attribute_index(&self, name: &str) -> Option<u32> {
        self.attributes
            .iter()
            .position(|attribute| attribute.name == name)
            .map(|index| index as u32)
    }

    pub fn slot(&self, index: u32) -> Option<&SlotInfo> {
        self.slots.get(index as usize)
    }

    /// Texture slots as (slot index, binding) pairs
    pub fn texture_slots(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot.binding {
                SlotBinding::Texture { binding } => Some((index as u32, binding)),
                SlotBinding::Member { .. } => None,
            })
    }
}

/// Parses and validates one stage, returning the compiler diagnostic on failure
pub fn compile_stage(label: &str, stage: ShaderStage, source: &str) -> Result<Module, CompileError> {
    let stage_error = |diagnostic: String| CompileError::Stage {
        label: label.to_owned(),
        stage,
        diagnostic,
    };

    let module = naga::front::wgsl::parse_str(source)
        .map_err(|err| stage_error(err.emit_to_string(source)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    );
    validator
        .validate(&module)
        .map_err(|err| stage_error(err.emit_to_string(source)))?;

    Ok(module)
}

/// Compiles both stages and links them
pub fn compile_and_link(
    label: &str,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<ProgramLayout, CompileError> {
    let vertex = compile_stage(label, ShaderStage::Vertex, vertex_source)?;
    let fragment = compile_stage(label, ShaderStage::Fragment, fragment_source)?;
    link(label, &vertex, &fragment)
}

/// Interface of a single stage as seen by the linker
#[derive(Default)]
struct StageInterface {
    uniform: Option<UniformBlock>,
    textures: Vec<(String, u32)>,
    samplers: Vec<u32>,
    inputs: Vec<AttributeInfo>,
    outputs: Vec<u32>,
}

struct UniformBlock {
    binding: u32,
    span: u32,
    members: Vec<(String, u32, UniformKind)>,
}

/// Links a compiled vertex and fragment module
pub fn link(label: &str, vertex: &Module, fragment: &Module) -> Result<ProgramLayout, CompileError> {
    let link_error = |diagnostic: String| CompileError::Link {
        label: label.to_owned(),
        diagnostic,
    };

    let vs = reflect_stage(vertex, VERTEX_ENTRY, naga::ShaderStage::Vertex).map_err(link_error)?;
    let fs =
        reflect_stage(fragment, FRAGMENT_ENTRY, naga::ShaderStage::Fragment).map_err(link_error)?;

    for input in &fs.inputs {
        if !vs.outputs.contains(&input.location) {
            return Err(link_error(format!(
                "fragment input '{}' at location {} is not written by the vertex stage",
                input.name, input.location
            )));
        }
    }

    let mut layout = ProgramLayout {
        attributes: vs.inputs,
        ..Default::default()
    };

    let mut members: Vec<(String, u32, UniformKind)> = Vec::new();
    for block in [vs.uniform, fs.uniform].into_iter().flatten() {
        match layout.uniform_binding {
            Some(binding) if binding != block.binding => {
                return Err(link_error(format!(
                    "uniform block bound at {} in one stage and {} in the other",
                    binding, block.binding
                )));
            }
            _ => layout.uniform_binding = Some(block.binding),
        }
        layout.uniform_size = layout.uniform_size.max(block.span);

        for (name, offset, kind) in block.members {
            match members.iter().find(|(existing, _, _)| *existing == name) {
                Some((_, existing_offset, existing_kind)) => {
                    if *existing_offset != offset || *existing_kind != kind {
                        return Err(link_error(format!(
                            "uniform '{}' is declared differently in the two stages \
                             (offset {} as {:?} vs offset {} as {:?})",
                            name, existing_offset, existing_kind, offset, kind
                        )));
                    }
                }
                None => members.push((name, offset, kind)),
            }
        }
    }

    layout.slots = members
        .into_iter()
        .map(|(name, offset, kind)| SlotInfo {
            name,
            binding: SlotBinding::Member { offset, kind },
        })
        .collect();

    let mut textures: BTreeMap<u32, String> = BTreeMap::new();
    for (name, binding) in vs.textures.into_iter().chain(fs.textures) {
        if let Some(existing) = textures.get(&binding) {
            if *existing != name {
                return Err(link_error(format!(
                    "binding {} is the texture '{}' in one stage and '{}' in the other",
                    binding, existing, name
                )));
            }
        }
        textures.insert(binding, name);
    }

    let mut samplers: Vec<u32> = vs.samplers.into_iter().chain(fs.samplers).collect();
    samplers.sort_unstable();
    samplers.dedup();

    let mut used = layout.uniform_binding.into_iter().collect::<Vec<_>>();
    for binding in textures.keys().chain(samplers.iter()) {
        if used.contains(binding) {
            return Err(link_error(format!("binding {} is used by two resources", binding)));
        }
        used.push(*binding);
    }

    layout.slots.extend(textures.into_iter().map(|(binding, name)| SlotInfo {
        name,
        binding: SlotBinding::Texture { binding },
    }));
    layout.sampler_bindings = samplers;

    Ok(layout)
}

fn reflect_stage(
    module: &Module,
    entry: &str,
    stage: naga::ShaderStage,
) -> Result<StageInterface, String> {
    let entry_point = module
        .entry_points
        .iter()
        .find(|ep| ep.name == entry && ep.stage == stage)
        .ok_or_else(|| format!("missing {:?} entry point '{}'", stage, entry))?;

    let mut interface = StageInterface::default();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        let name = var.name.clone().unwrap_or_default();
        if binding.group != 0 {
            return Err(format!(
                "'{}' uses bind group {}; only group 0 is supported",
                name, binding.group
            ));
        }

        let inner = &module.types[var.ty].inner;
        match var.space {
            AddressSpace::Uniform => {
                if interface.uniform.is_some() {
                    return Err(format!("'{}' is a second uniform block in one stage", name));
                }
                let TypeInner::Struct { members, span } = inner else {
                    return Err(format!("uniform '{}' must be a struct", name));
                };
                let mut block = UniformBlock {
                    binding: binding.binding,
                    span: *span,
                    members: Vec::with_capacity(members.len()),
                };
                for member in members {
                    let member_name = member.name.clone().unwrap_or_default();
                    let kind = UniformKind::from_naga(&module.types[member.ty].inner)
                        .ok_or_else(|| {
                            format!("uniform member '{}' has an unsupported type", member_name)
                        })?;
                    block.members.push((member_name, member.offset, kind));
                }
                interface.uniform = Some(block);
            }
            AddressSpace::Handle => match inner {
                TypeInner::Image {
                    dim: naga::ImageDimension::Cube,
                    arrayed: false,
                    ..
                } => interface.textures.push((name, binding.binding)),
                TypeInner::Sampler { comparison: false } => {
                    interface.samplers.push(binding.binding)
                }
                _ => return Err(format!("'{}' is not a cube texture or filtering sampler", name)),
            },
            _ => return Err(format!("'{}' uses an unsupported address space", name)),
        }
    }

    for argument in &entry_point.function.arguments {
        let name = argument.name.clone().unwrap_or_default();
        collect_locations(module, &name, argument.ty, argument.binding.as_ref(), &mut interface.inputs);
    }

    if let Some(result) = &entry_point.function.result {
        let mut outputs = Vec::new();
        collect_locations(module, "", result.ty, result.binding.as_ref(), &mut outputs);
        interface.outputs = outputs.into_iter().map(|output| output.location).collect();
    }

    Ok(interface)
}

/// Gathers `@location` bindings from a value or the members of a struct value
fn collect_locations(
    module: &Module,
    name: &str,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
    into: &mut Vec<AttributeInfo>,
) {
    let inner = &module.types[ty].inner;
    match binding {
        Some(Binding::Location { location, .. }) => into.push(AttributeInfo {
            name: name.to_owned(),
            location: *location,
            components: component_count(inner),
        }),
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = inner {
                for member in members {
                    let member_name = member.name.clone().unwrap_or_default();
                    collect_locations(module, &member_name, member.ty, member.binding.as_ref(), into);
                }
            }
        }
    }
}

fn component_count(inner: &TypeInner) -> u8 {
    match *inner {
        TypeInner::Vector { size, .. } => size as u8,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
struct Uniforms {
    p_matrix: mat4x4<f32>,
    light_power: f32,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) normal: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = u.p_matrix * vec4<f32>(position, 1.0);
    out.color = normal * u.light_power;
    return out;
}
"#;

    const FS: &str = r#"
struct Uniforms {
    p_matrix: mat4x4<f32>,
    light_power: f32,
    tint: vec3<f32>,
}
@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var sky: texture_cube<f32>;
@group(0) @binding(2) var sky_sampler: sampler;

@fragment
fn fs_main(@location(0) color: vec3<f32>) -> @location(0) vec4<f32> {
    let env = textureSample(sky, sky_sampler, color).rgb;
    return vec4<f32>(color * u.tint + env, 1.0);
}
"#;

    #[test]
    fn links_slots_from_both_stages() {
        let layout = compile_and_link("test", VS, FS).unwrap();

        assert_eq!(layout.uniform_binding, Some(0));
        assert_eq!(
            layout.slot(layout.slot_index("light_power").unwrap()).unwrap().binding,
            SlotBinding::Member {
                offset: 64,
                kind: UniformKind::F32
            }
        );
        assert_eq!(
            layout.slot(layout.slot_index("tint").unwrap()).unwrap().binding,
            SlotBinding::Member {
                offset: 80,
                kind: UniformKind::Vec3
            }
        );
        assert_eq!(
            layout.slot(layout.slot_index("sky").unwrap()).unwrap().binding,
            SlotBinding::Texture { binding: 1 }
        );
        assert_eq!(layout.sampler_bindings, vec![2]);
        assert_eq!(layout.uniform_size, 96);
        assert_eq!(layout.attributes.len(), 2);
        assert_eq!(layout.attribute_index("normal"), Some(1));
        assert!(layout.slot_index("missing").is_none());
    }

    #[test]
    fn syntax_error_carries_diagnostic() {
        let err = compile_and_link("broken", VS, "fn fs_main( {").unwrap_err();
        match err {
            CompileError::Stage {
                stage, diagnostic, ..
            } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(!diagnostic.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn conflicting_member_offsets_fail_to_link() {
        let fs = FS.replace(
            "    p_matrix: mat4x4<f32>,\n    light_power: f32,\n    tint",
            "    light_power: f32,\n    p_matrix: mat4x4<f32>,\n    tint",
        );
        let err = compile_and_link("conflict", VS, &fs).unwrap_err();
        assert!(matches!(err, CompileError::Link { .. }), "{err}");
    }

    #[test]
    fn unmatched_fragment_input_fails_to_link() {
        let fs = FS.replace("@location(0) color", "@location(3) color");
        let err = compile_and_link("varyings", VS, &fs).unwrap_err();
        assert!(err.to_string().contains("location 3"), "{err}");
    }

    #[test]
    fn missing_entry_point_fails_to_link() {
        let fs = FS.replace("fn fs_main", "fn main");
        let err = compile_and_link("entry", VS, &fs).unwrap_err();
        assert!(err.to_string().contains("fs_main"), "{err}");
    }

    #[test]
    fn slot_type_checks() {
        let layout = compile_and_link("test", VS, FS).unwrap();
        let power = layout.slot(layout.slot_index("light_power").unwrap()).unwrap();
        let sky = layout.slot(layout.slot_index("sky").unwrap()).unwrap();

        assert!(power.accepts(&UniformValue::F32(1.0)));
        assert!(!power.accepts(&UniformValue::I32(1)));
        assert!(sky.accepts(&UniformValue::TextureUnit(0)));
        assert!(!sky.accepts(&UniformValue::F32(0.0)));
    }
}
