//! # Frame Renderer
//!
//! Draws one frame in three passes: the sky cube behind everything, the
//! active mesh under the active shading model, and the optional light marker.
//!
//! Uniforms are uploaded through the program's [`SlotTable`]; a slot the
//! program does not expose is skipped, which is how one draw path serves every
//! shading model. GPU errors are collected after each pass, logged with the
//! pass name, and the first one is returned once the frame has been presented.

use cgmath::{Matrix4, SquareMatrix};

use crate::gfx::{
    device::{
        AttributeLocation, BufferId, BufferKind, CompileError, GpuDevice, ProgramId, Topology,
        UniformLocation, UniformValue,
    },
    environment::{EnvironmentMap, EnvironmentTexture},
    geometry::{GeometryStore, Mesh},
    scene::SceneState,
    shading::{ShadingModelRegistry, ShadingProgram, Slot, SlotTable},
};

use super::transforms::{normal_matrix, FrameMatrices, RenderSettings};

const MARKER_VS: &str = include_str!("../shaders/light_marker_vs.wgsl");
const MARKER_FS: &str = include_str!("../shaders/light_marker_fs.wgsl");

/// A GPU error raised while drawing a frame
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("GPU error during the {pass} pass: {message}")]
pub struct RuntimeDrawError {
    pub pass: &'static str,
    pub message: String,
}

/// Point-sprite program showing where the light is
struct LightMarker {
    program: ProgramId,
    projection: UniformLocation,
    position: AttributeLocation,
    buffer: BufferId,
}

impl LightMarker {
    fn compile(device: &mut dyn GpuDevice) -> Result<Self, CompileError> {
        let program = device.compile_program("light marker", MARKER_VS, MARKER_FS)?;
        let projection = device.uniform_location(program, Slot::Projection.name());
        let position = device.attribute_location(program, "position");
        let (Some(projection), Some(position)) = (projection, position) else {
            return Err(CompileError::MissingSlots {
                label: "light marker".to_owned(),
                slots: vec![Slot::Projection.name(), "position"],
            });
        };
        let buffer = device.create_buffer(BufferKind::Vertex, "light marker position");
        Ok(Self {
            program,
            projection,
            position,
            buffer,
        })
    }
}

pub struct FrameRenderer {
    settings: RenderSettings,
    marker: Option<LightMarker>,
    draw_calls: u32,
}

impl FrameRenderer {
    /// Compiles the light marker program; the marker pass is dropped if that fails
    pub fn new(device: &mut dyn GpuDevice, settings: RenderSettings) -> Self {
        let marker = match LightMarker::compile(device) {
            Ok(marker) => Some(marker),
            Err(err) => {
                log::warn!("Light marker disabled: {}", err);
                None
            }
        };
        Self {
            settings,
            marker,
            draw_calls: 0,
        }
    }

    /// Draws issued by the last frame
    pub fn draw_calls(&self) -> u32 {
        self.draw_calls
    }

    pub fn render_frame(
        &mut self,
        device: &mut dyn GpuDevice,
        scene: &SceneState,
        geometry: &GeometryStore,
        registry: &ShadingModelRegistry,
        environment: &EnvironmentMap,
    ) -> Result<(), RuntimeDrawError> {
        let mut first_error = None;
        self.draw_calls = 0;

        device.clear(self.settings.clear_color);

        let mesh = geometry.get(scene.mesh());
        let fitting = mesh.map_or_else(Matrix4::identity, Mesh::fitting);
        let matrices = FrameMatrices::compute(
            &self.settings,
            scene,
            fitting,
            device.viewport_size(),
            device.clip_space_correction(),
        );

        if scene.draw_background() {
            if let (Some(texture), Some(program)) =
                (environment.texture(), registry.environment_program())
            {
                self.draw_background(device, &matrices, environment, texture, program);
                self.draw_calls += 1;
                collect_errors(device, "background", &mut first_error);
            }
        }

        match (mesh, registry.program(scene.model())) {
            (Some(mesh), Ok(program)) => {
                self.draw_object(device, &matrices, scene, mesh, program, environment);
                self.draw_calls += 1;
                collect_errors(device, "object", &mut first_error);
            }
            (None, _) => log::trace!("No mesh {} to draw", scene.mesh()),
            (_, Err(err)) => log::trace!("Skipping object pass: {}", err),
        }

        if scene.draw_light_marker() {
            if let Some(marker) = &self.marker {
                draw_marker(device, marker, &matrices);
                self.draw_calls += 1;
                collect_errors(device, "light marker", &mut first_error);
            }
        }

        device.present();
        collect_errors(device, "present", &mut first_error);

        first_error.map_or(Ok(()), Err)
    }

    fn draw_background(
        &self,
        device: &mut dyn GpuDevice,
        matrices: &FrameMatrices,
        environment: &EnvironmentMap,
        texture: EnvironmentTexture,
        program: &ShadingProgram,
    ) {
        let unit = self.settings.environment_unit;
        let slots = &program.slots;

        device.set_depth_write(false);
        device.use_program(program.id);
        upload(device, slots, Slot::Projection, UniformValue::mat4(matrices.projection));
        upload(
            device,
            slots,
            Slot::ModelView,
            UniformValue::mat4(matrices.background_model_view),
        );
        upload(
            device,
            slots,
            Slot::NormalMatrix,
            UniformValue::mat4(normal_matrix(matrices.background_model_view)),
        );
        device.bind_texture(unit, texture.texture);
        upload(device, slots, Slot::EnvironmentMap, UniformValue::TextureUnit(unit));
        upload(device, slots, Slot::UseEnvironmentMap, UniformValue::I32(1));

        if let Some(position) = program.position {
            device.bind_vertex_buffer(position, environment.cube_positions());
        }
        device.bind_index_buffer(environment.cube_indices());
        device.draw_indexed(Topology::Triangles, environment.index_count());
        device.set_depth_write(true);
    }

    fn draw_object(
        &self,
        device: &mut dyn GpuDevice,
        matrices: &FrameMatrices,
        scene: &SceneState,
        mesh: &Mesh,
        program: &ShadingProgram,
        environment: &EnvironmentMap,
    ) {
        let slots = &program.slots;

        device.use_program(program.id);
        upload(device, slots, Slot::Projection, UniformValue::mat4(matrices.projection));
        upload(
            device,
            slots,
            Slot::ModelView,
            UniformValue::mat4(matrices.object_model_view),
        );
        upload(
            device,
            slots,
            Slot::NormalMatrix,
            UniformValue::mat4(matrices.normal_matrix),
        );
        upload(
            device,
            slots,
            Slot::LightPosition,
            UniformValue::Vec3(matrices.light_position.into()),
        );
        upload(device, slots, Slot::LightPower, UniformValue::F32(scene.light_power()));
        upload(
            device,
            slots,
            Slot::DiffuseColor,
            UniformValue::Vec3(scene.diffuse_color()),
        );
        upload(device, slots, Slot::Ambient, UniformValue::F32(scene.ambient()));

        // Reflections need both the sampler slot and a published texture
        let texture = environment
            .texture()
            .filter(|_| slots.has(Slot::EnvironmentMap));
        if let Some(texture) = texture {
            let unit = self.settings.environment_unit;
            device.bind_texture(unit, texture.texture);
            upload(device, slots, Slot::EnvironmentMap, UniformValue::TextureUnit(unit));
        }
        let reflect = texture.is_some() && scene.draw_background();
        upload(
            device,
            slots,
            Slot::UseEnvironmentMap,
            UniformValue::I32(reflect as i32),
        );

        if let Some(position) = program.position {
            device.bind_vertex_buffer(position, mesh.position_buffer());
        }
        if let Some(normal) = program.normal {
            device.bind_vertex_buffer(normal, mesh.normal_buffer());
        }
        device.bind_index_buffer(mesh.index_buffer());
        device.draw_indexed(Topology::Triangles, mesh.index_count());
    }
}

fn draw_marker(device: &mut dyn GpuDevice, marker: &LightMarker, matrices: &FrameMatrices) {
    let position: [f32; 3] = matrices.light_position.into();
    device.upload_buffer(marker.buffer, bytemuck::cast_slice(&position));

    device.use_program(marker.program);
    device.set_uniform(marker.projection, UniformValue::mat4(matrices.projection));
    device.bind_vertex_buffer(marker.position, marker.buffer);
    device.draw_arrays(Topology::Points, 0, 1);
}

/// Sets `slot` if the program exposes it
fn upload(device: &mut dyn GpuDevice, slots: &SlotTable, slot: Slot, value: UniformValue) {
    if let Some(location) = slots.get(slot) {
        device.set_uniform(location, value);
    }
}

/// Drains queued GPU errors, keeping the first for the caller
fn collect_errors(
    device: &mut dyn GpuDevice,
    pass: &'static str,
    first_error: &mut Option<RuntimeDrawError>,
) {
    while let Some(message) = device.take_error() {
        log::error!("GPU error during the {} pass: {}", pass, message);
        if first_error.is_none() {
            *first_error = Some(RuntimeDrawError { pass, message });
        }
    }
}
