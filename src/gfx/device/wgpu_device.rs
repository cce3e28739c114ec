//! wgpu implementation of the GPU binding surface
//!
//! Calls are recorded GL-style while a frame is built: `set_uniform` writes
//! into a per-program CPU copy of the uniform block, every draw snapshots that
//! block into a [`UniformRing`] together with the buffers and textures bound at
//! that moment. [`GpuDevice::present`] turns the recorded draws into a single
//! render pass.
//!
//! Buffer and texture uploads go through the queue, so the last upload of a
//! buffer within a frame is the one every draw of that frame sees.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use cgmath::Matrix4;

use super::{
    pipelines::{PipelineCache, PipelineKey, ProgramModules},
    reflect::{self, ProgramLayout, SlotBinding},
    AttributeLocation, BufferId, BufferKind, CompileError, CubeFace, GpuDevice, ProgramId,
    TextureId, TextureSampling, Topology, UniformLocation, UniformValue,
};
use crate::gfx::resources::TextureResource;
use crate::wgpu_utils::UniformRing;

/// Maps GL clip space (z in [-1, 1]) onto wgpu clip space (z in [0, 1])
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Failure while bringing up the GPU
#[derive(Debug, thiserror::Error)]
pub enum DeviceInitError {
    #[error("failed to create a surface for the window: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to open the GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("the surface reports no supported texture format")]
    NoSurfaceFormat,
}

struct GpuBuffer {
    label: String,
    kind: BufferKind,
    buffer: Option<wgpu::Buffer>,
}

struct GpuProgram {
    layout: ProgramLayout,
    modules: ProgramModules,
    uniform_data: Vec<u8>,
    /// Texture slot index -> texture unit
    texture_units: HashMap<u32, u32>,
}

#[derive(Copy, Clone)]
enum DrawRange {
    Indexed { count: u32 },
    Arrays { first: u32, count: u32 },
}

struct RecordedDraw {
    key: PipelineKey,
    uniform_offset: Option<u32>,
    vertex_buffers: Vec<BufferId>,
    index_buffer: Option<BufferId>,
    range: DrawRange,
    /// (binding, texture) pairs; `None` samples the placeholder cube
    textures: Vec<(u32, Option<TextureId>)>,
}

/// State of the frame currently being recorded
struct FrameRecording {
    clear_color: wgpu::Color,
    draws: Vec<RecordedDraw>,
    current_program: Option<ProgramId>,
    depth_write: bool,
}

impl Default for FrameRecording {
    fn default() -> Self {
        Self {
            clear_color: wgpu::Color::BLACK,
            draws: Vec::new(),
            current_program: None,
            depth_write: true,
        }
    }
}

pub struct WgpuDevice {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    depth_texture: TextureResource,
    placeholder_cube: TextureResource,
    pipelines: PipelineCache,
    uniform_ring: UniformRing,
    buffers: Vec<GpuBuffer>,
    textures: Vec<TextureResource>,
    programs: Vec<GpuProgram>,
    vertex_bindings: HashMap<AttributeLocation, BufferId>,
    index_binding: Option<BufferId>,
    texture_bindings: HashMap<u32, TextureId>,
    frame: FrameRecording,
    errors: Arc<Mutex<VecDeque<String>>>,
}

impl WgpuDevice {
    /// Opens the GPU and configures a surface for `window`
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, DeviceInitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("WGPU Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: 4096,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let errors = Arc::new(Mutex::new(VecDeque::new()));
        let sink = Arc::clone(&errors);
        device.on_uncaptured_error(Box::new(move |error| {
            if let Ok(mut queue) = sink.lock() {
                queue.push_back(error.to_string());
            }
        }));

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .ok_or(DeviceInitError::NoSurfaceFormat)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            // One frame per display refresh
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture =
            TextureResource::create_depth_texture(&device, &config, "depth_texture");

        let placeholder_cube = TextureResource::create_cube(
            &device,
            1,
            TextureSampling::LINEAR_CLAMPED,
            "Placeholder Cube",
        );
        for face in CubeFace::ALL {
            placeholder_cube.upload_face(&queue, face, &[0, 0, 0, 255]);
        }

        let alignment = device.limits().min_uniform_buffer_offset_alignment;

        Ok(Self {
            surface,
            device: Arc::new(device),
            queue: Arc::new(queue),
            config,
            depth_texture,
            placeholder_cube,
            pipelines: PipelineCache::new(format, TextureResource::DEPTH_FORMAT),
            uniform_ring: UniformRing::new("Uniform Ring", alignment),
            buffers: Vec::new(),
            textures: Vec::new(),
            programs: Vec::new(),
            vertex_bindings: HashMap::new(),
            index_binding: None,
            texture_bindings: HashMap::new(),
            frame: FrameRecording::default(),
            errors,
        })
    }

    /// Reconfigures the surface; zero-sized requests (minimised window) are ignored
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            TextureResource::create_depth_texture(&self.device, &self.config, "depth_texture");
    }

    fn push_error(&self, message: String) {
        if let Ok(mut queue) = self.errors.lock() {
            queue.push_back(message);
        }
    }

    fn program(&self, program: ProgramId) -> Option<&GpuProgram> {
        self.programs.get(program.0 as usize)
    }

    fn gpu_buffer(&self, buffer: BufferId) -> Option<&wgpu::Buffer> {
        self.buffers
            .get(buffer.0 as usize)
            .and_then(|entry| entry.buffer.as_ref())
    }

    /// Snapshots the current state into a draw, or explains why it cannot be drawn
    fn record_draw(&mut self, topology: Topology, range: DrawRange) -> Result<(), String> {
        let program_id = self
            .frame
            .current_program
            .ok_or_else(|| "draw issued without a program in use".to_owned())?;
        let program = self
            .programs
            .get(program_id.0 as usize)
            .ok_or_else(|| format!("draw issued with unknown program {:?}", program_id))?;

        let mut vertex_buffers = Vec::with_capacity(program.layout.attributes.len());
        for index in 0..program.layout.attributes.len() as u32 {
            let location = AttributeLocation {
                program: program_id,
                index,
            };
            let buffer = self
                .vertex_bindings
                .get(&location)
                .copied()
                .filter(|buffer| self.gpu_buffer(*buffer).is_some())
                .ok_or_else(|| {
                    format!(
                        "'{}': attribute '{}' has no vertex data bound",
                        program.modules.label, program.layout.attributes[index as usize].name
                    )
                })?;
            vertex_buffers.push(buffer);
        }

        let index_buffer = match range {
            DrawRange::Indexed { .. } => {
                let buffer = self
                    .index_binding
                    .filter(|buffer| self.gpu_buffer(*buffer).is_some())
                    .ok_or_else(|| {
                        format!("'{}': indexed draw without index data", program.modules.label)
                    })?;
                Some(buffer)
            }
            DrawRange::Arrays { .. } => None,
        };

        let textures = program
            .layout
            .texture_slots()
            .map(|(slot, binding)| {
                let unit = program.texture_units.get(&slot).copied().unwrap_or(0);
                (binding, self.texture_bindings.get(&unit).copied())
            })
            .collect();

        let uniform_offset = program
            .layout
            .uniform_binding
            .map(|_| self.uniform_ring.push(&program.uniform_data));

        self.frame.draws.push(RecordedDraw {
            key: PipelineKey {
                program: program_id,
                topology,
                depth_write: self.frame.depth_write,
            },
            uniform_offset,
            vertex_buffers,
            index_buffer,
            range,
            textures,
        });
        Ok(())
    }

    fn store_uniform(&mut self, location: UniformLocation, value: UniformValue) -> Result<(), String> {
        let program = self
            .programs
            .get_mut(location.program.0 as usize)
            .ok_or_else(|| format!("uniform of unknown program {:?}", location.program))?;
        let slot = program
            .layout
            .slot(location.index)
            .cloned()
            .ok_or_else(|| "invalid uniform location".to_owned())?;
        if !slot.accepts(&value) {
            return Err(format!(
                "'{}': type mismatch for uniform '{}' ({:?})",
                program.modules.label, slot.name, value
            ));
        }

        match (slot.binding, value) {
            (SlotBinding::Texture { .. }, UniformValue::TextureUnit(unit)) => {
                program.texture_units.insert(location.index, unit);
            }
            (SlotBinding::Member { offset, .. }, value) => {
                write_member(&mut program.uniform_data, offset, &value.to_bytes()).map_err(
                    |err| format!("'{}': uniform '{}' {}", program.modules.label, slot.name, err),
                )?;
            }
            _ => {}
        }
        Ok(())
    }

    fn create_bind_group(&self, draw: &RecordedDraw) -> Option<wgpu::BindGroup> {
        let program = self.program(draw.key.program)?;
        let layout = &program.layout;

        let cube = |texture: Option<TextureId>| {
            texture
                .and_then(|id| self.textures.get(id.0 as usize))
                .unwrap_or(&self.placeholder_cube)
        };

        let mut entries = Vec::new();
        if let Some(binding) = layout.uniform_binding {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: self.uniform_ring.buffer()?,
                    offset: 0,
                    size: wgpu::BufferSize::new(layout.uniform_size as u64),
                }),
            });
        }
        for &(binding, texture) in &draw.textures {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(&cube(texture).view),
            });
        }
        // Samplers follow the first sampled texture of the draw
        let sampler_source = cube(draw.textures.first().and_then(|(_, texture)| *texture));
        for &binding in &layout.sampler_bindings {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Sampler(&sampler_source.sampler),
            });
        }

        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&program.modules.label),
            layout: &program.modules.bind_group_layout,
            entries: &entries,
        }))
    }

    fn finish_frame(&mut self) {
        self.frame.draws.clear();
        self.uniform_ring.reset();
    }
}

impl GpuDevice for WgpuDevice {
    fn create_buffer(&mut self, kind: BufferKind, label: &str) -> BufferId {
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(GpuBuffer {
            label: label.to_owned(),
            kind,
            buffer: None,
        });
        id
    }

    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let Some(entry) = self.buffers.get_mut(buffer.0 as usize) else {
            self.push_error(format!("upload to unknown buffer {:?}", buffer));
            return;
        };

        let len = wgpu::util::align_to(data.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT);
        let too_small = entry
            .buffer
            .as_ref()
            .map_or(true, |existing| existing.size() < len);
        if too_small {
            let usage = match entry.kind {
                BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
                BufferKind::Index => wgpu::BufferUsages::INDEX,
            };
            entry.buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&entry.label),
                size: len,
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        if let Some(gpu) = &entry.buffer {
            if data.len() as u64 == len {
                self.queue.write_buffer(gpu, 0, data);
            } else {
                let mut padded = data.to_vec();
                padded.resize(len as usize, 0);
                self.queue.write_buffer(gpu, 0, &padded);
            }
        }
    }

    fn create_cube_texture(
        &mut self,
        face_size: u32,
        sampling: TextureSampling,
        label: &str,
    ) -> TextureId {
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(TextureResource::create_cube(
            &self.device,
            face_size,
            sampling,
            label,
        ));
        id
    }

    fn upload_texture_face(&mut self, texture: TextureId, face: CubeFace, rgba: &[u8]) {
        let Some(resource) = self.textures.get(texture.0 as usize) else {
            self.push_error(format!("upload to unknown texture {:?}", texture));
            return;
        };
        let expected = 4 * resource.face_size() as usize * resource.face_size() as usize;
        if rgba.len() != expected {
            self.push_error(format!(
                "{:?} face needs {} bytes, got {}",
                face,
                expected,
                rgba.len()
            ));
            return;
        }
        resource.upload_face(&self.queue, face, rgba);
    }

    fn compile_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, CompileError> {
        let layout = reflect::compile_and_link(label, vertex_source, fragment_source)?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let modules =
            ProgramModules::new(&self.device, label, vertex_source, fragment_source, &layout);
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(CompileError::Link {
                label: label.to_owned(),
                diagnostic: error.to_string(),
            });
        }

        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(GpuProgram {
            uniform_data: vec![0; layout.uniform_size as usize],
            layout,
            modules,
            texture_units: HashMap::new(),
        });
        Ok(id)
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeLocation> {
        self.program(program)?
            .layout
            .attribute_index(name)
            .map(|index| AttributeLocation { program, index })
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.program(program)?
            .layout
            .slot_index(name)
            .map(|index| UniformLocation { program, index })
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.program(program).is_none() {
            self.push_error(format!("use of unknown program {:?}", program));
            return;
        }
        self.frame.current_program = Some(program);
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        if let Err(message) = self.store_uniform(location, value) {
            self.push_error(message);
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.texture_bindings.insert(unit, texture);
    }

    fn bind_vertex_buffer(&mut self, attribute: AttributeLocation, buffer: BufferId) {
        self.vertex_bindings.insert(attribute, buffer);
    }

    fn bind_index_buffer(&mut self, buffer: BufferId) {
        self.index_binding = Some(buffer);
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.frame.depth_write = enabled;
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.finish_frame();
        self.frame.clear_color = wgpu::Color {
            r: color[0] as f64,
            g: color[1] as f64,
            b: color[2] as f64,
            a: color[3] as f64,
        };
    }

    fn draw_indexed(&mut self, topology: Topology, index_count: u32) {
        if let Err(message) = self.record_draw(topology, DrawRange::Indexed { count: index_count })
        {
            self.push_error(message);
        }
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        if let Err(message) = self.record_draw(topology, DrawRange::Arrays { first, count }) {
            self.push_error(message);
        }
    }

    fn max_texture_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn viewport_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn clip_space_correction(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX
    }

    fn present(&mut self) {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                self.finish_frame();
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timed out acquiring the next surface texture");
                self.finish_frame();
                return;
            }
            Err(error) => {
                self.push_error(format!("failed to acquire surface texture: {}", error));
                self.finish_frame();
                return;
            }
        };

        let draws = std::mem::take(&mut self.frame.draws);
        for draw in &draws {
            if let Some(program) = self.programs.get(draw.key.program.0 as usize) {
                self.pipelines
                    .prepare(&self.device, draw.key, &program.modules, &program.layout);
            }
        }
        self.uniform_ring.upload(&self.device, &self.queue);

        let bind_groups: Vec<Option<wgpu::BindGroup>> = draws
            .iter()
            .map(|draw| self.create_bind_group(draw))
            .collect();

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.frame.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (draw, bind_group) in draws.iter().zip(&bind_groups) {
                let (Some(bind_group), Some(pipeline)) =
                    (bind_group, self.pipelines.get(&draw.key))
                else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                let offsets: Vec<u32> = draw.uniform_offset.into_iter().collect();
                pass.set_bind_group(0, bind_group, &offsets);

                for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
                    if let Some(buffer) = self.gpu_buffer(*buffer) {
                        pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                    }
                }

                match draw.range {
                    DrawRange::Indexed { count } => {
                        if let Some(buffer) = draw.index_buffer.and_then(|id| self.gpu_buffer(id))
                        {
                            pass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint32);
                            pass.draw_indexed(0..count, 0, 0..1);
                        }
                    }
                    DrawRange::Arrays { first, count } => {
                        pass.draw(first..first + count, 0..1);
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        self.uniform_ring.reset();
    }

    fn take_error(&mut self) -> Option<String> {
        self.errors.lock().ok()?.pop_front()
    }
}

/// Copies a member's bytes into a program's uniform block
fn write_member(block: &mut [u8], offset: u32, bytes: &[u8]) -> Result<(), String> {
    let start = offset as usize;
    let block_len = block.len();
    let target = start
        .checked_add(bytes.len())
        .and_then(|end| block.get_mut(start..end))
        .ok_or_else(|| {
            format!(
                "at offset {} ({} bytes) lies outside the {}-byte uniform block",
                offset,
                bytes.len(),
                block_len
            )
        })?;
    target.copy_from_slice(bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::Vector4;

    #[test]
    fn clip_correction_maps_gl_depth_range() {
        let near = OPENGL_TO_WGPU_MATRIX * Vector4::new(0.0, 0.0, -1.0, 1.0);
        let far = OPENGL_TO_WGPU_MATRIX * Vector4::new(0.0, 0.0, 1.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0);
        assert_relative_eq!(far.z / far.w, 1.0);
    }

    #[test]
    fn member_writes_land_at_their_offset() {
        let mut block = vec![0u8; 16];
        write_member(&mut block, 4, &UniformValue::F32(1.0).to_bytes()).unwrap();
        assert_eq!(&block[4..8], &1.0f32.to_le_bytes());
        assert!(block[..4].iter().chain(&block[8..]).all(|&b| b == 0));
    }

    #[test]
    fn member_outside_the_block_is_an_error() {
        let mut block = vec![0u8; 16];
        let err = write_member(&mut block, 8, &UniformValue::Vec3([1.0; 3]).to_bytes()).unwrap_err();
        assert!(err.contains("16-byte uniform block"), "{}", err);
        assert!(block.iter().all(|&b| b == 0));

        assert!(write_member(&mut block, u32::MAX, &[0; 4]).is_err());
    }
}
