//! Headless [`GpuDevice`] that records every call
//!
//! Programs go through the real compile/link front end, so slot discovery is
//! exercised against the actual shader sources.

use std::collections::{HashMap, VecDeque};

use super::{
    reflect::{self, ProgramLayout},
    AttributeLocation, BufferId, BufferKind, CompileError, CubeFace, GpuDevice, ProgramId,
    TextureId, TextureSampling, Topology, UniformLocation, UniformValue,
};

/// One recorded device call
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    CreateBuffer(BufferId, BufferKind),
    UploadBuffer { buffer: BufferId, bytes: usize },
    CreateCubeTexture(TextureId, u32, TextureSampling),
    UploadTextureFace(TextureId, CubeFace),
    UseProgram(ProgramId),
    SetUniform {
        program: ProgramId,
        name: String,
        value: UniformValue,
    },
    BindTexture { unit: u32, texture: TextureId },
    BindVertexBuffer { attribute: String, buffer: BufferId },
    BindIndexBuffer(BufferId),
    SetDepthWrite(bool),
    Clear,
    DrawIndexed {
        program: ProgramId,
        topology: Topology,
        count: u32,
        depth_write: bool,
    },
    DrawArrays {
        program: ProgramId,
        topology: Topology,
        count: u32,
    },
    Present,
}

pub struct RecordingDevice {
    pub calls: Vec<DeviceCall>,
    pub viewport: (u32, u32),
    pub max_texture_size: u32,
    programs: Vec<(String, ProgramLayout)>,
    uniforms: HashMap<(ProgramId, String), UniformValue>,
    buffers: Vec<Vec<u8>>,
    textures: u32,
    current_program: Option<ProgramId>,
    depth_write: bool,
    errors: VecDeque<String>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            viewport: (800, 600),
            max_texture_size: 4096,
            programs: Vec::new(),
            uniforms: HashMap::new(),
            buffers: Vec::new(),
            textures: 0,
            current_program: None,
            depth_write: true,
            errors: VecDeque::new(),
        }
    }

    /// Queues an error as if the GPU had raised it
    pub fn inject_error(&mut self, message: &str) {
        self.errors.push_back(message.to_owned());
    }

    /// Last value stored in a program's named slot
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        self.uniforms.get(&(program, name.to_owned())).copied()
    }

    pub fn buffer_contents(&self, buffer: BufferId) -> &[u8] {
        &self.buffers[buffer.0 as usize]
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    DeviceCall::DrawIndexed { .. } | DeviceCall::DrawArrays { .. }
                )
            })
            .count()
    }

    fn layout(&self, program: ProgramId) -> &ProgramLayout {
        &self.programs[program.0 as usize].1
    }
}

impl GpuDevice for RecordingDevice {
    fn create_buffer(&mut self, kind: BufferKind, _label: &str) -> BufferId {
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(Vec::new());
        self.calls.push(DeviceCall::CreateBuffer(id, kind));
        id
    }

    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]) {
        self.buffers[buffer.0 as usize] = data.to_vec();
        self.calls.push(DeviceCall::UploadBuffer {
            buffer,
            bytes: data.len(),
        });
    }

    fn create_cube_texture(
        &mut self,
        face_size: u32,
        sampling: TextureSampling,
        _label: &str,
    ) -> TextureId {
        let id = TextureId(self.textures);
        self.textures += 1;
        self.calls
            .push(DeviceCall::CreateCubeTexture(id, face_size, sampling));
        id
    }

    fn upload_texture_face(&mut self, texture: TextureId, face: CubeFace, _rgba: &[u8]) {
        self.calls.push(DeviceCall::UploadTextureFace(texture, face));
    }

    fn compile_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, CompileError> {
        let layout = reflect::compile_and_link(label, vertex_source, fragment_source)?;
        let id = ProgramId(self.programs.len() as u32);
        self.programs.push((label.to_owned(), layout));
        Ok(id)
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeLocation> {
        self.layout(program)
            .attribute_index(name)
            .map(|index| AttributeLocation { program, index })
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.layout(program)
            .slot_index(name)
            .map(|index| UniformLocation { program, index })
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
        self.calls.push(DeviceCall::UseProgram(program));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(slot) = self.layout(location.program).slot(location.index).cloned() else {
            self.errors.push_back("invalid uniform location".to_owned());
            return;
        };
        if !slot.accepts(&value) {
            self.errors
                .push_back(format!("type mismatch for uniform '{}'", slot.name));
            return;
        }
        self.uniforms
            .insert((location.program, slot.name.clone()), value);
        self.calls.push(DeviceCall::SetUniform {
            program: location.program,
            name: slot.name,
            value,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.calls.push(DeviceCall::BindTexture { unit, texture });
    }

    fn bind_vertex_buffer(&mut self, attribute: AttributeLocation, buffer: BufferId) {
        let name = self.layout(attribute.program).attributes[attribute.index as usize]
            .name
            .clone();
        self.calls.push(DeviceCall::BindVertexBuffer {
            attribute: name,
            buffer,
        });
    }

    fn bind_index_buffer(&mut self, buffer: BufferId) {
        self.calls.push(DeviceCall::BindIndexBuffer(buffer));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = enabled;
        self.calls.push(DeviceCall::SetDepthWrite(enabled));
    }

    fn clear(&mut self, _color: [f32; 4]) {
        self.calls.push(DeviceCall::Clear);
    }

    fn draw_indexed(&mut self, topology: Topology, index_count: u32) {
        let Some(program) = self.current_program else {
            self.errors.push_back("draw without a program".to_owned());
            return;
        };
        self.calls.push(DeviceCall::DrawIndexed {
            program,
            topology,
            count: index_count,
            depth_write: self.depth_write,
        });
    }

    fn draw_arrays(&mut self, topology: Topology, _first: u32, count: u32) {
        let Some(program) = self.current_program else {
            self.errors.push_back("draw without a program".to_owned());
            return;
        };
        self.calls.push(DeviceCall::DrawArrays {
            program,
            topology,
            count,
        });
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.viewport
    }

    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn present(&mut self) {
        self.calls.push(DeviceCall::Present);
    }

    fn take_error(&mut self) -> Option<String> {
        self.errors.pop_front()
    }
}
