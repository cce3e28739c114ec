//! # GPU Binding Surface
//!
//! The capability surface every rendering component talks to. It is shaped
//! after a classic immediate-mode graphics API (create buffer, compile program,
//! look up named slots, set uniforms, draw) so that the shading registry and the
//! frame renderer stay independent of the backend that actually executes the
//! work.
//!
//! ## Implementations
//!
//! - [`WgpuDevice`] - the production backend, records draws and encodes them
//!   into a single wgpu render pass on [`GpuDevice::present`]
//! - `RecordingDevice` (tests only) - records every call, uses the same
//!   compile/link front end so real shader sources can be tested without a GPU
//!
//! Every component receives the device explicitly; nothing reaches for an
//! ambient global context.

pub mod pipelines;
pub mod reflect;
pub mod wgpu_device;

#[cfg(test)]
pub(crate) mod testing;

use cgmath::{Matrix4, SquareMatrix};
use std::fmt;

pub use reflect::{ProgramLayout, SlotBinding, SlotInfo, UniformKind};
pub use wgpu_device::{DeviceInitError, WgpuDevice};

/// Handle to a GPU buffer created through [`GpuDevice::create_buffer`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) u32);

/// Handle to a cube texture created through [`GpuDevice::create_cube_texture`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) u32);

/// Handle to a compiled and linked program
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) u32);

/// Location of a vertex attribute inside a specific program
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttributeLocation {
    pub(crate) program: ProgramId,
    pub(crate) index: u32,
}

/// Location of a named uniform slot inside a specific program
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub(crate) program: ProgramId,
    pub(crate) index: u32,
}

impl UniformLocation {
    pub fn program(&self) -> ProgramId {
        self.program
    }
}

/// Intended use of a buffer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Primitive assembly mode for draw calls
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Topology {
    Triangles,
    Points,
}

/// Filtering and wrapping for a sampled texture
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextureSampling {
    pub linear_filter: bool,
    pub clamp_to_edge: bool,
}

impl TextureSampling {
    /// Linear min/mag filtering with edge-clamped wrapping on both axes
    pub const LINEAR_CLAMPED: Self = Self {
        linear_filter: true,
        clamp_to_edge: true,
    };
}

/// One face of a cube texture, in upload order
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Array layer of this face in a cube texture
    pub fn layer(self) -> u32 {
        self as u32
    }
}

/// Value uploaded into a uniform slot
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    F32(f32),
    I32(i32),
    Vec3([f32; 3]),
    Mat4([[f32; 4]; 4]),
    /// Binds a texture slot to a texture unit
    TextureUnit(u32),
}

impl UniformValue {
    pub fn mat4(matrix: Matrix4<f32>) -> Self {
        UniformValue::Mat4(matrix.into())
    }

    /// Byte representation as laid out in a WGSL uniform struct
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::F32(v) => v.to_le_bytes().to_vec(),
            UniformValue::I32(v) => v.to_le_bytes().to_vec(),
            UniformValue::Vec3(v) => bytemuck::cast_slice(v).to_vec(),
            UniformValue::Mat4(m) => bytemuck::cast_slice(m).to_vec(),
            UniformValue::TextureUnit(unit) => unit.to_le_bytes().to_vec(),
        }
    }
}

/// Pipeline stage a diagnostic belongs to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// A program failed to compile or link
///
/// Always carries the compiler's diagnostic text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error("{stage} stage of '{label}' failed to compile:\n{diagnostic}")]
    Stage {
        label: String,
        stage: ShaderStage,
        diagnostic: String,
    },
    #[error("program '{label}' failed to link: {diagnostic}")]
    Link { label: String, diagnostic: String },
    #[error("program '{label}' is missing required slots: {}", .slots.join(", "))]
    MissingSlots {
        label: String,
        slots: Vec<&'static str>,
    },
}

/// The capability surface the core renders through
///
/// State-setting calls (`use_program`, `bind_*`, `set_depth_write`) affect the
/// draws that follow them, the same way a classic graphics context behaves.
/// Errors raised by any call are queued and returned by [`take_error`].
///
/// [`take_error`]: GpuDevice::take_error
pub trait GpuDevice {
    fn create_buffer(&mut self, kind: BufferKind, label: &str) -> BufferId;

    /// Replaces the buffer's contents, growing it if needed
    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]);

    fn create_cube_texture(
        &mut self,
        face_size: u32,
        sampling: TextureSampling,
        label: &str,
    ) -> TextureId;

    /// Uploads one RGBA8 face of a cube texture
    fn upload_texture_face(&mut self, texture: TextureId, face: CubeFace, rgba: &[u8]);

    /// Compiles both stages and links them into a program
    fn compile_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, CompileError>;

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeLocation>;

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    fn use_program(&mut self, program: ProgramId);

    /// Stores a uniform value in its program; values persist across frames
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    fn bind_vertex_buffer(&mut self, attribute: AttributeLocation, buffer: BufferId);

    fn bind_index_buffer(&mut self, buffer: BufferId);

    fn set_depth_write(&mut self, enabled: bool);

    /// Starts a new frame cleared to `color` with depth reset to far
    fn clear(&mut self, color: [f32; 4]);

    fn draw_indexed(&mut self, topology: Topology, index_count: u32);

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32);

    /// Current drawable size in pixels
    fn viewport_size(&self) -> (u32, u32);

    /// Largest supported texture edge, cube faces included
    fn max_texture_size(&self) -> u32;

    /// Matrix applied on top of GL-convention projections
    fn clip_space_correction(&self) -> Matrix4<f32> {
        Matrix4::identity()
    }

    /// Submits the recorded frame
    fn present(&mut self);

    /// Pops the oldest queued error, if any
    fn take_error(&mut self) -> Option<String>;
}
