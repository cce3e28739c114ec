//! # Geometry Store
//!
//! Owns the loaded meshes and their GPU buffers. Meshes arrive already parsed
//! as [`MeshData`] (from [`primitives`] or an OBJ file through [`obj`]), are
//! validated, uploaded once and never changed afterwards.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shadeview::gfx::geometry::{fitting::{self, FitStep}, primitives, GeometryStore};
//!
//! let mut store = GeometryStore::new();
//! let fitting = fitting::compose(&[FitStep::Scale(0.5)]);
//! store.add_mesh(&mut device, "sphere", &primitives::sphere(48, 24), fitting)?;
//! ```

pub mod fitting;
pub mod obj;
pub mod primitives;

use cgmath::Matrix4;

use crate::gfx::device::{BufferId, BufferKind, GpuDevice};

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("mesh '{name}' has no triangles")]
    Empty { name: String },
    #[error("mesh '{name}' has {positions} positions but {normals} normals")]
    NormalCountMismatch {
        name: String,
        positions: usize,
        normals: usize,
    },
    #[error("mesh '{name}' has {count} indices, not a multiple of 3")]
    PartialTriangle { name: String, count: usize },
    #[error("mesh '{name}' references vertex {index} but has only {vertex_count}")]
    IndexOutOfRange {
        name: String,
        index: u32,
        vertex_count: usize,
    },
    #[error("failed to load '{path}': {source}")]
    Obj {
        path: String,
        #[source]
        source: tobj::LoadError,
    },
}

/// Parsed geometry ready for upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// Triangle list, counter-clockwise winding
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn validate(&self, name: &str) -> Result<(), GeometryError> {
        if self.positions.is_empty() || self.indices.is_empty() {
            return Err(GeometryError::Empty {
                name: name.to_owned(),
            });
        }
        if self.normals.len() != self.positions.len() {
            return Err(GeometryError::NormalCountMismatch {
                name: name.to_owned(),
                positions: self.positions.len(),
                normals: self.normals.len(),
            });
        }
        if self.indices.len() % 3 != 0 {
            return Err(GeometryError::PartialTriangle {
                name: name.to_owned(),
                count: self.indices.len(),
            });
        }
        if let Some(&index) = self
            .indices
            .iter()
            .find(|&&index| index as usize >= self.positions.len())
        {
            return Err(GeometryError::IndexOutOfRange {
                name: name.to_owned(),
                index,
                vertex_count: self.positions.len(),
            });
        }
        Ok(())
    }
}

/// An uploaded mesh. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    name: String,
    positions: BufferId,
    normals: BufferId,
    indices: BufferId,
    index_count: u32,
    fitting: Matrix4<f32>,
}

impl Mesh {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position_buffer(&self) -> BufferId {
        self.positions
    }

    pub fn normal_buffer(&self) -> BufferId {
        self.normals
    }

    pub fn index_buffer(&self) -> BufferId {
        self.indices
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Fixed transform normalizing the mesh's scale and orientation
    pub fn fitting(&self) -> Matrix4<f32> {
        self.fitting
    }
}

#[derive(Default)]
pub struct GeometryStore {
    meshes: Vec<Mesh>,
}

impl GeometryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and uploads a mesh, returning its index
    pub fn add_mesh(
        &mut self,
        device: &mut dyn GpuDevice,
        name: &str,
        data: &MeshData,
        fitting: Matrix4<f32>,
    ) -> Result<usize, GeometryError> {
        data.validate(name)?;

        let positions = device.create_buffer(BufferKind::Vertex, &format!("{} positions", name));
        device.upload_buffer(positions, bytemuck::cast_slice(&data.positions));
        let normals = device.create_buffer(BufferKind::Vertex, &format!("{} normals", name));
        device.upload_buffer(normals, bytemuck::cast_slice(&data.normals));
        let indices = device.create_buffer(BufferKind::Index, &format!("{} indices", name));
        device.upload_buffer(indices, bytemuck::cast_slice(&data.indices));

        log::info!(
            "Loaded mesh '{}' ({} vertices, {} triangles)",
            name,
            data.positions.len(),
            data.triangle_count()
        );

        self.meshes.push(Mesh {
            name: name.to_owned(),
            positions,
            normals,
            indices,
            index_count: data.indices.len() as u32,
            fitting,
        });
        Ok(self.meshes.len() - 1)
    }

    pub fn get(&self, index: usize) -> Option<&Mesh> {
        self.meshes.get(index)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
