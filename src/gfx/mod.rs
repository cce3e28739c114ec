//! # Graphics Module
//!
//! Everything between the scene parameters and the pixels on screen.
//!
//! ## Architecture Overview
//!
//! - **Device** ([`device`]) - the GPU binding surface and its wgpu implementation
//! - **Shading** ([`shading`]) - compiled shading models and their named slots
//! - **Geometry** ([`geometry`]) - meshes, fitting transforms and mesh sources
//! - **Environment** ([`environment`]) - the six-faced sky texture
//! - **Scene** ([`scene`]) - live frame parameters
//! - **Rendering** ([`rendering`]) - per-frame matrices and the frame renderer
//!
//! Components never reach for a global GPU context; each operation that
//! touches the GPU takes the device as an argument.

pub mod device;
pub mod environment;
pub mod geometry;
pub mod rendering;
pub mod resources;
pub mod scene;
pub mod shading;

pub use device::{GpuDevice, WgpuDevice};
pub use rendering::FrameRenderer;
