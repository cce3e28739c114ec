//! GPU resource management
//!
//! Texture helpers used by the wgpu device backend.

pub mod texture_resource;

pub use texture_resource::TextureResource;
