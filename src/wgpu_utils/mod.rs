// src/wgpu_utils/mod.rs
//! WGPU utility functions and helpers
//!
//! Small wrappers for the raw wgpu pieces the device backend assembles:
//! bind group layout entries and the per-draw uniform ring.

pub mod binding_types;
pub mod uniform_ring;

pub use binding_types::*;
pub use uniform_ring::UniformRing;
