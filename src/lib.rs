// src/lib.rs
//! shadeview
//!
//! An interactive viewer comparing analytic shading models on one mesh,
//! optionally over a reflective sky, built on wgpu and winit.

pub mod animation;
pub mod app;
pub mod config;
pub mod controls;
pub mod gfx;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::ViewerApp;
pub use config::ViewerConfig;
