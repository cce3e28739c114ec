//! Frame rendering
//!
//! Per-frame matrices, the three-pass frame renderer and frame statistics.

pub mod frame_renderer;
pub mod frame_stats;
pub mod transforms;

pub use frame_renderer::{FrameRenderer, RuntimeDrawError};
pub use frame_stats::{FrameStats, FrameSummary};
pub use transforms::{FrameMatrices, RenderSettings};
