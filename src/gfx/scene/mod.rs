//! # Scene State
//!
//! The live parameters of the viewer: light, material colour, animation
//! angles and flags, and which mesh and shading model are selected.
//!
//! ## Ordering
//!
//! The state is only changed between frames, by the animation driver's angle
//! step or by the controls. The frame renderer reads it without changing it,
//! so no locking is needed.

pub mod state;

pub use state::{SceneError, SceneSettings, SceneState, ANGLE_PER_DEGREE};
