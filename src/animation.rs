//! # Animation Driver
//!
//! Owns the run/stop lifecycle of the frame loop. Each tick measures the time
//! since the previous one, advances the scene, renders, and asks the host for
//! the next tick. Exactly one tick is outstanding while running.

use serde::{Deserialize, Serialize};

use crate::gfx::{rendering::RuntimeDrawError, scene::SceneState};

/// Host services the driver relies on
pub trait HostLoop {
    /// Requests one more tick, delivered on the next display refresh
    fn schedule_next(&mut self);

    /// Monotonic clock in milliseconds
    fn now_ms(&self) -> f64;
}

/// What a failed frame does to the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Log and keep rendering
    #[default]
    Continue,
    /// Stop the driver after the first failed frame
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Stopped,
}

pub struct AnimationDriver {
    state: DriverState,
    last_tick_ms: Option<f64>,
    policy: ErrorPolicy,
}

impl AnimationDriver {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            state: DriverState::Idle,
            last_tick_ms: None,
            policy,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == DriverState::Running
    }

    /// Idle -> Running, scheduling the first tick
    ///
    /// Has no effect once running or stopped.
    pub fn start(&mut self, host: &mut dyn HostLoop) {
        if self.state != DriverState::Idle {
            return;
        }
        self.state = DriverState::Running;
        self.last_tick_ms = None;
        host.schedule_next();
        log::debug!("Animation started");
    }

    /// Moves to the terminal state; a tick already scheduled becomes a no-op
    pub fn stop(&mut self) {
        if self.state != DriverState::Stopped {
            log::debug!("Animation stopped");
        }
        self.state = DriverState::Stopped;
    }

    /// Runs one scheduled step: advance, render, reschedule
    ///
    /// Returns whether a frame was rendered.
    pub fn tick<F>(&mut self, host: &mut dyn HostLoop, scene: &mut SceneState, render: F) -> bool
    where
        F: FnOnce(&SceneState) -> Result<(), RuntimeDrawError>,
    {
        if self.state != DriverState::Running {
            return false;
        }

        let now = host.now_ms();
        let elapsed = self
            .last_tick_ms
            .map_or(0.0, |last| (now - last).max(0.0));
        self.last_tick_ms = Some(now);

        scene.advance(elapsed);

        if let Err(err) = render(scene) {
            match self.policy {
                ErrorPolicy::Continue => {}
                ErrorPolicy::Halt => {
                    log::error!("Stopping animation after failed frame: {}", err);
                    self.stop();
                    return true;
                }
            }
        }

        host.schedule_next();
        true
    }
}
