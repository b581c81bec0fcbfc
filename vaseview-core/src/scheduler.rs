//! Continuous frame cadence for one viewport.
//!
//! The loop runs from mount until it is cancelled; once cancelled it never
//! fires again, even for a tick that was already due.

use std::time::{Duration, Instant};

use tracing::error;

use crate::error::FrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Cancelled,
}

/// What happened on a call to [`FrameLoop::run_tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick ran and the frame was rendered
    Rendered,
    /// The tick ran but the frame failed; the loop keeps going
    Failed,
    /// The loop was cancelled; nothing ran
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct FrameLoop {
    state: LoopState,
    interval: Duration,
    next_due: Instant,
    frames: u64,
    failures: u64,
    fps: f32,
    fps_window_start: Instant,
    fps_window_frames: u32,
}

impl FrameLoop {
    /// Start a loop at `now` with one tick every `interval`
    pub fn start(now: Instant, interval: Duration) -> Self {
        Self {
            state: LoopState::Running,
            interval,
            next_due: now,
            frames: 0,
            failures: 0,
            fps: 0.0,
            fps_window_start: now,
            fps_window_frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn cancel(&mut self) {
        self.state = LoopState::Cancelled;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the next tick should run, `None` once cancelled
    pub fn next_due(&self) -> Option<Instant> {
        self.is_running().then_some(self.next_due)
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.is_running() && now >= self.next_due
    }

    /// Frames that completed without error
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Frames per second over the last full second
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Run one guarded tick. A failing frame is logged and counted and does
    /// not stop the loop.
    pub fn run_tick<F>(&mut self, now: Instant, frame: F) -> TickOutcome
    where
        F: FnOnce() -> Result<(), FrameError>,
    {
        if !self.is_running() {
            return TickOutcome::Cancelled;
        }

        // Skip missed slots rather than bursting to catch up
        self.next_due = (self.next_due + self.interval).max(now);

        let outcome = match frame() {
            Ok(()) => {
                self.frames += 1;
                TickOutcome::Rendered
            }
            Err(err) => {
                self.failures += 1;
                error!(error = %err, failures = self.failures, "frame failed");
                TickOutcome::Failed
            }
        };

        // Update FPS counter
        self.fps_window_frames += 1;
        let window = now.saturating_duration_since(self.fps_window_start);
        if window >= Duration::from_secs(1) {
            self.fps = self.fps_window_frames as f32 / window.as_secs_f32();
            self.fps_window_frames = 0;
            self.fps_window_start = now;
        }

        outcome
    }
}
