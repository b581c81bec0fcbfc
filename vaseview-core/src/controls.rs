//! Orbit-style camera controls with damped motion.
//!
//! The controller owns orbit angles and distance only. It reads the orbit
//! target to place the camera but never writes it; the target belongs to the
//! auto-framer.

use std::f32::consts::{FRAC_PI_2, PI};

use nalgebra::{Point3, Vector3};

use crate::config::ControlsConfig;

/// Keep the camera off the poles so `up` never becomes parallel to the view axis
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// Pending motion below this is dropped
const REST_THRESHOLD: f32 = 1e-5;

/// Scroll units per doubling of distance, before `zoom_speed`
const ZOOM_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Dragging { last_x: f32, last_y: f32 },
}

#[derive(Debug, Clone)]
pub struct OrbitControls {
    state: DragState,
    yaw: f32,
    pitch: f32,
    distance: f32,
    pending_yaw: f32,
    pending_pitch: f32,
    /// Natural log of the pending distance factor
    pending_zoom: f32,
    damping: f32,
    rotate_speed: f32,
    zoom_speed: f32,
    /// Zoom limits from configuration
    limits: (f32, f32),
    /// Limits in effect, widened to include the last framed distance
    min_distance: f32,
    max_distance: f32,
}

impl OrbitControls {
    pub fn new(config: &ControlsConfig, distance: f32) -> Self {
        Self {
            state: DragState::Idle,
            yaw: 0.0,
            pitch: 0.0,
            distance: distance.clamp(config.min_distance, config.max_distance),
            pending_yaw: 0.0,
            pending_pitch: 0.0,
            pending_zoom: 0.0,
            damping: config.damping,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            limits: (config.min_distance, config.max_distance),
            min_distance: config.min_distance,
            max_distance: config.max_distance,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Whether damped motion is still playing out
    pub fn is_moving(&self) -> bool {
        self.pending_yaw != 0.0 || self.pending_pitch != 0.0 || self.pending_zoom != 0.0
    }

    /// Start dragging if the pointer is inside a `width` x `height` viewport.
    pub fn pointer_down(&mut self, x: f32, y: f32, width: u32, height: u32) -> bool {
        let inside = x >= 0.0 && y >= 0.0 && x < width as f32 && y < height as f32;
        if inside {
            self.state = DragState::Dragging {
                last_x: x,
                last_y: y,
            };
        }
        inside
    }

    /// Accumulate orbit deltas while dragging; a full viewport height is one turn
    pub fn pointer_move(&mut self, x: f32, y: f32, height: u32) {
        let DragState::Dragging { last_x, last_y } = self.state else {
            return;
        };
        let height = height.max(1) as f32;
        self.pending_yaw -= 2.0 * PI * (x - last_x) / height * self.rotate_speed;
        self.pending_pitch += 2.0 * PI * (y - last_y) / height * self.rotate_speed;
        self.state = DragState::Dragging {
            last_x: x,
            last_y: y,
        };
    }

    pub fn pointer_up(&mut self) {
        self.state = DragState::Idle;
    }

    pub fn pointer_leave(&mut self) {
        self.state = DragState::Idle;
    }

    /// Positive `delta` zooms in
    pub fn scroll(&mut self, delta: f32) {
        if delta.is_finite() {
            self.pending_zoom -= delta * ZOOM_STEP * self.zoom_speed;
        }
    }

    /// Advance one frame of damping and return the camera position around `target`
    pub fn update(&mut self, target: &Point3<f32>) -> Point3<f32> {
        let k = self.damping;

        self.yaw = wrap_angle(self.yaw + self.pending_yaw * k);
        self.pitch = (self.pitch + self.pending_pitch * k).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.distance = (self.distance * (self.pending_zoom * k).exp())
            .clamp(self.min_distance, self.max_distance);

        self.pending_yaw = settle(self.pending_yaw * (1.0 - k));
        self.pending_pitch = settle(self.pending_pitch * (1.0 - k));
        self.pending_zoom = settle(self.pending_zoom * (1.0 - k));

        self.eye(target)
    }

    /// Camera position for the current angles, without advancing damping
    pub fn eye(&self, target: &Point3<f32>) -> Point3<f32> {
        let offset = Vector3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.cos() * self.pitch.cos(),
        );
        target + offset * self.distance
    }

    /// Snap back to the forward axis at `distance`, dropping residual motion
    pub fn reset(&mut self, distance: f32) {
        self.yaw = 0.0;
        self.pitch = 0.0;
        // Let the framer's distance win over the interactive zoom limits
        self.distance = distance;
        self.min_distance = self.limits.0.min(distance);
        self.max_distance = self.limits.1.max(distance);
        self.pending_yaw = 0.0;
        self.pending_pitch = 0.0;
        self.pending_zoom = 0.0;
    }
}

fn settle(value: f32) -> f32 {
    if value.abs() < REST_THRESHOLD {
        0.0
    } else {
        value
    }
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}
