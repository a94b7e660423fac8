use serde::Deserialize;
use serde::Serialize;

use crate::config::SwipeConfig;
use crate::gesture::GestureAxis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Left,
    Right,
}

impl SwipeDirection {
    pub fn label(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDecision {
    Commit(SwipeDirection),
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Release {
    pub offset_x: f64,
    pub velocity_x: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SwipePolicy {
    config: SwipeConfig,
}

impl SwipePolicy {
    pub fn new(config: SwipeConfig) -> Self {
        Self { config }
    }

    pub fn decide(&self, release: Release, axis: GestureAxis) -> SwipeDecision {
        if axis != GestureAxis::Horizontal {
            return SwipeDecision::Cancel;
        }

        let far_enough = release.offset_x.abs() > self.config.distance_threshold;
        let fast_enough = release.velocity_x.abs() > self.config.velocity_threshold;
        if !(far_enough || fast_enough) {
            return SwipeDecision::Cancel;
        }

        // A flick from rest has no offset to read the sign from.
        let sign = if release.offset_x != 0.0 {
            release.offset_x
        } else {
            release.velocity_x
        };
        if sign > 0.0 {
            SwipeDecision::Commit(SwipeDirection::Right)
        } else {
            SwipeDecision::Commit(SwipeDirection::Left)
        }
    }
}

const MAX_ROTATION_DEG: f64 = 15.0;
const ROTATION_DIVISOR: f64 = 20.0;

pub fn card_rotation(offset_x: f64) -> f64 {
    (offset_x / ROTATION_DIVISOR).clamp(-MAX_ROTATION_DEG, MAX_ROTATION_DEG)
}

const SPRING_STIFFNESS: f64 = 300.0;
const SPRING_DAMPING: f64 = 25.0;
const SETTLE_EPSILON: f64 = 0.01;

/// Damped spring that carries a cancelled card back to rest.
///
/// Offset and rotation share one integrator; rotation is derived from the
/// offset so they reach zero together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestSpring {
    offset: f64,
    velocity: f64,
    settled: bool,
}

impl RestSpring {
    pub fn new(offset: f64, velocity: f64) -> Self {
        Self {
            offset,
            velocity,
            settled: false,
        }
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn rotation(&self) -> f64 {
        card_rotation(self.offset)
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Advances the spring by `dt` seconds and returns the new offset.
    pub fn step(&mut self, dt: f64) -> f64 {
        if self.settled {
            return self.offset;
        }
        let force = -SPRING_STIFFNESS * self.offset - SPRING_DAMPING * self.velocity;
        self.velocity += force * dt;
        self.offset += self.velocity * dt;

        if self.offset.abs() < SETTLE_EPSILON && self.velocity.abs() < SETTLE_EPSILON {
            self.offset = 0.0;
            self.velocity = 0.0;
            self.settled = true;
        }
        self.offset
    }

    /// Steps at a fixed frame rate until settled, bounded by `max_frames`.
    pub fn settle(&mut self, frame_dt: f64, max_frames: usize) -> usize {
        let mut frames = 0;
        while !self.settled && frames < max_frames {
            self.step(frame_dt);
            frames += 1;
        }
        frames
    }
}
