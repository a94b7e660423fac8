use serde::Deserialize;
use serde::Serialize;

use crate::config::GestureConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerSample {
    pub x: f64,
    pub y: f64,
}

impl PointerSample {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureAxis {
    #[default]
    Undecided,
    Horizontal,
    Vertical,
}

impl GestureAxis {
    pub fn label(self) -> &'static str {
        match self {
            Self::Undecided => "undecided",
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragDirection {
    #[default]
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragFeedback {
    pub axis: GestureAxis,
    pub direction: DragDirection,
    /// False when this sample produced the same feedback as the previous one.
    pub changed: bool,
}

/// Classifies one press-drag-release gesture on the top card.
///
/// The axis is decided once, the first time either delta leaves the dead
/// zone, and is never revisited until the next press.
#[derive(Debug, Clone, Default)]
pub struct GestureTracker {
    config: GestureConfig,
    start: Option<PointerSample>,
    axis: GestureAxis,
    direction: DragDirection,
}

impl GestureTracker {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn press(&mut self, sample: PointerSample) {
        self.start = Some(sample);
        self.axis = GestureAxis::Undecided;
        self.direction = DragDirection::None;
    }

    pub fn is_pressed(&self) -> bool {
        self.start.is_some()
    }

    pub fn axis(&self) -> GestureAxis {
        self.axis
    }

    pub fn direction(&self) -> DragDirection {
        self.direction
    }

    pub fn track(&mut self, sample: PointerSample, offset_x: f64) -> DragFeedback {
        let Some(start) = self.start else {
            return DragFeedback {
                axis: self.axis,
                direction: self.direction,
                changed: false,
            };
        };

        let before = (self.axis, self.direction);

        if self.axis == GestureAxis::Undecided {
            let delta_x = (sample.x - start.x).abs();
            let delta_y = (sample.y - start.y).abs();
            if delta_x > self.config.dead_zone || delta_y > self.config.dead_zone {
                self.axis = if delta_x > self.config.axis_ratio * delta_y {
                    GestureAxis::Horizontal
                } else {
                    GestureAxis::Vertical
                };
            }
        }

        self.direction = match self.axis {
            GestureAxis::Horizontal if offset_x > self.config.direction_threshold => {
                DragDirection::Right
            }
            GestureAxis::Horizontal if offset_x < -self.config.direction_threshold => {
                DragDirection::Left
            }
            _ => DragDirection::None,
        };

        DragFeedback {
            axis: self.axis,
            direction: self.direction,
            changed: before != (self.axis, self.direction),
        }
    }

    /// Ends the gesture and returns the axis it settled on.
    pub fn release(&mut self) -> GestureAxis {
        let axis = self.axis;
        self.reset();
        axis
    }

    pub fn reset(&mut self) {
        self.start = None;
        self.axis = GestureAxis::Undecided;
        self.direction = DragDirection::None;
    }
}
