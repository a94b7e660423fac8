use kindred_core::UserAction;
use serde::Deserialize;
use serde::Serialize;

/// A recorded drag on the top card, as offsets from the press point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerTrace {
    #[serde(default)]
    pub start: (f64, f64),
    /// Cumulative (dx, dy) per sample.
    pub samples: Vec<(f64, f64)>,
    /// Time between samples.
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
}

fn default_frame_ms() -> u64 {
    16
}

impl PointerTrace {
    /// A straight horizontal drag to `distance` over `steps` samples.
    pub fn horizontal(distance: f64, steps: usize, frame_ms: u64) -> Self {
        Self::line(distance, 0.0, steps, frame_ms)
    }

    pub fn vertical(distance: f64, steps: usize, frame_ms: u64) -> Self {
        Self::line(0.0, distance, steps, frame_ms)
    }

    fn line(dx: f64, dy: f64, steps: usize, frame_ms: u64) -> Self {
        let steps = steps.max(1);
        let samples = (1..=steps)
            .map(|i| {
                let t = i as f64 / steps as f64;
                (dx * t, dy * t)
            })
            .collect();
        Self {
            start: (0.0, 0.0),
            samples,
            frame_ms,
        }
    }

    pub fn final_offset(&self) -> f64 {
        self.samples.last().map_or(0.0, |&(dx, _)| dx)
    }

    /// Horizontal release velocity in units per second, from the last two
    /// samples.
    pub fn release_velocity(&self) -> f64 {
        if self.frame_ms == 0 {
            return 0.0;
        }
        let last = self.samples.len();
        let (prev, current) = match last {
            0 => return 0.0,
            1 => (0.0, self.samples[0].0),
            _ => (self.samples[last - 2].0, self.samples[last - 1].0),
        };
        (current - prev) * 1000.0 / self.frame_ms as f64
    }

    /// The press, every move and the release, in order.
    pub fn to_actions(&self) -> Vec<UserAction> {
        let (x0, y0) = self.start;
        let mut actions = Vec::with_capacity(self.samples.len() + 2);
        actions.push(UserAction::PointerDown { x: x0, y: y0 });
        actions.extend(self.samples.iter().map(|&(dx, dy)| UserAction::PointerMove {
            x: x0 + dx,
            y: y0 + dy,
            offset_x: dx,
        }));
        actions.push(UserAction::PointerUp {
            offset_x: self.final_offset(),
            velocity_x: self.release_velocity(),
        });
        actions
    }
}
