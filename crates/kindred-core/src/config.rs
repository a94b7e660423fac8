use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("gift cap must be at least 1")]
    ZeroGiftCap,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct KindredConfig {
    pub gesture: GestureConfig,
    pub swipe: SwipeConfig,
    pub stack: StackConfig,
    pub outcome: OutcomeConfig,
    pub session: SessionConfig,
}

impl KindredConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("gesture.dead_zone", self.gesture.dead_zone),
            ("gesture.axis_ratio", self.gesture.axis_ratio),
            ("gesture.direction_threshold", self.gesture.direction_threshold),
            ("swipe.distance_threshold", self.swipe.distance_threshold),
            ("swipe.velocity_threshold", self.swipe.velocity_threshold),
        ];
        for (field, value) in checks {
            if !(value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        if self.outcome.gift_cap == 0 {
            return Err(ConfigError::ZeroGiftCap);
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct GestureConfig {
    pub dead_zone: f64,
    pub axis_ratio: f64,
    pub direction_threshold: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            dead_zone: 10.0,
            axis_ratio: 1.5,
            direction_threshold: 20.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct SwipeConfig {
    pub distance_threshold: f64,
    pub velocity_threshold: f64,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 80.0,
            velocity_threshold: 400.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct StackConfig {
    pub exit_duration_ms: u64,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            exit_duration_ms: 300,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct OutcomeConfig {
    pub confirm_delay_ms: u64,
    pub max_attachment_bytes: u64,
    pub gift_cap: u32,
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        Self {
            confirm_delay_ms: 2_500,
            max_attachment_bytes: 10 * 1024 * 1024,
            gift_cap: 50,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub initial_whispers: u32,
    pub initial_credits: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_whispers: 5,
            initial_credits: 20,
        }
    }
}
