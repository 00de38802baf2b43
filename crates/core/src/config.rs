use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{field}` must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}

const DEFAULT_WINDOW: f64 = 512.0;

/// Scene geometry and timing, fixed for one run.
///
/// Everything geometric scales off a single window size, see
/// [`Config::from_window`]. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window_width: f64,
    pub window_height: f64,

    pub thread_height: f64,
    /// Height lost per nesting level; children sit `y_shift / 2` below
    /// their parent's top edge.
    pub y_shift: f64,
    pub stroke: f64,
    pub corner_radius: f64,
    pub text_size: f64,
    /// Padding before a frame's label and after it.
    pub text_shift: f64,
    pub char_width: f64,
    pub marker_width: f64,
    /// Horizontal position of the "now" cursor every track scrolls under.
    pub cursor_x: f64,

    pub long_extent: f64,
    pub short_extent: f64,

    /// Track scroll speed in pixels per second.
    pub speed: f64,
    pub normal_pause_ms: f64,
    pub short_pause_ms: f64,
    /// Timer used for permanent pauses when no resume signal is wired.
    pub permanent_pause_ms: f64,
    pub widen_ms: f64,
    pub fade_ms: f64,
    pub banner_ms: f64,
    pub tooltip_ms: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_window(DEFAULT_WINDOW, DEFAULT_WINDOW)
    }
}

impl Config {
    pub fn from_window(width: f64, height: f64) -> Self {
        let thread_height = height / 5.0;
        let y_shift = thread_height * 0.15;
        let corner_radius = thread_height / 20.0;
        let text_size = thread_height / 2.0;
        let long_extent = width / 5.0;
        Self {
            window_width: width,
            window_height: height,
            thread_height,
            y_shift,
            stroke: y_shift / 3.0,
            corner_radius,
            text_size,
            text_shift: text_size / 4.0,
            char_width: text_size * 0.55,
            marker_width: corner_radius * 2.0,
            cursor_x: width / 2.0,
            long_extent,
            short_extent: long_extent / 4.0,
            speed: width / 5.0,
            normal_pause_ms: 1000.0,
            short_pause_ms: 300.0,
            permanent_pause_ms: 24.0 * 60.0 * 60.0 * 1000.0,
            widen_ms: 500.0,
            fade_ms: 250.0,
            banner_ms: 1500.0,
            tooltip_ms: 1200.0,
        }
    }

    pub fn from_json(data: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("speed", self.speed),
            ("thread_height", self.thread_height),
            ("window_width", self.window_width),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        Ok(())
    }

    pub fn label_width(&self, label: &str) -> f64 {
        label.chars().count() as f64 * self.char_width
    }

    /// Height of a frame at `depth`; shrinks by `y_shift` per level.
    pub fn frame_height(&self, depth: u32) -> f64 {
        (self.thread_height - self.y_shift * f64::from(depth)).max(self.y_shift)
    }

    /// Time to scroll `distance` pixels at the configured speed.
    pub fn travel_ms(&self, distance: f64) -> f64 {
        distance.abs() / self.speed * 1000.0
    }

    /// Distance covered in `ms` at the configured speed.
    pub fn distance_in(&self, ms: f64) -> f64 {
        ms / 1000.0 * self.speed
    }

    /// Default vertical position of the `index`-th track.
    pub fn track_y(&self, index: usize) -> f64 {
        self.window_height / 4.0 + self.thread_height * 2.0 * index as f64
    }
}

pub(crate) fn millis(ms: f64) -> Duration {
    Duration::from_secs_f64(ms.max(0.0) / 1000.0)
}
