//! Startup configuration.
//!
//! Configuration is via environment variables:
//! - `ROTATE_LABELER_IMG_SIZE` - side of the square canvas in pixels (default: 640)
//! - `ROTATE_LABELER_MAX_ANGLE` - gauge range in degrees, both directions (default: 45)
//! - `ROTATE_LABELER_GRID_INTERVAL` - spacing of the guide lines (default: 80)

use std::path::PathBuf;

use crate::error::{LabelerError, Result};

pub const DEFAULT_IMG_SIZE: u32 = 640;
pub const DEFAULT_MAX_ANGLE: f32 = 45.0;
pub const DEFAULT_GRID_INTERVAL: u32 = 80;

/// Name of the bookmark file, resolved against the working directory.
pub const BOOKMARK_FILE: &str = "config.json";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Settings {
    pub img_size: u32,
    pub max_angle: f32,
    pub grid_interval: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            img_size: DEFAULT_IMG_SIZE,
            max_angle: DEFAULT_MAX_ANGLE,
            grid_interval: DEFAULT_GRID_INTERVAL,
        }
    }
}

impl Settings {
    /// Load settings from environment variables, keeping defaults for
    /// anything unset or invalid.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            img_size: positive("ROTATE_LABELER_IMG_SIZE", &lookup, defaults.img_size),
            max_angle: positive("ROTATE_LABELER_MAX_ANGLE", &lookup, defaults.max_angle),
            grid_interval: positive(
                "ROTATE_LABELER_GRID_INTERVAL",
                &lookup,
                defaults.grid_interval,
            ),
        }
    }

    /// Reject values the session cannot work with. Needed for settings built
    /// by hand rather than through `from_env`.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("img_size", self.img_size.is_positive(), self.img_size.to_string()),
            ("max_angle", self.max_angle.is_positive(), self.max_angle.to_string()),
            (
                "grid_interval",
                self.grid_interval.is_positive(),
                self.grid_interval.to_string(),
            ),
        ];
        for (name, ok, value) in checks {
            if !ok {
                return Err(LabelerError::InvalidSetting { name, value });
            }
        }
        Ok(())
    }
}

trait Positive: std::str::FromStr + Copy {
    fn is_positive(self) -> bool;
}

impl Positive for u32 {
    fn is_positive(self) -> bool {
        self > 0
    }
}

impl Positive for f32 {
    fn is_positive(self) -> bool {
        self.is_finite() && self > 0.0
    }
}

fn positive<T: Positive>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T {
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value.is_positive() => value,
        _ => {
            log::warn!("ignoring {key}={raw:?}: expected a positive number");
            default
        }
    }
}

/// Bookmark location: `config.json` in the current working directory.
pub fn bookmark_path() -> std::io::Result<PathBuf> {
    Ok(std::env::current_dir()?.join(BOOKMARK_FILE))
}
