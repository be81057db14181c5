//! Scene configuration.
//!
//! Every field has a default, so an empty RON document `()` is a valid config:
//!
//! ```ron
//! (
//!     index: (charset: Base62, jitter: true, jitter_digits: 6),
//!     validation: (mode: Strict, interval_secs: 60),
//! )
//! ```

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::Result;
use crate::fractional::DEFAULT_JITTER_DIGITS;

/// Default minimum seconds between two full-collection validations.
pub const DEFAULT_VALIDATION_INTERVAL_SECS: u64 = 60;

/// Top-level configuration for a [`Scene`](crate::Scene).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub index: IndexConfig,
    pub validation: ValidationConfig,
}

impl SceneConfig {
    /// Parse from a RON document.
    pub fn from_ron(src: &str) -> Result<Self> {
        Ok(ron::from_str(src)?)
    }

    /// Deterministic keys and strict validation. For tests and replay.
    pub fn deterministic() -> Self {
        Self {
            index: IndexConfig::deterministic(),
            validation: ValidationConfig {
                mode: ValidationMode::Strict,
                interval_secs: 0,
            },
        }
    }
}

/// Digit alphabet for position keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Charset {
    /// `0-9A-Za-z`
    #[default]
    Base62,
    /// `0-9A-Z`
    Base36,
}

/// Position-key generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub charset: Charset,
    /// Append random digits to generated keys.
    pub jitter: bool,
    pub jitter_digits: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            charset: Charset::Base62,
            jitter: true,
            jitter_digits: DEFAULT_JITTER_DIGITS,
        }
    }
}

impl IndexConfig {
    /// Jitter disabled: identical inputs give identical keys.
    pub fn deterministic() -> Self {
        Self {
            jitter: false,
            ..Self::default()
        }
    }
}

/// What to do when the ordered-list invariant check fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum ValidationMode {
    /// Skip validation.
    Off,
    /// Log the violation and commit anyway.
    Log,
    /// Refuse to commit.
    Strict,
}

impl Default for ValidationMode {
    /// Strict in debug builds, off in release.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ValidationMode::Strict
        } else {
            ValidationMode::Off
        }
    }
}

/// Throttled invariant validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub mode: ValidationMode,
    pub interval_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            mode: ValidationMode::default(),
            interval_secs: DEFAULT_VALIDATION_INTERVAL_SECS,
        }
    }
}
