//! Throttled whole-collection invariant checks.
//!
//! Validation is O(n) per commit, so it runs on the leading edge of an
//! interval: the first commit checks, later commits inside the interval skip.

use std::time::{Duration, Instant};

use tracing::error;

use tessera_types::Element;

use crate::Result;
use crate::config::{ValidationConfig, ValidationMode};
use crate::indices::{ValidationContext, validate_fractional_indices};

/// Runs [`validate_fractional_indices`] at most once per interval.
#[derive(Debug, Clone)]
pub struct ThrottledValidator {
    mode: ValidationMode,
    interval: Duration,
    last_run: Option<Instant>,
}

impl ThrottledValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            mode: config.mode,
            interval: Duration::from_secs(config.interval_secs),
            last_run: None,
        }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Check `elements` unless validation is off or ran recently.
    ///
    /// In `Strict` mode a violation is returned; in `Log` mode it is logged
    /// and `Ok` is returned.
    pub fn check(&mut self, elements: &[Element], ctx: &ValidationContext) -> Result<()> {
        if self.mode == ValidationMode::Off {
            return Ok(());
        }
        let now = Instant::now();
        if let Some(last) = self.last_run
            && now.duration_since(last) < self.interval
        {
            return Ok(());
        }
        self.last_run = Some(now);

        match validate_fractional_indices(elements, ctx) {
            Ok(()) => Ok(()),
            Err(err) if self.mode == ValidationMode::Log => {
                error!(%err, elements = elements.len(), "position key invariant violated");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

impl Default for ThrottledValidator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}
