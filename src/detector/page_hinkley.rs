//! Page-Hinkley test for increases of the stream mean.

use serde::{Deserialize, Serialize};

use super::{check_finite, ChangeDetector};
use crate::error::{DetectorError, DriftError, Result};

/// Page-Hinkley sensitivity parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageHinkleyConfig {
    /// Values seen before a change may be signalled
    pub min_instances: u32,
    /// Magnitude of change tolerated without accumulating
    pub delta: f64,
    /// Cumulative deviation that signals a change
    pub threshold: f64,
    /// Forgetting factor applied to the cumulative sum, in (0, 1]
    pub alpha: f64,
}

impl Default for PageHinkleyConfig {
    fn default() -> Self {
        Self {
            min_instances: 30,
            delta: 0.005,
            threshold: 50.0,
            alpha: 1.0 - 0.0001,
        }
    }
}

impl PageHinkleyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(DriftError::InvalidConfig(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if !(self.threshold > 0.0) || !self.delta.is_finite() {
            return Err(DriftError::InvalidConfig(format!(
                "threshold must be positive and delta finite, got {} / {}",
                self.threshold, self.delta
            )));
        }
        Ok(())
    }
}

/// Page-Hinkley change detector
///
/// Has no warning zone. After a change the statistics restart with the next
/// value.
#[derive(Debug, Clone)]
pub struct PageHinkley {
    config: PageHinkleyConfig,
    sample_count: u64,
    mean: f64,
    sum: f64,
    in_concept_change: bool,
}

impl PageHinkley {
    pub const NAME: &'static str = "page_hinkley";

    pub fn new(config: PageHinkleyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sample_count: 1,
            mean: 0.0,
            sum: 0.0,
            in_concept_change: false,
        })
    }

    fn reset(&mut self) {
        self.sample_count = 1;
        self.mean = 0.0;
        self.sum = 0.0;
        self.in_concept_change = false;
    }

    /// Current cumulative deviation
    pub fn statistic(&self) -> f64 {
        self.sum
    }
}

impl ChangeDetector for PageHinkley {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn add_element(&mut self, value: f64) -> std::result::Result<(), DetectorError> {
        check_finite(value)?;
        if self.in_concept_change {
            self.reset();
        }

        self.mean += (value - self.mean) / self.sample_count as f64;
        self.sum = (self.config.alpha * self.sum + (value - self.mean - self.config.delta)).max(0.0);
        self.sample_count += 1;

        self.in_concept_change = self.sample_count >= u64::from(self.config.min_instances)
            && self.sum > self.config.threshold;
        Ok(())
    }

    fn detected_warning_zone(&self) -> bool {
        false
    }

    fn detected_change(&self) -> bool {
        self.in_concept_change
    }
}
