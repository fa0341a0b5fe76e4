//! HDDM-W: drift detection with McDiarmid bounds over weighted averages.
//!
//! The detector keeps an EWMA of the whole stream and remembers the point
//! where the upper (or lower) confidence bound of that average was tightest.
//! A second EWMA accumulates everything seen since that cut point; when the
//! two estimates diverge by more than the McDiarmid bound, a change (or,
//! with the looser confidence, a warning) is signalled. A change resets all
//! statistics.

use serde::{Deserialize, Serialize};

use super::{check_finite, ChangeDetector};
use crate::error::{DetectorError, DriftError, Result};

/// HDDM-W sensitivity parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HddmWConfig {
    /// Confidence for the change bound, in (0, 1)
    pub drift_confidence: f64,
    /// Confidence for the warning bound, in (0, 1)
    pub warning_confidence: f64,
    /// Weight given to recent data, in (0, 1]
    pub lambda: f64,
    /// Also monitor decreases of the mean
    pub two_sided: bool,
}

impl Default for HddmWConfig {
    fn default() -> Self {
        Self {
            drift_confidence: 0.001,
            warning_confidence: 0.005,
            lambda: 0.05,
            two_sided: true,
        }
    }
}

impl HddmWConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, c) in [
            ("drift_confidence", self.drift_confidence),
            ("warning_confidence", self.warning_confidence),
        ] {
            if !(c > 0.0 && c < 1.0) {
                return Err(DriftError::InvalidConfig(format!(
                    "{} must be in (0, 1), got {}",
                    name, c
                )));
            }
        }
        if !(self.lambda > 0.0 && self.lambda <= 1.0) {
            return Err(DriftError::InvalidConfig(format!(
                "lambda must be in (0, 1], got {}",
                self.lambda
            )));
        }
        Ok(())
    }
}

/// Weighted estimate and its bounded-condition sum
#[derive(Debug, Clone, Copy, Default)]
struct SampleInfo {
    estimate: Option<f64>,
    bound_sum: f64,
}

impl SampleInfo {
    fn update(&mut self, value: f64, lambda: f64) {
        let decay = 1.0 - lambda;
        match self.estimate {
            None => {
                self.estimate = Some(value);
                self.bound_sum = 1.0;
            }
            Some(estimate) => {
                self.estimate = Some(lambda * value + decay * estimate);
                self.bound_sum = lambda * lambda + decay * decay * self.bound_sum;
            }
        }
    }
}

fn mcdiarmid_bound(bound_sum: f64, confidence: f64) -> f64 {
    (bound_sum * (1.0 / confidence).ln() / 2.0).sqrt()
}

/// `later` exceeds `earlier` by more than the combined bound
fn mean_increased(earlier: &SampleInfo, later: &SampleInfo, confidence: f64) -> bool {
    match (earlier.estimate, later.estimate) {
        (Some(e), Some(l)) => {
            l - e > mcdiarmid_bound(earlier.bound_sum + later.bound_sum, confidence)
        }
        _ => false,
    }
}

/// HDDM-W change detector
#[derive(Debug, Clone)]
pub struct HddmW {
    config: HddmWConfig,
    total: SampleInfo,
    incr_before: SampleInfo,
    incr_after: SampleInfo,
    decr_before: SampleInfo,
    decr_after: SampleInfo,
    incr_cutpoint: f64,
    decr_cutpoint: f64,
    in_warning_zone: bool,
    in_concept_change: bool,
}

impl HddmW {
    pub const NAME: &'static str = "hddm_w";

    pub fn new(config: HddmWConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            total: SampleInfo::default(),
            incr_before: SampleInfo::default(),
            incr_after: SampleInfo::default(),
            decr_before: SampleInfo::default(),
            decr_after: SampleInfo::default(),
            incr_cutpoint: f64::INFINITY,
            decr_cutpoint: f64::NEG_INFINITY,
            in_warning_zone: false,
            in_concept_change: false,
        })
    }

    fn reset_statistics(&mut self) {
        self.total = SampleInfo::default();
        self.incr_before = SampleInfo::default();
        self.incr_after = SampleInfo::default();
        self.decr_before = SampleInfo::default();
        self.decr_after = SampleInfo::default();
        self.incr_cutpoint = f64::INFINITY;
        self.decr_cutpoint = f64::NEG_INFINITY;
    }

    fn update_incr(&mut self, value: f64) {
        let Some(total) = self.total.estimate else {
            return;
        };
        let epsilon = mcdiarmid_bound(self.total.bound_sum, self.config.drift_confidence);
        if total + epsilon < self.incr_cutpoint {
            self.incr_cutpoint = total + epsilon;
            self.incr_before = self.total;
            self.incr_after = SampleInfo::default();
        } else {
            self.incr_after.update(value, self.config.lambda);
        }
    }

    fn update_decr(&mut self, value: f64) {
        let Some(total) = self.total.estimate else {
            return;
        };
        let epsilon = mcdiarmid_bound(self.total.bound_sum, self.config.drift_confidence);
        if total - epsilon > self.decr_cutpoint {
            self.decr_cutpoint = total - epsilon;
            self.decr_before = self.total;
            self.decr_after = SampleInfo::default();
        } else {
            self.decr_after.update(value, self.config.lambda);
        }
    }
}

impl ChangeDetector for HddmW {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn add_element(&mut self, value: f64) -> std::result::Result<(), DetectorError> {
        check_finite(value)?;

        self.total.update(value, self.config.lambda);

        self.update_incr(value);
        if mean_increased(&self.incr_before, &self.incr_after, self.config.drift_confidence) {
            self.reset_statistics();
            self.in_concept_change = true;
            self.in_warning_zone = false;
        } else if mean_increased(
            &self.incr_before,
            &self.incr_after,
            self.config.warning_confidence,
        ) {
            self.in_concept_change = false;
            self.in_warning_zone = true;
        } else {
            self.in_concept_change = false;
            self.in_warning_zone = false;
        }

        self.update_decr(value);
        if self.config.two_sided
            && mean_increased(&self.decr_after, &self.decr_before, self.config.drift_confidence)
        {
            self.reset_statistics();
            self.in_concept_change = true;
            self.in_warning_zone = false;
        }

        Ok(())
    }

    fn detected_warning_zone(&self) -> bool {
        self.in_warning_zone
    }

    fn detected_change(&self) -> bool {
        self.in_concept_change
    }
}
