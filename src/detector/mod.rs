//! Sequential change detectors
//!
//! The orchestrator consumes detectors through the narrow
//! [`ChangeDetector`] capability: feed one value, then ask whether the
//! detector sits in its warning zone and whether it signalled a change.
//! Queries never mutate detector state.
//!
//! Variants are selected by [`DetectorConfig`]:
//!
//! - [`HddmW`]: drift detection with McDiarmid bounds over EWMA estimates,
//!   with a warning zone.
//! - [`PageHinkley`]: cumulative deviation test; has no warning zone, so its
//!   warning query is always `false`.

mod hddm_w;
mod page_hinkley;

pub use hddm_w::{HddmW, HddmWConfig};
pub use page_hinkley::{PageHinkley, PageHinkleyConfig};

use serde::{Deserialize, Serialize};

use crate::error::{DetectorError, Result};

/// Capability interface of a stateful change detector
pub trait ChangeDetector: Send {
    /// Short algorithm name used in logs and reports
    fn name(&self) -> &'static str;

    /// Feed the next value of the stream
    fn add_element(&mut self, value: f64) -> std::result::Result<(), DetectorError>;

    /// Whether the last value put the detector in its warning zone
    fn detected_warning_zone(&self) -> bool;

    /// Whether the last value signalled a change
    fn detected_change(&self) -> bool;
}

/// Detector variant and its sensitivity parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum DetectorConfig {
    HddmW(HddmWConfig),
    PageHinkley(PageHinkleyConfig),
}

impl DetectorConfig {
    /// Instantiate a fresh detector
    pub fn build(&self) -> Result<Box<dyn ChangeDetector>> {
        match self {
            Self::HddmW(config) => Ok(Box::new(HddmW::new(config.clone())?)),
            Self::PageHinkley(config) => Ok(Box::new(PageHinkley::new(config.clone())?)),
        }
    }

    pub fn algorithm(&self) -> &'static str {
        match self {
            Self::HddmW(_) => HddmW::NAME,
            Self::PageHinkley(_) => PageHinkley::NAME,
        }
    }
}

pub(crate) fn check_finite(value: f64) -> std::result::Result<(), DetectorError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DetectorError::NonFiniteInput(value))
    }
}
