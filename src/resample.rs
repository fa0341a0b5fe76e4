//! Fixed-width time-bucket resampling
//!
//! Turns an irregular sensor series into a gap-aware series of per-bucket
//! averages. Bucket `k` covers the half-open interval
//! `[anchor + k*width, anchor + (k+1)*width)`; buckets run from the anchor
//! until one contains the last sample, and every bucket is emitted even when
//! nothing fell into it. Empty buckets carry [`BucketValue::Missing`], never
//! zero.
//!
//! Samples are assigned to buckets by interval arithmetic,
//! `k = floor((t - anchor) / width)`, so a pass over the series is linear in
//! the number of samples plus the number of buckets.
//!
//! Two series resampled on the same grid can be compared with
//! [`difference`], which skips any bucket where either side is missing.
//!
//! ```rust
//! use chrono::Duration;
//! use sensor_drift::resample::{resample, BucketValue};
//! use sensor_drift::series::{from_epoch_secs, Sample, SensorSeries};
//!
//! let series: SensorSeries = [(0, 10.0), (3600, 12.0), (7200, 50.0)]
//!     .into_iter()
//!     .map(|(t, v)| Sample::new(from_epoch_secs(t).unwrap(), v))
//!     .collect();
//!
//! let hourly = resample(&series, Duration::hours(1), from_epoch_secs(0)).unwrap();
//! let values: Vec<_> = hourly.buckets().iter().map(|b| b.value).collect();
//! assert_eq!(
//!     values,
//!     vec![BucketValue::Value(10.0), BucketValue::Value(12.0), BucketValue::Value(50.0)]
//! );
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};
use crate::series::{Observation, SensorSeries, Timestamp};
use crate::store::TimeSeriesStore;

/// Upper bound on the number of buckets a single call may allocate
pub const MAX_BUCKETS: usize = 10_000_000;

/// Average of a bucket, or an explicit gap marker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketValue {
    Value(f64),
    Missing,
}

impl BucketValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn as_option(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Missing => None,
        }
    }
}

/// One resampled bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Position on the grid, counted from the anchor
    pub index: usize,
    /// Inclusive start of the interval
    pub start: Timestamp,
    /// Number of raw samples averaged
    pub count: usize,
    pub value: BucketValue,
}

/// Running sum over one bucket interval
#[derive(Debug, Clone, Copy, Default)]
struct Segment {
    total: f64,
    count: usize,
}

impl Segment {
    fn add(&mut self, value: f64) {
        self.total += value;
        self.count += 1;
    }

    fn average(&self) -> BucketValue {
        if self.count == 0 {
            BucketValue::Missing
        } else {
            BucketValue::Value(self.total / self.count as f64)
        }
    }
}

/// Gap-aware series of bucket averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledSeries {
    anchor: Timestamp,
    width_ms: i64,
    buckets: Vec<Bucket>,
    before_anchor: usize,
}

impl ResampledSeries {
    /// Start of bucket 0
    pub fn anchor(&self) -> Timestamp {
        self.anchor
    }

    /// Bucket width
    pub fn width(&self) -> Duration {
        Duration::milliseconds(self.width_ms)
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Samples earlier than the anchor, which belong to no bucket
    pub fn before_anchor(&self) -> usize {
        self.before_anchor
    }

    /// Number of buckets with no samples
    pub fn missing_count(&self) -> usize {
        self.buckets.iter().filter(|b| b.value.is_missing()).count()
    }

    /// Non-missing buckets, indexed by bucket position
    pub fn observations(&self) -> impl Iterator<Item = Observation> + '_ {
        self.buckets.iter().filter_map(|b| {
            b.value
                .as_option()
                .map(|v| Observation::new(b.index, b.start, v))
        })
    }

    /// `(bucket_start, average_or_none)` pairs
    pub fn points(&self) -> Vec<(Timestamp, Option<f64>)> {
        self.buckets
            .iter()
            .map(|b| (b.start, b.value.as_option()))
            .collect()
    }

    fn same_grid(&self, other: &ResampledSeries) -> bool {
        self.anchor == other.anchor && self.width_ms == other.width_ms
    }
}

/// Resample a series into fixed-width bucket averages
///
/// `anchor` defaults to the first timestamp of the series.
pub fn resample(
    series: &SensorSeries,
    width: Duration,
    anchor: Option<Timestamp>,
) -> Result<ResampledSeries> {
    let width_ms = width.num_milliseconds();
    if width_ms <= 0 {
        return Err(DriftError::InvalidConfig(format!(
            "bucket width must be positive, got {}ms",
            width_ms
        )));
    }

    let (first, last) = match (series.min_timestamp(), series.max_timestamp()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(DriftError::EmptySeries { sensor: None }),
    };
    let anchor = anchor.unwrap_or(first);

    let span_ms = (last - anchor).num_milliseconds();
    let bucket_count = if span_ms < 0 {
        1
    } else {
        usize::try_from(span_ms / width_ms)
            .ok()
            .and_then(|k| k.checked_add(1))
            .unwrap_or(usize::MAX)
    };
    if bucket_count > MAX_BUCKETS {
        return Err(DriftError::InvalidConfig(format!(
            "{} buckets exceed the limit of {}",
            bucket_count, MAX_BUCKETS
        )));
    }

    let mut segments = vec![Segment::default(); bucket_count];
    let mut before_anchor = 0;

    for sample in series.iter() {
        let offset_ms = (sample.timestamp - anchor).num_milliseconds();
        if offset_ms < 0 {
            before_anchor += 1;
            continue;
        }
        // offset <= span, so k < bucket_count
        let k = (offset_ms / width_ms) as usize;
        segments[k].add(sample.value);
    }

    if before_anchor > 0 {
        log::debug!(
            "{} samples precede anchor {} and were not bucketed",
            before_anchor,
            anchor
        );
    }

    let buckets = segments
        .iter()
        .enumerate()
        .map(|(k, segment)| Bucket {
            index: k,
            start: anchor + Duration::milliseconds(width_ms * k as i64),
            count: segment.count,
            value: segment.average(),
        })
        .collect();

    Ok(ResampledSeries {
        anchor,
        width_ms,
        buckets,
        before_anchor,
    })
}

/// Resample one sensor of an entity store
pub fn resample_sensor(
    store: &TimeSeriesStore,
    sensor_id: &str,
    width: Duration,
    anchor: Option<Timestamp>,
) -> Result<ResampledSeries> {
    let series = store.series(sensor_id)?;
    if series.is_empty() {
        return Err(DriftError::EmptySeries {
            sensor: Some(sensor_id.to_string()),
        });
    }
    resample(series, width, anchor)
}

/// Pointwise difference of two series on the same bucket grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferenceSeries {
    points: Vec<Observation>,
    skipped: usize,
    unmatched: usize,
}

impl DifferenceSeries {
    /// `a - b` for every bucket present on both sides
    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    /// Buckets dropped because either side was missing
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Buckets beyond the end of the shorter series
    pub fn unmatched(&self) -> usize {
        self.unmatched
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Difference `a - b` of two resampled series
///
/// Both series must share anchor and width. A bucket where either side is
/// [`BucketValue::Missing`] produces no point at all (no interpolation, no
/// zero fill).
pub fn difference(a: &ResampledSeries, b: &ResampledSeries) -> Result<DifferenceSeries> {
    if !a.same_grid(b) {
        return Err(DriftError::InvalidConfig(format!(
            "bucket grids differ: anchor {} / {}ms vs anchor {} / {}ms",
            a.anchor, a.width_ms, b.anchor, b.width_ms
        )));
    }

    let mut points = Vec::with_capacity(a.len().min(b.len()));
    let mut skipped = 0;

    for (bucket_a, bucket_b) in a.buckets.iter().zip(b.buckets.iter()) {
        match (bucket_a.value, bucket_b.value) {
            (BucketValue::Value(va), BucketValue::Value(vb)) => {
                points.push(Observation::new(bucket_a.index, bucket_a.start, va - vb));
            }
            _ => skipped += 1,
        }
    }

    Ok(DifferenceSeries {
        points,
        skipped,
        unmatched: a.len().abs_diff(b.len()),
    })
}
