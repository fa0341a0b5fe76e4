//! End-to-end scenarios: ingest, smooth, resample, difference, detect.

use std::path::Path;

use approx::assert_relative_eq;
use chrono::Duration;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use sensor_drift::series::from_epoch_secs;
use sensor_drift::*;

const HEADER: &str = "Time,DeviceId,Sensor,Value\n";

fn ts(secs: i64) -> Timestamp {
    from_epoch_secs(secs).unwrap()
}

fn ingest_str(registry: EntityRegistry, data: &str) -> EntityRegistry {
    let mut ingester = Ingester::new(registry, IngestOptions::default());
    ingester
        .ingest_reader(data.as_bytes(), Path::new("inline.csv"))
        .unwrap();
    ingester.finish().0
}

fn hddm_orchestrator() -> Orchestrator {
    Orchestrator::new(DetectorProfiles::uniform(DetectorConfig::HddmW(
        HddmWConfig::default(),
    )))
}

#[test]
fn test_end_to_end_exact_bucket_edges() {
    let data = format!("{}0,d1,T,10\n3600,d1,T,12\n7200,d1,T,50\n", HEADER);
    let registry = ingest_str(EntityRegistry::raw(), &data);

    let store = registry.by_name("d1").unwrap().store();
    let hourly = resample(store.series("T").unwrap(), Duration::hours(1), Some(ts(0))).unwrap();

    assert_eq!(
        hourly.points(),
        vec![
            (ts(0), Some(10.0)),
            (ts(3600), Some(12.0)),
            (ts(7200), Some(50.0)),
        ]
    );
    assert!(hourly.buckets().iter().all(|b| b.count == 1));
}

#[test]
fn test_ordered_is_strictly_ascending_for_any_insert_order() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut times: Vec<i64> = (0..500).map(|_| rng.gen_range(0..200)).collect();
    times.shuffle(&mut rng);

    let mut store = TimeSeriesStore::new("d1");
    for t in &times {
        store.add("T", ts(*t), *t as f64);
    }

    let (timestamps, values) = store.ordered("T").unwrap();
    assert_eq!(timestamps.len(), values.len());
    assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
    for (t, v) in timestamps.iter().zip(&values) {
        assert_eq!(t.timestamp() as f64, *v);
    }
}

#[test]
fn test_ewma_cadence_window_two() {
    let mut device = EwmaDownsampler::new("d1", DownsampleConfig::new(2, 0.5)).unwrap();
    let emitted: Vec<Option<f64>> = (0..5)
        .map(|i| device.add("T", ts(i), 10.0 * (i + 1) as f64))
        .collect();

    assert_eq!(emitted.iter().filter(|e| e.is_some()).count(), 1);
    assert!(emitted[2].is_some());
    assert_eq!(device.pending("T"), Some(2));

    // emission lands on the triggering sample's timestamp
    let (timestamps, _) = device.store().ordered("T").unwrap();
    assert_eq!(timestamps, vec![ts(2)]);
}

#[test]
fn test_resampling_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(42);
    let series: SensorSeries = (0..2_000)
        .map(|_| Sample::new(ts(rng.gen_range(0..86_400)), rng.gen_range(-5.0..35.0)))
        .collect();

    let first = resample(&series, Duration::minutes(15), Some(ts(0))).unwrap();
    let second = resample(&series, Duration::minutes(15), Some(ts(0))).unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_missing_bucket_does_not_leak_into_neighbours() {
    let series: SensorSeries = [(0, 2.0), (5, 4.0), (20, 8.0), (29, 10.0)]
        .into_iter()
        .map(|(t, v)| Sample::new(ts(t), v))
        .collect();

    let r = resample(&series, Duration::seconds(10), None).unwrap();
    assert_eq!(r.len(), 3);
    assert_relative_eq!(r.buckets()[0].value.as_option().unwrap(), 3.0);
    assert_eq!(r.buckets()[1].value, BucketValue::Missing);
    assert_relative_eq!(r.buckets()[2].value.as_option().unwrap(), 9.0);
}

#[test]
fn test_difference_has_no_entry_for_missing_side() {
    let data = format!(
        "{}0,a,T,10\n10,a,T,11\n20,a,T,12\n0,b,T,1\n20,b,T,2\n",
        HEADER
    );
    let registry = ingest_str(EntityRegistry::raw(), &data);
    let a = registry.by_name("a").unwrap().store();
    let b = registry.by_name("b").unwrap().store();

    let width = Duration::seconds(10);
    let anchor = a.min_timestamp("T").unwrap();
    let ra = resample(a.series("T").unwrap(), width, Some(anchor)).unwrap();
    let rb = resample(b.series("T").unwrap(), width, Some(anchor)).unwrap();
    let diff = difference(&ra, &rb).unwrap();

    let indices: Vec<usize> = diff.points().iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![0, 2]);
    assert_eq!(diff.skipped(), 1);
    assert_relative_eq!(diff.points()[1].value, 10.0);
}

#[test]
fn test_shuffled_input_is_rejected() {
    let mut rng = StdRng::seed_from_u64(1234);
    let mut observations: Vec<Observation> = (0..100)
        .map(|i| Observation::new(i, ts(i as i64 * 60), (i % 7) as f64 * 0.1))
        .collect();
    observations.shuffle(&mut rng);

    let mut detector = HddmW::new(HddmWConfig::default()).unwrap();
    let result = run_pass(&mut detector, &observations);
    assert!(matches!(result, Err(DriftError::OutOfOrder { .. })));
}

#[test]
fn test_aggregated_pass_detects_level_shift() {
    let mut data = String::from(HEADER);
    for i in 0..3_000 {
        let value = if i < 2_000 { 0.2 } else { 1.0 };
        data.push_str(&format!("{},f6ce368d7563b285,Humidity,{}\n", i * 10, value));
    }
    let registry = ingest_str(
        EntityRegistry::new(EntityKind::aggregating(9, 1.0)).unwrap(),
        &data,
    );

    let entity = registry.by_name("f6ce368d7563b285").unwrap();
    assert_eq!(entity.store().sample_count(), 300);

    let report = hddm_orchestrator().run_series(entity, "Humidity").unwrap();
    assert_eq!(report.fed, 300);
    assert_eq!(report.anomalies.len(), 1);
    assert!(report.anomalies[0].timestamp >= ts(20_000));
}

#[test]
fn test_difference_pass_between_devices() {
    let mut data = String::from(HEADER);
    for i in 0..300 {
        let drifted = if i < 200 { 20.2 } else { 21.0 };
        data.push_str(&format!("{},d1,T,{}\n", i * 60, drifted));
        data.push_str(&format!("{},d2,T,20.0\n", i * 60));
    }
    let registry = ingest_str(EntityRegistry::raw(), &data);

    let a = registry.by_name("d1").unwrap();
    let b = registry.by_name("d2").unwrap();
    let report = hddm_orchestrator()
        .run_difference(a, b, "T", &ResampleConfig::new(60))
        .unwrap();

    assert_eq!(report.fed, 300);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.anomalies.len(), 1);
    assert!(report.anomalies[0].index >= 200);
}

#[test]
fn test_detector_failure_reports_discarded_anomalies() {
    let mut entity = Entity::new("d1", EntityKind::Raw).unwrap();
    for i in 0..300 {
        let value = if i < 200 { 0.2 } else { 1.0 };
        entity.add("T", ts(i), value);
    }
    entity.add("T", ts(300), f64::NAN);

    match hddm_orchestrator().run_series(&entity, "T") {
        Err(DriftError::Detector {
            index,
            anomalies_before,
            source,
        }) => {
            assert_eq!(index, 300);
            assert_eq!(anomalies_before, 1);
            assert!(matches!(source, DetectorError::NonFiniteInput(_)));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
