//! Stress tests for sensor-drift
//!
//! Run with: cargo test --release stress -- --ignored

use std::time::Instant;

use chrono::Duration;
use sensor_drift::series::from_epoch_secs;
use sensor_drift::*;

#[test]
#[ignore] // Run manually with --ignored
fn stress_test_ewma_ingest() {
    let mut registry = EntityRegistry::new(EntityKind::aggregating(100, 0.7)).unwrap();

    let iterations = 1_000_000i64;
    let start = Instant::now();

    for i in 0..iterations {
        let t = from_epoch_secs(i).unwrap();
        let entity = if i % 2 == 0 { "f6ce368d7563b285" } else { "f6ce36f0118e6361" };
        registry
            .add(entity, "Temperature", t, 20.0 + (i as f64 * 0.001).sin())
            .unwrap();
    }

    let elapsed = start.elapsed();
    let rate = iterations as f64 / elapsed.as_secs_f64();

    println!("Absorbed {} samples in {:?}", iterations, elapsed);
    println!("Rate: {:.0} samples/second", rate);

    let stored: usize = registry.iter().map(|(_, e)| e.store().sample_count()).sum();
    assert!(stored < (iterations / 100) as usize + 2);
    assert!(
        rate > 100_000.0,
        "Should absorb at least 100k samples/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_resample_sparse_span() {
    // a long span with few samples must stay linear in samples + buckets
    let series: SensorSeries = (0..10_000i64)
        .map(|i| Sample::new(from_epoch_secs(i * 3_600).unwrap(), i as f64))
        .collect();

    let start = Instant::now();
    let resampled = resample(&series, Duration::seconds(10), None).unwrap();
    let elapsed = start.elapsed();

    println!(
        "Resampled {} samples into {} buckets in {:?}",
        series.len(),
        resampled.len(),
        elapsed
    );

    assert_eq!(resampled.len(), 9_999 * 360 + 1);
    assert_eq!(resampled.len() - resampled.missing_count(), 10_000);
    assert!(elapsed.as_secs() < 5, "Resampling took {:?}", elapsed);
}

#[test]
#[ignore]
fn stress_test_long_pass() {
    let observations: Vec<Observation> = (0..1_000_000usize)
        .map(|i| {
            Observation::new(
                i,
                from_epoch_secs(i as i64).unwrap(),
                0.5 + 0.1 * (i as f64 * 0.01).sin(),
            )
        })
        .collect();

    let mut detector = HddmW::new(HddmWConfig::default()).unwrap();
    let start = Instant::now();
    let report = run_pass(&mut detector, &observations).unwrap();
    let elapsed = start.elapsed();

    println!(
        "Fed {} values in {:?}, {} changes",
        report.fed,
        elapsed,
        report.anomalies.len()
    );
    assert_eq!(report.fed, observations.len());
}
