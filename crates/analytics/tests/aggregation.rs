use analytics::{Aggregator, BinningScheme, assign_bin};
use core_types::{BinIndex, Metric, Observation, ReportMonth};

fn obs(symbol: &str, yoy: f64, ret: f64) -> Observation {
    Observation::new(
        symbol,
        ReportMonth::new(2023, 6).unwrap(),
        Some(yoy),
        Some(yoy / 4.0),
        Some(ret),
    )
}

fn sample() -> Vec<Observation> {
    (0..40)
        .map(|i| {
            let ret = (i as f64 * 13.7) % 260.0 - 60.0;
            let yoy = (i as f64 * 7.3) % 90.0 - 20.0;
            obs(&format!("{:04}", 1000 + i), yoy, ret)
        })
        .collect()
}

#[test]
fn documented_returns_land_in_documented_bins() {
    let bins: Vec<i64> = [-35.0, -35.0, -5.0, 5.0, 50.0, 250.0]
        .into_iter()
        .map(|r| assign_bin(r).unwrap().0)
        .collect();
    assert_eq!(bins, vec![-4, -4, -1, 0, 0, 2]);
}

#[test]
fn aggregation_ignores_input_order() {
    let aggregator = Aggregator::new(BinningScheme::default(), 0.05, 20.0).unwrap();
    let original = sample();

    let mut reversed = original.clone();
    reversed.reverse();
    let mut rotated = original.clone();
    rotated.rotate_left(17);

    let expected = aggregator.aggregate(&original, Metric::Yoy);
    assert_eq!(aggregator.aggregate(&reversed, Metric::Yoy), expected);
    assert_eq!(aggregator.aggregate(&rotated, Metric::Yoy), expected);
}

#[test]
fn tied_metric_values_trim_the_same_records_in_any_order() {
    let aggregator = Aggregator::new(BinningScheme::default(), 0.25, 20.0).unwrap();
    let data = vec![
        obs("A", 10.0, -25.0),
        obs("B", 10.0, 15.0),
        obs("C", 10.0, 150.0),
        obs("D", 10.0, 5.0),
    ];
    let mut reversed = data.clone();
    reversed.reverse();
    assert_eq!(
        aggregator.aggregate(&data, Metric::Yoy),
        aggregator.aggregate(&reversed, Metric::Yoy)
    );
}

#[test]
fn single_observation_is_its_own_median() {
    let aggregator = Aggregator::new(BinningScheme::default(), 0.0, 20.0).unwrap();
    let result = aggregator.aggregate(&[obs("2330", 42.0, 12.0)], Metric::Yoy);
    let stat = result.get(BinIndex(0)).unwrap();
    assert_eq!(stat.count, 1);
    assert_eq!(stat.metric.median, Some(42.0));
    assert_eq!(stat.metric.p25, Some(42.0));
    assert_eq!(stat.median_return, Some(12.0));
}

#[test]
fn trimming_shifts_the_median_only_when_it_removes_records() {
    // Bin 0 holds the lowest metric value; the highest sits alone in bin 1.
    let data = vec![
        obs("A", 1.0, 10.0),
        obs("B", 5.0, 20.0),
        obs("C", 6.0, 30.0),
        obs("D", 7.0, 40.0),
        obs("E", 100.0, 150.0),
    ];
    let median_of_bin_zero = |trim: f64| {
        let aggregator = Aggregator::new(BinningScheme::default(), trim, 20.0).unwrap();
        let result = aggregator.aggregate(&data, Metric::Yoy);
        result.get(BinIndex(0)).unwrap().metric.median
    };

    assert_eq!(median_of_bin_zero(0.0), Some(5.5));
    // floor(5 * 0.19) = 0: nothing is removed.
    assert_eq!(median_of_bin_zero(0.19), Some(5.5));
    // floor(5 * 0.2) = 1: "A" and "E" are removed.
    assert_eq!(median_of_bin_zero(0.2), Some(6.0));
}

#[test]
fn trimmed_records_stay_visible_as_exclusions() {
    let mut data: Vec<Observation> = (0..9)
        .map(|i| obs(&format!("S{i}"), 10.0 + i as f64, 20.0))
        .collect();
    data.push(obs("OUTLIER", 10_000.0, 20.0));

    let raw = Aggregator::new(BinningScheme::default(), 0.0, 20.0)
        .unwrap()
        .aggregate(&data, Metric::Yoy);
    let cut = Aggregator::new(BinningScheme::default(), 0.1, 20.0)
        .unwrap()
        .aggregate(&data, Metric::Yoy);

    let raw_bin = raw.get(BinIndex(0)).unwrap();
    let cut_bin = cut.get(BinIndex(0)).unwrap();
    assert!(raw_bin.metric.mean.unwrap() > 1000.0);
    // 11..=18 remain.
    assert_eq!(cut_bin.metric.mean, Some(14.5));
    assert_eq!(cut_bin.count, 8);
    assert_eq!(cut_bin.excluded, 2);
    assert_eq!(cut.excluded, 2);
    assert_eq!(raw.excluded, 0);
}

#[test]
fn other_metrics_bin_the_same_records() {
    let aggregator = Aggregator::new(BinningScheme::default(), 0.0, 20.0).unwrap();
    let data = sample();
    let yoy = aggregator.aggregate(&data, Metric::Yoy);
    let mom = aggregator.aggregate(&data, Metric::Mom);

    assert_eq!(yoy.bins.keys().collect::<Vec<_>>(), mom.bins.keys().collect::<Vec<_>>());
    for (bin, stat) in &yoy.bins {
        let other = &mom.bins[bin];
        assert_eq!(stat.count, other.count);
        let (a, b) = (stat.metric.median.unwrap(), other.metric.median.unwrap());
        assert!((a / 4.0 - b).abs() < 1e-9);
    }
}
