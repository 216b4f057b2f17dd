use crate::binning::BinningScheme;
use crate::error::AnalyticsError;
use crate::report::{Aggregation, BinStatistic, MetricSummary, OutcomeProfile};
use crate::stats;
use configuration::{AggregationConfig, BinningConfig};
use core_types::{BinIndex, Metric, Observation};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A stateless calculator that bins observations by forward return and summarises
/// the paired growth metric in every bin.
#[derive(Debug, Clone)]
pub struct Aggregator {
    scheme: BinningScheme,
    trim_fraction: f64,
    hit_threshold_pct: f64,
}

/// A validated observation, ready to be ranked and binned.
struct Sample<'a> {
    metric: f64,
    forward_return: f64,
    bin: BinIndex,
    observation: &'a Observation,
}

impl Sample<'_> {
    /// Total order used for trimming. Ties on the metric fall back to the remaining
    /// fields so that the excluded set depends only on the data, never on input order.
    fn rank(&self, other: &Self) -> Ordering {
        self.metric
            .total_cmp(&other.metric)
            .then_with(|| self.forward_return.total_cmp(&other.forward_return))
            .then_with(|| self.observation.symbol.cmp(&other.observation.symbol))
            .then_with(|| self.observation.period.cmp(&other.observation.period))
    }
}

#[derive(Default)]
struct BinAccumulator {
    metrics: Vec<f64>,
    returns: Vec<f64>,
    excluded: usize,
}

impl Aggregator {
    /// # Arguments
    ///
    /// * `scheme` - How returns are cut into bins.
    /// * `trim_fraction` - Share of observations dropped from each tail of the metric
    ///   distribution before the statistics are taken. Must be in `[0, 0.5)`.
    /// * `hit_threshold_pct` - Returns strictly above this count as hits.
    pub fn new(
        scheme: BinningScheme,
        trim_fraction: f64,
        hit_threshold_pct: f64,
    ) -> Result<Self, AnalyticsError> {
        if !(0.0..0.5).contains(&trim_fraction) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "trim_fraction must be in [0, 0.5), got {trim_fraction}"
            )));
        }
        if !hit_threshold_pct.is_finite() {
            return Err(AnalyticsError::InvalidConfig(format!(
                "hit_threshold_pct must be finite, got {hit_threshold_pct}"
            )));
        }
        Ok(Self {
            scheme,
            trim_fraction,
            hit_threshold_pct,
        })
    }

    pub fn from_config(
        binning: &BinningConfig,
        aggregation: &AggregationConfig,
    ) -> Result<Self, AnalyticsError> {
        Self::new(
            BinningScheme::from_config(binning)?,
            aggregation.trim_fraction,
            aggregation.hit_threshold_pct,
        )
    }

    pub fn scheme(&self) -> &BinningScheme {
        &self.scheme
    }

    /// Groups `observations` into return bins and computes a `BinStatistic` for each.
    ///
    /// Records with a missing or non-finite return or metric are counted in
    /// `Aggregation::rejected` and take no further part. The result depends only on the
    /// multiset of observations: shuffling the input yields an identical aggregation.
    pub fn aggregate(&self, observations: &[Observation], metric: Metric) -> Aggregation {
        let mut rejected = 0;
        let mut samples = Vec::with_capacity(observations.len());

        for observation in observations {
            match self.validate(observation, metric) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    rejected += 1;
                    tracing::debug!(
                        symbol = %observation.symbol,
                        period = %observation.period,
                        error = %e,
                        "Observation rejected."
                    );
                }
            }
        }
        if rejected > 0 {
            tracing::warn!(
                rejected,
                total = observations.len(),
                "Observations with missing or non-finite values were excluded."
            );
        }

        samples.sort_by(|a, b| a.rank(b));
        let trim = (samples.len() as f64 * self.trim_fraction).floor() as usize;
        let keep = trim..samples.len() - trim;

        let mut accumulators: BTreeMap<BinIndex, BinAccumulator> = BTreeMap::new();
        for (position, sample) in samples.iter().enumerate() {
            let acc = accumulators.entry(sample.bin).or_default();
            if keep.contains(&position) {
                acc.metrics.push(sample.metric);
                acc.returns.push(sample.forward_return);
            } else {
                acc.excluded += 1;
            }
        }

        let bins: BTreeMap<BinIndex, BinStatistic> = accumulators
            .into_iter()
            .map(|(bin, acc)| (bin, self.summarize_bin(bin, acc)))
            .collect();

        tracing::debug!(
            ?metric,
            bins = bins.len(),
            samples = samples.len(),
            excluded = 2 * trim,
            "Aggregation complete."
        );

        Aggregation {
            metric,
            scheme: self.scheme,
            trim_fraction: self.trim_fraction,
            bins,
            rejected,
            excluded: 2 * trim,
        }
    }

    /// Aggregates independent partitions (e.g. one dataset per study year) in parallel.
    pub fn aggregate_partitions<K>(
        &self,
        partitions: &BTreeMap<K, Vec<Observation>>,
        metric: Metric,
    ) -> BTreeMap<K, Aggregation>
    where
        K: Ord + Clone + Send + Sync,
    {
        partitions
            .par_iter()
            .map(|(key, observations)| (key.clone(), self.aggregate(observations, metric)))
            .collect()
    }

    fn validate<'a>(
        &self,
        observation: &'a Observation,
        metric: Metric,
    ) -> Result<Sample<'a>, AnalyticsError> {
        let forward_return = observation
            .forward_return_pct
            .ok_or_else(|| AnalyticsError::InvalidInput("forward return is missing".to_string()))?;
        let bin = self.scheme.assign_bin(forward_return)?;
        let value = metric
            .value(observation)
            .ok_or_else(|| AnalyticsError::InvalidInput(format!("{metric} is missing")))?;
        if !value.is_finite() {
            return Err(AnalyticsError::InvalidInput(format!(
                "{metric} value {value} is not finite"
            )));
        }
        Ok(Sample {
            metric: value,
            forward_return,
            bin,
            observation,
        })
    }

    fn summarize_bin(&self, bin: BinIndex, acc: BinAccumulator) -> BinStatistic {
        let metrics = stats::sorted(acc.metrics);
        let returns = stats::sorted(acc.returns);
        let (lower, upper) = self.scheme.bounds(bin);

        BinStatistic {
            bin,
            lower,
            upper,
            count: returns.len(),
            excluded: acc.excluded,
            median_return: stats::median(&returns),
            metric: MetricSummary::from_sorted(&metrics),
            outcome: OutcomeProfile::from_sorted_returns(&returns, self.hit_threshold_pct),
        }
    }
}
