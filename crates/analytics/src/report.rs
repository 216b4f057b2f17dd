use crate::binning::BinningScheme;
use crate::error::AnalyticsError;
use crate::stats;
use core_types::{BinIndex, Metric};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Order statistics and shape of the growth metric inside one bin.
///
/// Every field is `None` when the bin holds too few values for it to be defined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub median: Option<f64>,
    pub p25: Option<f64>,
    pub p75: Option<f64>,
    pub mean: Option<f64>,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub coefficient_of_variation: Option<f64>,
}

impl MetricSummary {
    pub fn from_sorted(sorted: &[f64]) -> Self {
        Self {
            median: stats::median(sorted),
            p25: stats::percentile_cont(sorted, 0.25),
            p75: stats::percentile_cont(sorted, 0.75),
            mean: stats::mean(sorted),
            skewness: stats::skewness(sorted),
            kurtosis: stats::excess_kurtosis(sorted),
            coefficient_of_variation: stats::coefficient_of_variation(sorted),
        }
    }
}

/// The risk/reward profile of a set of returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeProfile {
    /// Mean of `max(r, 0)`, in percent.
    pub expected_gain: f64,
    /// Mean of `max(-r, 0)`, in percent. Always non-negative.
    pub expected_loss: f64,
    /// Share of returns strictly above the hit threshold, in `[0, 1]`.
    pub hit_probability: f64,
}

impl OutcomeProfile {
    /// Builds the profile from ascending returns. `None` for an empty sample.
    pub fn from_sorted_returns(sorted: &[f64], hit_threshold_pct: f64) -> Option<Self> {
        if sorted.is_empty() {
            return None;
        }
        let n = sorted.len() as f64;
        let gain: f64 = sorted.iter().map(|r| r.max(0.0)).sum();
        let loss: f64 = sorted.iter().map(|r| (-r).max(0.0)).sum();
        let first_hit = sorted.partition_point(|r| *r <= hit_threshold_pct);
        let hits = sorted.len() - first_hit;

        Some(Self {
            expected_gain: gain / n,
            expected_loss: loss / n,
            hit_probability: hits as f64 / n,
        })
    }
}

/// Summary of one return bin. Always derived from the observations, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinStatistic {
    pub bin: BinIndex,
    pub lower: f64,
    pub upper: f64,
    /// Observations that contributed to the statistics.
    pub count: usize,
    /// Observations that fell into this bin but were trimmed as outliers.
    pub excluded: usize,
    pub median_return: Option<f64>,
    pub metric: MetricSummary,
    pub outcome: Option<OutcomeProfile>,
}

impl BinStatistic {
    /// A bin without observations: every statistic is undefined.
    pub fn empty(scheme: &BinningScheme, bin: BinIndex) -> Self {
        let (lower, upper) = scheme.bounds(bin);
        Self {
            bin,
            lower,
            upper,
            count: 0,
            excluded: 0,
            median_return: None,
            metric: MetricSummary::default(),
            outcome: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// The result of binning a dataset: one `BinStatistic` per populated bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub metric: Metric,
    pub scheme: BinningScheme,
    pub trim_fraction: f64,
    pub bins: BTreeMap<BinIndex, BinStatistic>,
    /// Records with a missing or non-finite return or metric.
    pub rejected: usize,
    /// Records removed by outlier trimming, over all bins.
    pub excluded: usize,
}

impl Aggregation {
    pub fn get(&self, bin: BinIndex) -> Option<&BinStatistic> {
        self.bins.get(&bin)
    }

    /// Observations that made it into a bin's statistics.
    pub fn total_count(&self) -> usize {
        self.bins.values().map(|b| b.count).sum()
    }

    /// Every bin from `from` to `to` inclusive, with empty placeholders for the gaps.
    ///
    /// Fails with `InvalidInput` when the range spans more than `max_bins` bins.
    pub fn dense_bins(
        &self,
        from: BinIndex,
        to: BinIndex,
        max_bins: usize,
    ) -> Result<impl Iterator<Item = BinStatistic> + '_, AnalyticsError> {
        let span = (i128::from(to.0) - i128::from(from.0) + 1).max(0);
        if span > max_bins as i128 {
            return Err(AnalyticsError::InvalidInput(format!(
                "bins {from}..={to} span {span} bins, more than the limit of {max_bins}"
            )));
        }
        Ok((from.0..=to.0).map(move |i| {
            let bin = BinIndex(i);
            self.bins
                .get(&bin)
                .cloned()
                .unwrap_or_else(|| BinStatistic::empty(&self.scheme, bin))
        }))
    }

    /// Lowest and highest populated bins.
    pub fn bin_range(&self) -> Option<(BinIndex, BinIndex)> {
        let first = *self.bins.keys().next()?;
        let last = *self.bins.keys().next_back()?;
        Some((first, last))
    }
}
