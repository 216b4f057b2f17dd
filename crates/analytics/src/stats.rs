//! Descriptive statistics over sorted samples.
//!
//! Every function takes an ascending slice of finite values (see [`sorted`]) and
//! returns `None` when the statistic is undefined for the sample rather than
//! inventing a number. Sums always run over the sorted slice, so the result only
//! depends on the multiset of values and never on the order they arrived in.

use serde::{Deserialize, Serialize};

/// Tail ratios need this many values before they mean anything.
pub const MIN_TAIL_SAMPLE: usize = 20;

/// Collects values into an ascending vector.
pub fn sorted(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.into_iter().collect();
    values.sort_by(f64::total_cmp);
    values
}

/// Continuous percentile (linear interpolation between order statistics).
///
/// For `n` sorted values and `p` in `[0, 1]`: `h = (n - 1) * p`, and the result is
/// `x[floor(h)] + (h - floor(h)) * (x[floor(h) + 1] - x[floor(h)])`. This is the
/// `percentile_cont` of SQL and numpy's default `linear` method.
pub fn percentile_cont(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * p;
    let lower = h.floor() as usize;
    let fraction = h - lower as f64;

    match sorted.get(lower + 1) {
        Some(next) if fraction > 0.0 => Some(sorted[lower] + fraction * (next - sorted[lower])),
        _ => Some(sorted[lower]),
    }
}

pub fn median(sorted: &[f64]) -> Option<f64> {
    percentile_cont(sorted, 0.5)
}

pub fn mean(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    Some(sorted.iter().sum::<f64>() / sorted.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std_dev(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n < 2 {
        return None;
    }
    let mean = mean(sorted)?;
    let sum_sq: f64 = sorted.iter().map(|x| (x - mean) * (x - mean)).sum();
    Some((sum_sq / (n - 1) as f64).sqrt())
}

/// Central moments m2, m3, m4 (population form).
fn central_moments(sorted: &[f64]) -> Option<(f64, f64, f64)> {
    let n = sorted.len() as f64;
    let mean = mean(sorted)?;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for x in sorted {
        let d = x - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    Some((m2 / n, m3 / n, m4 / n))
}

/// Adjusted Fisher-Pearson sample skewness (G1). Needs at least three values and non-zero spread.
pub fn skewness(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n < 3 {
        return None;
    }
    let (m2, m3, _) = central_moments(sorted)?;
    if m2 == 0.0 {
        return None;
    }
    let n = n as f64;
    let g1 = m3 / m2.powf(1.5);
    Some(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0))
}

/// Bias-corrected sample excess kurtosis (G2). Needs at least four values and non-zero spread.
pub fn excess_kurtosis(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n < 4 {
        return None;
    }
    let (m2, _, m4) = central_moments(sorted)?;
    if m2 == 0.0 {
        return None;
    }
    let n = n as f64;
    let g2 = m4 / (m2 * m2) - 3.0;
    Some(((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0)))
}

/// Sample standard deviation over the mean. Undefined for a zero mean.
pub fn coefficient_of_variation(sorted: &[f64]) -> Option<f64> {
    let mean = mean(sorted)?;
    if mean == 0.0 {
        return None;
    }
    Some(sample_std_dev(sorted)? / mean)
}

/// Right-tail concentration: `(p95 - median) / IQR`.
///
/// Large values mean the upside is carried by a few extreme names.
pub fn right_tail_concentration(sorted: &[f64]) -> Option<f64> {
    if sorted.len() < MIN_TAIL_SAMPLE {
        return None;
    }
    let q95 = percentile_cont(sorted, 0.95)?;
    let q75 = percentile_cont(sorted, 0.75)?;
    let q25 = percentile_cont(sorted, 0.25)?;
    let iqr = q75 - q25;
    if iqr == 0.0 {
        return None;
    }
    Some((q95 - median(sorted)?) / iqr)
}

/// Top-decile intensity: mean of the values at or above p90, divided by the median.
pub fn top_decile_intensity(sorted: &[f64]) -> Option<f64> {
    if sorted.len() < MIN_TAIL_SAMPLE {
        return None;
    }
    let median = median(sorted)?;
    if median == 0.0 {
        return None;
    }
    let cutoff = percentile_cont(sorted, 0.9)?;
    let start = sorted.partition_point(|x| *x < cutoff);
    Some(mean(&sorted[start..])? / median)
}

/// Counts of moves in the five reaction buckets
/// `(-inf, -5) [-5, -1) [-1, 1) [1, 5) [5, inf)`, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionBuckets {
    pub big_drop: usize,
    pub small_drop: usize,
    pub flat: usize,
    pub small_rise: usize,
    pub big_rise: usize,
}

impl DistributionBuckets {
    pub fn from_values(values: &[f64]) -> Self {
        let mut buckets = Self::default();
        for value in values {
            match *value {
                v if v < -5.0 => buckets.big_drop += 1,
                v if v < -1.0 => buckets.small_drop += 1,
                v if v < 1.0 => buckets.flat += 1,
                v if v < 5.0 => buckets.small_rise += 1,
                _ => buckets.big_rise += 1,
            }
        }
        buckets
    }

    pub fn total(&self) -> usize {
        self.big_drop + self.small_drop + self.flat + self.small_rise + self.big_rise
    }
}
