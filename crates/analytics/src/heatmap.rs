use crate::binning::BinningScheme;
use crate::stats;
use core_types::{AggregationMethod, BinIndex, Metric, Observation, ReportMonth, StudyWindow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One cell of the "return bin x report month" matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    /// Median or mean of the metric, depending on the heatmap's method.
    pub value: f64,
    /// Distinct symbols behind the value.
    pub symbols: usize,
}

/// Growth metric per return bin and reporting month. Cells without data are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub metric: Metric,
    pub method: AggregationMethod,
    /// Report months the matrix was restricted to, if any.
    pub window: Option<StudyWindow>,
    pub rows: BTreeMap<BinIndex, BTreeMap<ReportMonth, HeatmapCell>>,
    pub rejected: usize,
}

impl Heatmap {
    /// Every reporting month that has at least one cell, ascending.
    pub fn periods(&self) -> BTreeSet<ReportMonth> {
        self.rows
            .values()
            .flat_map(|row| row.keys().copied())
            .collect()
    }

    /// Size of the sample: for each bin the largest per-month symbol count, summed over bins.
    pub fn total_symbols(&self) -> usize {
        self.rows
            .values()
            .map(|row| row.values().map(|cell| cell.symbols).max().unwrap_or(0))
            .sum()
    }

    pub fn cell(&self, bin: BinIndex, period: ReportMonth) -> Option<&HeatmapCell> {
        self.rows.get(&bin)?.get(&period)
    }
}

#[derive(Default)]
struct CellAccumulator<'a> {
    values: Vec<f64>,
    symbols: BTreeSet<&'a str>,
}

/// Builds the bin/month matrix. Observations with a missing or non-finite
/// return or metric are counted in `rejected`; those outside `window` are skipped.
pub fn build_heatmap(
    observations: &[Observation],
    scheme: &BinningScheme,
    metric: Metric,
    method: AggregationMethod,
    window: Option<StudyWindow>,
) -> Heatmap {
    let mut rejected = 0;
    let mut cells: BTreeMap<(BinIndex, ReportMonth), CellAccumulator<'_>> = BTreeMap::new();

    let in_window = observations
        .iter()
        .filter(|o| window.is_none_or(|w| w.contains(o.period)));
    for observation in in_window {
        let bin = observation
            .forward_return_pct
            .and_then(|r| scheme.assign_bin(r).ok());
        let value = metric.value(observation).filter(|v| v.is_finite());
        let (Some(bin), Some(value)) = (bin, value) else {
            rejected += 1;
            continue;
        };

        let cell = cells.entry((bin, observation.period)).or_default();
        cell.values.push(value);
        cell.symbols.insert(observation.symbol.as_str());
    }

    let mut rows: BTreeMap<BinIndex, BTreeMap<ReportMonth, HeatmapCell>> = BTreeMap::new();
    for ((bin, period), acc) in cells {
        let values = stats::sorted(acc.values);
        let collapsed = match method {
            AggregationMethod::Median => stats::median(&values),
            AggregationMethod::Mean => stats::mean(&values),
        };
        if let Some(value) = collapsed {
            rows.entry(bin).or_default().insert(
                period,
                HeatmapCell {
                    value,
                    symbols: acc.symbols.len(),
                },
            );
        }
    }

    tracing::debug!(bins = rows.len(), rejected, "Heatmap built.");

    Heatmap {
        metric,
        method,
        window,
        rows,
        rejected,
    }
}
