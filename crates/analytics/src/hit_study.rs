use crate::error::AnalyticsError;
use crate::report::OutcomeProfile;
use crate::stats;
use configuration::HitStudyConfig;
use core_types::{Observation, ReportMonth, SymbolOutcome};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Symbols that hit the growth range the same number of times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitGroup {
    /// Number of reporting months whose metric fell inside the range.
    pub hits: usize,
    pub symbols: Vec<String>,
    pub mean_return: f64,
    /// Share of symbols whose return beat the win threshold, in percent.
    pub win_rate_pct: f64,
    /// Share of symbols whose return beat the double threshold, in percent.
    pub double_rate_pct: f64,
    pub outcome: OutcomeProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitStudy {
    /// Ordered by `hits`, most frequent breakouts first.
    pub groups: Vec<HitGroup>,
    /// Symbols with at least one hit but no usable outcome return.
    pub unmatched: usize,
}

impl HitStudy {
    pub fn group(&self, hits: usize) -> Option<&HitGroup> {
        self.groups.iter().find(|g| g.hits == hits)
    }
}

/// Counts, per symbol, the months whose metric lies in `[low, high)` and relates that
/// count to the symbol's return over the study horizon.
///
/// With `study_year` set, only the 12 reports announced during that year count.
/// Symbols without any hit do not take part. When `outcomes` lists a symbol more than
/// once, the last entry wins.
pub fn run_hit_study(
    observations: &[Observation],
    outcomes: &[SymbolOutcome],
    config: &HitStudyConfig,
) -> Result<HitStudy, AnalyticsError> {
    if !config.low.is_finite() || !config.high.is_finite() || config.low >= config.high {
        return Err(AnalyticsError::InvalidConfig(format!(
            "hit range [{}, {}) is empty or not finite",
            config.low, config.high
        )));
    }

    let window = config
        .window()
        .map_err(|e| AnalyticsError::InvalidConfig(e.to_string()))?;

    let range = config.low..config.high;
    let mut hit_months: BTreeMap<&str, BTreeSet<ReportMonth>> = BTreeMap::new();
    let in_window = observations
        .iter()
        .filter(|o| window.is_none_or(|w| w.contains(o.period)));
    for observation in in_window {
        let Some(value) = config.metric.value(observation) else {
            continue;
        };
        if range.contains(&value) {
            hit_months
                .entry(observation.symbol.as_str())
                .or_default()
                .insert(observation.period);
        }
    }

    let returns: HashMap<&str, f64> = outcomes
        .iter()
        .filter(|o| o.return_pct.is_finite())
        .map(|o| (o.symbol.as_str(), o.return_pct))
        .collect();

    let mut unmatched = 0;
    let mut by_hits: BTreeMap<usize, Vec<(&str, f64)>> = BTreeMap::new();
    for (symbol, months) in &hit_months {
        match returns.get(symbol) {
            Some(ret) => by_hits.entry(months.len()).or_default().push((*symbol, *ret)),
            None => unmatched += 1,
        }
    }
    if unmatched > 0 {
        tracing::warn!(unmatched, "Symbols with hits have no outcome return.");
    }

    let groups = by_hits
        .into_iter()
        .rev()
        .filter_map(|(hits, members)| build_group(hits, members, config))
        .collect();

    Ok(HitStudy { groups, unmatched })
}

fn build_group(
    hits: usize,
    members: Vec<(&str, f64)>,
    config: &HitStudyConfig,
) -> Option<HitGroup> {
    let symbols = members.iter().map(|(s, _)| s.to_string()).sorted().collect();
    let returns = stats::sorted(members.into_iter().map(|(_, r)| r));
    let n = returns.len() as f64;
    let share_above = |threshold: f64| {
        let above = returns.len() - returns.partition_point(|r| *r <= threshold);
        above as f64 * 100.0 / n
    };

    Some(HitGroup {
        hits,
        symbols,
        mean_return: stats::mean(&returns)?,
        win_rate_pct: share_above(config.win_threshold_pct),
        double_rate_pct: share_above(config.double_threshold_pct),
        outcome: OutcomeProfile::from_sorted_returns(&returns, config.win_threshold_pct)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(m: u32) -> ReportMonth {
        ReportMonth::new(2024, m).unwrap()
    }

    fn yoy(symbol: &str, m: u32, value: f64) -> Observation {
        Observation::new(symbol, month(m), Some(value), None, None)
    }

    fn outcome(symbol: &str, ret: f64) -> SymbolOutcome {
        SymbolOutcome {
            symbol: symbol.to_string(),
            return_pct: ret,
        }
    }

    #[test]
    fn groups_symbols_by_hit_count() {
        let observations = vec![
            yoy("A", 1, 150.0),
            yoy("A", 2, 120.0),
            yoy("A", 3, 50.0),
            yoy("B", 1, 100.0),
            yoy("B", 2, 1000.0), // upper bound is exclusive
            yoy("C", 5, 300.0),
            yoy("D", 1, 10.0),
        ];
        let outcomes = vec![
            outcome("A", 150.0),
            outcome("B", 10.0),
            outcome("C", 40.0),
            outcome("D", 500.0),
        ];
        let study = run_hit_study(&observations, &outcomes, &HitStudyConfig::default()).unwrap();

        let hits: Vec<usize> = study.groups.iter().map(|g| g.hits).collect();
        assert_eq!(hits, vec![2, 1]);

        let double = study.group(2).unwrap();
        assert_eq!(double.symbols, vec!["A"]);
        assert_eq!(double.win_rate_pct, 100.0);
        assert_eq!(double.double_rate_pct, 100.0);

        let single = study.group(1).unwrap();
        assert_eq!(single.symbols, vec!["B", "C"]);
        assert_eq!(single.mean_return, 25.0);
        assert_eq!(single.win_rate_pct, 50.0);
        assert_eq!(single.double_rate_pct, 0.0);
        assert_eq!(single.outcome.hit_probability, 0.5);
        assert_eq!(study.unmatched, 0);
    }

    #[test]
    fn repeated_months_count_once_and_missing_outcomes_are_reported() {
        let observations = vec![yoy("A", 1, 150.0), yoy("A", 1, 160.0), yoy("Z", 1, 200.0)];
        let study =
            run_hit_study(&observations, &[outcome("A", 5.0)], &HitStudyConfig::default()).unwrap();
        assert_eq!(study.groups.len(), 1);
        assert_eq!(study.groups[0].hits, 1);
        assert_eq!(study.unmatched, 1);
    }

    #[test]
    fn study_year_counts_reports_announced_that_year() {
        let at = |year: i32, m: u32| {
            Observation::new("A", ReportMonth::new(year, m).unwrap(), Some(150.0), None, None)
        };
        // Announced in 2023, in 2024 (Dec through Nov), and in 2025.
        let observations = vec![
            at(2023, 11),
            at(2023, 12),
            at(2024, 6),
            at(2024, 11),
            at(2024, 12),
        ];
        let config = HitStudyConfig {
            study_year: Some(2024),
            ..HitStudyConfig::default()
        };
        let study = run_hit_study(&observations, &[outcome("A", 30.0)], &config).unwrap();
        assert_eq!(study.groups.len(), 1);
        assert_eq!(study.groups[0].hits, 3);

        let config = HitStudyConfig::default();
        let all_years = run_hit_study(&observations, &[outcome("A", 30.0)], &config).unwrap();
        assert_eq!(all_years.groups[0].hits, 5);
    }

    #[test]
    fn unusable_study_year_is_invalid_config() {
        let config = HitStudyConfig {
            study_year: Some(0),
            ..HitStudyConfig::default()
        };
        assert!(matches!(
            run_hit_study(&[], &[], &config),
            Err(AnalyticsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_range_is_invalid_config() {
        let config = HitStudyConfig {
            low: 100.0,
            high: 100.0,
            ..HitStudyConfig::default()
        };
        assert!(matches!(
            run_hit_study(&[], &[], &config),
            Err(AnalyticsError::InvalidConfig(_))
        ));
    }
}
