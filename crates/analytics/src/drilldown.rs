//! Leaderboards behind a single heatmap row or hit group: which companies make up a
//! bin, how their revenue grew, and what they said about it.

use crate::binning::BinningScheme;
use crate::error::AnalyticsError;
use crate::hit_study::run_hit_study;
use crate::stats;
use configuration::HitStudyConfig;
use core_types::{BinIndex, Observation, ReportMonth, StudyWindow, SymbolOutcome};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Remarks that mean "nothing to report" in the filings.
const BLANK_REMARKS: [&str; 2] = ["", "-"];

/// Narrows a drill-down to some report months, a keyword and a maximum length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrilldownFilter {
    pub window: Option<StudyWindow>,
    /// Case-insensitive text looked up in the company name and the remark.
    pub keyword: Option<String>,
    pub limit: Option<usize>,
}

/// One company in a drill-down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub symbol: String,
    pub name: Option<String>,
    pub return_pct: f64,
    pub mean_yoy: Option<f64>,
    pub mean_mom: Option<f64>,
    /// The most recent non-blank remark inside the window, regardless of the keyword.
    pub latest_remark: Option<String>,
    /// Reports behind the means.
    pub reports: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drilldown {
    /// Best return first; ties are broken by symbol.
    pub members: Vec<SymbolSummary>,
    /// Members found before `limit` was applied.
    pub matched: usize,
}

#[derive(Default)]
struct Member<'a> {
    name: Option<(ReportMonth, &'a str)>,
    remark: Option<(ReportMonth, &'a str)>,
    returns: Vec<f64>,
    yoy: Vec<f64>,
    mom: Vec<f64>,
}

impl<'a> Member<'a> {
    fn observe(&mut self, row: &'a Observation) {
        let latest = |current: Option<(ReportMonth, &'a str)>, text: Option<&'a str>| match text {
            Some(text) if current.is_none_or(|(period, _)| period <= row.period) => {
                Some((row.period, text))
            }
            _ => current,
        };
        self.name = latest(self.name, row.name.as_deref());
        let remark = row
            .remark
            .as_deref()
            .map(str::trim)
            .filter(|r| !BLANK_REMARKS.contains(r));
        self.remark = latest(self.remark, remark);
    }

    fn count(&mut self, row: &Observation, return_pct: f64) {
        self.returns.push(return_pct);
        self.yoy.extend(row.yoy_pct.filter(|v| v.is_finite()));
        self.mom.extend(row.mom_pct.filter(|v| v.is_finite()));
    }

    fn summarize(self, symbol: &str) -> Option<SymbolSummary> {
        let returns = stats::sorted(self.returns);
        Some(SymbolSummary {
            symbol: symbol.to_string(),
            name: self.name.map(|(_, n)| n.to_string()),
            return_pct: stats::mean(&returns)?,
            mean_yoy: stats::mean(&stats::sorted(self.yoy)),
            mean_mom: stats::mean(&stats::sorted(self.mom)),
            latest_remark: self.remark.map(|(_, r)| r.to_string()),
            reports: returns.len(),
        })
    }
}

/// The companies whose forward return falls into `bin`, best performer first.
///
/// A company's return is the mean of its in-bin forward returns; the growth means
/// cover the same reports.
pub fn drilldown_bin(
    observations: &[Observation],
    scheme: &BinningScheme,
    bin: BinIndex,
    filter: &DrilldownFilter,
) -> Result<Drilldown, AnalyticsError> {
    check_limit(filter)?;
    let drilldown = leaderboard(observations, filter, |row| {
        let ret = row.forward_return_pct?;
        (scheme.assign_bin(ret).ok()? == bin).then_some(ret)
    });
    tracing::debug!(%bin, matched = drilldown.matched, "Bin drill-down complete.");
    Ok(drilldown)
}

/// The companies that hit the growth range exactly `hits` times, with their growth
/// means over `filter.window` and their outcome return.
pub fn drilldown_hit_group(
    observations: &[Observation],
    outcomes: &[SymbolOutcome],
    config: &HitStudyConfig,
    hits: usize,
    filter: &DrilldownFilter,
) -> Result<Drilldown, AnalyticsError> {
    check_limit(filter)?;
    let study = run_hit_study(observations, outcomes, config)?;
    let Some(group) = study.group(hits) else {
        return Err(AnalyticsError::NotEnoughData(format!(
            "no symbol hit the range {hits} times"
        )));
    };

    let members: BTreeSet<&str> = group.symbols.iter().map(String::as_str).collect();
    let returns: HashMap<&str, f64> = outcomes
        .iter()
        .filter(|o| o.return_pct.is_finite())
        .map(|o| (o.symbol.as_str(), o.return_pct))
        .collect();

    Ok(leaderboard(observations, filter, |row| {
        let symbol = row.symbol.as_str();
        if members.contains(symbol) {
            returns.get(symbol).copied()
        } else {
            None
        }
    }))
}

fn check_limit(filter: &DrilldownFilter) -> Result<(), AnalyticsError> {
    if filter.limit == Some(0) {
        return Err(AnalyticsError::InvalidInput(
            "drill-down limit must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// `membership` returns the return a row contributes, or `None` when the row's
/// company is not part of the drill-down.
fn leaderboard<'a>(
    observations: &'a [Observation],
    filter: &DrilldownFilter,
    membership: impl Fn(&Observation) -> Option<f64>,
) -> Drilldown {
    let keyword = filter.keyword.as_deref().unwrap_or_default();
    let mut by_symbol: BTreeMap<&str, Member<'a>> = BTreeMap::new();

    let in_window = observations
        .iter()
        .filter(|o| filter.window.is_none_or(|w| w.contains(o.period)));
    for row in in_window {
        let member = by_symbol.entry(row.symbol.as_str()).or_default();
        member.observe(row);
        if let Some(ret) = membership(row).filter(|r| r.is_finite()) {
            if row.matches_keyword(keyword) {
                member.count(row, ret);
            }
        }
    }

    let mut members: Vec<SymbolSummary> = by_symbol
        .into_iter()
        .filter_map(|(symbol, member)| member.summarize(symbol))
        .collect();
    members.sort_by(|a, b| {
        b.return_pct
            .partial_cmp(&a.return_pct)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    let matched = members.len();
    if let Some(limit) = filter.limit {
        members.truncate(limit);
    }
    Drilldown { members, matched }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(symbol: &str, year: i32, month: u32, yoy: f64, ret: f64) -> Observation {
        Observation::new(
            symbol,
            ReportMonth::new(year, month).unwrap(),
            Some(yoy),
            Some(yoy / 10.0),
            Some(ret),
        )
    }

    fn with_text(mut obs: Observation, name: &str, remark: &str) -> Observation {
        obs.name = Some(name.to_string());
        obs.remark = Some(remark.to_string());
        obs
    }

    #[test]
    fn bin_leaderboard_ranks_by_return() {
        let data = vec![
            row("A", 2024, 1, 10.0, 150.0),
            row("A", 2024, 2, 30.0, 150.0),
            row("B", 2024, 1, 80.0, 190.0),
            row("C", 2024, 1, 50.0, 120.0),
            row("D", 2024, 1, 70.0, 40.0), // bin 0
        ];
        let result = drilldown_bin(
            &data,
            &BinningScheme::default(),
            BinIndex(1),
            &DrilldownFilter::default(),
        )
        .unwrap();

        let order: Vec<&str> = result.members.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
        let a = &result.members[1];
        assert_eq!(a.reports, 2);
        assert_eq!(a.mean_yoy, Some(20.0));
        assert_eq!(a.mean_mom, Some(2.0));
        assert_eq!(result.matched, 3);
    }

    #[test]
    fn keyword_filters_rows_and_remark_stays_latest() {
        let data = vec![
            with_text(row("A", 2024, 1, 10.0, 150.0), "Alpha", "CoWoS orders"),
            with_text(row("A", 2024, 2, 90.0, 150.0), "Alpha", "seasonal"),
            with_text(row("A", 2024, 3, 40.0, 150.0), "Alpha", "-"),
            with_text(row("B", 2024, 1, 70.0, 160.0), "Beta", "housing project"),
        ];
        let filter = DrilldownFilter {
            keyword: Some("cowos".to_string()),
            ..DrilldownFilter::default()
        };
        let result = drilldown_bin(&data, &BinningScheme::default(), BinIndex(1), &filter).unwrap();

        assert_eq!(result.members.len(), 1);
        let a = &result.members[0];
        assert_eq!(a.name.as_deref(), Some("Alpha"));
        assert_eq!(a.reports, 1);
        assert_eq!(a.mean_yoy, Some(10.0));
        // "-" is blank, so February's remark is the latest one.
        assert_eq!(a.latest_remark.as_deref(), Some("seasonal"));
    }

    #[test]
    fn window_and_limit_cut_the_list() {
        let data = vec![
            row("A", 2023, 11, 10.0, 150.0), // outside the window
            row("B", 2023, 12, 20.0, 140.0),
            row("C", 2024, 12, 30.0, 130.0),
            row("D", 2024, 6, 40.0, 110.0),
        ];
        let filter = DrilldownFilter {
            window: Some(StudyWindow::with_prior_december(2024).unwrap()),
            keyword: None,
            limit: Some(2),
        };
        let result = drilldown_bin(&data, &BinningScheme::default(), BinIndex(1), &filter).unwrap();
        let order: Vec<&str> = result.members.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(order, vec!["B", "C"]);
        assert_eq!(result.matched, 3);
    }

    #[test]
    fn zero_limit_is_invalid_input() {
        let filter = DrilldownFilter {
            limit: Some(0),
            ..DrilldownFilter::default()
        };
        assert!(matches!(
            drilldown_bin(&[], &BinningScheme::default(), BinIndex(0), &filter),
            Err(AnalyticsError::InvalidInput(_))
        ));
    }

    #[test]
    fn hit_group_members_use_outcome_returns() {
        let hit = |symbol: &str, month: u32| row(symbol, 2024, month, 150.0, 0.0);
        let data = vec![hit("A", 1), hit("A", 2), hit("B", 1), hit("B", 3), hit("C", 1)];
        let outcome = |symbol: &str, return_pct: f64| SymbolOutcome {
            symbol: symbol.to_string(),
            return_pct,
        };
        let outcomes = vec![outcome("A", 20.0), outcome("B", 80.0), outcome("C", 300.0)];
        let config = HitStudyConfig::default();
        let result =
            drilldown_hit_group(&data, &outcomes, &config, 2, &DrilldownFilter::default()).unwrap();

        let order: Vec<(&str, f64)> = result
            .members
            .iter()
            .map(|m| (m.symbol.as_str(), m.return_pct))
            .collect();
        assert_eq!(order, vec![("B", 80.0), ("A", 20.0)]);
        assert_eq!(result.members[0].mean_yoy, Some(150.0));

        assert!(matches!(
            drilldown_hit_group(&data, &outcomes, &config, 7, &DrilldownFilter::default()),
            Err(AnalyticsError::NotEnoughData(_))
        ));
    }
}
