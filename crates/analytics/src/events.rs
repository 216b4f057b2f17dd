//! Announcement event study.
//!
//! A breakout is the first month a symbol's growth metric reaches a threshold. Its
//! event date is the day the revenue figure is published. Weekly returns in windows
//! around that date show whether the move came before the news (informed buying),
//! on the news, or after it (chasing).

use crate::error::AnalyticsError;
use crate::stats::{self, DistributionBuckets};
use chrono::{Duration, NaiveDate};
use configuration::{EventStudyConfig, EventWindow};
use core_types::{Metric, Observation, ReportMonth, StudyWindow, WeeklyReturn};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutEvent {
    pub symbol: String,
    pub name: Option<String>,
    pub period: ReportMonth,
    /// The metric value that crossed the threshold.
    pub value: f64,
    pub event_date: NaiveDate,
}

/// Scaled mean weekly return for each configured window; `None` when no week fell inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventReturns {
    pub event: BreakoutEvent,
    pub returns: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub window: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Share of events that moved up by more than the move threshold, in percent.
    pub rise_rate_pct: Option<f64>,
    /// Share of events that moved down by more than the move threshold, in percent.
    pub fall_rate_pct: Option<f64>,
    pub right_tail_concentration: Option<f64>,
    pub top_decile_intensity: Option<f64>,
    pub distribution: DistributionBuckets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStudyReport {
    pub events: Vec<EventReturns>,
    pub summaries: Vec<WindowSummary>,
}

/// Finds, per symbol, each month where the metric reaches `threshold` while the
/// previous row for that symbol was below it or had no value.
///
/// With a `window`, only months inside it become events, and the previous row is looked
/// up among the window plus the month before it. With a `keyword`, only breakout rows
/// whose company name or remark contain it are kept.
///
/// Rows are ordered by period within a symbol; the result is ordered by symbol, then period.
pub fn detect_first_breakouts(
    observations: &[Observation],
    metric: Metric,
    threshold: f64,
    window: Option<StudyWindow>,
    keyword: Option<&str>,
) -> Vec<BreakoutEvent> {
    let history = window.map(|w| w.with_lead_month().unwrap_or(w));
    let by_symbol = observations
        .iter()
        .filter(|o| history.is_none_or(|h| h.contains(o.period)))
        .into_group_map_by(|o| o.symbol.as_str());

    let mut events = Vec::new();
    for (_, mut rows) in by_symbol.into_iter().sorted_by(|a, b| a.0.cmp(b.0)) {
        rows.sort_by_key(|o| o.period);

        let mut previous: Option<f64> = None;
        for row in rows {
            let value = metric.value(row).filter(|v| v.is_finite());
            if let Some(v) = value {
                let first_crossing = previous.is_none_or(|p| p < threshold);
                let selected = window.is_none_or(|w| w.contains(row.period))
                    && keyword.is_none_or(|k| row.matches_keyword(k));
                if v >= threshold && first_crossing && selected {
                    if let Some(event_date) = row.effective_announcement_date() {
                        events.push(BreakoutEvent {
                            symbol: row.symbol.clone(),
                            name: row.name.clone(),
                            period: row.period,
                            value: v,
                            event_date,
                        });
                    }
                }
            }
            previous = value;
        }
    }

    tracing::debug!(events = events.len(), threshold, "Breakout detection complete.");
    events
}

/// Averages each event's weekly returns inside every window and applies the window scale.
pub fn window_returns(
    events: &[BreakoutEvent],
    weekly: &[WeeklyReturn],
    windows: &[EventWindow],
) -> Vec<EventReturns> {
    let mut by_symbol: HashMap<&str, Vec<&WeeklyReturn>> = HashMap::new();
    for week in weekly.iter().filter(|w| w.return_pct.is_finite()) {
        by_symbol.entry(week.symbol.as_str()).or_default().push(week);
    }
    for weeks in by_symbol.values_mut() {
        weeks.sort_by(|a, b| a.date.cmp(&b.date).then(a.return_pct.total_cmp(&b.return_pct)));
    }

    events
        .iter()
        .map(|event| {
            let weeks = by_symbol
                .get(event.symbol.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();
            let returns = windows
                .iter()
                .map(|window| window_mean(event.event_date, weeks, window))
                .collect();
            EventReturns {
                event: event.clone(),
                returns,
            }
        })
        .collect()
}

fn window_mean(
    event_date: NaiveDate,
    weeks: &[&WeeklyReturn],
    window: &EventWindow,
) -> Option<f64> {
    let start = event_date.checked_add_signed(Duration::days(window.start_offset_days))?;
    let end = event_date.checked_add_signed(Duration::days(window.end_offset_days))?;
    let inside: Vec<f64> = weeks
        .iter()
        .filter(|w| start <= w.date && w.date <= end)
        .map(|w| w.return_pct)
        .collect();
    stats::mean(&inside).map(|m| m * window.scale)
}

/// Per-window distribution of the event returns.
pub fn summarize(
    returns: &[EventReturns],
    windows: &[EventWindow],
    move_threshold_pct: f64,
) -> Vec<WindowSummary> {
    windows
        .iter()
        .enumerate()
        .map(|(i, window)| {
            let values = stats::sorted(
                returns
                    .iter()
                    .filter_map(|r| r.returns.get(i).copied().flatten()),
            );
            let n = values.len();
            let rate = |count: usize| (n > 0).then(|| count as f64 * 100.0 / n as f64);
            let rises = n - values.partition_point(|v| *v <= move_threshold_pct);
            let falls = values.partition_point(|v| *v < -move_threshold_pct);

            WindowSummary {
                window: window.name.clone(),
                count: n,
                mean: stats::mean(&values),
                median: stats::median(&values),
                rise_rate_pct: rate(rises),
                fall_rate_pct: rate(falls),
                right_tail_concentration: stats::right_tail_concentration(&values),
                top_decile_intensity: stats::top_decile_intensity(&values),
                distribution: DistributionBuckets::from_values(&values),
            }
        })
        .collect()
}

/// Runs detection, window measurement and summary with one configuration.
pub fn run_event_study(
    observations: &[Observation],
    weekly: &[WeeklyReturn],
    config: &EventStudyConfig,
) -> Result<EventStudyReport, AnalyticsError> {
    if !config.threshold.is_finite() {
        return Err(AnalyticsError::InvalidConfig(
            "event threshold must be finite".to_string(),
        ));
    }
    if !config.move_threshold_pct.is_finite() || config.move_threshold_pct < 0.0 {
        return Err(AnalyticsError::InvalidConfig(
            "move threshold must be a non-negative number".to_string(),
        ));
    }
    if config.windows.is_empty() {
        return Err(AnalyticsError::InvalidConfig(
            "at least one event window is required".to_string(),
        ));
    }

    let window = config
        .window()
        .map_err(|e| AnalyticsError::InvalidConfig(e.to_string()))?;

    let breakouts = detect_first_breakouts(
        observations,
        config.metric,
        config.threshold,
        window,
        config.keyword.as_deref(),
    );
    if breakouts.is_empty() {
        return Err(AnalyticsError::NotEnoughData(format!(
            "no {} breakout at or above {}",
            config.metric, config.threshold
        )));
    }
    let events = window_returns(&breakouts, weekly, &config.windows);
    let summaries = summarize(&events, &config.windows, config.move_threshold_pct);

    Ok(EventStudyReport { events, summaries })
}
