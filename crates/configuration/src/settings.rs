use crate::error::ConfigError;
use core_types::{AggregationMethod, CoreError, Metric, StudyWindow};
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub binning: BinningConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    /// Ranking weights. No defaults: scoring is unavailable until the weights
    /// are written down in the config file.
    #[serde(default)]
    pub scoring: Option<ScoringConfig>,
    #[serde(default)]
    pub hit_study: HitStudyConfig,
    #[serde(default)]
    pub event_study: EventStudyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Widths of the return bins, in percentage points.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BinningConfig {
    /// Width of the bins holding negative returns (10 => -10%..0%, -20%..-10%, ...).
    pub negative_width: f64,
    /// Width of the bins holding zero and positive returns (100 => 0%..100%, ...).
    pub positive_width: f64,
    /// Upper limit on the number of rows a dense (gap-filled) bin listing may produce.
    pub max_dense_bins: usize,
}

/// Parameters for grouping observations into return bins.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// The growth metric paired with the returns.
    pub metric: Metric,
    /// How the metric is collapsed per heatmap cell.
    pub method: AggregationMethod,
    /// Fraction of observations removed from each tail (by metric) before the
    /// statistics are computed. Must be in `[0, 0.5)`; 0 disables trimming.
    pub trim_fraction: f64,
    /// A return strictly above this percentage counts as a hit.
    pub hit_threshold_pct: f64,
    /// Restricts the heatmap and bin drill-downs to the reports that can be read
    /// alongside this year's price move: the previous December through December.
    pub study_year: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
}

/// Weights for the composite score. They need not sum to 1.0, only to a positive value.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScoreWeights {
    pub expected_gain: f64,
    pub expected_loss: f64,
    pub hit_probability: f64,
}

/// Parameters for the "how many breakout months" study.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HitStudyConfig {
    pub metric: Metric,
    /// Inclusive lower bound of the breakout range.
    pub low: f64,
    /// Exclusive upper bound of the breakout range.
    pub high: f64,
    pub win_threshold_pct: f64,
    pub double_threshold_pct: f64,
    /// Counts only the 12 reports announced during this year (previous December
    /// through November).
    pub study_year: Option<i32>,
}

/// Parameters for the announcement event study.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventStudyConfig {
    pub metric: Metric,
    /// A breakout is the first period whose metric reaches this value.
    pub threshold: f64,
    /// Moves larger than this (in either direction) count as a reaction.
    pub move_threshold_pct: f64,
    pub windows: Vec<EventWindow>,
    /// Only breakouts in this year's January..December reports are events. The month
    /// before a breakout may still come from the previous December.
    pub study_year: Option<i32>,
    /// Keeps only breakouts whose company name or remark contains this text.
    pub keyword: Option<String>,
}

/// A window of days around an announcement date. Offsets are inclusive.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventWindow {
    pub name: String,
    pub start_offset_days: i64,
    pub end_offset_days: i64,
    /// Multiplier applied to the mean weekly return (e.g. 4 turns a weekly mean into a monthly figure).
    #[serde(default = "default_scale")]
    pub scale: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
}

fn default_scale() -> f64 {
    1.0
}

fn study_window(
    section: &str,
    year: Option<i32>,
    build: fn(i32) -> Result<StudyWindow, CoreError>,
) -> Result<Option<StudyWindow>, ConfigError> {
    year.map(build).transpose().map_err(|e| {
        ConfigError::ValidationError(format!("{section}.study_year is not usable: {e}"))
    })
}

// --- Default Implementations ---
// These allow a user to omit whole sections from their toml.

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            negative_width: 10.0,
            positive_width: 100.0,
            max_dense_bins: 1000,
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            metric: Metric::Yoy,
            method: AggregationMethod::Median,
            trim_fraction: 0.0,
            hit_threshold_pct: 20.0,
            study_year: None,
        }
    }
}

impl Default for HitStudyConfig {
    fn default() -> Self {
        Self {
            metric: Metric::Yoy,
            low: 100.0,
            high: 1000.0,
            win_threshold_pct: 20.0,
            double_threshold_pct: 100.0,
            study_year: None,
        }
    }
}

impl Default for EventStudyConfig {
    fn default() -> Self {
        Self {
            metric: Metric::Yoy,
            threshold: 100.0,
            move_threshold_pct: 5.0,
            windows: EventWindow::defaults(),
            study_year: None,
            keyword: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl EventWindow {
    pub fn new(name: &str, start_offset_days: i64, end_offset_days: i64, scale: f64) -> Self {
        Self {
            name: name.to_string(),
            start_offset_days,
            end_offset_days,
            scale,
        }
    }

    /// Month before, week before, announcement week, week after and month after.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("pre_month", -38, -9, 4.0),
            Self::new("pre_week", -9, -3, 1.0),
            Self::new("announce_week", -3, 4, 1.0),
            Self::new("after_week", 4, 11, 1.0),
            Self::new("after_month", 11, 30, 1.0),
        ]
    }
}

impl Config {
    /// Checks every section for values the analysis cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.binning.validate()?;
        self.aggregation.validate()?;
        if let Some(scoring) = &self.scoring {
            scoring.weights.validate()?;
        }
        self.hit_study.validate()?;
        self.event_study.validate()?;
        Ok(())
    }
}

impl BinningConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, width) in [
            ("negative_width", self.negative_width),
            ("positive_width", self.positive_width),
        ] {
            if !width.is_finite() || width <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "binning.{name} must be a positive number, got {width}"
                )));
            }
        }
        if self.max_dense_bins == 0 {
            return Err(ConfigError::ValidationError(
                "binning.max_dense_bins must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl AggregationConfig {
    /// Reports from the previous December through December of `study_year`.
    pub fn window(&self) -> Result<Option<StudyWindow>, ConfigError> {
        study_window("aggregation", self.study_year, StudyWindow::with_prior_december)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..0.5).contains(&self.trim_fraction) {
            return Err(ConfigError::ValidationError(format!(
                "aggregation.trim_fraction must be in [0, 0.5), got {}",
                self.trim_fraction
            )));
        }
        if !self.hit_threshold_pct.is_finite() {
            return Err(ConfigError::ValidationError(
                "aggregation.hit_threshold_pct must be finite".to_string(),
            ));
        }
        self.window()?;
        Ok(())
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.expected_gain + self.expected_loss + self.hit_probability
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, weight) in [
            ("expected_gain", self.expected_gain),
            ("expected_loss", self.expected_loss),
            ("hit_probability", self.hit_probability),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "scoring.weights.{name} must be a non-negative number, got {weight}"
                )));
            }
        }
        let sum = self.sum();
        if !sum.is_finite() || sum <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "scoring.weights must sum to a positive finite value, got {sum}"
            )));
        }
        Ok(())
    }
}

impl HitStudyConfig {
    /// The 12 reports announced during `study_year`.
    pub fn window(&self) -> Result<Option<StudyWindow>, ConfigError> {
        study_window("hit_study", self.study_year, StudyWindow::announced_in)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.low.is_finite() || !self.high.is_finite() || self.low >= self.high {
            return Err(ConfigError::ValidationError(format!(
                "hit_study range [{}, {}) is empty or not finite",
                self.low, self.high
            )));
        }
        if !self.win_threshold_pct.is_finite() || !self.double_threshold_pct.is_finite() {
            return Err(ConfigError::ValidationError(
                "hit_study thresholds must be finite".to_string(),
            ));
        }
        self.window()?;
        Ok(())
    }
}

impl EventStudyConfig {
    /// January through December of `study_year`.
    pub fn window(&self) -> Result<Option<StudyWindow>, ConfigError> {
        study_window("event_study", self.study_year, StudyWindow::calendar_year)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() {
            return Err(ConfigError::ValidationError(
                "event_study.threshold must be finite".to_string(),
            ));
        }
        if !self.move_threshold_pct.is_finite() || self.move_threshold_pct < 0.0 {
            return Err(ConfigError::ValidationError(
                "event_study.move_threshold_pct must be a non-negative number".to_string(),
            ));
        }
        if self.windows.is_empty() {
            return Err(ConfigError::ValidationError(
                "event_study.windows must not be empty".to_string(),
            ));
        }
        for window in &self.windows {
            if window.start_offset_days > window.end_offset_days {
                return Err(ConfigError::ValidationError(format!(
                    "event window '{}' starts after it ends",
                    window.name
                )));
            }
            if !window.scale.is_finite() {
                return Err(ConfigError::ValidationError(format!(
                    "event window '{}' has a non-finite scale",
                    window.name
                )));
            }
        }
        self.window()?;
        Ok(())
    }
}
