//! # RevenueLab Analytics Engine
//!
//! Groups monthly revenue observations by the stock's forward return and measures how
//! the growth metric is distributed inside each return bin. Also hosts the two side
//! studies built on the same statistics: the hit-count study and the announcement
//! event study.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** No I/O. Inputs are slices of `core-types` records and config
//!   sections from `configuration`; outputs are plain serializable structs.
//! - **Order Independence:** Every statistic is computed over sorted values, so the same
//!   multiset of observations always produces the same result.
//! - **Missing, Not Zero:** A bin without data reports `None`, never `0`.
//!
//! ## Public API
//!
//! - `Aggregator`: Bins observations and produces an `Aggregation` of `BinStatistic`s.
//! - `BinningScheme` / `assign_bin`: The return-to-bin mapping.
//! - `build_heatmap`, `run_hit_study`, `run_event_study`: The side studies.
//! - `drilldown_bin`, `drilldown_hit_group`: The companies behind a bin or hit group.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

pub mod binning;
pub mod drilldown;
pub mod engine;
pub mod error;
pub mod events;
pub mod heatmap;
pub mod hit_study;
pub mod report;
pub mod stats;

pub use binning::{BinningScheme, assign_bin};
pub use drilldown::{
    Drilldown, DrilldownFilter, SymbolSummary, drilldown_bin, drilldown_hit_group,
};
pub use engine::Aggregator;
pub use error::AnalyticsError;
pub use events::{
    BreakoutEvent, EventReturns, EventStudyReport, WindowSummary, detect_first_breakouts,
    run_event_study, summarize, window_returns,
};
pub use heatmap::{Heatmap, HeatmapCell, build_heatmap};
pub use hit_study::{HitGroup, HitStudy, run_hit_study};
pub use report::{Aggregation, BinStatistic, MetricSummary, OutcomeProfile};
pub use stats::DistributionBuckets;
