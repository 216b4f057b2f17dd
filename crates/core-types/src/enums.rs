use crate::structs::Observation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The numeric attribute of an `Observation` that a study looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Revenue year-over-year growth, in percent.
    Yoy,
    /// Revenue month-over-month growth, in percent.
    Mom,
    /// Price return over the holding window that follows the period, in percent.
    ForwardReturn,
}

impl Metric {
    /// Reads this metric from an observation. `None` means the value was not reported.
    pub fn value(&self, observation: &Observation) -> Option<f64> {
        match self {
            Metric::Yoy => observation.yoy_pct,
            Metric::Mom => observation.mom_pct,
            Metric::ForwardReturn => observation.forward_return_pct,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Yoy => "YoY %",
            Metric::Mom => "MoM %",
            Metric::ForwardReturn => "Return %",
        };
        f.write_str(name)
    }
}

/// How a group of metric values is collapsed into a single number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    /// 50th continuous percentile. Robust against extreme values.
    #[default]
    Median,
    /// Arithmetic mean.
    Mean,
}
