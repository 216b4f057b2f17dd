use crate::error::CoreError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Offset between the ROC (Minguo) calendar used in revenue filings and the Gregorian year.
const ROC_YEAR_OFFSET: i32 = 1911;

/// Monthly revenue reports are published by the 10th of the following month.
const ANNOUNCEMENT_DAY: u32 = 10;

/// A reporting period: one calendar month.
///
/// Accepts `YYYY_MM`, `YYYY-MM`, and the ROC form `YYY_MM` found in the revenue
/// filings (e.g. `113_12` is December 2024). Always serializes as `YYYY_MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportMonth {
    year: i32,
    month: u32,
}

impl ReportMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, CoreError> {
        if !(1..=12).contains(&month) {
            return Err(CoreError::InvalidInput(
                "month".to_string(),
                format!("{month} is not in 1..=12"),
            ));
        }
        // Leave room for `next()` so the announcement date is always representable.
        if !(1..=9998).contains(&year) {
            return Err(CoreError::InvalidInput(
                "year".to_string(),
                format!("{year} is out of the supported range"),
            ));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The month that follows this one.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// The month before this one. Fails below the supported year range.
    pub fn previous(&self) -> Result<Self, CoreError> {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    /// The day the revenue figures for this month become public: the 10th of the next month.
    pub fn announcement_date(&self) -> Option<NaiveDate> {
        let next = self.next();
        NaiveDate::from_ymd_opt(next.year, next.month, ANNOUNCEMENT_DAY)
    }
}

impl fmt::Display for ReportMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}_{:02}", self.year, self.month)
    }
}

impl FromStr for ReportMonth {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidInput("report month".to_string(), s.to_string());

        let (year_part, month_part) = s.trim().split_once(['_', '-']).ok_or_else(invalid)?;
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(year_part) || !digits(month_part) {
            return Err(invalid());
        }
        let year: i32 = year_part.parse().map_err(|_| invalid())?;
        let month: u32 = month_part.parse().map_err(|_| invalid())?;

        let year = match year_part.len() {
            3 => year + ROC_YEAR_OFFSET,
            4 => year,
            _ => return Err(invalid()),
        };
        Self::new(year, month)
    }
}

/// An inclusive range of reporting months, used to restrict a study to one year's reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudyWindow {
    first: ReportMonth,
    last: ReportMonth,
}

impl StudyWindow {
    pub fn new(first: ReportMonth, last: ReportMonth) -> Result<Self, CoreError> {
        if first > last {
            return Err(CoreError::InvalidInput(
                "study window".to_string(),
                format!("{first} is after {last}"),
            ));
        }
        Ok(Self { first, last })
    }

    /// The previous December through December of `year`: every report that can be
    /// read alongside the year's price move (13 months).
    pub fn with_prior_december(year: i32) -> Result<Self, CoreError> {
        Self::calendar_year(year)?.with_lead_month()
    }

    /// The previous December through November of `year`: the 12 reports that are
    /// published during the year itself (January 10th to December 10th).
    pub fn announced_in(year: i32) -> Result<Self, CoreError> {
        Self::new(ReportMonth::new(year - 1, 12)?, ReportMonth::new(year, 11)?)
    }

    /// January through December of `year`.
    pub fn calendar_year(year: i32) -> Result<Self, CoreError> {
        Self::new(ReportMonth::new(year, 1)?, ReportMonth::new(year, 12)?)
    }

    /// The same window starting one month earlier.
    pub fn with_lead_month(&self) -> Result<Self, CoreError> {
        Self::new(self.first.previous()?, self.last)
    }

    pub fn first(&self) -> ReportMonth {
        self.first
    }

    pub fn last(&self) -> ReportMonth {
        self.last
    }

    pub fn contains(&self, month: ReportMonth) -> bool {
        self.first <= month && month <= self.last
    }
}

impl fmt::Display for StudyWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ {}", self.first, self.last)
    }
}

impl TryFrom<String> for ReportMonth {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReportMonth> for String {
    fn from(value: ReportMonth) -> Self {
        value.to_string()
    }
}

/// One row of the research dataset: a security's revenue growth for a period,
/// paired with the price return that followed it.
///
/// Numeric fields are optional because the upstream filings are incomplete;
/// records with missing values are rejected (and counted) by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub symbol: String,
    /// Company name as printed in the filing.
    #[serde(default)]
    pub name: Option<String>,
    pub period: ReportMonth,
    #[serde(default)]
    pub yoy_pct: Option<f64>,
    #[serde(default)]
    pub mom_pct: Option<f64>,
    #[serde(default)]
    pub forward_return_pct: Option<f64>,
    #[serde(default)]
    pub announcement_date: Option<NaiveDate>,
    /// Free-text explanation the company filed with the figures.
    #[serde(default)]
    pub remark: Option<String>,
}

impl Observation {
    pub fn new(
        symbol: impl Into<String>,
        period: ReportMonth,
        yoy_pct: Option<f64>,
        mom_pct: Option<f64>,
        forward_return_pct: Option<f64>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            period,
            yoy_pct,
            mom_pct,
            forward_return_pct,
            announcement_date: None,
            remark: None,
        }
    }

    /// Case-insensitive match of `keyword` against the company name or the remark.
    /// An empty keyword matches every row.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return true;
        }
        [self.name.as_deref(), self.remark.as_deref()]
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(&keyword))
    }

    /// The announcement date, falling back to the regulatory deadline for the period.
    pub fn effective_announcement_date(&self) -> Option<NaiveDate> {
        self.announcement_date.or_else(|| self.period.announcement_date())
    }
}

/// Index of a return bin. Negative indices hold negative returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinIndex(pub i64);

impl fmt::Display for BinIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The realised return of a security over a study horizon (e.g. a calendar year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub return_pct: f64,
}

/// Week-over-week close-to-close return, dated by the week's bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReturn {
    pub symbol: String,
    pub date: NaiveDate,
    pub return_pct: f64,
}
