pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{AggregationMethod, Metric};
pub use error::CoreError;
pub use structs::{BinIndex, Observation, ReportMonth, StudyWindow, SymbolOutcome, WeeklyReturn};
