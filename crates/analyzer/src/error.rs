use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyzerError {
    #[error("Invalid scoring configuration: {0}")]
    InvalidConfig(String),

    #[error("Analytics error: {0}")]
    Analytics(#[from] analytics::AnalyticsError),
}
