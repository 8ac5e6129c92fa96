//! Error types for workpulse-core

use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// The period an analysis was running for when it failed.
///
/// Every error raised while analysing activity names its scope so callers
/// can report "insufficient data for <period>" instead of a generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisScope {
    /// A single calendar day
    Day(NaiveDate),
    /// A week, identified by its Monday
    Week(NaiveDate),
    /// An inclusive date range
    Range(NaiveDate, NaiveDate),
}

impl fmt::Display for AnalysisScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisScope::Day(date) => write!(f, "day {}", date),
            AnalysisScope::Week(start) => write!(f, "week of {}", start),
            AnalysisScope::Range(start, end) => write!(f, "{} to {}", start, end),
        }
    }
}

/// Main error type for the workpulse-core library
#[derive(Error, Debug)]
pub enum Error {
    /// The activity source failed to answer a query
    #[error("activity source error for {scope}: {message}")]
    Source {
        scope: AnalysisScope,
        message: String,
    },

    /// No usable activity exists for the scope
    #[error("insufficient data for {0}")]
    InsufficientData(AnalysisScope),

    /// Range with end before start
    #[error("invalid range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A background aggregation task failed to complete
    #[error("aggregation task failed: {0}")]
    Task(String),
}

impl Error {
    /// Build a source error attributed to `scope`.
    pub fn source(scope: AnalysisScope, message: impl Into<String>) -> Self {
        Error::Source {
            scope,
            message: message.into(),
        }
    }

    /// The scope this error is attributed to, if any.
    pub fn scope(&self) -> Option<AnalysisScope> {
        match self {
            Error::Source { scope, .. } => Some(*scope),
            Error::InsufficientData(scope) => Some(*scope),
            Error::InvalidRange { start, end } => Some(AnalysisScope::Range(*start, *end)),
            _ => None,
        }
    }
}

/// Result type alias for workpulse-core
pub type Result<T> = std::result::Result<T, Error>;
