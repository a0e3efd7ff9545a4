//! Error types for the probelens I/O boundary.

use thiserror::Error;

/// Errors that can occur while reading or writing probe tables.
///
/// Malformed *rows* are never errors - they are skipped and counted by the
/// readers. A malformed *file* (unreadable, or missing a mandatory column)
/// is.
#[derive(Debug, Error)]
pub enum TableError {
    /// Underlying filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV-level failure (broken quoting, unreadable header, ...)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The header row lacks a column the table contract requires
    #[error("missing required column '{0}'")]
    MissingColumn(String),
}

impl TableError {
    /// Creates a missing-column error.
    pub fn missing_column(name: impl Into<String>) -> Self {
        Self::MissingColumn(name.into())
    }
}
