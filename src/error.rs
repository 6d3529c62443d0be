//! Error types for the campus roaming pipeline.
//!
//! Only contract violations surface as errors: malformed loader records and
//! invalid configuration. Data-quality gaps (missing metrics, unresolved
//! buildings, empty graphs, fuzzy misses) are expressed as omissions or
//! `None` values by the stages themselves.

use thiserror::Error;

/// Errors produced by the pipeline.
#[derive(Debug, Error)]
pub enum CampusError {
    /// A configuration value is out of its accepted range.
    #[error("invalid config `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    /// A loader record is missing a required field or has the wrong shape.
    #[error("malformed record #{index}: field `{field}` {reason}")]
    MalformedRecord {
        index: usize,
        field: &'static str,
        reason: String,
    },

    /// A snapshot timestamp could not be interpreted.
    #[error("invalid timestamp {value:?}")]
    InvalidTimestamp { value: String },

    /// The input document is not valid JSON for the expected shape.
    #[cfg(feature = "json")]
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl CampusError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        CampusError::InvalidConfig { field, reason: reason.into() }
    }

    #[cfg(feature = "json")]
    pub(crate) fn malformed(index: usize, field: &'static str, reason: impl Into<String>) -> Self {
        CampusError::MalformedRecord { index, field, reason: reason.into() }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CampusError>;
