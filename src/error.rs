//! Hard error kinds surfaced to callers.
//!
//! Absent data during composition is not an error; see [`crate::composer`].

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AggregationError {
    #[error("no observations to aggregate")]
    EmptyInput,

    #[error("group {group} has {count} usable observation(s), need at least 2 for a weighted std")]
    InsufficientSamples { group: NaiveDateTime, count: usize },

    #[error("observation #{index} has no '{field}' field")]
    MissingField { field: String, index: usize },

    #[error("group {group} has a negative error ({error})")]
    NegativeError { group: NaiveDateTime, error: f64 },

    #[error("observation #{index} in group {group} has an invalid '{field}' ({value})")]
    NonFinite {
        group: NaiveDateTime,
        field: String,
        value: f64,
        index: usize,
    },
}

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("no moving-window variants requested")]
    NoVariantsRequested,

    #[error("summary fetch task failed: {0}")]
    FetchTaskFailed(#[from] tokio::task::JoinError),
}
