//! Error-weighted aggregation of per-pair dv/v observations.
//!
//! Observations are grouped by date and collapsed into one weighted mean and
//! one weighted standard deviation per group, each observation weighted by
//! the inverse of its reported error.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::AggregationError;

/// Errors of exactly zero are replaced by this floor before weighting.
///
/// This is a numerical-stability policy: it keeps the weight finite and stops
/// a single zero-error measurement from dominating its group.
pub const ERROR_FLOOR: f64 = 1e-6;

/// A single measurement for one station pair on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDateTime,
    pub pair: String,
    pub fields: BTreeMap<String, f64>,
}

impl Observation {
    pub fn new(date: NaiveDateTime, pair: &str) -> Self {
        Self {
            date,
            pair: pair.to_string(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a measurement column (e.g. `M` or `EM`).
    pub fn with_field(mut self, name: &str, value: f64) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }
}

/// What to do with a group that has fewer than two usable observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InsufficientPolicy {
    /// Fail the aggregation with [`AggregationError::InsufficientSamples`].
    #[default]
    Reject,
    /// Keep the group, with `weighted_std` set to NaN.
    NotANumber,
}

/// Weighted summary of one date group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aggregate {
    pub weighted_mean: f64,
    pub weighted_std: f64,
}

/// Date-ordered aggregates, one per group.
pub type AggregateSeries = BTreeMap<NaiveDateTime, Aggregate>;

/// Aggregates `observations` per date using `value_field` as the measurement
/// and `error_field` as its uncertainty.
///
/// # Errors
///
/// - [`AggregationError::EmptyInput`] for an empty slice.
/// - [`AggregationError::MissingField`] if a row lacks either field.
/// - [`AggregationError::NonFinite`] for a NaN or infinite value, or a NaN
///   uncertainty.
/// - [`AggregationError::NegativeError`] for a negative uncertainty.
/// - [`AggregationError::InsufficientSamples`] for a group with fewer than two
///   usable observations, unless `policy` is [`InsufficientPolicy::NotANumber`].
pub fn aggregate(
    observations: &[Observation],
    value_field: &str,
    error_field: &str,
    policy: InsufficientPolicy,
) -> Result<AggregateSeries, AggregationError> {
    if observations.is_empty() {
        return Err(AggregationError::EmptyInput);
    }

    let mut groups: BTreeMap<NaiveDateTime, Vec<(f64, f64)>> = BTreeMap::new();

    for (index, obs) in observations.iter().enumerate() {
        let missing = |field: &str| AggregationError::MissingField {
            field: field.to_string(),
            index,
        };
        let value = obs.field(value_field).ok_or_else(|| missing(value_field))?;
        let error = obs.field(error_field).ok_or_else(|| missing(error_field))?;

        // An infinite error is a valid zero-weight observation; NaN is not.
        let invalid = |field: &str, value: f64| AggregationError::NonFinite {
            group: obs.date,
            field: field.to_string(),
            value,
            index,
        };
        if !value.is_finite() {
            return Err(invalid(value_field, value));
        }
        if error.is_nan() {
            return Err(invalid(error_field, error));
        }
        if error < 0.0 {
            return Err(AggregationError::NegativeError {
                group: obs.date,
                error,
            });
        }

        groups.entry(obs.date).or_default().push((value, error));
    }

    let mut series = AggregateSeries::new();

    for (date, mut samples) in groups {
        // Fixed summation order so the result does not depend on input order.
        samples.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mean = weighted_mean(&samples);
        let std = match weighted_std(&samples, mean) {
            Some(std) => std,
            None if policy == InsufficientPolicy::NotANumber => f64::NAN,
            None => {
                return Err(AggregationError::InsufficientSamples {
                    group: date,
                    count: effective_count(&samples),
                });
            }
        };

        series.insert(
            date,
            Aggregate {
                weighted_mean: mean,
                weighted_std: std,
            },
        );
    }

    Ok(series)
}

fn weight(error: f64) -> f64 {
    let error = if error == 0.0 { ERROR_FLOOR } else { error };
    1.0 / error
}

/// Number of samples carrying a nonzero weight.
fn effective_count(samples: &[(f64, f64)]) -> usize {
    samples.iter().filter(|(_, e)| weight(*e) != 0.0).count()
}

/// `sum(value * w) / sum(w)` with `w = 1 / error`.
pub fn weighted_mean(samples: &[(f64, f64)]) -> f64 {
    let (num, den) = samples.iter().fold((0.0, 0.0), |(num, den), &(v, e)| {
        let w = weight(e);
        (num + v * w, den + w)
    });
    num / den
}

/// Weighted sample standard deviation around `mean`, bias-corrected with the
/// count of nonzero weights `N`:
///
/// `sqrt(sum(w * (v - mean)^2) / ((N - 1) * sum(w) / N))`
///
/// Returns `None` when `N <= 1`.
pub fn weighted_std(samples: &[(f64, f64)], mean: f64) -> Option<f64> {
    let n = effective_count(samples);
    if n <= 1 {
        return None;
    }
    let n = n as f64;

    let (spread, weight_sum) = samples.iter().fold((0.0, 0.0), |(s, ws), &(v, e)| {
        let w = weight(e);
        (s + w * (v - mean).powi(2), ws + w)
    });

    Some((spread / ((n - 1.0) * weight_sum / n)).sqrt())
}
