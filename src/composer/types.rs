//! Data types used by the series composer.

use anyhow::{Result, bail, ensure};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use crate::stats::AggregateSeries;

/// A named summary curve that can be overlaid on a dv/v panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Curve {
    Mean,
    Median,
    TrimmedMean,
    WeightedMean,
    P5,
    P95,
}

impl Curve {
    /// Column name in a [`SummaryTable`], also used in legend labels.
    pub fn column(&self) -> &'static str {
        match self {
            Curve::Mean => "mean",
            Curve::Median => "50%",
            Curve::TrimmedMean => "trimmed_mean",
            Curve::WeightedMean => "weighted_mean",
            Curve::P5 => "5%",
            Curve::P95 => "95%",
        }
    }

    /// Central estimators first, then the percentile band.
    pub fn all() -> [Curve; 6] {
        [
            Curve::Mean,
            Curve::Median,
            Curve::TrimmedMean,
            Curve::WeightedMean,
            Curve::P5,
            Curve::P95,
        ]
    }
}

impl FromStr for Curve {
    type Err = anyhow::Error;

    /// Accepts column names and the long percentile names.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Curve::Mean),
            "50%" | "50th-percentile" | "median" => Ok(Curve::Median),
            "trimmed_mean" => Ok(Curve::TrimmedMean),
            "weighted_mean" => Ok(Curve::WeightedMean),
            "5%" | "5th-percentile" => Ok(Curve::P5),
            "95%" | "95th-percentile" => Ok(Curve::P95),
            other => bail!("unknown curve '{}'", other),
        }
    }
}

/// A date-indexed table of precomputed dv/v summary columns.
///
/// Every column has exactly one value per index entry; NaN marks a gap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTable {
    index: Vec<NaiveDateTime>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl SummaryTable {
    pub fn new(index: Vec<NaiveDateTime>) -> Self {
        Self {
            index,
            columns: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) a column. Fails if its length differs from the index.
    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> Result<Self> {
        ensure!(
            values.len() == self.index.len(),
            "column '{}' has {} values for {} dates",
            name,
            values.len(),
            self.index.len()
        );
        self.columns.insert(name.to_string(), values);
        Ok(self)
    }

    /// Builds a table with `weighted_mean` and `weighted_std` columns.
    pub fn from_aggregates(series: &AggregateSeries) -> Self {
        let index = series.keys().copied().collect();
        let mut columns = BTreeMap::new();
        columns.insert(
            "weighted_mean".to_string(),
            series.values().map(|a| a.weighted_mean).collect(),
        );
        columns.insert(
            "weighted_std".to_string(),
            series.values().map(|a| a.weighted_std).collect(),
        );
        Self { index, columns }
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// First and last date of the index, in index order.
    pub fn span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((*self.index.first()?, *self.index.last()?))
    }
}

/// Low/high cutoff frequencies (Hz) of a filter band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterBounds {
    pub low: f64,
    pub high: f64,
}

/// Identifies one summary table in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantSelector {
    pub components: String,
    pub filter_id: u32,
    pub mov_stack: u32,
}

/// What to compose: windows, component pairs, filter and overlaid curves.
#[derive(Debug, Clone)]
pub struct CompositionRequest {
    pub mov_stacks: Vec<u32>,
    pub components: Vec<String>,
    pub filter_id: u32,
    pub curves: Vec<Curve>,
    pub dtt_name: String,
}

impl CompositionRequest {
    /// A request overlaying every curve, with the default `M` measurement name.
    pub fn new(mov_stacks: Vec<u32>, components: Vec<String>, filter_id: u32) -> Self {
        Self {
            mov_stacks,
            components,
            filter_id,
            curves: Curve::all().to_vec(),
            dtt_name: "M".to_string(),
        }
    }

    pub fn with_curves(mut self, curves: Vec<Curve>) -> Self {
        self.curves = curves;
        self
    }
}

/// Bounds on the concurrent summary-table fetches.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: Duration::from_secs(30),
        }
    }
}

/// One overlay line: a single curve for one component pair, in dv/v percent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub component: String,
    pub curve: Curve,
    pub label: String,
    pub dates: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

/// All lines for one moving-window variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSeries {
    pub index: usize,
    pub mov_stack: u32,
    pub title: String,
    pub lines: Vec<Line>,
    /// Shared horizontal range; `None` lets the panel fit its own data.
    pub x_range: Option<(NaiveDateTime, NaiveDateTime)>,
}

/// The complete set of panels handed to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composition {
    pub title: String,
    pub filter_id: u32,
    pub bounds: FilterBounds,
    pub panels: Vec<PanelSeries>,
}
