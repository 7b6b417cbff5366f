//! Output formatting and persistence for aggregated dv/v series.
//!
//! Supports pretty-printing, JSON serialization, and writing a summary table
//! CSV that [`crate::store::CsvStore`] can read back.

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use crate::composer::types::SummaryTable;
use crate::parser::DATE_FORMAT;
use crate::stats::AggregateSeries;

#[derive(Serialize)]
struct AggregateRecord {
    date: String,
    weighted_mean: f64,
    weighted_std: f64,
}

fn records(series: &AggregateSeries) -> Vec<AggregateRecord> {
    series
        .iter()
        .map(|(date, agg)| AggregateRecord {
            date: date.format(DATE_FORMAT).to_string(),
            weighted_mean: agg.weighted_mean,
            weighted_std: agg.weighted_std,
        })
        .collect()
}

/// Logs aggregates using Rust's debug pretty-print format.
pub fn print_pretty(series: &AggregateSeries) {
    debug!("{:#?}", series);
}

/// Logs aggregates as pretty-printed JSON.
pub fn print_json(series: &AggregateSeries) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(&records(series))?);
    Ok(())
}

/// Writes `table` as CSV with a leading `date` column, replacing `path`.
///
/// NaN values are written as empty cells.
pub fn write_summary_table(path: &Path, table: &SummaryTable) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    debug!(path = %path.display(), rows = table.index().len(), "Writing summary table");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().from_writer(file);

    let names: Vec<&str> = table.column_names().collect();
    let mut header = vec!["date"];
    header.extend(&names);
    writer.write_record(&header)?;

    for (row, date) in table.index().iter().enumerate() {
        let mut record = vec![date.format(DATE_FORMAT).to_string()];
        for name in &names {
            let value = table.column(name).map_or(f64::NAN, |c| c[row]);
            record.push(if value.is_nan() {
                String::new()
            } else {
                value.to_string()
            });
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read_summary_table;
    use crate::stats::Aggregate;
    use chrono::NaiveDate;
    use std::env;
    use std::fs;

    fn sample_series() -> AggregateSeries {
        let mut series = AggregateSeries::new();
        for (d, m, s) in [(1, 0.013_333_333_333_333_334, 0.004), (2, -0.002, f64::NAN)] {
            let date = NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            series.insert(
                date,
                Aggregate {
                    weighted_mean: m,
                    weighted_std: s,
                },
            );
        }
        series
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&sample_series());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&sample_series()).unwrap();
    }

    #[test]
    fn test_write_summary_table_reads_back_exactly() {
        let path = env::temp_dir().join("dvv_curve_test_summary.csv");
        let _ = fs::remove_file(&path);

        let series = sample_series();
        let table = SummaryTable::from_aggregates(&series);
        write_summary_table(&path, &table).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("date,weighted_mean,weighted_std\n"));

        let back = read_summary_table(File::open(&path).unwrap()).unwrap();
        assert_eq!(back.index(), table.index());
        assert_eq!(back.column("weighted_mean"), table.column("weighted_mean"));
        assert_eq!(back.column("weighted_std").unwrap()[0], 0.004);
        assert!(back.column("weighted_std").unwrap()[1].is_nan());

        fs::remove_file(&path).unwrap();
    }
}
