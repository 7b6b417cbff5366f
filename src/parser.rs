//! CSV readers for observation files and dv/v summary tables.
//!
//! Both formats start with a `date` column; `.gz` files are decompressed
//! transparently.

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::composer::types::SummaryTable;
use crate::stats::Observation;

/// Format used when writing dates back out.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parses a date or date-time cell. Bare dates map to midnight.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Opens `path` for reading, gunzipping it when the extension is `gz`.
pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Reads observations from CSV with header `date,pair,<fields...>`.
///
/// Empty measurement cells are left out of the observation's fields.
pub fn read_observations<R: Read>(reader: R) -> Result<Vec<Observation>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();

    if headers.get(0) != Some("date") || headers.get(1) != Some("pair") {
        bail!("observation CSV must start with 'date,pair' columns");
    }

    let mut observations = Vec::new();

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let line = row + 2;

        let date = parse_date(&record[0])
            .with_context(|| format!("line {}: invalid date '{}'", line, &record[0]))?;
        let mut obs = Observation::new(date, &record[1]);

        for (name, cell) in headers.iter().zip(record.iter()).skip(2) {
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            let value: f64 = cell
                .parse()
                .with_context(|| format!("line {}: invalid '{}' value '{}'", line, name, cell))?;
            obs = obs.with_field(name, value);
        }

        observations.push(obs);
    }

    Ok(observations)
}

/// Reads a summary table from CSV with header `date,<columns...>`.
///
/// Empty cells become NaN.
pub fn read_summary_table<R: Read>(reader: R) -> Result<SummaryTable> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();

    if headers.get(0) != Some("date") {
        bail!("summary table CSV must start with a 'date' column");
    }

    let names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    let mut index = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let line = row + 2;

        let date = parse_date(&record[0])
            .with_context(|| format!("line {}: invalid date '{}'", line, &record[0]))?;
        index.push(date);

        for (i, column) in columns.iter_mut().enumerate() {
            let cell = record.get(i + 1).unwrap_or("").trim();
            let value = if cell.is_empty() {
                f64::NAN
            } else {
                cell.parse().with_context(|| {
                    format!("line {}: invalid '{}' value '{}'", line, names[i], cell)
                })?
            };
            column.push(value);
        }
    }

    names
        .iter()
        .zip(columns)
        .try_fold(SummaryTable::new(index), |table, (name, values)| {
            table.with_column(name, values)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let midnight = NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_date("2024-05-17"), Some(midnight));
        assert_eq!(parse_date("2024-05-17 00:00:00"), Some(midnight));
        assert_eq!(parse_date("2024-05-17T00:00:00"), Some(midnight));
        assert_eq!(
            parse_date("2024-05-17 12:30"),
            NaiveDate::from_ymd_opt(2024, 5, 17).unwrap().and_hms_opt(12, 30, 0)
        );
        assert_eq!(parse_date("17/05/2024"), None);
    }

    #[test]
    fn test_read_observations() {
        let csv = "date,pair,M,EM\n2024-01-01,YA.UV05_YA.UV06,0.01,0.1\n2024-01-01,YA.UV05_YA.UV10,0.02,\n";
        let obs = read_observations(csv.as_bytes()).unwrap();

        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].pair, "YA.UV05_YA.UV06");
        assert_eq!(obs[0].field("M"), Some(0.01));
        assert_eq!(obs[0].field("EM"), Some(0.1));
        assert_eq!(obs[1].field("EM"), None);
    }

    #[test]
    fn test_read_observations_requires_header() {
        let csv = "day,pair,M\n2024-01-01,A_B,0.1\n";
        assert!(read_observations(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_read_observations_invalid_value() {
        let csv = "date,pair,M\n2024-01-01,A_B,abc\n";
        assert!(read_observations(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_read_summary_table() {
        let csv = "date,mean,50%,5%\n2024-01-01,0.1,0.2,\n2024-01-02,0.3,0.4,0.5\n";
        let table = read_summary_table(csv.as_bytes()).unwrap();

        assert_eq!(table.index().len(), 2);
        assert_eq!(table.column("mean"), Some(&[0.1, 0.3][..]));
        assert_eq!(table.column("50%"), Some(&[0.2, 0.4][..]));
        let p5 = table.column("5%").unwrap();
        assert!(p5[0].is_nan());
        assert_eq!(p5[1], 0.5);
    }

    #[test]
    fn test_read_summary_table_bad_date() {
        let csv = "date,mean\nyesterday,0.1\n";
        assert!(read_summary_table(csv.as_bytes()).is_err());
    }
}
