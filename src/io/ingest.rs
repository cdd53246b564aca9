//! CSV ingest of measured samples.
//!
//! Turns a measurement CSV into `(va, vg1, vg2, ia)` samples that are safe to fit.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (rows keep file order)
//!
//! Required columns: `va`, `vg1`, `ia` (mA). Optional: `vg2`.
//! `vg` is accepted as an alias for `vg1`.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::Sample;
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: samples + row errors.
#[derive(Debug, Clone)]
pub struct IngestedSamples {
    pub samples: Vec<Sample>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl IngestedSamples {
    pub fn rows_used(&self) -> usize {
        self.samples.len()
    }
}

/// Load samples from a CSV file.
pub fn load_samples(path: &Path) -> Result<IngestedSamples, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open samples CSV '{}': {e}", path.display())))?;
    read_samples(file)
}

/// Load samples from any CSV source.
pub fn read_samples<R: Read>(source: R) -> Result<IngestedSamples, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    ensure_required_columns_exist(&header_map)?;

    let mut samples = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header line; lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map) {
            Ok(sample) => samples.push(sample),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if samples.is_empty() {
        return Err(AppError::new(2, "No valid sample rows in CSV."));
    }

    Ok(IngestedSamples {
        samples,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect();
    if let Some(&idx) = map.get("vg") {
        map.entry("vg1".to_string()).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_required_columns_exist(header_map: &HashMap<String, usize>) -> Result<(), AppError> {
    for name in ["va", "vg1", "ia"] {
        if !header_map.contains_key(name) {
            return Err(AppError::new(2, format!("Missing required column: `{name}`")));
        }
    }
    Ok(())
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<Sample, String> {
    let va = parse_required(record, header_map, "va")?;
    let vg1 = parse_required(record, header_map, "vg1")?;
    let ia = parse_required(record, header_map, "ia")?;
    let vg2 = match get_optional(record, header_map, "vg2") {
        Some(s) => parse_f64(s, "vg2")?,
        None => 0.0,
    };

    if va < 0.0 {
        return Err(format!("Negative anode voltage: {va}"));
    }
    if ia < 0.0 {
        return Err(format!("Negative anode current: {ia}"));
    }

    Ok(Sample::new(va, vg1, vg2, ia))
}

fn parse_required(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<f64, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    let raw = record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))?;
    parse_f64(raw, name)
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("Invalid `{name}` value: '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_samples_and_defaults_vg2() {
        let csv = "va,vg1,ia\n100,-1,0.5\n200, -2 ,1.25\n";
        let data = read_samples(csv.as_bytes()).unwrap();
        assert_eq!(data.rows_read, 2);
        assert_eq!(data.rows_used(), 2);
        assert_eq!(data.samples[1], Sample::new(200.0, -2.0, 0.0, 1.25));
    }

    #[test]
    fn bad_rows_are_skipped_with_line_numbers() {
        let csv = "\u{feff}VA,Vg,Ia,vg2\n100,-1,0.5,\nabc,-1,0.5,0\n150,,0.7,0\n-5,0,1,0\n250,-3,2.0,90\n";
        let data = read_samples(csv.as_bytes()).unwrap();

        assert_eq!(data.rows_read, 5);
        assert_eq!(data.rows_used(), 2);
        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert_eq!(data.samples[1].vg2, 90.0);
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = read_samples("va,ia\n100,1\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("vg1"));
    }

    #[test]
    fn no_usable_rows_is_an_error() {
        let err = read_samples("va,vg1,ia\nx,y,z\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
