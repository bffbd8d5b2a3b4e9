//! CSV ingest and normalization.
//!
//! Turns a utility-bill style CSV (one row per billing period) into a clean set
//! of `(temperature, energy, label)` observations that are safe to fit.
//!
//! Design goals:
//! - **Strict schema** for the temperature / energy columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior**: input order is preserved
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{info, warn};

use crate::domain::{ColumnSpec, Observation};
use crate::error::AppError;

/// Columns tried (in order) for a period label when none is configured.
const LABEL_CANDIDATES: [&str; 3] = ["month", "period", "date"];

/// Summary stats about the observations actually used for fitting.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_points: usize,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub energy_min: f64,
    pub energy_max: f64,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub label: Option<String>,
    pub message: String,
}

/// Ingest output: observations + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub observations: Vec<Observation>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load observations from a CSV file on disk.
pub fn load_observations(path: &Path, columns: &ColumnSpec) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let data = read_observations(file, columns)?;
    info!(
        path = %path.display(),
        rows_read = data.rows_read,
        rows_used = data.rows_used,
        "ingested observations"
    );
    Ok(data)
}

/// Read observations from any CSV source.
pub fn read_observations<R: Read>(source: R, columns: &ColumnSpec) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let temp_idx = required_column(&header_map, &columns.temperature)?;
    let energy_idx = required_column(&header_map, &columns.energy)?;
    let label_idx = resolve_label_column(columns, &header_map)?;

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    label: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        if record.iter().all(|field| field.is_empty()) {
            rows_read -= 1;
            continue;
        }

        let label = label_idx.and_then(|i| get_field(&record, i)).map(str::to_string);

        match parse_row(&record, temp_idx, energy_idx, columns) {
            Ok((temperature, energy)) => observations.push(Observation {
                label,
                temperature,
                energy,
            }),
            Err(message) => row_errors.push(RowError { line, label, message }),
        }
    }

    if !row_errors.is_empty() {
        warn!(skipped = row_errors.len(), "skipped invalid CSV rows");
    }

    let rows_used = observations.len();
    let stats = compute_stats(&observations)
        .ok_or_else(|| AppError::insufficient_data("No valid rows remain after validation."))?;

    Ok(IngestedData {
        observations,
        stats,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn required_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| AppError::new(2, format!("Missing required column: `{name}`")))
}

fn resolve_label_column(
    columns: &ColumnSpec,
    header_map: &HashMap<String, usize>,
) -> Result<Option<usize>, AppError> {
    if let Some(name) = &columns.label {
        return required_column(header_map, name).map(Some);
    }
    Ok(LABEL_CANDIDATES
        .iter()
        .find_map(|name| header_map.get(*name).copied()))
}

fn parse_row(
    record: &StringRecord,
    temp_idx: usize,
    energy_idx: usize,
    columns: &ColumnSpec,
) -> Result<(f64, f64), String> {
    let temperature = parse_value(record, temp_idx, &columns.temperature)?;
    let energy = parse_value(record, energy_idx, &columns.energy)?;
    Ok((temperature, energy))
}

fn parse_value(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let raw = get_field(record, idx).ok_or_else(|| format!("Missing value: `{name}`"))?;
    // Bill exports frequently carry thousands separators ("1,234").
    let cleaned = raw.replace(',', "");
    let value = cleaned
        .parse::<f64>()
        .map_err(|_| format!("Invalid `{name}` value '{raw}'"))?;
    if !value.is_finite() {
        return Err(format!("Non-finite `{name}` value '{raw}'"));
    }
    Ok(value)
}

fn get_field(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn compute_stats(observations: &[Observation]) -> Option<DatasetStats> {
    if observations.is_empty() {
        return None;
    }
    let mut temperature_min = f64::INFINITY;
    let mut temperature_max = f64::NEG_INFINITY;
    let mut energy_min = f64::INFINITY;
    let mut energy_max = f64::NEG_INFINITY;

    for o in observations {
        temperature_min = temperature_min.min(o.temperature);
        temperature_max = temperature_max.max(o.temperature);
        energy_min = energy_min.min(o.energy);
        energy_max = energy_max.max(o.energy);
    }

    Some(DatasetStats {
        n_points: observations.len(),
        temperature_min,
        temperature_max,
        energy_min,
        energy_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(csv: &str) -> Result<IngestedData, AppError> {
        read_observations(csv.as_bytes(), &ColumnSpec::default())
    }

    #[test]
    fn reads_default_columns_with_bom_and_mixed_case() {
        let csv = "\u{feff}Month,AVG_OAT_F,Total_kWh,total_therms\n\
                   Jan,28.5,\"2,410\",310\n\
                   Feb,33.0,2200,280\n";
        let data = read(csv).unwrap();
        assert_eq!(data.rows_read, 2);
        assert_eq!(data.rows_used, 2);
        assert_eq!(data.observations[0].label.as_deref(), Some("Jan"));
        assert_eq!(data.observations[0].energy, 2410.0);
        assert_eq!(data.stats.temperature_min, 28.5);
        assert_eq!(data.stats.energy_max, 2410.0);
    }

    #[test]
    fn bad_rows_are_collected_not_fatal() {
        let csv = "period,avg_oat_f,total_kwh\n\
                   1,30,2000\n\
                   2,abc,1900\n\
                   3,45,\n\
                   4,60,1000\n";
        let data = read(csv).unwrap();
        assert_eq!(data.rows_read, 4);
        assert_eq!(data.rows_used, 2);
        assert_eq!(data.row_errors.len(), 2);
        assert_eq!(data.row_errors[0].line, 3);
        assert_eq!(data.row_errors[0].label.as_deref(), Some("2"));
        assert!(data.row_errors[1].message.contains("total_kwh"));
    }

    #[test]
    fn missing_column_is_a_config_error() {
        let err = read("month,temp,kwh\nJan,30,2000\n").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("avg_oat_f"));
    }

    #[test]
    fn no_usable_rows_is_insufficient_data() {
        let err = read("avg_oat_f,total_kwh\nx,y\n").unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn custom_columns_are_honored() {
        let columns = ColumnSpec {
            temperature: "oat".to_string(),
            energy: "total_therms".to_string(),
            label: Some("bill".to_string()),
        };
        let csv = "bill,oat,total_therms\nB1,40,120\n";
        let data = read_observations(csv.as_bytes(), &columns).unwrap();
        assert_eq!(data.observations[0], Observation::labeled("B1", 40.0, 120.0));
    }

    #[test]
    fn blank_lines_are_ignored() {
        let data = read("avg_oat_f,total_kwh\n30,2000\n,\n50,1500\n").unwrap();
        assert_eq!(data.rows_read, 2);
        assert!(data.row_errors.is_empty());
    }
}
