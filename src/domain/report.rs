//! Audit reports written by the batch coordinator: one CSV per chunk, plus a
//! single-row error report when the run has to be abandoned.

use super::records::BatchOutcome;
use chrono::{Local, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

/// Columns pinned to the front of every chunk report, in this order.
pub const LEADING_COLUMNS: [&str; 5] = ["id", "status", "error", "moderationStatus", "reason"];

pub type ReportRow = BTreeMap<String, String>;

/// Flattens an outcome into a report row.
pub fn outcome_row(outcome: &BatchOutcome) -> ReportRow {
    let mut row = ReportRow::new();
    row.insert("id".to_string(), outcome.id().to_string());
    row.insert("status".to_string(), outcome.status().to_string());

    match outcome {
        BatchOutcome::Success { moderation, .. } => {
            if let Ok(Value::Object(fields)) = serde_json::to_value(moderation) {
                for (column, value) in fields {
                    row.insert(column, cell(&value));
                }
            }
        }
        BatchOutcome::Failed { kind, error, .. } => {
            row.insert("error".to_string(), error.clone());
            row.insert("errorKind".to_string(), kind.as_str().to_string());
        }
        BatchOutcome::Skipped { reason, .. } => {
            row.insert("error".to_string(), reason.clone());
        }
    }
    row
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Union of all row columns: pinned columns first (when present), the rest sorted.
pub fn ordered_columns(rows: &[ReportRow]) -> Vec<String> {
    let all: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let mut columns: Vec<String> = LEADING_COLUMNS
        .iter()
        .filter(|column| all.contains(*column))
        .map(|column| column.to_string())
        .collect();
    columns.extend(
        all.iter()
            .filter(|column| !LEADING_COLUMNS.contains(*column))
            .map(|column| column.to_string()),
    );
    columns
}

fn write_csv(path: &Path, columns: &[String], rows: &[ReportRow]) -> io::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(
            columns
                .iter()
                .map(|column| row.get(column).map(String::as_str).unwrap_or("")),
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the report for one completed chunk and returns its path.
pub fn write_chunk_report(
    reports_dir: &Path,
    chunk_number: usize,
    outcomes: &[BatchOutcome],
) -> io::Result<PathBuf> {
    std::fs::create_dir_all(reports_dir)?;
    let rows: Vec<ReportRow> = outcomes.iter().map(outcome_row).collect();
    let columns = ordered_columns(&rows);

    let path = reports_dir.join(format!(
        "batch_report_part_{}_{}.csv",
        chunk_number,
        Utc::now().timestamp_millis()
    ));
    write_csv(&path, &columns, &rows)?;
    Ok(path)
}

/// Writes the `error_type, message, timestamp` report for an aborted run.
pub fn write_error_report(reports_dir: &Path, error_type: &str, message: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(reports_dir)?;
    let path = reports_dir.join(format!("error_report_{}.csv", Utc::now().timestamp_millis()));

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["error_type", "message", "timestamp"])?;
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    writer.write_record([error_type, message, timestamp.as_str()])?;
    writer.flush()?;
    Ok(path)
}
