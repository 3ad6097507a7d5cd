//! CSV export of the overdue payments list. Uses the `csv` crate for quoting.
//!
//! Semicolon-delimited so spreadsheet apps in comma-decimal locales open it as-is.

use crate::domain::{DomainError, OverduePayment};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

const HEADER: [&str; 10] = [
    "Client",
    "Phone",
    "Deal",
    "Category",
    "Total",
    "Paid",
    "Pending",
    "Days overdue",
    "Due date",
    "Status",
];

/// Convert overdue rows to a CSV string (header included).
pub fn overdue_to_csv(rows: &[OverduePayment]) -> Result<String, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_writer(Vec::new());

    wtr.write_record(HEADER)?;

    for row in rows {
        wtr.write_record([
            clean(&row.client_name),
            clean(row.client_phone.as_deref().unwrap_or("")),
            clean(row.deal_title.as_deref().unwrap_or("")),
            clean(row.category.as_deref().unwrap_or("")),
            format!("{:.2}", row.amount_total),
            format!("{:.2}", row.amount_paid),
            format!("{:.2}", row.amount_pending),
            row.days_overdue.to_string(),
            row.due_date.format("%Y-%m-%d").to_string(),
            row.payment_status.label().to_string(),
        ])?;
    }

    wtr.flush()?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))?;

    String::from_utf8(bytes).map_err(|e| {
        csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        ))
    })
}

/// Write `overdue_{today}.csv` into `dir` (created if missing). Returns the file path.
pub async fn write_overdue_report(
    dir: impl AsRef<Path>,
    rows: &[OverduePayment],
    today: NaiveDate,
) -> Result<PathBuf, DomainError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .await
        .map_err(|e| DomainError::Export(format!("create export dir: {}", e)))?;

    let csv = overdue_to_csv(rows).map_err(|e| DomainError::Export(e.to_string()))?;
    let path = dir.join(format!("overdue_{}.csv", today.format("%Y-%m-%d")));
    fs::write(&path, csv)
        .await
        .map_err(|e| DomainError::Export(format!("write {}: {}", path.display(), e)))?;

    info!(path = %path.display(), rows = rows.len(), "overdue report exported");
    Ok(path)
}

/// Single-line cell text; the csv crate handles quoting of delimiters and quotes.
fn clean(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}
