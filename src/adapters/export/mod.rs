//! Report exports.

pub mod csv_export;

pub use csv_export::{overdue_to_csv, write_overdue_report};
