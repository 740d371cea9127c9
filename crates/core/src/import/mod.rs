//! Bulk rate import: sheet parsing, header checks, and a simulate/commit run
//! against the catalog.

pub mod headers;
pub mod importer;
pub mod parser;

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use headers::{validate_headers, ImportColumn};
pub use importer::{ImportReport, RateImporter};
pub use parser::{parse_date, parse_import_file, parse_tonnage, ParsedImport, RateImportRecord};

/// Per-row or per-file problem. Collected, never thrown mid-batch.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportError {
    #[error("required column `{header}` is missing")]
    MissingHeader { header: String },
    #[error("column `{header}` appears more than once")]
    DuplicateHeader { header: String },
    #[error("file has more than {max_rows} data rows")]
    TooManyRows { max_rows: usize },
    #[error("file could not be read: {message}")]
    Unreadable { message: String },
    #[error("row {row}: {message}")]
    InvalidRow { row: usize, column: Option<String>, message: String },
    #[error("row {row}: rate for `{center_name}` {tonnage}t skipped, rows {invalid_rows:?} are invalid")]
    IncompleteRate { row: usize, center_name: String, tonnage: Decimal, invalid_rows: Vec<usize> },
    #[error("row {row}: a rate for `{center_name}` {tonnage}t already exists")]
    DuplicateKey { row: usize, center_name: String, tonnage: Decimal },
}

impl ImportError {
    /// Stable tag, identical to the serialized `kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingHeader { .. } => "missing_header",
            Self::DuplicateHeader { .. } => "duplicate_header",
            Self::TooManyRows { .. } => "too_many_rows",
            Self::Unreadable { .. } => "unreadable",
            Self::InvalidRow { .. } => "invalid_row",
            Self::IncompleteRate { .. } => "incomplete_rate",
            Self::DuplicateKey { .. } => "duplicate_key",
        }
    }

    pub fn row(&self) -> Option<usize> {
        match self {
            Self::InvalidRow { row, .. }
            | Self::IncompleteRate { row, .. }
            | Self::DuplicateKey { row, .. } => Some(*row),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Validate against the catalog, write nothing.
    #[default]
    Simulate,
    Commit,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simulate => "simulate",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simulate" | "dry-run" | "dry_run" => Ok(Self::Simulate),
            "commit" => Ok(Self::Commit),
            other => Err(format!("unknown import mode `{other}` (expected simulate|commit)")),
        }
    }
}
