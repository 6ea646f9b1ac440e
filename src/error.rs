use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a report run.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to connect to SQL Server at {server}: {source}")]
    ConnectionFailed {
        server: String,
        #[source]
        source: tiberius::error::Error,
    },

    #[error("productivity query failed: {0}")]
    QueryFailed(#[source] tiberius::error::Error),

    #[error("row {row}, column {column}: {reason}")]
    MalformedRow {
        row: usize,
        column: &'static str,
        reason: String,
    },

    #[error("`{value}` is not a percentage")]
    MalformedPercent { value: String },

    #[error("failed to write workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
}
