use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DashError {
    #[error("invalid work key: {0}")]
    InvalidWorkKey(String),

    #[error("invalid author key: {0}")]
    InvalidAuthorKey(String),

    #[error("invalid rows per page: {0} (expected one of 10, 25, 50, 100)")]
    InvalidPageSize(usize),

    #[error("unknown row field: {0}")]
    InvalidField(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("unexpected catalog payload: {0}")]
    CatalogPayload(String),

    #[error("works list for subject `{subject}` is unavailable: {reason}")]
    #[diagnostic(help("the dashboard stays empty; check network access or the catalog base URL"))]
    WorksListUnavailable { subject: String, reason: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("export failed: {0}")]
    Export(String),
}
