use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read group data {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse group data {path}: {source}")]
    Parse {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("group data {path} is not a label -> locator object")]
    Shape { path: PathBuf },
    #[error("group {label} has a non-string locator")]
    InvalidEntry { label: String },
}

/// Raised for input that must never reach the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("empty query")]
    EmptyQuery,
    #[error("locator is not an absolute url: {0}")]
    NotAbsolute(String),
    #[error("locator {locator} is outside {prefix}")]
    OutsidePrefix { locator: String, prefix: String },
    #[error("locator {0} names no group")]
    MissingGroupId(String),
}
