use thiserror::Error;

use crate::browser::BrowserError;

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Any fault during extraction. Partial documents are never returned alongside.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to open {locator}: {source}")]
    Open {
        locator: String,
        #[source]
        source: BrowserError,
    },
    #[error("probe of {selector} failed: {source}")]
    Probe {
        selector: String,
        #[source]
        source: BrowserError,
    },
    #[error("probe of {selector} timed out after {timeout_ms}ms")]
    ProbeTimeout { selector: String, timeout_ms: u128 },
    #[error("invalid extraction settings: {0}")]
    Configuration(#[source] BrowserError),
}
