use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::config::DEFAULT_LOCATOR_PREFIX;

use super::error::ValidationError;

fn group_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/Rasp/Group/(\d+)").expect("static pattern"))
}

/// Accepts only absolute urls below a fixed schedule prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorPolicy {
    prefix: String,
}

impl LocatorPolicy {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn validate(&self, locator: &str) -> Result<(), ValidationError> {
        let candidate = locator.trim();
        if candidate.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        Url::parse(candidate).map_err(|_| ValidationError::NotAbsolute(candidate.to_string()))?;
        if !candidate.starts_with(&self.prefix) {
            return Err(ValidationError::OutsidePrefix {
                locator: candidate.to_string(),
                prefix: self.prefix.clone(),
            });
        }
        if Self::group_id(candidate).is_none() {
            return Err(ValidationError::MissingGroupId(candidate.to_string()));
        }
        Ok(())
    }

    /// Numeric group id embedded in the locator path, if any.
    pub fn group_id(locator: &str) -> Option<&str> {
        group_id_pattern()
            .captures(locator)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    }
}

impl Default for LocatorPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LOCATOR_PREFIX)
    }
}
