use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

pub const DEFAULT_LOCATOR_PREFIX: &str = "https://lk2.stgau.ru/WebApp/#/Rasp/Group/";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RaspConfig {
    pub telegram: TelegramSection,
    pub groups: GroupsSection,
    pub chromium: ChromiumSection,
    pub extraction: ExtractionSection,
    pub delivery: DeliverySection,
}

impl RaspConfig {
    /// Resolves relative paths against the directory holding the config file.
    pub fn resolve_path<P: AsRef<Path>>(&self, base_dir: &Path, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSection {
    pub api_base: String,
    pub token_env: String,
    pub poll_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl TelegramSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(self.poll_timeout_seconds + 5))
    }
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            token_env: "BOT_TOKEN".to_string(),
            poll_timeout_seconds: 30,
            request_timeout_seconds: 40,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GroupsSection {
    pub data_path: String,
    pub locator_prefix: String,
}

impl Default for GroupsSection {
    fn default() -> Self {
        Self {
            data_path: "groups_data.json".to_string(),
            locator_prefix: DEFAULT_LOCATOR_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub request_timeout_seconds: Option<u64>,
    pub extra_args: Vec<String>,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            sandbox: false,
            disable_gpu: true,
            request_timeout_seconds: Some(30),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionSection {
    pub ready_selector: String,
    pub navigation_timeout_ms: u64,
    pub ready_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub max_sections: usize,
    pub max_items: usize,
    /// Positional path of a section; `{section}` is replaced with the slot number.
    pub section_template: String,
    /// Appended to the section path; `{item}` is replaced with the slot number.
    pub item_template: String,
}

impl ExtractionSection {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            ready_selector: ".box-limiter div".to_string(),
            navigation_timeout_ms: 60_000,
            ready_timeout_ms: 18_000,
            probe_timeout_ms: 5_000,
            max_sections: 50,
            max_items: 50,
            section_template: "#page-main > div > div > div:nth-child(7) > div > div > div:nth-child({section}) > div > div".to_string(),
            item_template: " > div:nth-child({item})".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliverySection {
    pub item_delay_ms: u64,
    pub section_delay_ms: u64,
    pub retry_backoff_ms: u64,
}

impl Default for DeliverySection {
    fn default() -> Self {
        Self {
            item_delay_ms: 200,
            section_delay_ms: 300,
            retry_backoff_ms: 1_000,
        }
    }
}

pub fn load_rasp_config<P: AsRef<Path>>(path: P) -> Result<RaspConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
