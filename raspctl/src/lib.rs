use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rasp_core::{
    load_rasp_config, BotService, BrowserMetrics, ChromiumDriver, DeliveryPacer,
    ExtractionDocument, ExtractionEngine, ExtractionError, ExtractionOptions, GroupEntry,
    GroupIndex, Inbound, LoadError, LocatorPolicy, RaspConfig, ResolutionResult, TelegramClient,
    TelegramError, ValidationError,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub type Result<T> = std::result::Result<T, AppError>;

const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);
const CHROMIUM_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] rasp_core::ConfigError),
    #[error("group data error: {0}")]
    Groups(#[from] LoadError),
    #[error("invalid locator: {0}")]
    Validation(#[from] ValidationError),
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("telegram error: {0}")]
    Telegram(#[from] TelegramError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("no group matches '{0}'")]
    NoMatch(String),
    #[error("'{query}' matches {total} groups: {labels}")]
    Ambiguous {
        query: String,
        total: usize,
        labels: String,
    },
    #[error("one or more checks failed")]
    CheckFailed,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Group schedule bot and extraction tooling", long_about = None)]
pub struct Cli {
    /// Path to rasp.toml
    #[arg(long, default_value = "configs/rasp.toml")]
    pub config: PathBuf,
    /// Group data file, overrides groups.data_path
    #[arg(long)]
    pub groups: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs the chat bot with long polling
    Serve,
    /// Resolves a free-text query against the group data
    Resolve(ResolveArgs),
    /// Extracts the schedule of one group and prints it
    Extract(ExtractArgs),
    /// Checks config, group data and browser availability
    Check,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Group name, part of it or group number
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Group query or full schedule url
    #[arg(required = true, num_args = 1..)]
    pub target: Vec<String>,
}

pub async fn run(cli: Cli) -> Result<()> {
    let context = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Serve => context.serve().await?,
        Commands::Resolve(args) => {
            let report = context.resolve(&args.query.join(" "))?;
            render(&report, cli.format)?;
        }
        Commands::Extract(args) => {
            let report = context.extract(&args.target.join(" ")).await?;
            render(&report, cli.format)?;
        }
        Commands::Check => {
            let report = context.health_check();
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::CheckFailed);
            }
        }
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug)]
struct AppContext {
    config: RaspConfig,
    config_path: PathBuf,
    groups_path: PathBuf,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let config_path = cli.config.clone();
        let config = load_rasp_config(&config_path)?;
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let groups_path = cli
            .groups
            .clone()
            .unwrap_or_else(|| config.resolve_path(&config_dir, &config.groups.data_path));
        Ok(Self {
            config,
            config_path,
            groups_path,
        })
    }

    fn policy(&self) -> LocatorPolicy {
        LocatorPolicy::new(self.config.groups.locator_prefix.clone())
    }

    fn load_groups(&self) -> Result<GroupIndex> {
        let index = GroupIndex::new(self.policy());
        index.load(&self.groups_path)?;
        Ok(index)
    }

    fn engine(&self) -> Result<ExtractionEngine> {
        let driver = ChromiumDriver::new(
            self.config.chromium.clone(),
            self.config.extraction.navigation_timeout(),
        );
        let options = ExtractionOptions::from_config(&self.config.extraction)?;
        Ok(ExtractionEngine::new(Arc::new(driver), options))
    }

    fn resolve(&self, query: &str) -> Result<ResolveReport> {
        let index = self.load_groups()?;
        Ok(ResolveReport {
            query: query.to_string(),
            groups_loaded: index.len(),
            result: index.resolve(query),
        })
    }

    fn target_entry(&self, target: &str) -> Result<GroupEntry> {
        let target = target.trim();
        if target.starts_with("http://") || target.starts_with("https://") {
            self.policy().validate(target)?;
            let label = LocatorPolicy::group_id(target).unwrap_or(target);
            return Ok(GroupEntry::new(label, target));
        }
        match self.load_groups()?.resolve(target) {
            ResolutionResult::SingleMatch(entry) => Ok(entry),
            ResolutionResult::NoMatch => Err(AppError::NoMatch(target.to_string())),
            ResolutionResult::MultipleMatches { candidates, total } => Err(AppError::Ambiguous {
                query: target.to_string(),
                total,
                labels: candidates
                    .iter()
                    .map(|entry| entry.label.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    async fn extract(&self, target: &str) -> Result<ExtractReport> {
        let entry = self.target_entry(target)?;
        let engine = self.engine()?;
        let document = engine.extract(&entry.locator).await?;
        Ok(ExtractReport {
            group: entry.label,
            locator: entry.locator,
            document,
            metrics: engine.metrics(),
        })
    }

    async fn serve(&self) -> Result<()> {
        let token = TelegramClient::token_from_env(&self.config.telegram)?;
        let client = Arc::new(TelegramClient::new(&self.config.telegram, &token)?);

        // A broken group file must not keep the bot down; the index stays
        // empty until the next reload.
        let groups = Arc::new(GroupIndex::new(self.policy()));
        if let Err(err) = groups.load(&self.groups_path) {
            warn!(error = %err, "starting with an empty group index");
        }
        let service = Arc::new(BotService::new(
            groups,
            self.engine()?,
            DeliveryPacer::from_config(&self.config.delivery),
        ));
        reload_on_hangup(Arc::clone(service.groups()))?;
        info!(config = %self.config_path.display(), "bot started");

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);
        let mut offset: Option<i64> = None;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                polled = client.get_updates(offset) => match polled {
                    Ok(updates) => {
                        for update in updates {
                            offset = Some(update.update_id + 1);
                            let Some(inbound) = Inbound::from_update(&update) else {
                                continue;
                            };
                            let service = Arc::clone(&service);
                            let client = Arc::clone(&client);
                            tokio::spawn(async move {
                                if let Err(err) = service.handle(&inbound, client.as_ref()).await {
                                    warn!(
                                        requester = inbound.requester,
                                        error = %err,
                                        "failed to answer message"
                                    );
                                }
                            });
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "polling failed, retrying");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                    }
                }
            }
        }
        Ok(())
    }

    fn health_check(&self) -> Vec<HealthEntry> {
        let mut results = vec![HealthEntry::ok(
            "rasp.toml",
            format!("{}", self.config_path.display()),
        )];
        results.push(self.check_groups());
        results.push(self.check_chromium());
        results.push(self.check_token());
        results
    }

    fn check_groups(&self) -> HealthEntry {
        let name = "groups";
        match self.load_groups() {
            Ok(index) if index.is_empty() => HealthEntry::warn(
                name,
                format!("{} has no valid groups", self.groups_path.display()),
            ),
            Ok(index) => HealthEntry::ok(
                name,
                format!("{} groups in {}", index.len(), self.groups_path.display()),
            ),
            Err(err) => HealthEntry::error(name, err.to_string()),
        }
    }

    fn check_chromium(&self) -> HealthEntry {
        let name = "chromium";
        if let Some(configured) = &self.config.chromium.executable_path {
            let path = Path::new(configured);
            return if path.is_file() {
                HealthEntry::ok(name, configured.clone())
            } else {
                HealthEntry::error(name, format!("{configured} not found"))
            };
        }
        match find_in_path(CHROMIUM_CANDIDATES) {
            Some(found) => HealthEntry::ok(name, format!("{}", found.display())),
            None => HealthEntry::warn(name, "no chromium executable on PATH".to_string()),
        }
    }

    fn check_token(&self) -> HealthEntry {
        let name = "token";
        match TelegramClient::token_from_env(&self.config.telegram) {
            Ok(_) => HealthEntry::ok(name, format!("{} is set", self.config.telegram.token_env)),
            Err(err) => HealthEntry::warn(name, err.to_string()),
        }
    }
}

#[cfg(unix)]
fn reload_on_hangup(groups: Arc<GroupIndex>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading group index");
            reload_groups(&groups);
        }
    });
    Ok(())
}

/// Returns the new group count, or `None` when the reload left the index empty.
#[cfg_attr(not(unix), allow(dead_code))]
fn reload_groups(groups: &GroupIndex) -> Option<usize> {
    match groups.reload() {
        Ok(count) => {
            info!(groups = count, "group index reloaded");
            Some(count)
        }
        Err(err) => {
            warn!(error = %err, "group index reload failed");
            None
        }
    }
}

#[cfg(not(unix))]
fn reload_on_hangup(_groups: Arc<GroupIndex>) -> Result<()> {
    Ok(())
}

fn find_in_path(candidates: &[&str]) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .flat_map(|dir| candidates.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

#[derive(Debug, Serialize)]
pub struct ResolveReport {
    pub query: String,
    pub groups_loaded: usize,
    pub result: ResolutionResult,
}

impl DisplayFallback for ResolveReport {
    fn display(&self) -> String {
        match &self.result {
            ResolutionResult::NoMatch => format!(
                "No match for '{}' among {} groups",
                self.query, self.groups_loaded
            ),
            ResolutionResult::SingleMatch(entry) => {
                format!("{} -> {}", entry.label, entry.locator)
            }
            ResolutionResult::MultipleMatches { candidates, total } => {
                let mut lines = vec![format!("{total} groups match '{}':", self.query)];
                lines.extend(
                    candidates
                        .iter()
                        .map(|entry| format!("  {} -> {}", entry.label, entry.locator)),
                );
                if *total > candidates.len() {
                    lines.push(format!("  ... {} more", total - candidates.len()));
                }
                lines.join("\n")
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExtractReport {
    pub group: String,
    pub locator: String,
    pub document: ExtractionDocument,
    pub metrics: BrowserMetrics,
}

impl DisplayFallback for ExtractReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "{} ({}): {} sections, {} items",
            self.group,
            self.locator,
            self.document.section_count(),
            self.document.total_items()
        )];
        for section in self.document.sections() {
            lines.push(format!(
                "Section {} (slot {}), {} items",
                section.index,
                section.slot,
                section.item_count()
            ));
            for item in &section.items {
                let text = item.text.replace('\n', " | ");
                lines.push(format!("  {}. {}", item.index, text));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

impl HealthEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}

impl DisplayFallback for Vec<HealthEntry> {
    fn display(&self) -> String {
        self.iter()
            .map(|entry| format!("[{}] {}: {}", entry.status, entry.name, entry.detail))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn prepare_context(groups: Option<&str>) -> (TempDir, AppContext) {
        let temp = TempDir::new().unwrap();
        let configs_dir = temp.path().join("configs");
        fs::create_dir_all(&configs_dir).unwrap();
        fs::copy("../configs/rasp.toml", configs_dir.join("rasp.toml")).unwrap();
        match groups {
            Some(body) => fs::write(configs_dir.join("groups_data.json"), body).unwrap(),
            None => {
                fs::copy(
                    "../configs/groups_data.json",
                    configs_dir.join("groups_data.json"),
                )
                .unwrap();
            }
        }
        let cli = Cli {
            config: configs_dir.join("rasp.toml"),
            groups: None,
            format: OutputFormat::Json,
            command: Commands::Check,
        };
        let context = AppContext::new(&cli).unwrap();
        (temp, context)
    }

    #[test]
    fn groups_path_is_relative_to_config() {
        let (temp, context) = prepare_context(None);
        assert_eq!(
            context.groups_path,
            temp.path().join("configs").join("groups_data.json")
        );
    }

    #[test]
    fn resolve_reports_candidates() {
        let (_temp, context) = prepare_context(None);
        let report = context.resolve("ИСП-21").unwrap();
        assert_eq!(report.groups_loaded, 4);
        assert!(report.result.is_ambiguous());
        assert!(report.display().contains("2 groups match"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["result"]["kind"], "multiple_matches");
    }

    #[test]
    fn extract_target_accepts_url_or_unique_query() {
        let (_temp, context) = prepare_context(None);
        let entry = context.target_entry("22296").unwrap();
        assert_eq!(entry.label, "ИСП-21-1");

        let direct = context
            .target_entry("https://lk2.stgau.ru/WebApp/#/Rasp/Group/99999")
            .unwrap();
        assert_eq!(direct.label, "99999");

        assert!(matches!(
            context.target_entry("https://example.com/Rasp/Group/1"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            context.target_entry("ИСП"),
            Err(AppError::Ambiguous { total: 2, .. })
        ));
        assert!(matches!(
            context.target_entry("ФИЗ"),
            Err(AppError::NoMatch(_))
        ));
    }

    #[test]
    fn reload_reports_count_or_failure() {
        let (_temp, context) = prepare_context(None);
        let groups = context.load_groups().unwrap();
        assert_eq!(reload_groups(&groups), Some(4));

        fs::write(&context.groups_path, "{ broken").unwrap();
        assert_eq!(reload_groups(&groups), None);
        assert!(groups.is_empty());

        fs::write(
            &context.groups_path,
            r#"{"ИСП-21-1": "https://lk2.stgau.ru/WebApp/#/Rasp/Group/22296"}"#,
        )
        .unwrap();
        assert_eq!(reload_groups(&groups), Some(1));
    }

    #[test]
    fn health_check_flags_broken_group_file() {
        let (_temp, context) = prepare_context(Some("{ broken"));
        let report = context.health_check();
        let groups = report.iter().find(|entry| entry.name == "groups").unwrap();
        assert!(matches!(groups.status, CheckStatus::Error));

        let (_temp, context) = prepare_context(None);
        let report = context.health_check();
        let groups = report.iter().find(|entry| entry.name == "groups").unwrap();
        assert!(matches!(groups.status, CheckStatus::Ok));
        assert!(report.display().contains("4 groups"));
    }
}
