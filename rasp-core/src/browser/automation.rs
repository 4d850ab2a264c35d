use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ChromiumSection;

use super::driver::{NodeHandle, RenderDriver, RenderSession};
use super::error::{BrowserError, BrowserResult};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launches one headless Chromium per session.
#[derive(Debug, Clone)]
pub struct ChromiumDriver {
    config: Arc<ChromiumSection>,
    navigation_timeout: Duration,
}

impl ChromiumDriver {
    pub fn new(config: ChromiumSection, navigation_timeout: Duration) -> Self {
        Self {
            config: Arc::new(config),
            navigation_timeout,
        }
    }

    pub fn config(&self) -> &ChromiumSection {
        &self.config
    }

    fn build_chromium_config(&self, profile: &TempDir) -> BrowserResult<ChromiumConfig> {
        let mut builder = ChromiumConfig::builder().user_data_dir(profile.path());

        if let Some(executable) = &self.config.executable_path {
            builder = builder.chrome_executable(executable);
        }
        if !self.config.headless {
            builder = builder.with_head();
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(seconds) = self.config.request_timeout_seconds {
            builder = builder.request_timeout(Duration::from_secs(seconds));
        }

        let mut args = vec!["--no-first-run".to_string(), "--mute-audio".to_string()];
        if self.config.disable_gpu {
            args.push("--disable-gpu".into());
        }
        args.extend(self.config.extra_args.iter().cloned());
        builder = builder.args(args);

        builder.build().map_err(BrowserError::Configuration)
    }
}

#[async_trait]
impl RenderDriver for ChromiumDriver {
    async fn open(&self, locator: &str) -> BrowserResult<Box<dyn RenderSession>> {
        let profile = tempfile::Builder::new().prefix("rasp-profile-").tempdir()?;
        let chromium_config = self.build_chromium_config(&profile)?;
        let session_id = Uuid::new_v4().to_string();
        info!(
            session = %session_id,
            headless = self.config.headless,
            url = %locator,
            "Launching Chromium instance"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        let mut session = ChromiumSession {
            id: session_id,
            browser: Some(browser),
            page: None,
            handler_task: Some(handler_task),
            _profile: profile,
        };

        match session.navigate(locator, self.navigation_timeout).await {
            Ok(()) => Ok(Box::new(session)),
            Err(err) => {
                session.shutdown().await;
                Err(err)
            }
        }
    }
}

/// Owns the browser, its event handler task and a throwaway profile directory.
#[derive(Debug)]
pub struct ChromiumSession {
    id: String,
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
    _profile: TempDir,
}

impl ChromiumSession {
    async fn navigate(&mut self, url: &str, limit: Duration) -> BrowserResult<()> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| BrowserError::Disconnected(self.id.clone()))?;
        let page = browser
            .new_page(CreateTargetParams::new("about:blank"))
            .await?;
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Configuration)?;

        let navigation = async {
            page.goto(params).await?;
            page.wait_for_navigation().await?;
            Ok::<_, BrowserError>(())
        };
        match timeout(limit, navigation).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: err.to_string(),
                })
            }
            Err(_) => {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: format!("timed out after {}ms", limit.as_millis()),
                })
            }
        }
        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> BrowserResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::Disconnected(self.id.clone()))
    }

    async fn query_all(&self, selector: &str) -> BrowserResult<Vec<Element>> {
        self.page()?
            .find_elements(selector)
            .await
            .map_err(|err| map_query_error(selector, err))
    }

    async fn shutdown(&mut self) {
        info!(session = %self.id, "Shutting down Chromium instance");
        if let Some(page) = self.page.take() {
            if let Err(err) = page.close().await {
                debug!(error = %err, "Failed to close page");
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(err) = browser.close().await {
                warn!(error = %err, "Failed to close browser gracefully");
            }
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Browser handler join error");
            }
        }
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn ready(&self, selector: &str, limit: Duration) -> BrowserResult<bool> {
        let deadline = Instant::now() + limit;
        loop {
            if !self.query_all(selector).await?.is_empty() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            sleep(READY_POLL_INTERVAL.min(remaining)).await;
        }
    }

    async fn probe(&self, selector: &str) -> BrowserResult<Option<Box<dyn NodeHandle>>> {
        let node = self
            .query_all(selector)
            .await?
            .into_iter()
            .next()
            .map(|element| Box::new(ChromiumNode { element }) as Box<dyn NodeHandle>);
        Ok(node)
    }

    async fn close(mut self: Box<Self>) -> BrowserResult<()> {
        self.shutdown().await;
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            // Dropping the Browser kills the child process; the handler task
            // would otherwise outlive it.
            warn!(session = %self.id, "ChromiumSession dropped without explicit close");
            if let Some(handle) = self.handler_task.take() {
                handle.abort();
            }
        }
    }
}

struct ChromiumNode {
    element: Element,
}

#[async_trait]
impl NodeHandle for ChromiumNode {
    async fn text(&self) -> BrowserResult<String> {
        Ok(self.element.inner_text().await?.unwrap_or_default())
    }
}

fn map_query_error(selector: &str, err: chromiumoxide::error::CdpError) -> BrowserError {
    let reason = err.to_string();
    if reason.contains("not a valid selector") || reason.contains("SyntaxError") {
        BrowserError::Selector {
            selector: selector.to_string(),
            reason,
        }
    } else {
        BrowserError::Cdp(err)
    }
}
