use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::TryStreamExt;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::browser::{BrowserMetrics, RenderDriver, RenderSession, SelectorLayout};
use crate::config::ExtractionSection;

use super::document::ExtractionDocument;
use super::error::{ExtractionError, ExtractionResult};
use super::sections::{produce_sections, ScanPlan};

#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub ready_selector: String,
    pub ready_timeout: Duration,
    pub scan: ScanPlan,
}

impl ExtractionOptions {
    pub fn from_config(config: &ExtractionSection) -> ExtractionResult<Self> {
        let layout = SelectorLayout::from_config(config).map_err(ExtractionError::Configuration)?;
        Ok(Self {
            ready_selector: config.ready_selector.clone(),
            ready_timeout: config.ready_timeout(),
            scan: ScanPlan {
                layout,
                max_sections: config.max_sections,
                max_items: config.max_items,
                probe_timeout: config.probe_timeout(),
            },
        })
    }
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        let defaults = ExtractionSection::default();
        Self {
            ready_selector: defaults.ready_selector.clone(),
            ready_timeout: defaults.ready_timeout(),
            scan: ScanPlan::default(),
        }
    }
}

/// Turns a locator into an [`ExtractionDocument`] through a [`RenderDriver`].
/// Stateless across calls apart from metrics; nothing is cached.
pub struct ExtractionEngine {
    driver: Arc<dyn RenderDriver>,
    options: ExtractionOptions,
    metrics: Arc<Mutex<BrowserMetrics>>,
}

impl ExtractionEngine {
    pub fn new(driver: Arc<dyn RenderDriver>, options: ExtractionOptions) -> Self {
        Self {
            driver,
            options,
            metrics: Arc::new(Mutex::new(BrowserMetrics::default())),
        }
    }

    pub fn metrics(&self) -> BrowserMetrics {
        self.metrics.lock().clone()
    }

    fn with_metrics(&self, f: impl FnOnce(&mut BrowserMetrics)) {
        f(&mut self.metrics.lock());
    }

    /// Opens a session, scans it and always closes it before returning. If the
    /// returned future is dropped midway the session is released by its own
    /// drop instead.
    pub async fn extract(&self, locator: &str) -> ExtractionResult<ExtractionDocument> {
        let started = Instant::now();
        let session = match self.driver.open(locator).await {
            Ok(session) => {
                self.with_metrics(BrowserMetrics::record_session_open);
                session
            }
            Err(source) => {
                self.with_metrics(|metrics| {
                    metrics.record_session_failure();
                    metrics.record_extraction(false);
                });
                warn!(url = %locator, error = %source, "failed to open render session");
                return Err(ExtractionError::Open {
                    locator: locator.to_string(),
                    source,
                });
            }
        };

        let outcome = self.scan(session.as_ref()).await;
        if let Err(err) = session.close().await {
            warn!(url = %locator, error = %err, "failed to close render session");
        }

        self.with_metrics(|metrics| metrics.record_extraction(outcome.is_ok()));
        match &outcome {
            Ok(document) => info!(
                url = %locator,
                sections = document.section_count(),
                items = document.total_items(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "extraction finished"
            ),
            Err(err) => warn!(url = %locator, error = %err, "extraction failed"),
        }
        outcome
    }

    async fn scan(&self, session: &dyn RenderSession) -> ExtractionResult<ExtractionDocument> {
        // Readiness is advisory; a dead session fails again on the first probe.
        match session
            .ready(&self.options.ready_selector, self.options.ready_timeout)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                self.with_metrics(BrowserMetrics::record_ready_timeout);
                warn!(
                    selector = %self.options.ready_selector,
                    timeout_ms = self.options.ready_timeout.as_millis() as u64,
                    "page not ready in time, scanning anyway"
                );
            }
            Err(err) => {
                self.with_metrics(BrowserMetrics::record_ready_fault);
                warn!(
                    selector = %self.options.ready_selector,
                    error = %err,
                    "readiness check failed, scanning anyway"
                );
            }
        }

        let sections = produce_sections(session, &self.options.scan, &self.metrics)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(ExtractionDocument::from_sections(sections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserError, BrowserResult, NodeHandle};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeNode(String);

    #[async_trait]
    impl NodeHandle for FakeNode {
        async fn text(&self) -> BrowserResult<String> {
            Ok(self.0.clone())
        }
    }

    /// Page model: `sections[s - 1]` holds the item texts of slot `s`.
    #[derive(Clone, Default)]
    struct FakePage {
        sections: Vec<Vec<&'static str>>,
        ready: bool,
        ready_fault: bool,
        failing_selector: Option<String>,
        hanging_selector: Option<String>,
    }

    struct FakeSession {
        nodes: HashMap<String, String>,
        page: FakePage,
        closed: Arc<AtomicUsize>,
        dropped: Arc<AtomicUsize>,
    }

    impl Drop for FakeSession {
        fn drop(&mut self) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RenderSession for FakeSession {
        async fn ready(&self, selector: &str, _timeout: Duration) -> BrowserResult<bool> {
            if self.page.ready_fault {
                return Err(BrowserError::Selector {
                    selector: selector.to_string(),
                    reason: "Cannot find context".into(),
                });
            }
            Ok(self.page.ready)
        }

        async fn probe(&self, selector: &str) -> BrowserResult<Option<Box<dyn NodeHandle>>> {
            if self.page.hanging_selector.as_deref() == Some(selector) {
                std::future::pending::<()>().await;
            }
            if self.page.failing_selector.as_deref() == Some(selector) {
                return Err(BrowserError::Disconnected("fake".into()));
            }
            Ok(self
                .nodes
                .get(selector)
                .map(|text| Box::new(FakeNode(text.clone())) as Box<dyn NodeHandle>))
        }

        async fn close(self: Box<Self>) -> BrowserResult<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeDriver {
        page: FakePage,
        layout: SelectorLayout,
        fail_navigation: bool,
        closed: Arc<AtomicUsize>,
        dropped: Arc<AtomicUsize>,
    }

    impl FakeDriver {
        fn new(page: FakePage) -> Self {
            Self {
                page,
                layout: SelectorLayout::default(),
                fail_navigation: false,
                closed: Arc::new(AtomicUsize::new(0)),
                dropped: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl RenderDriver for FakeDriver {
        async fn open(&self, locator: &str) -> BrowserResult<Box<dyn RenderSession>> {
            if self.fail_navigation {
                return Err(BrowserError::Navigation {
                    url: locator.to_string(),
                    reason: "timed out".into(),
                });
            }
            let mut nodes = HashMap::new();
            for (s, items) in self.page.sections.iter().enumerate() {
                nodes.insert(self.layout.section(s + 1), String::new());
                for (i, text) in items.iter().enumerate() {
                    nodes.insert(self.layout.item(s + 1, i + 1), text.to_string());
                }
            }
            Ok(Box::new(FakeSession {
                nodes,
                page: self.page.clone(),
                closed: Arc::clone(&self.closed),
                dropped: Arc::clone(&self.dropped),
            }))
        }
    }

    fn engine(driver: FakeDriver) -> (ExtractionEngine, Arc<AtomicUsize>) {
        let closed = Arc::clone(&driver.closed);
        (
            ExtractionEngine::new(Arc::new(driver), ExtractionOptions::default()),
            closed,
        )
    }

    #[tokio::test]
    async fn empty_section_is_dropped() {
        let (engine, closed) = engine(FakeDriver::new(FakePage {
            sections: vec![vec!["Math", "Physics"], vec!["  ", ""]],
            ready: true,
            ..FakePage::default()
        }));
        let document = engine.extract("https://example.test/1").await.unwrap();
        assert_eq!(document.section_count(), 1);
        let section = &document.sections()[0];
        assert_eq!(section.index, 1);
        assert_eq!(
            section.items.iter().map(|item| item.text.as_str()).collect::<Vec<_>>(),
            vec!["Math", "Physics"]
        );
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(engine.metrics().sections_dropped, 1);
    }

    #[tokio::test]
    async fn empty_items_are_skipped_and_indices_stay_dense() {
        let (engine, _) = engine(FakeDriver::new(FakePage {
            sections: vec![vec!["", "  Chemistry \n", "", "Biology"], vec![], vec!["Art"]],
            ready: true,
            ..FakePage::default()
        }));
        let document = engine.extract("https://example.test/2").await.unwrap();
        let sections = document.sections();
        assert_eq!(sections.len(), 2);
        assert_eq!((sections[0].index, sections[0].slot), (1, 1));
        assert_eq!((sections[1].index, sections[1].slot), (2, 3));
        let items: Vec<_> = sections[0]
            .items
            .iter()
            .map(|item| (item.index, item.slot, item.text.as_str()))
            .collect();
        assert_eq!(items, vec![(1, 2, "Chemistry"), (2, 4, "Biology")]);
    }

    #[tokio::test]
    async fn ready_timeout_is_not_fatal() {
        let (engine, _) = engine(FakeDriver::new(FakePage {
            sections: vec![vec!["Lecture"]],
            ready: false,
            ..FakePage::default()
        }));
        let document = engine.extract("https://example.test/3").await.unwrap();
        assert_eq!(document.total_items(), 1);
        assert_eq!(engine.metrics().ready_timeouts, 1);
    }

    #[tokio::test]
    async fn readiness_fault_still_scans_the_page() {
        let (engine, closed) = engine(FakeDriver::new(FakePage {
            sections: vec![vec!["Lecture"]],
            ready_fault: true,
            ..FakePage::default()
        }));
        let document = engine.extract("https://example.test/8").await.unwrap();
        assert_eq!(document.total_items(), 1);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        let metrics = engine.metrics();
        assert_eq!(metrics.ready_faults, 1);
        assert_eq!(metrics.extractions_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_probe_times_out_and_closes_session() {
        let layout = SelectorLayout::default();
        let (engine, closed) = engine(FakeDriver::new(FakePage {
            sections: vec![vec!["Math"], vec!["History"]],
            ready: true,
            hanging_selector: Some(layout.section(2)),
            ..FakePage::default()
        }));
        let err = engine.extract("https://example.test/9").await.unwrap_err();
        match err {
            ExtractionError::ProbeTimeout {
                selector,
                timeout_ms,
            } => {
                assert_eq!(selector, layout.section(2));
                assert_eq!(timeout_ms, 5_000);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(engine.metrics().extractions_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_extraction_releases_session() {
        let layout = SelectorLayout::default();
        let driver = FakeDriver::new(FakePage {
            sections: vec![vec!["Math"]],
            ready: true,
            hanging_selector: Some(layout.item(1, 1)),
            ..FakePage::default()
        });
        let dropped = Arc::clone(&driver.dropped);
        let (engine, closed) = engine(driver);

        let cancelled = tokio::time::timeout(
            Duration::from_millis(100),
            engine.extract("https://example.test/10"),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(closed.load(Ordering::SeqCst), 0);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn navigation_failure_returns_error() {
        let mut driver = FakeDriver::new(FakePage::default());
        driver.fail_navigation = true;
        let (engine, closed) = engine(driver);
        let err = engine.extract("https://example.test/4").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Open { .. }));
        assert_eq!(closed.load(Ordering::SeqCst), 0);
        assert_eq!(engine.metrics().extractions_failed, 1);
    }

    #[tokio::test]
    async fn probe_fault_aborts_without_partial_document() {
        let layout = SelectorLayout::default();
        let (engine, closed) = engine(FakeDriver::new(FakePage {
            sections: vec![vec!["Math"], vec!["History"]],
            ready: true,
            failing_selector: Some(layout.item(2, 1)),
            ..FakePage::default()
        }));
        let err = engine.extract("https://example.test/5").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Probe { .. }));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn scan_is_bounded_by_max_sections_and_items() {
        let page = FakePage {
            sections: vec![vec!["a", "b", "c"]; 6],
            ready: true,
            ..FakePage::default()
        };
        let driver = FakeDriver::new(page);
        let mut options = ExtractionOptions::default();
        options.scan.max_sections = 4;
        options.scan.max_items = 2;
        let engine = ExtractionEngine::new(Arc::new(driver), options);
        let document = engine.extract("https://example.test/6").await.unwrap();
        assert_eq!(document.section_count(), 4);
        assert_eq!(document.total_items(), 8);
    }

    #[tokio::test]
    async fn missing_page_yields_empty_document() {
        let (engine, _) = engine(FakeDriver::new(FakePage {
            ready: true,
            ..FakePage::default()
        }));
        let document = engine.extract("https://example.test/7").await.unwrap();
        assert!(document.is_empty());
    }
}
