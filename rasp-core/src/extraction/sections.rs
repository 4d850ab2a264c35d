use std::future::Future;
use std::time::Duration;

use futures::stream::{self, Stream};
use parking_lot::Mutex;
use tokio::time::timeout;
use tracing::debug;

use crate::browser::{BrowserMetrics, BrowserResult, NodeHandle, RenderSession, SelectorLayout};

use super::document::{Item, Section};
use super::error::{ExtractionError, ExtractionResult};

/// Bounds and addressing of a two-level positional scan.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub layout: SelectorLayout,
    pub max_sections: usize,
    pub max_items: usize,
    pub probe_timeout: Duration,
}

impl Default for ScanPlan {
    fn default() -> Self {
        Self {
            layout: SelectorLayout::default(),
            max_sections: 50,
            max_items: 50,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

struct ScanState<'a> {
    session: &'a dyn RenderSession,
    plan: &'a ScanPlan,
    metrics: &'a Mutex<BrowserMetrics>,
    next_slot: usize,
    emitted: usize,
    exhausted: bool,
}

impl ScanState<'_> {
    fn record(&self, f: impl FnOnce(&mut BrowserMetrics)) {
        f(&mut self.metrics.lock());
    }

    async fn bounded<T, F>(&self, selector: &str, operation: F) -> ExtractionResult<T>
    where
        F: Future<Output = BrowserResult<T>>,
    {
        match timeout(self.plan.probe_timeout, operation).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(ExtractionError::Probe {
                selector: selector.to_string(),
                source,
            }),
            Err(_) => Err(ExtractionError::ProbeTimeout {
                selector: selector.to_string(),
                timeout_ms: self.plan.probe_timeout.as_millis(),
            }),
        }
    }

    async fn probe(&self, selector: &str) -> ExtractionResult<Option<Box<dyn NodeHandle>>> {
        self.record(BrowserMetrics::record_probe);
        self.bounded(selector, self.session.probe(selector)).await
    }

    async fn scan_items(&self, section_slot: usize) -> ExtractionResult<Vec<Item>> {
        let mut items = Vec::new();
        for slot in 1..=self.plan.max_items {
            let selector = self.plan.layout.item(section_slot, slot);
            let Some(node) = self.probe(&selector).await? else {
                break;
            };
            let text = self.bounded(&selector, node.text()).await?;
            let text = text.trim();
            if text.is_empty() {
                self.record(BrowserMetrics::record_empty_item);
                continue;
            }
            items.push(Item {
                index: items.len() + 1,
                slot,
                text: text.to_string(),
            });
        }
        Ok(items)
    }

    async fn next_section(&mut self) -> ExtractionResult<Option<Section>> {
        while !self.exhausted && self.next_slot <= self.plan.max_sections {
            let slot = self.next_slot;
            self.next_slot += 1;

            let selector = self.plan.layout.section(slot);
            if self.probe(&selector).await?.is_none() {
                // First absent slot ends the scan, even if it is a render gap.
                debug!(slot, "section slot absent, ending scan");
                self.exhausted = true;
                break;
            }

            let items = self.scan_items(slot).await?;
            if items.is_empty() {
                debug!(slot, "section has no non-empty items, dropping");
                self.record(BrowserMetrics::record_section_dropped);
                continue;
            }

            self.emitted += 1;
            self.record(|metrics| metrics.record_section(items.len()));
            return Ok(Some(Section {
                index: self.emitted,
                slot,
                items,
            }));
        }
        self.exhausted = true;
        Ok(None)
    }
}

/// Lazily yields the non-empty sections of a live session, at most
/// `plan.max_sections` slots deep. The stream is tied to the session and
/// cannot be restarted; it ends after the first error.
pub fn produce_sections<'a>(
    session: &'a dyn RenderSession,
    plan: &'a ScanPlan,
    metrics: &'a Mutex<BrowserMetrics>,
) -> impl Stream<Item = ExtractionResult<Section>> + Send + 'a {
    let state = ScanState {
        session,
        plan,
        metrics,
        next_slot: 1,
        emitted: 0,
        exhausted: false,
    };
    stream::try_unfold(state, |mut state| async move {
        let next = state.next_section().await?;
        Ok(next.map(|section| (section, state)))
    })
}
