use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::DeliverySection;
use crate::extraction::ExtractionDocument;

use super::format::{item_message, section_header, summary_message};
use super::retry::RetryPolicy;
use super::sink::{MessageSink, SinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    pub item_delay: Duration,
    pub section_delay: Duration,
}

impl PacingConfig {
    pub fn from_config(config: &DeliverySection) -> Self {
        Self {
            item_delay: Duration::from_millis(config.item_delay_ms),
            section_delay: Duration::from_millis(config.section_delay_ms),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self::from_config(&DeliverySection::default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReceipt {
    pub sections: usize,
    pub items: usize,
    pub messages_sent: usize,
    pub retries: usize,
    pub total_wait_ms: u64,
    pub completed_at: DateTime<Local>,
}

#[derive(Debug, Error)]
#[error("delivery stopped after {sent} messages: {source}")]
pub struct DeliveryError {
    pub sent: usize,
    #[source]
    pub source: SinkError,
}

/// Gap inserted before the next send.
enum Gap {
    None,
    Item,
    Section,
}

struct Progress {
    sent: usize,
    retries: usize,
    waited: Duration,
    gap: Gap,
}

/// Streams a document to a sink one message at a time, in document order.
#[derive(Debug, Clone, Default)]
pub struct DeliveryPacer {
    pacing: PacingConfig,
    retry: RetryPolicy,
}

impl DeliveryPacer {
    pub fn new(pacing: PacingConfig, retry: RetryPolicy) -> Self {
        Self { pacing, retry }
    }

    pub fn from_config(config: &DeliverySection) -> Self {
        Self::new(PacingConfig::from_config(config), RetryPolicy::from_config(config))
    }

    /// Sends a header per section, one message per item, then a summary.
    /// Stops at the first message that still fails after retrying; messages
    /// already sent are not recalled.
    pub async fn deliver(
        &self,
        document: &ExtractionDocument,
        sink: &dyn MessageSink,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let mut progress = Progress {
            sent: 0,
            retries: 0,
            waited: Duration::ZERO,
            gap: Gap::None,
        };

        for section in document.sections() {
            self.send(sink, &section_header(section), &mut progress).await?;
            progress.gap = Gap::Item;
            for item in &section.items {
                self.send(sink, &item_message(item), &mut progress).await?;
                progress.gap = Gap::Item;
            }
            progress.gap = Gap::Section;
            debug!(section = section.index, items = section.item_count(), "section delivered");
        }

        let completed_at = Local::now();
        let summary = summary_message(document.section_count(), document.total_items(), completed_at);
        self.send(sink, &summary, &mut progress).await?;

        let receipt = DeliveryReceipt {
            sections: document.section_count(),
            items: document.total_items(),
            messages_sent: progress.sent,
            retries: progress.retries,
            total_wait_ms: progress.waited.as_millis() as u64,
            completed_at,
        };
        info!(
            sections = receipt.sections,
            items = receipt.items,
            messages = receipt.messages_sent,
            retries = receipt.retries,
            "delivery completed"
        );
        Ok(receipt)
    }

    async fn send(
        &self,
        sink: &dyn MessageSink,
        text: &str,
        progress: &mut Progress,
    ) -> Result<(), DeliveryError> {
        let delay = match progress.gap {
            Gap::None => Duration::ZERO,
            Gap::Item => self.pacing.item_delay,
            Gap::Section => self.pacing.section_delay,
        };
        if !delay.is_zero() {
            sleep(delay).await;
            progress.waited += delay;
        }

        match self.retry.run(|_| sink.send(text)).await {
            Ok(outcome) => {
                progress.sent += 1;
                progress.retries += outcome.attempts - 1;
                progress.waited += outcome.waited;
                Ok(())
            }
            Err(source) => {
                warn!(sent = progress.sent, error = %source, "delivery aborted");
                Err(DeliveryError {
                    sent: progress.sent,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{Item, Section};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, Instant)>>,
        failures: Mutex<VecDeque<Option<SinkError>>>,
    }

    impl RecordingSink {
        fn failing(plan: Vec<Option<SinkError>>) -> Self {
            Self {
                failures: Mutex::new(plan.into()),
                ..Self::default()
            }
        }

        fn texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(text, _)| text.clone())
                .collect()
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send(&self, text: &str) -> Result<(), SinkError> {
            if let Some(Some(err)) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            self.sent
                .lock()
                .unwrap()
                .push((text.to_string(), Instant::now()));
            Ok(())
        }
    }

    fn document(shape: &[&[&str]]) -> ExtractionDocument {
        ExtractionDocument::from_sections(shape.iter().enumerate().map(|(s, items)| Section {
            index: s + 1,
            slot: s + 1,
            items: items
                .iter()
                .enumerate()
                .map(|(i, text)| Item {
                    index: i + 1,
                    slot: i + 1,
                    text: text.to_string(),
                })
                .collect(),
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn sends_headers_items_and_summary_in_order() {
        let doc = document(&[&["Math", "Physics"], &["Art"]]);
        let sink = RecordingSink::default();
        let receipt = DeliveryPacer::default().deliver(&doc, &sink).await.unwrap();

        let texts = sink.texts();
        assert_eq!(texts.len(), 2 + 3 + 1);
        assert_eq!(receipt.messages_sent, 6);
        assert!(texts[0].contains("ДЕНЬ #1"));
        assert!(texts[1].contains("Math"));
        assert!(texts[2].contains("Physics"));
        assert!(texts[3].contains("ДЕНЬ #2"));
        assert!(texts[4].contains("Art"));
        assert!(texts[5].contains("Всего занятий: 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn item_and_section_gaps_are_respected() {
        let doc = document(&[&["Math"], &["Art"]]);
        let sink = RecordingSink::default();
        let pacer = DeliveryPacer::new(
            PacingConfig {
                item_delay: Duration::from_millis(200),
                section_delay: Duration::from_millis(300),
            },
            RetryPolicy::default(),
        );
        let receipt = pacer.deliver(&doc, &sink).await.unwrap();

        let stamps: Vec<Instant> = sink.sent.lock().unwrap().iter().map(|(_, at)| *at).collect();
        let gaps: Vec<u128> = stamps
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect();
        assert_eq!(gaps, vec![200, 300, 200, 300]);
        assert_eq!(receipt.total_wait_ms, 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_message_is_retried_once() {
        let doc = document(&[&["Math"]]);
        let sink = RecordingSink::failing(vec![
            None,
            Some(SinkError::RateLimited {
                retry_after: Some(Duration::from_secs(2)),
            }),
        ]);
        let receipt = DeliveryPacer::default().deliver(&doc, &sink).await.unwrap();
        assert_eq!(receipt.messages_sent, 3);
        assert_eq!(receipt.retries, 1);
        assert_eq!(sink.texts().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn second_failure_reports_sent_count() {
        let doc = document(&[&["Math", "Physics"]]);
        let sink = RecordingSink::failing(vec![
            None,
            None,
            Some(SinkError::Transient("reset".into())),
            Some(SinkError::Transient("reset".into())),
        ]);
        let err = DeliveryPacer::default().deliver(&doc, &sink).await.unwrap_err();
        assert_eq!(err.sent, 2);
        assert_eq!(err.source, SinkError::Transient("reset".into()));
        assert_eq!(sink.texts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_document_sends_only_summary() {
        let sink = RecordingSink::default();
        let receipt = DeliveryPacer::default()
            .deliver(&ExtractionDocument::default(), &sink)
            .await
            .unwrap();
        assert_eq!(receipt.messages_sent, 1);
        assert!(sink.texts()[0].contains("Дней занятий: 0"));
    }
}
