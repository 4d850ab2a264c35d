use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserMetrics {
    pub sessions_opened: u64,
    pub session_failures: u64,
    pub probes: u64,
    pub ready_timeouts: u64,
    pub ready_faults: u64,
    pub sections_found: u64,
    pub sections_dropped: u64,
    pub items_found: u64,
    pub empty_items_skipped: u64,
    pub extractions_completed: u64,
    pub extractions_failed: u64,
}

impl BrowserMetrics {
    pub fn record_session_open(&mut self) {
        self.sessions_opened = self.sessions_opened.saturating_add(1);
    }

    pub fn record_session_failure(&mut self) {
        self.session_failures = self.session_failures.saturating_add(1);
    }

    pub fn record_probe(&mut self) {
        self.probes = self.probes.saturating_add(1);
    }

    pub fn record_ready_timeout(&mut self) {
        self.ready_timeouts = self.ready_timeouts.saturating_add(1);
    }

    pub fn record_ready_fault(&mut self) {
        self.ready_faults = self.ready_faults.saturating_add(1);
    }

    pub fn record_section(&mut self, items: usize) {
        self.sections_found = self.sections_found.saturating_add(1);
        self.items_found = self.items_found.saturating_add(items as u64);
    }

    pub fn record_section_dropped(&mut self) {
        self.sections_dropped = self.sections_dropped.saturating_add(1);
    }

    pub fn record_empty_item(&mut self) {
        self.empty_items_skipped = self.empty_items_skipped.saturating_add(1);
    }

    pub fn record_extraction(&mut self, success: bool) {
        if success {
            self.extractions_completed = self.extractions_completed.saturating_add(1);
        } else {
            self.extractions_failed = self.extractions_failed.saturating_add(1);
        }
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.extractions_completed + self.extractions_failed;
        if total == 0 {
            0.0
        } else {
            (self.extractions_completed as f64 / total as f64) * 100.0
        }
    }
}
