use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::groups::GroupEntry;

pub type RequesterId = i64;

/// Candidates offered to a requester after an ambiguous query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResolution {
    pub query: String,
    pub candidates: Vec<GroupEntry>,
    pub total: usize,
    pub created_at: DateTime<Utc>,
}

impl PendingResolution {
    pub fn new(query: impl Into<String>, candidates: Vec<GroupEntry>, total: usize) -> Self {
        Self {
            query: query.into(),
            candidates,
            total,
            created_at: Utc::now(),
        }
    }

    pub fn choose(&self, label: &str) -> Option<&GroupEntry> {
        self.candidates.iter().find(|entry| entry.label == label)
    }
}

#[derive(Debug, Clone, Default)]
struct RequesterState {
    registration: Option<GroupEntry>,
    pending: Option<PendingResolution>,
}

/// Process-lifetime requester state. Entries are created on first write and
/// removed only by [`RequesterRegistry::reset`].
#[derive(Debug, Default)]
pub struct RequesterRegistry {
    states: DashMap<RequesterId, RequesterState>,
}

impl RequesterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, requester: RequesterId, entry: GroupEntry) {
        let mut state = self.states.entry(requester).or_default();
        state.registration = Some(entry);
        state.pending = None;
    }

    pub fn registration(&self, requester: RequesterId) -> Option<GroupEntry> {
        self.states
            .get(&requester)
            .and_then(|state| state.registration.clone())
    }

    /// Stores a pending resolution, superseding any previous one.
    pub fn set_pending(&self, requester: RequesterId, pending: PendingResolution) {
        self.states.entry(requester).or_default().pending = Some(pending);
    }

    pub fn has_pending(&self, requester: RequesterId) -> bool {
        self.states
            .get(&requester)
            .map(|state| state.pending.is_some())
            .unwrap_or(false)
    }

    /// Removes and returns the pending resolution.
    pub fn take_pending(&self, requester: RequesterId) -> Option<PendingResolution> {
        self.states
            .get_mut(&requester)
            .and_then(|mut state| state.pending.take())
    }

    pub fn clear_pending(&self, requester: RequesterId) {
        if let Some(mut state) = self.states.get_mut(&requester) {
            state.pending = None;
        }
    }

    pub fn reset(&self, requester: RequesterId) {
        self.states.remove(&requester);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str, id: u32) -> GroupEntry {
        GroupEntry::new(label, format!("https://lk2.stgau.ru/WebApp/#/Rasp/Group/{id}"))
    }

    #[test]
    fn register_clears_pending() {
        let registry = RequesterRegistry::new();
        registry.set_pending(7, PendingResolution::new("21", vec![entry("A", 1)], 1));
        registry.register(7, entry("A", 1));
        assert!(!registry.has_pending(7));
        assert_eq!(registry.registration(7).unwrap().label, "A");
    }

    #[test]
    fn take_pending_consumes_once() {
        let registry = RequesterRegistry::new();
        registry.set_pending(
            1,
            PendingResolution::new("21", vec![entry("A", 1), entry("B", 2)], 2),
        );
        let pending = registry.take_pending(1).unwrap();
        assert_eq!(pending.choose("B").unwrap().label, "B");
        assert!(registry.take_pending(1).is_none());
    }

    #[test]
    fn newer_query_supersedes_pending() {
        let registry = RequesterRegistry::new();
        registry.set_pending(1, PendingResolution::new("a", vec![entry("A", 1)], 1));
        registry.set_pending(1, PendingResolution::new("b", vec![entry("B", 2)], 1));
        assert_eq!(registry.take_pending(1).unwrap().query, "b");
    }

    #[test]
    fn requesters_are_isolated_and_reset_removes_state() {
        let registry = RequesterRegistry::new();
        registry.register(1, entry("A", 1));
        registry.register(2, entry("B", 2));
        assert_eq!(registry.registration(2).unwrap().label, "B");
        registry.reset(1);
        assert!(registry.registration(1).is_none());
        assert_eq!(registry.len(), 1);
    }
}
