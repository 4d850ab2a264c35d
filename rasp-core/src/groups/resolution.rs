use serde::Serialize;

use super::index::{GroupEntry, GroupSnapshot};

/// Upper bound of candidates exposed for disambiguation.
pub const MAX_CANDIDATES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionResult {
    NoMatch,
    SingleMatch(GroupEntry),
    MultipleMatches {
        candidates: Vec<GroupEntry>,
        total: usize,
    },
}

impl ResolutionResult {
    fn from_hits(mut hits: Vec<GroupEntry>) -> Self {
        match hits.len() {
            0 => ResolutionResult::NoMatch,
            1 => ResolutionResult::SingleMatch(hits.remove(0)),
            total => {
                hits.truncate(MAX_CANDIDATES);
                ResolutionResult::MultipleMatches {
                    candidates: hits,
                    total,
                }
            }
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, ResolutionResult::MultipleMatches { .. })
    }
}

/// Resolves `query` against a snapshot. Rules are tried in order and the first
/// one producing hits wins: exact label, digits inside a locator, label substring.
pub fn resolve_in(snapshot: &GroupSnapshot, query: &str) -> ResolutionResult {
    let query = query.trim();
    if query.is_empty() {
        return ResolutionResult::NoMatch;
    }

    if let Some(entry) = snapshot.find_by_label(query) {
        return ResolutionResult::SingleMatch(entry.clone());
    }

    if query.chars().all(|c| c.is_ascii_digit()) {
        let hits: Vec<GroupEntry> = snapshot
            .entries()
            .iter()
            .filter(|entry| entry.locator.contains(query))
            .cloned()
            .collect();
        if !hits.is_empty() {
            return ResolutionResult::from_hits(hits);
        }
    }

    let folded = query.to_lowercase();
    let mut hits: Vec<GroupEntry> = Vec::new();
    for entry in snapshot.entries() {
        let matched =
            entry.label.contains(query) || entry.label.to_lowercase().contains(&folded);
        if matched && !hits.iter().any(|hit| hit.label == entry.label) {
            hits.push(entry.clone());
        }
    }
    ResolutionResult::from_hits(hits)
}
