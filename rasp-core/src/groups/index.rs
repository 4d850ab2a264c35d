use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::error::LoadError;
use super::locator::LocatorPolicy;
use super::resolution::{resolve_in, ResolutionResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub label: String,
    pub locator: String,
}

impl GroupEntry {
    pub fn new(label: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            locator: locator.into(),
        }
    }
}

/// Immutable view of the index; replaced wholesale on every load.
#[derive(Debug, Clone, Default)]
pub struct GroupSnapshot {
    entries: Vec<GroupEntry>,
}

impl GroupSnapshot {
    /// Builds a snapshot keeping the first occurrence of every label.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = GroupEntry>,
    {
        let mut unique: Vec<GroupEntry> = Vec::new();
        for entry in entries {
            if unique.iter().any(|existing| existing.label == entry.label) {
                continue;
            }
            unique.push(entry);
        }
        Self { entries: unique }
    }

    pub fn entries(&self) -> &[GroupEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find_by_label(&self, label: &str) -> Option<&GroupEntry> {
        self.entries.iter().find(|entry| entry.label == label)
    }
}

#[derive(Debug)]
pub struct GroupIndex {
    policy: LocatorPolicy,
    source: RwLock<Option<PathBuf>>,
    snapshot: RwLock<Arc<GroupSnapshot>>,
}

impl GroupIndex {
    pub fn new(policy: LocatorPolicy) -> Self {
        Self {
            policy,
            source: RwLock::new(None),
            snapshot: RwLock::new(Arc::new(GroupSnapshot::default())),
        }
    }

    pub fn with_entries<I>(policy: LocatorPolicy, entries: I) -> Self
    where
        I: IntoIterator<Item = GroupEntry>,
    {
        let index = Self::new(policy);
        let accepted = index.accept(entries);
        index.swap(GroupSnapshot::from_entries(accepted));
        index
    }

    pub fn policy(&self) -> &LocatorPolicy {
        &self.policy
    }

    /// Loads `path` and swaps the snapshot. On failure the index is emptied and
    /// the error is returned for reporting; `resolve` keeps working.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<usize, LoadError> {
        let path = path.as_ref().to_path_buf();
        *self.source.write() = Some(path.clone());
        match read_entries(&path) {
            Ok(entries) => {
                let accepted = self.accept(entries);
                let snapshot = GroupSnapshot::from_entries(accepted);
                let count = snapshot.len();
                self.swap(snapshot);
                info!(path = %path.display(), groups = count, "group index loaded");
                Ok(count)
            }
            Err(err) => {
                self.swap(GroupSnapshot::default());
                warn!(path = %path.display(), error = %err, "group index load failed, index is empty");
                Err(err)
            }
        }
    }

    /// Re-reads the last loaded source. A never-loaded index stays empty.
    pub fn reload(&self) -> Result<usize, LoadError> {
        let source = self.source.read().clone();
        match source {
            Some(path) => self.load(path),
            None => Ok(self.len()),
        }
    }

    pub fn snapshot(&self) -> Arc<GroupSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn resolve(&self, query: &str) -> ResolutionResult {
        resolve_in(&self.snapshot(), query)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn accept<I>(&self, entries: I) -> Vec<GroupEntry>
    where
        I: IntoIterator<Item = GroupEntry>,
    {
        entries
            .into_iter()
            .filter_map(|entry| match self.policy.validate(&entry.locator) {
                Ok(()) => Some(GroupEntry::new(entry.label, entry.locator.trim())),
                Err(err) => {
                    warn!(label = %entry.label, error = %err, "skipping group with invalid locator");
                    None
                }
            })
            .collect()
    }

    fn swap(&self, snapshot: GroupSnapshot) {
        *self.snapshot.write() = Arc::new(snapshot);
    }
}

fn read_entries(path: &Path) -> Result<Vec<GroupEntry>, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| LoadError::Parse {
        source,
        path: path.to_path_buf(),
    })?;
    let Value::Object(map) = value else {
        return Err(LoadError::Shape {
            path: path.to_path_buf(),
        });
    };
    map.into_iter()
        .map(|(label, locator)| match locator {
            Value::String(locator) => Ok(GroupEntry { label, locator }),
            _ => Err(LoadError::InvalidEntry { label }),
        })
        .collect()
}
