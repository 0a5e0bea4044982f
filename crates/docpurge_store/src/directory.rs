//! User directory and run-log access.

use crate::error::StoreResult;
use parking_lot::Mutex;
use serde_json::Value;

/// One user record from the directory, with its settings document when
/// the directory could resolve it.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// The directory-level id of the user.
    pub id: String,
    /// The user settings document, if one exists.
    pub doc: Option<Value>,
}

impl DirectoryEntry {
    /// An entry carrying a settings document.
    pub fn with_doc(id: impl Into<String>, doc: Value) -> Self {
        Self { id: id.into(), doc: Some(doc) }
    }

    /// An entry whose settings document is missing.
    pub fn bare(id: impl Into<String>) -> Self {
        Self { id: id.into(), doc: None }
    }
}

/// Source of the user population whose roles drive store grouping.
pub trait UserDirectory: Send + Sync {
    /// Lists all user entries, with settings documents attached.
    fn entries(&self) -> StoreResult<Vec<DirectoryEntry>>;
}

/// Sink for per-run purge log records.
pub trait RunLogStore: Send + Sync {
    /// Persists one run log document.
    fn save(&self, entry: Value) -> StoreResult<()>;
}

/// An in-memory directory seeded with fixed entries.
#[derive(Default)]
pub struct MemoryUserDirectory {
    entries: Mutex<Vec<DirectoryEntry>>,
}

impl MemoryUserDirectory {
    /// Creates a directory with the given entries.
    pub fn with_entries(entries: Vec<DirectoryEntry>) -> Self {
        Self { entries: Mutex::new(entries) }
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn entries(&self) -> StoreResult<Vec<DirectoryEntry>> {
        Ok(self.entries.lock().clone())
    }
}

/// An in-memory run log that keeps every saved entry.
#[derive(Default)]
pub struct MemoryRunLog {
    saved: Mutex<Vec<Value>>,
    fail_next: Mutex<Option<crate::error::StoreError>>,
}

impl MemoryRunLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the saved entries, in order.
    pub fn saved(&self) -> Vec<Value> {
        self.saved.lock().clone()
    }

    /// Makes the next `save` call fail with the given error.
    pub fn fail_next(&self, error: crate::error::StoreError) {
        *self.fail_next.lock() = Some(error);
    }
}

impl RunLogStore for MemoryRunLog {
    fn save(&self, entry: Value) -> StoreResult<()> {
        if let Some(err) = self.fail_next.lock().take() {
            return Err(err);
        }
        self.saved.lock().push(entry);
        Ok(())
    }
}
