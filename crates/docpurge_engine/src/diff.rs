//! Diffing desired purge state against a purge store.

use docpurge_store::{marker_id, original_id, ChangesRequest, MarkerWrite, PurgeStore, StoreResult};
use std::collections::{HashMap, HashSet};

/// Counts of marker writes applied by one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    /// Markers created (documents newly purged).
    pub created: usize,
    /// Markers deleted (documents un-purged).
    pub removed: usize,
}

impl DiffStats {
    /// Total writes applied.
    pub fn writes(&self) -> usize {
        self.created + self.removed
    }
}

/// Fetches the live purge markers for the given document ids.
///
/// Returns a map from document id to the marker's current revision.
/// Deleted markers are omitted. An empty id list yields an empty map
/// without touching the store.
pub fn already_purged(
    store: &dyn PurgeStore,
    doc_ids: &[String],
) -> StoreResult<HashMap<String, String>> {
    if doc_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let marker_ids = doc_ids.iter().map(|id| marker_id(id)).collect();
    let response = store.changes(&ChangesRequest::for_ids(marker_ids))?;
    let mut current = HashMap::new();
    for change in response.results {
        if change.deleted {
            continue;
        }
        if let Some(doc_id) = original_id(&change.id) {
            current.insert(doc_id.to_string(), change.rev);
        }
    }
    Ok(current)
}

/// Reconciles the wanted purge set against the store's current markers.
///
/// Walks `candidates` in order, creating markers for newly wanted ids and
/// deleting markers for ids no longer wanted. Ids already in the desired
/// state produce no write; an empty write set skips the bulk call.
pub fn update_purged(
    store: &dyn PurgeStore,
    candidates: &[String],
    wanted: &HashSet<String>,
    current: &HashMap<String, String>,
) -> StoreResult<DiffStats> {
    let mut writes = Vec::new();
    let mut stats = DiffStats::default();
    let mut seen = HashSet::new();
    for id in candidates {
        if !seen.insert(id.as_str()) {
            continue;
        }
        match (wanted.contains(id), current.get(id)) {
            (true, None) => {
                writes.push(MarkerWrite::Create { id: marker_id(id) });
                stats.created += 1;
            }
            (false, Some(rev)) => {
                writes.push(MarkerWrite::Delete {
                    id: marker_id(id),
                    rev: rev.clone(),
                });
                stats.removed += 1;
            }
            _ => {}
        }
    }
    if !writes.is_empty() {
        store.bulk_docs(&writes)?;
    }
    Ok(stats)
}
