//! Per-role-group purge stores.

use crate::error::{StoreError, StoreResult};
use crate::types::{ChangeResult, ChangesRequest, ChangesResponse, MarkerWrite};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One logical purge-marker store, scoped to a single role-group.
///
/// A marker present and not deleted means "this document id is purged
/// for this role-group". The engine's state differ is the only writer.
pub trait PurgeStore: Send + Sync {
    /// Reports the current state of the requested marker ids.
    ///
    /// Ids with no marker history are omitted from the response; deleted
    /// markers are reported with their deleted flag set.
    fn changes(&self, request: &ChangesRequest) -> StoreResult<ChangesResponse>;

    /// Applies a batch of marker mutations as one write.
    fn bulk_docs(&self, writes: &[MarkerWrite]) -> StoreResult<()>;

    /// Writes the `_local/info` diagnostics record with the role list.
    ///
    /// Returns [`StoreError::Conflict`] when the record already exists;
    /// callers treat that as success.
    fn put_info(&self, roles: &[String]) -> StoreResult<()>;
}

/// Opens and releases purge stores by name.
pub trait PurgeStoreProvider: Send + Sync {
    /// Opens (creating if necessary) the store with the given name.
    fn open(&self, name: &str) -> StoreResult<Arc<dyn PurgeStore>>;

    /// Releases the handle for the given name.
    fn close(&self, name: &str);
}

#[derive(Debug, Clone)]
struct Marker {
    seq: u64,
    deleted: bool,
}

impl Marker {
    fn rev(&self) -> String {
        format!("{}-mem", self.seq)
    }
}

/// An in-memory purge store for tests and embedders.
///
/// Keeps real marker state (revisions, deletion flags) so diff
/// round-trips behave like a revisioned store, and records every
/// request it receives for assertions.
#[derive(Default)]
pub struct MemoryPurgeStore {
    markers: Mutex<HashMap<String, Marker>>,
    info: Mutex<Option<Vec<String>>>,
    changes_calls: Mutex<Vec<ChangesRequest>>,
    bulk_calls: Mutex<Vec<Vec<MarkerWrite>>>,
    fail_info: Mutex<Option<StoreError>>,
    fail_changes: Mutex<Option<StoreError>>,
    fail_bulk: Mutex<Option<StoreError>>,
}

impl MemoryPurgeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a live marker, as if a previous run had purged `marker_id`.
    pub fn seed_marker(&self, marker_id: &str) {
        self.markers
            .lock()
            .insert(marker_id.to_string(), Marker { seq: 1, deleted: false });
    }

    /// Seeds a deleted marker (purged, then un-purged).
    pub fn seed_deleted_marker(&self, marker_id: &str) {
        self.markers
            .lock()
            .insert(marker_id.to_string(), Marker { seq: 2, deleted: true });
    }

    /// Returns true when the marker is present and not deleted.
    pub fn is_purged(&self, marker_id: &str) -> bool {
        self.markers
            .lock()
            .get(marker_id)
            .is_some_and(|m| !m.deleted)
    }

    /// Returns the stored role list, if the info record was written.
    pub fn info_roles(&self) -> Option<Vec<String>> {
        self.info.lock().clone()
    }

    /// Returns the recorded changes requests.
    pub fn changes_calls(&self) -> Vec<ChangesRequest> {
        self.changes_calls.lock().clone()
    }

    /// Returns the recorded bulk-write batches.
    pub fn bulk_calls(&self) -> Vec<Vec<MarkerWrite>> {
        self.bulk_calls.lock().clone()
    }

    /// Makes the next `put_info` call fail with the given error.
    pub fn fail_next_info(&self, error: StoreError) {
        *self.fail_info.lock() = Some(error);
    }

    /// Makes the next `changes` call fail with the given error.
    pub fn fail_next_changes(&self, error: StoreError) {
        *self.fail_changes.lock() = Some(error);
    }

    /// Makes the next `bulk_docs` call fail with the given error.
    pub fn fail_next_bulk(&self, error: StoreError) {
        *self.fail_bulk.lock() = Some(error);
    }
}

impl PurgeStore for MemoryPurgeStore {
    fn changes(&self, request: &ChangesRequest) -> StoreResult<ChangesResponse> {
        self.changes_calls.lock().push(request.clone());
        if let Some(err) = self.fail_changes.lock().take() {
            return Err(err);
        }
        let markers = self.markers.lock();
        let results = request
            .doc_ids
            .iter()
            .filter_map(|id| {
                markers.get(id).map(|m| ChangeResult {
                    id: id.clone(),
                    rev: m.rev(),
                    deleted: m.deleted,
                })
            })
            .collect();
        Ok(ChangesResponse { results })
    }

    fn bulk_docs(&self, writes: &[MarkerWrite]) -> StoreResult<()> {
        self.bulk_calls.lock().push(writes.to_vec());
        if let Some(err) = self.fail_bulk.lock().take() {
            return Err(err);
        }
        let mut markers = self.markers.lock();
        for write in writes {
            match write {
                MarkerWrite::Create { id } => {
                    let next = markers.get(id).map(|m| m.seq + 1).unwrap_or(1);
                    markers.insert(id.clone(), Marker { seq: next, deleted: false });
                }
                MarkerWrite::Delete { id, rev } => {
                    // Stale revisions are per-document conflicts the
                    // caller ignores, matching bulk-write semantics.
                    if let Some(current) = markers.get_mut(id) {
                        if current.rev() == *rev {
                            current.seq += 1;
                            current.deleted = true;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn put_info(&self, roles: &[String]) -> StoreResult<()> {
        if let Some(err) = self.fail_info.lock().take() {
            return Err(err);
        }
        let mut info = self.info.lock();
        if info.is_some() {
            return Err(StoreError::Conflict("_local/info".into()));
        }
        *info = Some(roles.to_vec());
        Ok(())
    }
}

/// An in-memory provider that creates [`MemoryPurgeStore`]s on demand.
#[derive(Default)]
pub struct MemoryPurgeStoreProvider {
    stores: Mutex<HashMap<String, Arc<MemoryPurgeStore>>>,
    closed: Mutex<Vec<String>>,
}

impl MemoryPurgeStoreProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store for `name`, creating it if needed.
    ///
    /// Useful for seeding marker state before a run.
    pub fn store(&self, name: &str) -> Arc<MemoryPurgeStore> {
        Arc::clone(
            self.stores
                .lock()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryPurgeStore::new())),
        )
    }

    /// Returns the names passed to `close`, in order.
    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().clone()
    }
}

impl PurgeStoreProvider for MemoryPurgeStoreProvider {
    fn open(&self, name: &str) -> StoreResult<Arc<dyn PurgeStore>> {
        Ok(self.store(name))
    }

    fn close(&self, name: &str) {
        self.closed.lock().push(name.to_string());
    }
}
