//! The source document store consumed by the purge engine.

use crate::error::StoreResult;
use crate::types::{KeyedQuery, ViewQuery, ViewRow};

/// Read access to the replication-relevant views of the source store.
///
/// One method per upstream index, so an implementation maps directly to
/// named view endpoints. All methods return rows in index order; the
/// engine relies on stable ordering for its overlap-based continuation.
pub trait SourceStore: Send + Sync {
    /// Contacts ordered by contact type, then natural key.
    fn contacts_by_type(&self, query: &ViewQuery) -> StoreResult<Vec<ViewRow>>;

    /// All documents emitted for a set of replication keys, with offset
    /// paging independent of any outer cursor.
    fn docs_by_replication_key(&self, query: &KeyedQuery) -> StoreResult<Vec<ViewRow>>;

    /// Documents with no owning contact.
    fn unassigned_records(&self, query: &ViewQuery) -> StoreResult<Vec<ViewRow>>;

    /// Task documents keyed by the date they became terminal.
    fn terminal_tasks(&self, query: &ViewQuery) -> StoreResult<Vec<ViewRow>>;

    /// Aggregate target documents, keyed by id (`target~<period>~...`).
    fn target_docs(&self, query: &ViewQuery) -> StoreResult<Vec<ViewRow>>;
}
