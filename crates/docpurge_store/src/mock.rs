//! A mock source store for testing.

use crate::error::{StoreError, StoreResult};
use crate::source::SourceStore;
use crate::types::{KeyedQuery, ViewQuery, ViewRow};
use parking_lot::Mutex;
use std::collections::VecDeque;

type PageResult = StoreResult<Vec<ViewRow>>;

#[derive(Default)]
struct Endpoint<Q> {
    queued: VecDeque<PageResult>,
    calls: Vec<Q>,
}

impl<Q: Clone> Endpoint<Q> {
    fn respond(&mut self, query: &Q) -> PageResult {
        self.calls.push(query.clone());
        self.queued.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// A source store that replays queued responses, one per call.
///
/// Each endpoint records the queries it received, so tests can assert on
/// cursors, limits and keys. When an endpoint's queue runs dry it
/// returns empty pages, which terminates any traversal.
#[derive(Default)]
pub struct MockSourceStore {
    contacts: Mutex<Endpoint<ViewQuery>>,
    replication: Mutex<Endpoint<KeyedQuery>>,
    unassigned: Mutex<Endpoint<ViewQuery>>,
    tasks: Mutex<Endpoint<ViewQuery>>,
    targets: Mutex<Endpoint<ViewQuery>>,
}

impl MockSourceStore {
    /// Creates a mock store with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a contacts page.
    pub fn queue_contacts(&self, rows: Vec<ViewRow>) {
        self.contacts.lock().queued.push_back(Ok(rows));
    }

    /// Queues a contacts error.
    pub fn queue_contacts_error(&self, error: StoreError) {
        self.contacts.lock().queued.push_back(Err(error));
    }

    /// Queues a replication-key page.
    pub fn queue_replication(&self, rows: Vec<ViewRow>) {
        self.replication.lock().queued.push_back(Ok(rows));
    }

    /// Queues a replication-key error.
    pub fn queue_replication_error(&self, error: StoreError) {
        self.replication.lock().queued.push_back(Err(error));
    }

    /// Queues an unassigned-records page.
    pub fn queue_unassigned(&self, rows: Vec<ViewRow>) {
        self.unassigned.lock().queued.push_back(Ok(rows));
    }

    /// Queues a terminal-tasks page.
    pub fn queue_tasks(&self, rows: Vec<ViewRow>) {
        self.tasks.lock().queued.push_back(Ok(rows));
    }

    /// Queues a target-docs page.
    pub fn queue_targets(&self, rows: Vec<ViewRow>) {
        self.targets.lock().queued.push_back(Ok(rows));
    }

    /// Returns the recorded contacts queries.
    pub fn contacts_calls(&self) -> Vec<ViewQuery> {
        self.contacts.lock().calls.clone()
    }

    /// Returns the recorded replication-key queries.
    pub fn replication_calls(&self) -> Vec<KeyedQuery> {
        self.replication.lock().calls.clone()
    }

    /// Returns the recorded unassigned-records queries.
    pub fn unassigned_calls(&self) -> Vec<ViewQuery> {
        self.unassigned.lock().calls.clone()
    }

    /// Returns the recorded terminal-tasks queries.
    pub fn tasks_calls(&self) -> Vec<ViewQuery> {
        self.tasks.lock().calls.clone()
    }

    /// Returns the recorded target-docs queries.
    pub fn targets_calls(&self) -> Vec<ViewQuery> {
        self.targets.lock().calls.clone()
    }
}

impl SourceStore for MockSourceStore {
    fn contacts_by_type(&self, query: &ViewQuery) -> StoreResult<Vec<ViewRow>> {
        self.contacts.lock().respond(query)
    }

    fn docs_by_replication_key(&self, query: &KeyedQuery) -> StoreResult<Vec<ViewRow>> {
        self.replication.lock().respond(query)
    }

    fn unassigned_records(&self, query: &ViewQuery) -> StoreResult<Vec<ViewRow>> {
        self.unassigned.lock().respond(query)
    }

    fn terminal_tasks(&self, query: &ViewQuery) -> StoreResult<Vec<ViewRow>> {
        self.tasks.lock().respond(query)
    }

    fn target_docs(&self, query: &ViewQuery) -> StoreResult<Vec<ViewRow>> {
        self.targets.lock().respond(query)
    }
}
