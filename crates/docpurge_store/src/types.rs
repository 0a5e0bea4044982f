//! Query, row, change-feed and marker types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Id prefix for purge markers.
pub const MARKER_PREFIX: &str = "purged:";

/// Builds the purge-marker id for a document id.
pub fn marker_id(doc_id: &str) -> String {
    format!("{MARKER_PREFIX}{doc_id}")
}

/// Extracts the original document id from a purge-marker id.
///
/// Returns `None` when the id does not carry the marker prefix.
pub fn original_id(marker_id: &str) -> Option<&str> {
    marker_id.strip_prefix(MARKER_PREFIX)
}

/// A paginated view query against an ordered index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    /// Maximum number of rows to return.
    pub limit: usize,
    /// Sort key to start from (inclusive).
    pub start_key: Option<String>,
    /// Document id tie-break for the start key.
    pub start_doc_id: Option<String>,
    /// Sort key to stop at (inclusive).
    pub end_key: Option<String>,
    /// Whether to include full documents in the rows.
    pub include_docs: bool,
}

impl ViewQuery {
    /// Creates a query for the first `limit` rows of an index.
    pub fn first(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Sets the start cursor (key and doc-id tie-break).
    pub fn starting_at(mut self, key: impl Into<String>, doc_id: impl Into<String>) -> Self {
        self.start_key = Some(key.into());
        self.start_doc_id = Some(doc_id.into());
        self
    }

    /// Sets the end key.
    pub fn ending_at(mut self, key: impl Into<String>) -> Self {
        self.end_key = Some(key.into());
        self
    }

    /// Requests full documents with each row.
    pub fn with_docs(mut self) -> Self {
        self.include_docs = true;
        self
    }
}

/// A bulk lookup by replication key with offset paging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedQuery {
    /// Keys to match.
    pub keys: Vec<String>,
    /// Number of matching rows to skip.
    pub skip: usize,
    /// Maximum number of rows to return.
    pub limit: usize,
    /// Whether to include full documents in the rows.
    pub include_docs: bool,
}

/// One row of a view response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    /// Document id.
    pub id: String,
    /// Emitted sort key.
    pub key: String,
    /// Emitted value, when the view emits one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Full document, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
}

impl ViewRow {
    /// Creates a row with a document attached.
    pub fn with_doc(id: impl Into<String>, key: impl Into<String>, doc: Value) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            value: None,
            doc: Some(doc),
        }
    }

    /// Creates a bare row (id and key only).
    pub fn bare(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            value: None,
            doc: None,
        }
    }

    /// Attaches an emitted value.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Returns the submitter recorded in the emitted value, if any.
    pub fn submitter(&self) -> Option<&str> {
        self.value.as_ref()?.get("submitter")?.as_str()
    }
}

/// A change-feed request filtered to specific document ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangesRequest {
    /// Marker ids to report on.
    pub doc_ids: Vec<String>,
    /// Batch-size hint passed through to the store.
    pub batch_size: usize,
    /// Sequence-interval hint passed through to the store.
    pub seq_interval: usize,
}

impl ChangesRequest {
    /// Builds a request for the given marker ids with the standard hints
    /// (`batch_size` one above the id count, `seq_interval` equal to it).
    pub fn for_ids(doc_ids: Vec<String>) -> Self {
        let n = doc_ids.len();
        Self {
            doc_ids,
            batch_size: n + 1,
            seq_interval: n,
        }
    }
}

/// One entry of a change-feed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeResult {
    /// Document id.
    pub id: String,
    /// Current revision.
    pub rev: String,
    /// Whether the document is deleted at this revision.
    pub deleted: bool,
}

impl ChangeResult {
    /// Creates a live change entry.
    pub fn live(id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: rev.into(),
            deleted: false,
        }
    }

    /// Creates a deleted change entry.
    pub fn deleted(id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: rev.into(),
            deleted: true,
        }
    }
}

/// A change-feed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangesResponse {
    /// Matched changes.
    pub results: Vec<ChangeResult>,
}

/// A single purge-marker mutation in a bulk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerWrite {
    /// Create a marker for a newly purged document.
    Create {
        /// Marker id (`purged:<doc-id>`).
        id: String,
    },
    /// Delete an existing marker, un-purging the document.
    Delete {
        /// Marker id (`purged:<doc-id>`).
        id: String,
        /// Revision being deleted.
        rev: String,
    },
}

impl MarkerWrite {
    /// Returns the marker id of this write.
    pub fn id(&self) -> &str {
        match self {
            MarkerWrite::Create { id } => id,
            MarkerWrite::Delete { id, .. } => id,
        }
    }
}
