//! Overlap-based continuation over ordered views.
//!
//! Sort keys in the source views are not unique, so resuming "after" a
//! key can silently skip rows that share it. The cursor instead resumes
//! *at* the last row seen, using its document id as the tie-break, and
//! strips that row when the store returns it again.

use docpurge_store::{ViewQuery, ViewRow};

/// A resumable cursor over an ordered view with an adaptive batch size.
#[derive(Debug, Clone)]
pub struct ViewCursor {
    batch_size: usize,
    max_batch_size: usize,
    start: Option<(String, String)>,
    exhausted: bool,
}

impl ViewCursor {
    /// Creates a cursor starting at the top of the view.
    ///
    /// `batch_size` is both the starting size and the ceiling growth may
    /// reach again after shrinking.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            max_batch_size: batch_size,
            start: None,
            exhausted: false,
        }
    }

    /// The current batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// True once the view has been walked to the end.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Builds the query for the current position.
    ///
    /// After the first page the limit is one above the batch size, since
    /// the overlap row comes back again and gets stripped.
    pub fn next_query(&self) -> ViewQuery {
        match &self.start {
            Some((key, doc_id)) => {
                ViewQuery::first(self.batch_size + 1).starting_at(key.clone(), doc_id.clone())
            }
            None => ViewQuery::first(self.batch_size),
        }
    }

    /// Strips the overlap row from a fetched page.
    ///
    /// Does not move the cursor, so a caller can re-fetch the same
    /// position with a smaller batch size after trimming.
    pub fn trim(&self, mut rows: Vec<ViewRow>) -> Vec<ViewRow> {
        if let Some((_, doc_id)) = &self.start {
            if rows.first().is_some_and(|row| row.id == *doc_id) {
                rows.remove(0);
            }
        }
        rows
    }

    /// Moves the cursor past a trimmed page.
    ///
    /// An empty page marks the cursor exhausted; otherwise the last row
    /// becomes the next overlap position.
    pub fn advance(&mut self, page: &[ViewRow]) {
        match page.last() {
            Some(last) => self.start = Some((last.key.clone(), last.id.clone())),
            None => self.exhausted = true,
        }
    }

    /// Halves the batch size, flooring at one.
    ///
    /// Returns false when the size was already one and could not shrink.
    pub fn shrink(&mut self) -> bool {
        if self.batch_size <= 1 {
            return false;
        }
        self.batch_size /= 2;
        true
    }

    /// Doubles the batch size, capped at the starting size.
    pub fn grow(&mut self) {
        self.batch_size = (self.batch_size * 2).min(self.max_batch_size);
    }
}
