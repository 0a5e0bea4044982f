//! # docpurge store interfaces
//!
//! Interface types and traits for the stores the purge engine talks to.
//!
//! This crate provides:
//! - View/query types (`ViewQuery`, `KeyedQuery`, `ViewRow`)
//! - Change-feed types (`ChangesRequest`, `ChangesResponse`)
//! - Purge-marker write types (`MarkerWrite`)
//! - The consumed store traits (`SourceStore`, `PurgeStore`,
//!   `PurgeStoreProvider`, `UserDirectory`, `RunLogStore`)
//! - In-memory and mock implementations for tests and embedders
//!
//! This is a pure interface crate with no network I/O of its own; a
//! deployment supplies implementations backed by its actual document
//! store.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod error;
mod mock;
mod purge;
mod source;
mod types;

pub use directory::{DirectoryEntry, MemoryRunLog, MemoryUserDirectory, RunLogStore, UserDirectory};
pub use error::{StoreError, StoreResult};
pub use mock::MockSourceStore;
pub use purge::{MemoryPurgeStore, MemoryPurgeStoreProvider, PurgeStore, PurgeStoreProvider};
pub use source::SourceStore;
pub use types::{
    marker_id, original_id, ChangeResult, ChangesRequest, ChangesResponse, KeyedQuery, MarkerWrite,
    ViewQuery, ViewRow, MARKER_PREFIX,
};
