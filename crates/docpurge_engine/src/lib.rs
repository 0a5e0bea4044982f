//! # docpurge engine
//!
//! Server-side purging for a replicated document store. Purging hides
//! old documents from offline clients without deleting them: for each
//! distinct user role set, a dedicated purge store records marker
//! documents naming the purged ids, and clients with those roles filter
//! them out during replication.
//!
//! A run walks every contact with its subordinate reports and messages,
//! asks the configured [`policy::PurgePolicy`] what to purge per role
//! set, and reconciles the verdicts against each role group's purge
//! store. Records without an owning contact, long-terminal tasks and
//! old aggregate targets are handled by their own pipelines. The
//! [`runner::PurgeRunner`] ties the pipelines together and writes one
//! log record per run.
//!
//! Store access goes through the traits in `docpurge_store`; the engine
//! performs no I/O of its own.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod contacts;
pub mod diff;
pub mod error;
pub mod policy;
pub mod record;
pub mod roles;
pub mod runner;
pub mod stores;
pub mod targets;
pub mod tasks;
pub mod unallocated;
pub mod walker;

pub use config::PurgeConfig;
pub use error::{PurgeError, PurgeResult};
pub use policy::{PolicyError, PolicyProvider, PolicyVerdict, PurgePolicy, StaticPolicyProvider};
pub use roles::RoleGroup;
pub use runner::{PurgeLogEntry, PurgeRunner, RunOutcome};
