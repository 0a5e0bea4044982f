//! Orchestration of a complete purge run.

use chrono::Utc;
use docpurge_store::{PurgeStoreProvider, RunLogStore, SourceStore, StoreError, UserDirectory};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::PurgeConfig;
use crate::contacts::purge_contacts;
use crate::error::PurgeResult;
use crate::policy::PolicyProvider;
use crate::roles::role_groups;
use crate::stores::PurgeStoreManager;
use crate::targets::purge_targets;
use crate::tasks::purge_tasks;
use crate::unallocated::purge_unallocated;

/// How a run request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run was in flight; nothing was done.
    AlreadyRunning,
    /// No policy is configured; nothing was done.
    NoPolicy,
    /// The run executed and wrote its log record.
    ///
    /// Pipeline failures do not prevent this outcome; they are recorded
    /// in the log instead.
    Completed,
}

/// The log record written at the end of every executed run.
#[derive(Debug, Clone, Serialize)]
pub struct PurgeLogEntry {
    /// `purgelog:<epoch-ms>`, or `purgelog:error:<epoch-ms>` on failure.
    #[serde(rename = "_id")]
    pub id: String,
    /// Run start time, ISO-8601.
    pub date: String,
    /// Role list per role-group hash.
    pub roles: BTreeMap<String, Vec<String>>,
    /// Wall-clock run duration in milliseconds.
    pub duration: u64,
    /// Contacts left untouched because their record sets were too large.
    pub skipped_contacts: Vec<String>,
    /// The failure that ended the run early, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Drives purge runs over the configured stores.
///
/// At most one run executes at a time; requests arriving while a run is
/// in flight return immediately.
pub struct PurgeRunner {
    config: PurgeConfig,
    source: Arc<dyn SourceStore>,
    provider: Arc<dyn PurgeStoreProvider>,
    directory: Arc<dyn UserDirectory>,
    run_log: Arc<dyn RunLogStore>,
    policies: Arc<dyn PolicyProvider>,
    running: AtomicBool,
}

impl PurgeRunner {
    /// Creates a runner over the given stores and policy source.
    pub fn new(
        config: PurgeConfig,
        source: Arc<dyn SourceStore>,
        provider: Arc<dyn PurgeStoreProvider>,
        directory: Arc<dyn UserDirectory>,
        run_log: Arc<dyn RunLogStore>,
        policies: Arc<dyn PolicyProvider>,
    ) -> Self {
        Self {
            config,
            source,
            provider,
            directory,
            run_log,
            policies,
            running: AtomicBool::new(false),
        }
    }

    /// Executes one purge run.
    ///
    /// Returns an error only when the run could not be accounted for:
    /// pipeline failures end up in the run log, but a failure to write
    /// that log propagates.
    pub fn run(&self) -> PurgeResult<RunOutcome> {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("purge already running, ignoring request");
            return Ok(RunOutcome::AlreadyRunning);
        }
        let result = self.run_exclusive();
        self.running.store(false, Ordering::SeqCst);
        result
    }

    fn run_exclusive(&self) -> PurgeResult<RunOutcome> {
        let Some(policy) = self.policies.current() else {
            info!("no purge policy configured, skipping run");
            return Ok(RunOutcome::NoPolicy);
        };
        let started = Utc::now();
        let clock = Instant::now();
        info!(db = %self.config.db_name, "purge run starting");

        let mut roles_map = BTreeMap::new();
        let manager =
            PurgeStoreManager::new(self.config.db_name.clone(), Arc::clone(&self.provider));
        let outcome: PurgeResult<Vec<String>> = (|| {
            let groups = role_groups(self.directory.as_ref())?;
            for group in &groups {
                roles_map.insert(group.hash.clone(), group.roles.clone());
            }
            if groups.is_empty() {
                warn!("no user role sets found, nothing to purge");
                return Ok(Vec::new());
            }
            manager.init(&groups)?;
            let skipped = purge_contacts(
                self.source.as_ref(),
                &manager,
                policy.as_ref(),
                &groups,
                &self.config,
            )?;
            purge_unallocated(
                self.source.as_ref(),
                &manager,
                policy.as_ref(),
                &groups,
                &self.config,
            )?;
            let today = started.date_naive();
            purge_tasks(self.source.as_ref(), &manager, &self.config, today)?;
            purge_targets(self.source.as_ref(), &manager, &self.config, today)?;
            Ok(skipped)
        })();
        manager.close_all();

        let (skipped, run_error) = match outcome {
            Ok(skipped) => (skipped, None),
            Err(err) => {
                error!(error = %err, "purge run failed");
                (Vec::new(), Some(err.to_string()))
            }
        };

        let duration = clock.elapsed().as_millis() as u64;
        let millis = started.timestamp_millis();
        let id = match &run_error {
            Some(_) => format!("purgelog:error:{millis}"),
            None => format!("purgelog:{millis}"),
        };
        let entry = PurgeLogEntry {
            id,
            date: started.to_rfc3339(),
            roles: roles_map,
            duration,
            skipped_contacts: skipped,
            error: run_error,
        };
        let entry = serde_json::to_value(&entry)
            .map_err(|err| StoreError::InvalidResponse(err.to_string()))?;
        self.run_log.save(entry)?;
        info!(duration_ms = duration, "purge run finished");
        Ok(RunOutcome::Completed)
    }
}
