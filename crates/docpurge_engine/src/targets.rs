//! Purging aggregate target documents for old reporting periods.

use chrono::{Months, NaiveDate};
use docpurge_store::SourceStore;
use std::collections::HashSet;
use tracing::debug;

use crate::config::PurgeConfig;
use crate::diff::{already_purged, update_purged};
use crate::error::PurgeResult;
use crate::stores::PurgeStoreManager;
use crate::walker::ViewCursor;

const TARGET_PREFIX: &str = "target~";

/// The exclusive upper id bound for purgeable target documents.
///
/// Target ids embed their period (`target~YYYY-MM~...`), so everything
/// below `target~<cutoff period>~` is older than the retention window.
pub fn target_end_key(today: NaiveDate, retention_months: u32) -> String {
    let cutoff = today
        .checked_sub_months(Months::new(retention_months))
        .unwrap_or(today);
    format!("{TARGET_PREFIX}{}~", cutoff.format("%Y-%m"))
}

/// Purges every target document from periods past retention, for every
/// role group, without consulting the policy.
pub fn purge_targets(
    source: &dyn SourceStore,
    manager: &PurgeStoreManager,
    config: &PurgeConfig,
    today: NaiveDate,
) -> PurgeResult<()> {
    let end_key = target_end_key(today, config.target_retention_months);
    let mut cursor = ViewCursor::new(config.max_batch_size);
    let mut first = true;
    while !cursor.is_exhausted() {
        let mut query = cursor.next_query().ending_at(end_key.clone());
        if first {
            query.start_key = Some(TARGET_PREFIX.to_string());
            first = false;
        }
        let rows = source.target_docs(&query)?;
        let page = cursor.trim(rows);
        if page.is_empty() {
            cursor.advance(&page);
            continue;
        }

        let ids: Vec<String> = page.iter().map(|row| row.id.clone()).collect();
        let wanted: HashSet<String> = ids.iter().cloned().collect();
        for (hash, store) in manager.handles() {
            let current = already_purged(store.as_ref(), &ids)?;
            let stats = update_purged(store.as_ref(), &ids, &wanted, &current)?;
            if stats.created > 0 {
                debug!(role_group = %hash, created = stats.created, "purged stale targets");
            }
        }
        cursor.advance(&page);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{role_hash, RoleGroup};
    use docpurge_store::{marker_id, MemoryPurgeStoreProvider, MockSourceStore, ViewRow};
    use std::sync::Arc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn target(id: &str) -> ViewRow {
        ViewRow::bare(id, id)
    }

    #[test]
    fn end_key_is_six_months_back() {
        assert_eq!(target_end_key(date("2026-08-15"), 6), "target~2026-02~");
        assert_eq!(target_end_key(date("2026-03-31"), 6), "target~2025-09~");
    }

    #[test]
    fn purges_old_targets_for_every_role_group() {
        let source = MockSourceStore::new();
        source.queue_targets(vec![
            target("target~2025-10~c1~user1"),
            target("target~2025-11~c2~user2"),
        ]);

        let roles = vec!["chw".to_string()];
        let groups = vec![RoleGroup {
            hash: role_hash(&roles),
            roles,
        }];
        let provider = Arc::new(MemoryPurgeStoreProvider::new());
        let manager = PurgeStoreManager::new("medic", Arc::clone(&provider) as Arc<dyn docpurge_store::PurgeStoreProvider>);
        manager.init(&groups).unwrap();

        let config = PurgeConfig::new("medic");
        purge_targets(&source, &manager, &config, date("2026-08-15")).unwrap();

        let calls = source.targets_calls();
        assert_eq!(calls[0].start_key.as_deref(), Some("target~"));
        assert_eq!(calls[0].end_key.as_deref(), Some("target~2026-02~"));
        assert!(!calls[0].include_docs);

        let store = provider.store(&format!("medic-purged-role-{}", groups[0].hash));
        assert!(store.is_purged(&marker_id("target~2025-10~c1~user1")));
        assert!(store.is_purged(&marker_id("target~2025-11~c2~user2")));
    }

    #[test]
    fn continuation_resumes_at_last_target_id() {
        let source = MockSourceStore::new();
        source.queue_targets(vec![
            target("target~2025-10~c1~user1"),
            target("target~2025-10~c2~user1"),
        ]);
        source.queue_targets(vec![target("target~2025-10~c2~user1")]);

        let roles = vec!["chw".to_string()];
        let groups = vec![RoleGroup {
            hash: role_hash(&roles),
            roles,
        }];
        let provider = Arc::new(MemoryPurgeStoreProvider::new());
        let manager = PurgeStoreManager::new("medic", Arc::clone(&provider) as Arc<dyn docpurge_store::PurgeStoreProvider>);
        manager.init(&groups).unwrap();

        let config = PurgeConfig::new("medic").with_max_batch_size(2);
        purge_targets(&source, &manager, &config, date("2026-08-15")).unwrap();

        let calls = source.targets_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].start_key.as_deref(), Some("target~2025-10~c2~user1"));
        assert_eq!(calls[1].start_doc_id.as_deref(), Some("target~2025-10~c2~user1"));
        assert_eq!(calls[1].limit, 3);
    }
}
