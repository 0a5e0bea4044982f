//! Purging tasks that reached a terminal state long ago.

use chrono::{Days, NaiveDate};
use docpurge_store::SourceStore;
use std::collections::HashSet;
use tracing::debug;

use crate::config::PurgeConfig;
use crate::diff::{already_purged, update_purged};
use crate::error::PurgeResult;
use crate::stores::PurgeStoreManager;
use crate::walker::ViewCursor;

/// The last terminal date still old enough to purge.
pub fn task_cutoff(today: NaiveDate, retention_days: u64) -> NaiveDate {
    today
        .checked_sub_days(Days::new(retention_days))
        .unwrap_or(today)
}

/// Purges every task whose terminal date is at or before the cutoff.
///
/// Tasks are purged for every role group without consulting the policy;
/// a task that old is of no use to anyone.
pub fn purge_tasks(
    source: &dyn SourceStore,
    manager: &PurgeStoreManager,
    config: &PurgeConfig,
    today: NaiveDate,
) -> PurgeResult<()> {
    let end_key = task_cutoff(today, config.task_retention_days)
        .format("%Y-%m-%d")
        .to_string();
    let mut cursor = ViewCursor::new(config.max_batch_size);
    while !cursor.is_exhausted() {
        let query = cursor.next_query().ending_at(end_key.clone());
        let rows = source.terminal_tasks(&query)?;
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
                debug!(role_group = %hash, created = stats.created, "purged stale tasks");
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

    fn setup(role_sets: &[&[&str]]) -> (Vec<RoleGroup>, Arc<MemoryPurgeStoreProvider>, PurgeStoreManager) {
        let groups: Vec<RoleGroup> = role_sets
            .iter()
            .map(|roles| {
                let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
                RoleGroup {
                    hash: role_hash(&roles),
                    roles,
                }
            })
            .collect();
        let provider = Arc::new(MemoryPurgeStoreProvider::new());
        let manager = PurgeStoreManager::new("medic", Arc::clone(&provider) as Arc<dyn docpurge_store::PurgeStoreProvider>);
        manager.init(&groups).unwrap();
        (groups, provider, manager)
    }

    #[test]
    fn cutoff_is_sixty_days_back() {
        assert_eq!(task_cutoff(date("2026-03-02"), 60), date("2026-01-01"));
    }

    #[test]
    fn retention_boundary_splits_at_the_end_key() {
        // End keys are inclusive, so a task terminal exactly 60 days ago
        // or earlier falls inside the range and a fresher one does not.
        let end_key = task_cutoff(date("2026-03-02"), 60)
            .format("%Y-%m-%d")
            .to_string();
        let sixty_one_days_old = "2025-12-31";
        let fifty_nine_days_old = "2026-01-02";
        assert!(sixty_one_days_old <= end_key.as_str());
        assert!(fifty_nine_days_old > end_key.as_str());
    }

    #[test]
    fn purges_old_tasks_for_every_role_group() {
        let source = MockSourceStore::new();
        source.queue_tasks(vec![
            ViewRow::bare("task1", "2025-12-01"),
            ViewRow::bare("task2", "2025-12-20"),
        ]);

        let (groups, provider, manager) = setup(&[&["chw"], &["supervisor"]]);
        let config = PurgeConfig::new("medic");
        purge_tasks(&source, &manager, &config, date("2026-03-02")).unwrap();

        let calls = source.tasks_calls();
        assert_eq!(calls[0].end_key.as_deref(), Some("2026-01-01"));
        assert!(!calls[0].include_docs);

        for group in &groups {
            let store = provider.store(&format!("medic-purged-role-{}", group.hash));
            assert!(store.is_purged(&marker_id("task1")));
            assert!(store.is_purged(&marker_id("task2")));
        }
    }

    #[test]
    fn already_purged_tasks_are_not_rewritten() {
        let source = MockSourceStore::new();
        source.queue_tasks(vec![ViewRow::bare("task1", "2025-12-01")]);

        let (groups, provider, manager) = setup(&[&["chw"]]);
        let store = provider.store(&format!("medic-purged-role-{}", groups[0].hash));
        store.seed_marker(&marker_id("task1"));

        let config = PurgeConfig::new("medic");
        purge_tasks(&source, &manager, &config, date("2026-03-02")).unwrap();
        assert!(store.bulk_calls().is_empty());
    }

    #[test]
    fn pages_until_view_is_exhausted() {
        let source = MockSourceStore::new();
        source.queue_tasks(vec![
            ViewRow::bare("task1", "2025-11-01"),
            ViewRow::bare("task2", "2025-11-02"),
        ]);
        source.queue_tasks(vec![
            ViewRow::bare("task2", "2025-11-02"),
            ViewRow::bare("task3", "2025-11-03"),
        ]);
        source.queue_tasks(vec![ViewRow::bare("task3", "2025-11-03")]);

        let (groups, provider, manager) = setup(&[&["chw"]]);
        let config = PurgeConfig::new("medic").with_max_batch_size(2);
        purge_tasks(&source, &manager, &config, date("2026-03-02")).unwrap();

        let calls = source.tasks_calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].start_key.as_deref(), Some("2025-11-02"));
        assert_eq!(calls[1].end_key.as_deref(), Some("2026-01-01"));

        let store = provider.store(&format!("medic-purged-role-{}", groups[0].hash));
        assert!(store.is_purged(&marker_id("task3")));
    }
}
