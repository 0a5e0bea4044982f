//! Purging records that belong to no contact.

use docpurge_store::SourceStore;
use std::collections::HashSet;
use tracing::debug;

use crate::config::PurgeConfig;
use crate::contacts::evaluate_unowned;
use crate::diff::{already_purged, update_purged};
use crate::error::PurgeResult;
use crate::policy::PurgePolicy;
use crate::record;
use crate::roles::RoleGroup;
use crate::stores::PurgeStoreManager;
use crate::walker::ViewCursor;

/// Walks the unassigned-records view and reconciles each page.
///
/// Every document is its own group with an empty contact; reports and
/// messages are told apart by the presence of a form.
pub fn purge_unallocated(
    source: &dyn SourceStore,
    manager: &PurgeStoreManager,
    policy: &dyn PurgePolicy,
    groups: &[RoleGroup],
    config: &PurgeConfig,
) -> PurgeResult<()> {
    let mut cursor = ViewCursor::new(config.max_batch_size);
    while !cursor.is_exhausted() {
        let query = cursor.next_query().with_docs();
        let raw = source.unassigned_records(&query)?;
        let page = cursor.trim(raw);
        if page.is_empty() {
            cursor.advance(&page);
            continue;
        }

        let mut candidates = Vec::new();
        let mut docs = Vec::new();
        for row in &page {
            if record::is_tombstone_id(&row.id) {
                continue;
            }
            let Some(doc) = row.doc.as_ref() else {
                continue;
            };
            candidates.push(row.id.clone());
            docs.push(doc);
        }

        for role_group in groups {
            let mut wanted: HashSet<String> = HashSet::new();
            for (id, doc) in candidates.iter().zip(&docs) {
                if let Some(ids) = evaluate_unowned(policy, &role_group.roles, doc)? {
                    // Only the document under evaluation may be named.
                    wanted.extend(ids.into_iter().filter(|named| named.as_str() == id.as_str()));
                }
            }
            let store = manager.get(&role_group.hash)?;
            let current = already_purged(store.as_ref(), &candidates)?;
            let stats = update_purged(store.as_ref(), &candidates, &wanted, &current)?;
            if stats.writes() > 0 {
                debug!(
                    role_group = %role_group.hash,
                    created = stats.created,
                    removed = stats.removed,
                    "reconciled unallocated batch"
                );
            }
        }
        cursor.advance(&page);
    }
    Ok(())
}
