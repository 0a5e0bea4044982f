//! The contact-rooted purge pipeline.

use docpurge_store::{KeyedQuery, SourceStore, ViewRow};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::config::PurgeConfig;
use crate::diff::{already_purged, update_purged};
use crate::error::PurgeResult;
use crate::policy::{PolicyVerdict, PurgePolicy};
use crate::record::GroupSet;
use crate::roles::RoleGroup;
use crate::stores::PurgeStoreManager;
use crate::walker::ViewCursor;

/// Walks every contact, groups its subordinate records and reconciles
/// the policy's verdicts into each role group's purge store.
///
/// Returns the ids of contacts skipped because their record set exceeded
/// the batch ceiling even at the smallest batch size.
pub fn purge_contacts(
    source: &dyn SourceStore,
    manager: &PurgeStoreManager,
    policy: &dyn PurgePolicy,
    groups: &[RoleGroup],
    config: &PurgeConfig,
) -> PurgeResult<Vec<String>> {
    let mut cursor = ViewCursor::new(config.contact_batch_size);
    let mut skipped = Vec::new();

    while !cursor.is_exhausted() {
        let query = cursor.next_query().with_docs();
        let raw = source.contacts_by_type(&query)?;
        let page = cursor.trim(raw);
        if page.is_empty() {
            cursor.advance(&page);
            continue;
        }

        let mut set = GroupSet::from_contacts(&page);
        let (records, overflowed) = fetch_records(source, &set, config)?;

        if overflowed {
            if cursor.shrink() {
                debug!(batch_size = cursor.batch_size(), "batch overflow, shrinking");
                continue;
            }
            // A single contact exceeding the ceiling cannot be split
            // further; leave it untouched and move on.
            warn!(contact = %page[0].id, "contact exceeds batch ceiling, skipping");
            skipped.push(page[0].id.clone());
            cursor.advance(&page);
            continue;
        }
        if records.len() < config.grow_threshold() {
            cursor.grow();
        }

        let mut candidates: Vec<String> = set.purgeable_contact_ids().to_vec();
        for row in &records {
            candidates.push(row.id.clone());
        }
        for row in &records {
            set.attach(row);
        }

        reconcile_page(manager, policy, groups, &set, &candidates)?;
        cursor.advance(&page);
    }

    Ok(skipped)
}

/// Fetches every record emitted for the batch's subject keys, paging the
/// lookup by offset until a short page arrives.
///
/// The second element is true when the relevant rows reached the batch
/// ceiling, which aborts accumulation.
fn fetch_records(
    source: &dyn SourceStore,
    set: &GroupSet,
    config: &PurgeConfig,
) -> PurgeResult<(Vec<ViewRow>, bool)> {
    let mut relevant = Vec::new();
    let mut skip = 0;
    loop {
        let query = KeyedQuery {
            keys: set.keys().to_vec(),
            skip,
            limit: config.max_batch_size,
            include_docs: true,
        };
        let rows = source.docs_by_replication_key(&query)?;
        let full_page = rows.len() == config.max_batch_size;
        relevant.extend(rows.into_iter().filter(|row| set.is_relevant(row)));
        if relevant.len() >= config.max_batch_size {
            return Ok((relevant, true));
        }
        if !full_page {
            return Ok((relevant, false));
        }
        skip += config.max_batch_size;
    }
}

/// Evaluates the policy for every group and role set, then diffs the
/// verdicts against each role group's purge store.
fn reconcile_page(
    manager: &PurgeStoreManager,
    policy: &dyn PurgePolicy,
    groups: &[RoleGroup],
    set: &GroupSet,
    candidates: &[String],
) -> PurgeResult<()> {
    let universe: HashSet<&str> = candidates.iter().map(String::as_str).collect();
    for role_group in groups {
        let mut wanted: HashSet<String> = HashSet::new();
        for group in set.groups() {
            let verdict = policy.evaluate(
                &role_group.roles,
                &group.contact,
                &group.reports,
                &group.messages,
            )?;
            if let PolicyVerdict::Purge(ids) = verdict {
                // Ids outside this batch are untrusted and dropped.
                wanted.extend(ids.into_iter().filter(|id| universe.contains(id.as_str())));
            }
        }
        let store = manager.get(&role_group.hash)?;
        let current = already_purged(store.as_ref(), candidates)?;
        let stats = update_purged(store.as_ref(), candidates, &wanted, &current)?;
        if stats.writes() > 0 {
            debug!(
                role_group = %role_group.hash,
                created = stats.created,
                removed = stats.removed,
                "reconciled contact batch"
            );
        }
    }
    Ok(())
}

/// Routes one formless or form-bearing unowned document to the policy as
/// its own group with an empty contact.
pub(crate) fn evaluate_unowned(
    policy: &dyn PurgePolicy,
    roles: &[String],
    doc: &Value,
) -> PurgeResult<Option<Vec<String>>> {
    let empty = Value::Object(serde_json::Map::new());
    let single = std::slice::from_ref(doc);
    let verdict = if doc.get("form").is_some() {
        policy.evaluate(roles, &empty, single, &[])?
    } else {
        policy.evaluate(roles, &empty, &[], single)?
    };
    Ok(match verdict {
        PolicyVerdict::Purge(ids) => Some(ids),
        PolicyVerdict::Ignore => None,
    })
}
