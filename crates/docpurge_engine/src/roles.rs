//! Grouping users by their role sets.

use docpurge_store::{StoreResult, UserDirectory};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A distinct role set shared by one or more users.
///
/// The hash is stable under reordering and duplication of the role list,
/// so users with permuted roles land in the same group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGroup {
    /// Hex digest identifying this role set.
    pub hash: String,
    /// The roles, sorted and deduplicated.
    pub roles: Vec<String>,
}

/// Sorts and deduplicates a role list.
fn normalize(roles: &[String]) -> Vec<String> {
    let mut roles = roles.to_vec();
    roles.sort_unstable();
    roles.dedup();
    roles
}

/// Computes the order-insensitive digest of a role list.
pub fn role_hash(roles: &[String]) -> String {
    let normalized = normalize(roles);
    let mut hasher = Sha256::new();
    for role in &normalized {
        hasher.update(role.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn roles_of(doc: &Value) -> Option<Vec<String>> {
    let roles: Vec<String> = doc
        .get("roles")?
        .as_array()?
        .iter()
        .filter_map(|r| r.as_str().map(str::to_string))
        .collect();
    if roles.is_empty() {
        None
    } else {
        Some(roles)
    }
}

/// Derives the distinct role groups of the user population.
///
/// Users without a settings document, without a roles array, or with an
/// empty one contribute nothing. Groups come back ordered by hash so
/// runs are deterministic.
pub fn role_groups(directory: &dyn UserDirectory) -> StoreResult<Vec<RoleGroup>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in directory.entries()? {
        let Some(doc) = entry.doc.as_ref() else {
            continue;
        };
        let Some(roles) = roles_of(doc) else {
            continue;
        };
        let normalized = normalize(&roles);
        groups.entry(role_hash(&normalized)).or_insert(normalized);
    }
    Ok(groups
        .into_iter()
        .map(|(hash, roles)| RoleGroup { hash, roles })
        .collect())
}
