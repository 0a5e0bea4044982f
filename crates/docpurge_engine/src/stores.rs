//! Lifecycle of the per-role-group purge stores.

use docpurge_store::{PurgeStore, PurgeStoreProvider, StoreResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::roles::RoleGroup;

/// Derives the purge store name for a role-group hash.
pub fn store_name(db_name: &str, hash: &str) -> String {
    format!("{db_name}-purged-role-{hash}")
}

struct ManagedStore {
    hash: String,
    name: String,
    store: Arc<dyn PurgeStore>,
}

/// Opens one purge store per role group and releases them afterwards.
///
/// Handles are cached by role-group hash for the duration of a run.
pub struct PurgeStoreManager {
    db_name: String,
    provider: Arc<dyn PurgeStoreProvider>,
    stores: Mutex<Vec<ManagedStore>>,
}

impl PurgeStoreManager {
    /// Creates a manager with no stores open.
    pub fn new(db_name: impl Into<String>, provider: Arc<dyn PurgeStoreProvider>) -> Self {
        Self {
            db_name: db_name.into(),
            provider,
            stores: Mutex::new(Vec::new()),
        }
    }

    /// Opens the store for each role group and writes its diagnostics
    /// record.
    ///
    /// The diagnostics write conflicts when the store already carries one
    /// from an earlier run; that conflict is swallowed.
    pub fn init(&self, groups: &[RoleGroup]) -> StoreResult<()> {
        let mut stores = self.stores.lock();
        for group in groups {
            let name = store_name(&self.db_name, &group.hash);
            let store = self.provider.open(&name)?;
            match store.put_info(&group.roles) {
                Ok(()) => debug!(store = %name, "wrote purge store info"),
                Err(err) if err.is_conflict() => {}
                Err(err) => return Err(err),
            }
            stores.push(ManagedStore {
                hash: group.hash.clone(),
                name,
                store,
            });
        }
        Ok(())
    }

    /// Returns the store for a role-group hash, opening it on a cache
    /// miss.
    pub fn get(&self, hash: &str) -> StoreResult<Arc<dyn PurgeStore>> {
        let mut stores = self.stores.lock();
        if let Some(managed) = stores.iter().find(|m| m.hash == hash) {
            return Ok(Arc::clone(&managed.store));
        }
        let name = store_name(&self.db_name, hash);
        let store = self.provider.open(&name)?;
        stores.push(ManagedStore {
            hash: hash.to_string(),
            name,
            store: Arc::clone(&store),
        });
        Ok(store)
    }

    /// Snapshots the open stores with their role-group hashes, in the
    /// order they were opened.
    pub fn handles(&self) -> Vec<(String, Arc<dyn PurgeStore>)> {
        self.stores
            .lock()
            .iter()
            .map(|m| (m.hash.clone(), Arc::clone(&m.store)))
            .collect()
    }

    /// Releases every open store.
    pub fn close_all(&self) {
        for managed in self.stores.lock().drain(..) {
            self.provider.close(&managed.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpurge_store::{MemoryPurgeStoreProvider, StoreError};

    fn group(hash: &str, roles: &[&str]) -> RoleGroup {
        RoleGroup {
            hash: hash.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn opens_one_store_per_group_with_info() {
        let provider = Arc::new(MemoryPurgeStoreProvider::new());
        let manager = PurgeStoreManager::new("medic", Arc::clone(&provider) as Arc<dyn PurgeStoreProvider>);
        manager
            .init(&[group("aaa", &["chw"]), group("bbb", &["chw", "supervisor"])])
            .unwrap();

        assert_eq!(manager.handles().len(), 2);
        let store = provider.store("medic-purged-role-aaa");
        assert_eq!(store.info_roles(), Some(vec!["chw".to_string()]));

        manager.close_all();
        assert_eq!(
            provider.closed(),
            vec![
                "medic-purged-role-aaa".to_string(),
                "medic-purged-role-bbb".to_string()
            ]
        );
        assert!(manager.handles().is_empty());
    }

    #[test]
    fn get_reopens_after_cache_miss() {
        let provider = Arc::new(MemoryPurgeStoreProvider::new());
        let manager = PurgeStoreManager::new("medic", Arc::clone(&provider) as Arc<dyn PurgeStoreProvider>);

        // Nothing initialized: get opens on demand, without an info write.
        let store = manager.get("ccc").unwrap();
        store.put_info(&["chw".into()]).unwrap();
        assert_eq!(manager.handles().len(), 1);

        // A second get hits the cache.
        manager.get("ccc").unwrap();
        assert_eq!(manager.handles().len(), 1);
    }

    #[test]
    fn info_conflict_is_swallowed() {
        let provider = Arc::new(MemoryPurgeStoreProvider::new());
        provider
            .store("medic-purged-role-aaa")
            .put_info(&["chw".into()])
            .unwrap();

        let manager = PurgeStoreManager::new("medic", Arc::clone(&provider) as Arc<dyn PurgeStoreProvider>);
        manager.init(&[group("aaa", &["chw"])]).unwrap();
        assert_eq!(manager.handles().len(), 1);
    }

    #[test]
    fn other_info_errors_propagate() {
        let provider = Arc::new(MemoryPurgeStoreProvider::new());
        provider
            .store("medic-purged-role-aaa")
            .fail_next_info(StoreError::transport("down"));

        let manager = PurgeStoreManager::new("medic", Arc::clone(&provider) as Arc<dyn PurgeStoreProvider>);
        assert!(manager.init(&[group("aaa", &["chw"])]).is_err());
    }
}
