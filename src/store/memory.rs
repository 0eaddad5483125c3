use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Namespace, PersistentStore};
use crate::error::StoreError;

/// Process-local store. Used when no database is configured or when the
/// database cannot be opened; contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<Namespace, BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get(&self, ns: Namespace, key: &str) -> Result<Option<String>, StoreError> {
        let guard = self.data.read().await;
        Ok(guard.get(&ns).and_then(|entries| entries.get(key).cloned()))
    }

    async fn set(&self, ns: Namespace, key: &str, value: String) -> Result<(), StoreError> {
        let mut guard = self.data.write().await;
        guard.entry(ns).or_default().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, ns: Namespace, key: &str) -> Result<(), StoreError> {
        let mut guard = self.data.write().await;
        if let Some(entries) = guard.get_mut(&ns) {
            entries.remove(key);
        }
        Ok(())
    }

    async fn keys(&self, ns: Namespace) -> Result<Vec<String>, StoreError> {
        let guard = self.data.read().await;
        Ok(guard
            .get(&ns)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn entries(&self, ns: Namespace) -> Result<Vec<(String, String)>, StoreError> {
        let guard = self.data.read().await;
        Ok(guard
            .get(&ns)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, ns: Namespace) -> Result<usize, StoreError> {
        let guard = self.data.read().await;
        Ok(guard.get(&ns).map(BTreeMap::len).unwrap_or(0))
    }
}
