//! Namespaced key/value persistence shared by every component.
//!
//! Values are always codec-encoded text; the store never interprets them.
//! Writes to the same key are last-write-wins and there is no transaction
//! spanning keys.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Logical dataset. Each component reads and writes only its own namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Namespace {
    Tiles,
    Measurements,
    SyncQueue,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Tiles => "tiles",
            Namespace::Measurements => "measurements",
            Namespace::SyncQueue => "syncqueue",
        }
    }
}

#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get(&self, ns: Namespace, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, ns: Namespace, key: &str, value: String) -> Result<(), StoreError>;

    async fn remove(&self, ns: Namespace, key: &str) -> Result<(), StoreError>;

    async fn keys(&self, ns: Namespace) -> Result<Vec<String>, StoreError>;

    /// Snapshot of every `(key, value)` pair in the namespace.
    async fn entries(&self, ns: Namespace) -> Result<Vec<(String, String)>, StoreError>;

    async fn count(&self, ns: Namespace) -> Result<usize, StoreError> {
        Ok(self.keys(ns).await?.len())
    }

    /// Visit every entry of a namespace snapshot in store order.
    async fn iterate(
        &self,
        ns: Namespace,
        visitor: &mut (dyn for<'a> FnMut(&'a str, &'a str) + Send),
    ) -> Result<(), StoreError> {
        for (key, value) in self.entries(ns).await? {
            visitor(&key, &value);
        }
        Ok(())
    }
}
