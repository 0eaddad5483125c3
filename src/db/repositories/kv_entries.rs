use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::{connection::Database, helpers::to_usize};
use crate::error::StoreError;
use crate::store::{Namespace, PersistentStore};

impl Database {
    pub async fn get_entry(&self, ns: Namespace, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        self.execute("read entry", move |conn| {
            conn.query_row(
                "SELECT value FROM kv_entries WHERE namespace = ?1 AND key = ?2",
                params![ns.as_str(), key],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
        .await
    }

    pub async fn put_entry(&self, ns: Namespace, key: &str, value: String) -> Result<(), StoreError> {
        let key = key.to_string();
        self.execute("write entry", move |conn| {
            conn.execute(
                "INSERT INTO kv_entries (namespace, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(namespace, key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![ns.as_str(), key, value, Utc::now().to_rfc3339()],
            )
            .map(|_| ())
        })
        .await
    }

    pub async fn delete_entry(&self, ns: Namespace, key: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        self.execute("delete entry", move |conn| {
            conn.execute(
                "DELETE FROM kv_entries WHERE namespace = ?1 AND key = ?2",
                params![ns.as_str(), key],
            )
            .map(|_| ())
        })
        .await
    }

    pub async fn list_keys(&self, ns: Namespace) -> Result<Vec<String>, StoreError> {
        self.execute("list keys", move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT key FROM kv_entries
                 WHERE namespace = ?1
                 ORDER BY rowid ASC",
            )?;
            let keys = stmt
                .query_map(params![ns.as_str()], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(keys)
        })
        .await
    }

    pub async fn list_entries(&self, ns: Namespace) -> Result<Vec<(String, String)>, StoreError> {
        self.execute("list entries", move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT key, value FROM kv_entries
                 WHERE namespace = ?1
                 ORDER BY rowid ASC",
            )?;
            let entries = stmt
                .query_map(params![ns.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<(String, String)>>>()?;
            Ok(entries)
        })
        .await
    }

    pub async fn count_entries(&self, ns: Namespace) -> Result<usize, StoreError> {
        self.execute("count entries", move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM kv_entries WHERE namespace = ?1",
                params![ns.as_str()],
                |row| row.get(0),
            )?;
            to_usize(count, 0)
        })
        .await
    }
}

#[async_trait]
impl PersistentStore for Database {
    async fn get(&self, ns: Namespace, key: &str) -> Result<Option<String>, StoreError> {
        self.get_entry(ns, key).await
    }

    async fn set(&self, ns: Namespace, key: &str, value: String) -> Result<(), StoreError> {
        self.put_entry(ns, key, value).await
    }

    async fn remove(&self, ns: Namespace, key: &str) -> Result<(), StoreError> {
        self.delete_entry(ns, key).await
    }

    async fn keys(&self, ns: Namespace) -> Result<Vec<String>, StoreError> {
        self.list_keys(ns).await
    }

    async fn entries(&self, ns: Namespace) -> Result<Vec<(String, String)>, StoreError> {
        self.list_entries(ns).await
    }

    async fn count(&self, ns: Namespace) -> Result<usize, StoreError> {
        self.count_entries(ns).await
    }
}
