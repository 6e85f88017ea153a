use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::{helpers::parse_datetime, models::KvEntry, Database};
use crate::storage::LocalStore;

impl Database {
    pub async fn get_entry(&self, key: &str) -> Result<Option<KvEntry>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let row = conn
                .query_row(
                    "SELECT key, value, updated_at FROM kv_entries WHERE key = ?1",
                    params![key],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;

            match row {
                Some((key, value, updated_at)) => Ok(Some(KvEntry {
                    key,
                    value,
                    updated_at: parse_datetime(&updated_at, "updated_at")?,
                })),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn upsert_entry(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn delete_entry(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl LocalStore for Database {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_entry(key).await?.map(|entry| entry.value))
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.upsert_entry(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.delete_entry(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_overwrites_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();

        db.write("story_index", "2").await.unwrap();
        db.write("story_index", "7").await.unwrap();

        let entry = db.get_entry("story_index").await.unwrap().unwrap();
        assert_eq!(entry.value, "7");
        assert_eq!(db.read("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite3");
        {
            let db = Database::new(path.clone()).unwrap();
            db.write("shop_cart_items", "[]").await.unwrap();
        }

        let db = Database::new(path).unwrap();
        assert_eq!(db.read("shop_cart_items").await.unwrap().as_deref(), Some("[]"));
        db.remove("shop_cart_items").await.unwrap();
        assert_eq!(db.read("shop_cart_items").await.unwrap(), None);
    }
}
