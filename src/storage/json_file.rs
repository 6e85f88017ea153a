use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::warn;
use tokio::{sync::Mutex, task};

use super::LocalStore;

/// Flat `key -> value` map kept in one JSON file, rewritten on every change.
///
/// The file is written on the blocking pool. The map lock is held until the
/// write lands, so snapshots reach the disk in the order they were taken.
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read store from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring corrupt store {}: {err}", path.display());
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    async fn persist(&self, data: &BTreeMap<String, String>) -> Result<()> {
        let path = self.path.clone();
        let serialized = serde_json::to_string_pretty(data)?;
        task::spawn_blocking(move || write_file(&path, &serialized))
            .await
            .context("store writer join failed")?
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, contents)
        .with_context(|| format!("Failed to write store to {}", path.display()))
}

#[async_trait]
impl LocalStore for JsonFileStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.data.lock().await;
        guard.insert(key.to_string(), value.to_string());
        self.persist(&guard).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.data.lock().await;
        if guard.remove(key).is_some() {
            self.persist(&guard).await?;
        }
        Ok(())
    }
}
