//! Best-effort keyed persistence shared by the story index and the cart.
//!
//! Callers treat every failure as "nothing stored"; backends still report
//! errors so the caller can log them.

mod json_file;

pub use json_file::JsonFileStore;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>>;

    async fn write(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::LocalStore;

    #[derive(Default)]
    pub struct MemoryStore {
        entries: Mutex<HashMap<String, String>>,
    }

    impl MemoryStore {
        pub fn with_entry(key: &str, value: &str) -> Self {
            let store = Self::default();
            store
                .entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            store
        }

        pub fn get(&self, key: &str) -> Option<String> {
            self.entries.lock().unwrap().get(key).cloned()
        }
    }

    #[async_trait]
    impl LocalStore for MemoryStore {
        async fn read(&self, key: &str) -> Result<Option<String>> {
            Ok(self.get(key))
        }

        async fn write(&self, key: &str, value: &str) -> Result<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
    }

    /// Store whose every access fails, like a browser with storage disabled.
    pub struct FailingStore;

    #[async_trait]
    impl LocalStore for FailingStore {
        async fn read(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow!("storage unavailable"))
        }

        async fn write(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("storage unavailable"))
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(anyhow!("storage unavailable"))
        }
    }
}
