//! Process-local cache backend.
//!
//! Entries expire lazily: an expired entry is invisible to readers and is
//! dropped on the next write to its key or by `purge_expired`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SessionCache;

#[derive(Debug, Default, Clone)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

#[derive(Debug, Clone)]
struct Entry {
    fields: HashMap<String, String>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }
}

#[async_trait]
impl SessionCache for InMemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<HashMap<String, String>>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.fields.clone()))
    }

    async fn merge(
        &self,
        key: &str,
        fields: HashMap<String, String>,
        ttl: Duration,
    ) -> anyhow::Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            fields: HashMap::new(),
            expires_at: now,
        });

        if !entry.is_live(now) {
            entry.fields.clear();
        }
        for (field, value) in fields {
            if !value.trim().is_empty() {
                entry.fields.insert(field, value);
            }
        }
        entry.expires_at = now + ttl;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        Ok(entries
            .remove(key)
            .map(|entry| entry.is_live(now))
            .unwrap_or(false))
    }
}
