pub mod memory;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

/// Short-lived key/value store holding hash-shaped entries, in the manner
/// of a Redis hash with an expiry.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Returns the fields of a live entry, `None` if absent or expired.
    async fn get(&self, key: &str) -> anyhow::Result<Option<HashMap<String, String>>>;

    /// Sets the given fields on the entry, keeping the others, and restarts
    /// its expiry window.
    async fn merge(
        &self,
        key: &str,
        fields: HashMap<String, String>,
        ttl: Duration,
    ) -> anyhow::Result<()>;

    /// Removes the entry. Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> anyhow::Result<bool>;
}
