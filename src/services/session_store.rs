//! Write-through session storage: the fast cache is the read path, the
//! durable `session_fields` table is the system of record.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::cache::SessionCache;
use crate::config::AppConfig;
use crate::db::{self, queries, Db};
use crate::models::session::fields;
use crate::models::{Professional, Session, SessionPatch};

const LISTING_FIELD: &str = "professionals";

pub struct SessionStore {
    cache: Arc<dyn SessionCache>,
    db: Db,
    ttl: Duration,
    listing_ttl: Duration,
}

fn session_key(conversation_id: &str) -> String {
    format!("session:{conversation_id}")
}

fn listing_key(city: &str, service_type: &str) -> String {
    format!(
        "professionals:{}:{}",
        city.trim().to_lowercase(),
        service_type.trim().to_lowercase()
    )
}

impl SessionStore {
    pub fn new(cache: Arc<dyn SessionCache>, db: Db, ttl: Duration, listing_ttl: Duration) -> Self {
        Self {
            cache,
            db,
            ttl,
            listing_ttl,
        }
    }

    pub fn from_config(cache: Arc<dyn SessionCache>, db: Db, config: &AppConfig) -> Self {
        Self::new(
            cache,
            db,
            Duration::from_secs(config.session_ttl_secs),
            Duration::from_secs(config.professional_list_ttl_secs),
        )
    }

    /// Reads the session from the cache. A miss, or an entry without a
    /// stage, falls back to the durable rows; cached values win on
    /// conflict and the combined view is written back to the cache.
    pub async fn load(&self, conversation_id: &str) -> anyhow::Result<Session> {
        let key = session_key(conversation_id);
        let cached = match self.cache.get(&key).await {
            Ok(entry) => entry.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "session cache read failed, using durable store");
                Default::default()
            }
        };

        if cached.contains_key(fields::STAGE) {
            return Ok(Session::from_fields(conversation_id, &cached));
        }

        let mut merged = {
            let conn = db::lock(&self.db)?;
            queries::load_session_fields(&conn, conversation_id)
                .context("failed to load durable session")?
        };
        if merged.is_empty() && cached.is_empty() {
            return Ok(Session::new(conversation_id));
        }
        merged.extend(cached);

        if let Err(e) = self.cache.merge(&key, merged.clone(), self.ttl).await {
            tracing::warn!(conversation_id, error = %e, "failed to warm session cache");
        }

        Ok(Session::from_fields(conversation_id, &merged))
    }

    /// Writes the patch to the durable store, then to the cache with a
    /// fresh sliding TTL. If the cache write fails the cached entry is
    /// evicted, so the next load reads the durable rows.
    pub async fn merge(&self, conversation_id: &str, patch: SessionPatch) -> anyhow::Result<()> {
        if patch.is_empty() {
            return Ok(());
        }

        {
            let conn = db::lock(&self.db)?;
            queries::upsert_session_fields(&conn, conversation_id, &patch)
                .context("failed to persist session fields")?;
        }

        let key = session_key(conversation_id);
        if let Err(e) = self.cache.merge(&key, patch.into_map(), self.ttl).await {
            tracing::warn!(conversation_id, error = %e, "session cache write failed, evicting entry");
            self.cache
                .delete(&key)
                .await
                .context("failed to evict stale session cache entry")?;
        }
        Ok(())
    }

    /// Drops the cached entry. Durable rows are kept.
    pub async fn clear(&self, conversation_id: &str) -> anyhow::Result<bool> {
        self.cache.delete(&session_key(conversation_id)).await
    }

    pub async fn cached_listing(
        &self,
        city: &str,
        service_type: &str,
    ) -> anyhow::Result<Option<Vec<Professional>>> {
        let entry = self.cache.get(&listing_key(city, service_type)).await?;
        let Some(raw) = entry.as_ref().and_then(|e| e.get(LISTING_FIELD)) else {
            return Ok(None);
        };

        match serde_json::from_str(raw) {
            Ok(list) => Ok(Some(list)),
            Err(e) => {
                tracing::warn!(city, service_type, error = %e, "discarding undecodable cached listing");
                Ok(None)
            }
        }
    }

    pub async fn cache_listing(
        &self,
        city: &str,
        service_type: &str,
        professionals: &[Professional],
    ) -> anyhow::Result<()> {
        let encoded = serde_json::to_string(professionals)?;
        let entry = [(LISTING_FIELD.to_string(), encoded)].into_iter().collect();
        self.cache
            .merge(&listing_key(city, service_type), entry, self.listing_ttl)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use crate::cache::memory::InMemoryCache;
    use crate::models::Stage;

    /// Delegates to an in-memory cache, refusing writes while `fail_writes`
    /// is set.
    struct WriteFailingCache {
        inner: InMemoryCache,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl SessionCache for WriteFailingCache {
        async fn get(&self, key: &str) -> anyhow::Result<Option<HashMap<String, String>>> {
            self.inner.get(key).await
        }

        async fn merge(
            &self,
            key: &str,
            fields: HashMap<String, String>,
            ttl: Duration,
        ) -> anyhow::Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                anyhow::bail!("cache unavailable");
            }
            self.inner.merge(key, fields, ttl).await
        }

        async fn delete(&self, key: &str) -> anyhow::Result<bool> {
            self.inner.delete(key).await
        }
    }

    fn store() -> (SessionStore, Arc<InMemoryCache>, Db) {
        let cache = Arc::new(InMemoryCache::new());
        let db = db::shared(db::init_db(":memory:").unwrap());
        let store = SessionStore::new(
            cache.clone(),
            db.clone(),
            Duration::from_secs(60),
            Duration::from_secs(60),
        );
        (store, cache, db)
    }

    #[tokio::test]
    async fn test_unknown_conversation_starts_fresh() {
        let (store, _, _) = store();
        let session = store.load("nope").await.unwrap();
        assert_eq!(session.stage, Stage::Recommendation);
        assert_eq!(session.conversation_id, "nope");
    }

    #[tokio::test]
    async fn test_merge_writes_through_to_durable_store() {
        let (store, _, db) = store();
        store
            .merge("c1", SessionPatch::new().stage(Stage::AwaitingCity).set(fields::SERVICE_TYPE, "Dentist"))
            .await
            .unwrap();

        let durable = queries::load_session_fields(&db::lock(&db).unwrap(), "c1").unwrap();
        assert_eq!(durable.get("stage").map(String::as_str), Some("awaiting_city"));
        assert_eq!(durable.get("service_type").map(String::as_str), Some("Dentist"));
    }

    #[tokio::test]
    async fn test_load_falls_back_to_durable_after_clear() {
        let (store, cache, _) = store();
        store
            .merge("c1", SessionPatch::new().stage(Stage::AwaitingUserInfo).set(fields::CITY, "Pune"))
            .await
            .unwrap();
        assert!(store.clear("c1").await.unwrap());
        assert!(cache.get("session:c1").await.unwrap().is_none());

        let session = store.load("c1").await.unwrap();
        assert_eq!(session.stage, Stage::AwaitingUserInfo);
        assert_eq!(session.city.as_deref(), Some("Pune"));
        // warmed again
        assert!(cache.get("session:c1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_cache_write_evicts_stale_entry() {
        let cache = Arc::new(WriteFailingCache {
            inner: InMemoryCache::new(),
            fail_writes: AtomicBool::new(false),
        });
        let db = db::shared(db::init_db(":memory:").unwrap());
        let store = SessionStore::new(cache.clone(), db, Duration::from_secs(60), Duration::from_secs(60));

        store.merge("c1", SessionPatch::new().stage(Stage::AwaitingCity)).await.unwrap();
        assert!(cache.get("session:c1").await.unwrap().is_some());

        cache.fail_writes.store(true, Ordering::SeqCst);
        store
            .merge("c1", SessionPatch::new().stage(Stage::AwaitingProfSelection).set(fields::CITY, "Pune"))
            .await
            .unwrap();
        assert!(cache.get("session:c1").await.unwrap().is_none());

        let session = store.load("c1").await.unwrap();
        assert_eq!(session.stage, Stage::AwaitingProfSelection);
        assert_eq!(session.city.as_deref(), Some("Pune"));
    }

    #[tokio::test]
    async fn test_cached_fields_win_over_durable() {
        let (store, cache, db) = store();
        queries::upsert_session_fields(
            &db::lock(&db).unwrap(),
            "c1",
            &SessionPatch::new().stage(Stage::AwaitingCity).set(fields::NAME, "Old"),
        )
        .unwrap();
        let partial = [("name".to_string(), "New".to_string())].into_iter().collect();
        cache.merge("session:c1", partial, Duration::from_secs(60)).await.unwrap();

        let session = store.load("c1").await.unwrap();
        assert_eq!(session.stage, Stage::AwaitingCity);
        assert_eq!(session.customer.name.as_deref(), Some("New"));
    }

    #[tokio::test]
    async fn test_listing_cache_round_trip() {
        let (store, _, _) = store();
        assert!(store.cached_listing("Delhi", "Cardiologist").await.unwrap().is_none());

        let prof = Professional {
            name: "Dr. Raj Sharma".to_string(),
            service_type: "Cardiologist".to_string(),
            city: "Delhi".to_string(),
            working_days: vec!["Monday".to_string()],
            working_hours: None,
            certification: None,
            rating: None,
            years_experience: None,
            default_time: None,
        };
        store.cache_listing("Delhi", "Cardiologist", &[prof.clone()]).await.unwrap();

        let cached = store.cached_listing("delhi", "cardiologist").await.unwrap().unwrap();
        assert_eq!(cached, vec![prof]);
    }
}
