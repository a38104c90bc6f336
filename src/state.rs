use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Db;
use crate::services::ai::{LlmProvider, RetryPolicy};
use crate::services::conversation::TurnLocks;
use crate::services::retrieval::DocumentRetriever;
use crate::services::session_store::SessionStore;

pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
    pub sessions: SessionStore,
    pub llm: Box<dyn LlmProvider>,
    pub retriever: Box<dyn DocumentRetriever>,
    pub retry: RetryPolicy,
    pub turn_locks: TurnLocks,
}

impl AppState {
    pub fn new(
        db: Db,
        config: AppConfig,
        sessions: SessionStore,
        llm: Box<dyn LlmProvider>,
        retriever: Box<dyn DocumentRetriever>,
    ) -> Arc<Self> {
        let retry = RetryPolicy::from_config(&config);
        Arc::new(Self {
            db,
            config,
            sessions,
            llm,
            retriever,
            retry,
            turn_locks: TurnLocks::default(),
        })
    }
}
