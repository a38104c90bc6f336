use async_trait::async_trait;

/// Source of reference snippets used as context for a recommendation.
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    async fn retrieve(&self, query: &str, limit: usize) -> anyhow::Result<Vec<String>>;
}

/// Used when no document index is configured.
pub struct NoopRetriever;

#[async_trait]
impl DocumentRetriever for NoopRetriever {
    async fn retrieve(&self, _query: &str, _limit: usize) -> anyhow::Result<Vec<String>> {
        Ok(vec![])
    }
}
