use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use carebook::cache::memory::InMemoryCache;
use carebook::config::AppConfig;
use carebook::db;
use carebook::handlers;
use carebook::services::ai::groq::GroqProvider;
use carebook::services::ai::ollama::OllamaProvider;
use carebook::services::ai::LlmProvider;
use carebook::services::retrieval::NoopRetriever;
use carebook::services::session_store::SessionStore;
use carebook::state::AppState;

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    if let Some(seed) = &config.professionals_seed {
        db::seed::seed_professionals(&conn, Path::new(seed))?;
    }
    let db = db::shared(conn);

    let llm: Box<dyn LlmProvider> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(!config.groq_api_key.is_empty(), "GROQ_API_KEY must be set when LLM_PROVIDER=groq");
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(config.groq_api_key.clone(), config.groq_model.clone()))
        }
        _ => {
            tracing::info!("using Ollama LLM provider (url: {}, model: {})", config.ollama_url, config.ollama_model);
            Box::new(OllamaProvider::new(config.ollama_url.clone(), config.ollama_model.clone()))
        }
    };

    let cache = Arc::new(InMemoryCache::new());
    let sweeper = cache.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let purged = sweeper.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "purged expired cache entries");
            }
        }
    });

    let sessions = SessionStore::from_config(cache, db.clone(), &config);
    let state = AppState::new(db, config.clone(), sessions, llm, Box::new(NoopRetriever));

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
