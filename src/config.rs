use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub llm_provider: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub llm_max_retries: u32,
    pub llm_retry_backoff_ms: u64,
    pub session_ttl_secs: u64,
    pub professional_list_ttl_secs: u64,
    pub supported_cities: Vec<String>,
    pub professionals_seed: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "carebook.db".to_string()),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string()),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_model: env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            llm_max_retries: env_parse("LLM_MAX_RETRIES", 2),
            llm_retry_backoff_ms: env_parse("LLM_RETRY_BACKOFF_MS", 200),
            session_ttl_secs: env_parse("SESSION_TTL_SECS", 3600),
            professional_list_ttl_secs: env_parse("PROFESSIONAL_LIST_TTL_SECS", 1800),
            supported_cities: env::var("SUPPORTED_CITIES")
                .map(|v| parse_list(&v))
                .unwrap_or_else(|_| default_cities()),
            professionals_seed: env::var("PROFESSIONALS_SEED").ok().filter(|p| !p.is_empty()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: ":memory:".to_string(),
            llm_provider: "ollama".to_string(),
            groq_api_key: String::new(),
            groq_model: "llama-3.3-70b-versatile".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2".to_string(),
            llm_max_retries: 2,
            llm_retry_backoff_ms: 200,
            session_ttl_secs: 3600,
            professional_list_ttl_secs: 1800,
            supported_cities: default_cities(),
            professionals_seed: None,
        }
    }
}

pub fn default_cities() -> Vec<String> {
    ["Kolkata", "Pune", "Bangalore", "Delhi"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_list(raw: &str) -> Vec<String> {
    let cities: Vec<String> = raw
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if cities.is_empty() {
        default_cities()
    } else {
        cities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_trims_entries() {
        assert_eq!(parse_list(" Pune , Delhi,,"), vec!["Pune", "Delhi"]);
    }

    #[test]
    fn test_parse_list_empty_falls_back_to_defaults() {
        assert_eq!(parse_list(" , "), default_cities());
    }
}
