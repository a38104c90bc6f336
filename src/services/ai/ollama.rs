use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{check_status, LlmProvider, Message};

pub struct OllamaProvider {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            url: url.trim_end_matches('/').to_string(),
            model,
            client,
        }
    }

    fn request_body(&self, system_prompt: &str, messages: &[Message]) -> serde_json::Value {
        let ollama_messages: Vec<_> = std::iter::once(json!({"role": "system", "content": system_prompt}))
            .chain(messages.iter().map(|m| json!({"role": m.role, "content": m.content})))
            .collect();

        json!({
            "model": self.model,
            "messages": ollama_messages,
            "stream": false,
            "options": {"temperature": 0.3},
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let resp = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&self.request_body(system_prompt, messages))
            .send()
            .await
            .context("failed to call Ollama API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Ollama response")?;
        check_status("Ollama", status, &data)?;

        data["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing content in Ollama response"))
    }
}
