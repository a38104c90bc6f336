use crate::errors::TurnError;
use crate::services::ai::Message;
use crate::services::extraction::{detect_service_type, DEFAULT_SERVICE_TYPE};
use crate::services::normalizer::{display_text, from_collaborator_text};
use crate::state::AppState;

const RETRIEVAL_LIMIT: usize = 5;

const SYSTEM_PROMPT: &str = "You are a healthcare booking assistant. \
Recommend the single most appropriate type of healthcare professional \
(for example Cardiologist, Dermatologist, Dentist, Neurologist) for the \
user's problem. Keep the answer to two or three short sentences. \
Do not diagnose and do not ask follow-up questions.";

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub text: String,
    pub service_type: String,
}

/// Asks the text generator which kind of professional fits the user's
/// message, using retrieved reference snippets as context.
pub async fn recommend_service(state: &AppState, message: &str) -> Result<Recommendation, TurnError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(TurnError::Validation(vec!["description of your health issue".to_string()]));
    }

    let context = match state.retriever.retrieve(message, RETRIEVAL_LIMIT).await {
        Ok(snippets) => snippets.join("\n"),
        Err(e) => {
            tracing::warn!(error = %e, "document retrieval failed, recommending without context");
            String::new()
        }
    };

    let prompt = build_prompt(message, &context);
    let generated = state
        .retry
        .chat(state.llm.as_ref(), SYSTEM_PROMPT, &[Message::user(prompt)])
        .await?;

    let text = display_text(&from_collaborator_text(&generated));
    let service_type = detect_service_type(&text)
        .unwrap_or(DEFAULT_SERVICE_TYPE)
        .to_string();

    Ok(Recommendation { text, service_type })
}

pub fn city_prompt(cities: &[String]) -> String {
    format!("Please mention your city (e.g., {}).", cities.join(", "))
}

fn build_prompt(message: &str, context: &str) -> String {
    if context.trim().is_empty() {
        return format!("A user says: \"{message}\"");
    }
    format!(
        "A user says: \"{message}\"\n\nDescriptions of the available services:\n{context}"
    )
}
