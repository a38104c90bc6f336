//! Turns whatever an operation or collaborator returned into the single
//! string shown to the user.

use serde_json::{Map, Value};

use crate::models::Reply;

pub const FALLBACK_TEXT: &str = "No recommendation available.";

const PREFERRED_KEYS: [&str; 2] = ["recommendation", "prompt"];

pub fn display_text(reply: &Reply) -> String {
    match reply {
        Reply::Text(text) if !text.trim().is_empty() => text.clone(),
        Reply::Text(_) => FALLBACK_TEXT.to_string(),
        Reply::Raw(value) => extract_display_text(value),
    }
}

/// Precedence: `structured_content.recommendation|prompt`, then the first
/// text item of `content` (decoded as JSON when possible), then `message`,
/// then the first string value of the object. Total over every input.
pub fn extract_display_text(value: &Value) -> String {
    let found = match value {
        Value::String(s) => non_empty(s),
        Value::Array(items) => from_content_list(items),
        Value::Object(map) => from_object(map),
        _ => None,
    };
    found.unwrap_or_else(|| FALLBACK_TEXT.to_string())
}

fn from_object(map: &Map<String, Value>) -> Option<String> {
    if let Some(Value::Object(structured)) = map.get("structured_content") {
        if let Some(text) = preferred_field(structured) {
            return Some(text);
        }
    }

    if let Some(Value::Array(items)) = map.get("content") {
        if let Some(text) = from_content_list(items) {
            return Some(text);
        }
    }

    if let Some(text) = map.get("message").and_then(Value::as_str).and_then(non_empty) {
        return Some(text);
    }

    map.values().find_map(|v| v.as_str().and_then(non_empty))
}

fn from_content_list(items: &[Value]) -> Option<String> {
    for item in items {
        let text = match item {
            Value::String(s) => s.as_str(),
            Value::Object(obj) => match obj.get("text").and_then(Value::as_str) {
                Some(t) => t,
                None => continue,
            },
            _ => continue,
        };
        if text.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(parsed)) => {
                if let Some(found) = preferred_field(&parsed) {
                    return Some(found);
                }
            }
            _ => return Some(text.to_string()),
        }
    }
    None
}

fn preferred_field(map: &Map<String, Value>) -> Option<String> {
    PREFERRED_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str).and_then(non_empty))
}

fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Wraps generated text as a reply. JSON output, bare or inside a
/// markdown fence, is kept structured so the precedence above applies.
pub fn from_collaborator_text(response: &str) -> Reply {
    let trimmed = response.trim();
    let cleaned = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if cleaned.starts_with('{') {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(cleaned) {
            return Reply::Raw(value);
        }
    }

    Reply::Text(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_content_wins() {
        let value = json!({
            "structured_content": {"prompt": "Which city?", "recommendation": "See a Dentist."},
            "message": "ignored",
        });
        assert_eq!(extract_display_text(&value), "See a Dentist.");
    }

    #[test]
    fn test_prompt_used_when_recommendation_empty() {
        let value = json!({"structured_content": {"recommendation": "", "prompt": "Which city?"}});
        assert_eq!(extract_display_text(&value), "Which city?");
    }

    #[test]
    fn test_content_list_json_then_raw_text() {
        let value = json!({"content": [{"text": "{\"recommendation\": \"From JSON\"}"}]});
        assert_eq!(extract_display_text(&value), "From JSON");

        let value = json!({"content": [{"text": "plain words"}]});
        assert_eq!(extract_display_text(&value), "plain words");
    }

    #[test]
    fn test_json_item_without_keys_falls_through() {
        let value = json!({
            "content": [{"text": "{\"other\": 1}"}, {"text": "second"}],
        });
        assert_eq!(extract_display_text(&value), "second");
    }

    #[test]
    fn test_message_then_first_string() {
        assert_eq!(extract_display_text(&json!({"message": "hello", "a": "x"})), "hello");
        assert_eq!(extract_display_text(&json!({"count": 3, "note": "first"})), "first");
    }

    #[test]
    fn test_fallback_for_everything_else() {
        for value in [json!(null), json!(42), json!({}), json!([]), json!({"n": 1}), json!("  ")] {
            assert_eq!(extract_display_text(&value), FALLBACK_TEXT);
        }
        assert_eq!(display_text(&Reply::Text(String::new())), FALLBACK_TEXT);
    }

    #[test]
    fn test_from_collaborator_text() {
        let fenced = "```json\n{\"recommendation\": \"See a Cardiologist.\"}\n```";
        assert_eq!(display_text(&from_collaborator_text(fenced)), "See a Cardiologist.");

        let plain = "  You should see a Dermatologist.  ";
        assert_eq!(
            from_collaborator_text(plain),
            Reply::Text("You should see a Dermatologist.".to_string())
        );
    }
}
