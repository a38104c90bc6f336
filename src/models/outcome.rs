use serde::{Deserialize, Serialize};

use super::session::Stage;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Incomplete,
    NotFound,
    Error,
}

/// What an operation hands back for display. `Raw` carries collaborator
/// output whose shape is not known in advance.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Raw(serde_json::Value),
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Reply::Text(s)
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

/// Result of one stage operation: how it went, what to show, and where
/// the dialogue goes next.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub reply: Reply,
    pub next_stage: Stage,
    pub booking_id: Option<String>,
}

impl Outcome {
    pub fn advance(next_stage: Stage, reply: impl Into<Reply>) -> Self {
        Self {
            kind: OutcomeKind::Success,
            reply: reply.into(),
            next_stage,
            booking_id: None,
        }
    }

    pub fn stay(kind: OutcomeKind, stage: Stage, reply: impl Into<Reply>) -> Self {
        Self {
            kind,
            reply: reply.into(),
            next_stage: stage,
            booking_id: None,
        }
    }

    pub fn confirmed(booking_id: String, reply: impl Into<Reply>) -> Self {
        Self {
            kind: OutcomeKind::Success,
            reply: reply.into(),
            next_stage: Stage::Complete,
            booking_id: Some(booking_id),
        }
    }
}
