use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::Booking;
use crate::services::conversation::{self, TurnReply};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Serialize)]
pub struct NewChatResponse {
    pub conversation_id: String,
    pub response: String,
}

// POST /chat/new
pub async fn new_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Json<NewChatResponse> {
    let reply = conversation::start_conversation(&state, &req.message).await;
    Json(NewChatResponse {
        conversation_id: reply.conversation_id,
        response: reply.response,
    })
}

// POST /chat/continue/:conversation_id
pub async fn continue_chat(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Json<TurnReply> {
    Json(conversation::continue_conversation(&state, &conversation_id, &req.message).await)
}

#[derive(Serialize)]
pub struct BookingInfo {
    pub booking_id: String,
    pub professional_name: String,
    pub service_type: Option<String>,
    pub customer_name: String,
    pub age: u32,
    pub contact: String,
    pub email: String,
    pub booking_date: String,
    pub booking_time: String,
    pub status: &'static str,
}

impl From<Booking> for BookingInfo {
    fn from(b: Booking) -> Self {
        Self {
            booking_date: b.date_str(),
            booking_time: b.time_str(),
            status: b.status.as_str(),
            booking_id: b.booking_id,
            professional_name: b.professional_name,
            service_type: b.service_type,
            customer_name: b.customer_name,
            age: b.age,
            contact: b.contact,
            email: b.email,
        }
    }
}

// GET /chat/booking/:conversation_id
pub async fn get_booking_info(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let booking = {
        let conn = db::lock(&state.db)?;
        queries::get_booking_for_conversation(&conn, &conversation_id)?
    };

    let body = match booking {
        Some(booking) => serde_json::json!({
            "status": "success",
            "conversation_id": conversation_id,
            "booking_info": BookingInfo::from(booking),
        }),
        None => serde_json::json!({
            "status": "error",
            "message": "Conversation not found.",
        }),
    };
    Ok(Json(body))
}

// DELETE /chat/booking/:conversation_id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = {
        let conn = db::lock(&state.db)?;
        queries::delete_booking_for_conversation(&conn, &conversation_id)?
    };

    if !deleted {
        return Err(AppError::NotFound("Conversation not found.".to_string()));
    }

    tracing::info!(conversation_id = %conversation_id, "booking deleted");
    Ok(Json(serde_json::json!({
        "status": "success",
        "message": format!("Booking for conversation '{conversation_id}' has been deleted."),
    })))
}
