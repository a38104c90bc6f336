pub mod chat;
pub mod health;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/chat/new", post(chat::new_chat))
        .route("/chat/continue/:conversation_id", post(chat::continue_chat))
        .route(
            "/chat/booking/:conversation_id",
            get(chat::get_booking_info).delete(chat::delete_booking),
        )
        .with_state(state)
}
