use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::ProcessingResult;
use crate::services::conversation;
use crate::state::AppState;

/// A chat message as a transport adapter would hand it over.
#[derive(Deserialize)]
pub struct DevMessage {
    /// Defaults to `from` when omitted.
    pub conversation_key: Option<String>,
    pub from: String,
    pub message: String,
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DevMessage>,
) -> Result<Json<ProcessingResult>, AppError> {
    let from = payload.from.trim();
    if from.is_empty() {
        return Err(AppError::BadRequest("from must not be empty".to_string()));
    }
    let key = payload
        .conversation_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .unwrap_or(from);

    let result = conversation::handle(&state, key, from, payload.message.trim()).await;
    Ok(Json(result))
}
