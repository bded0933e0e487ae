//! Axum route handlers for the avatar coach API.

use axum::{body::Bytes, extract::State, Json};
use uuid::Uuid;

use crate::avatar::broker::{
    EndResponse, SendResponse, StartRequest, StartResponse, StatusResponse, TokenRequestBody,
    TokenResponse, WebhookAck, WebhookEvent,
};
use crate::errors::AppError;
use crate::extract::{AppJson, AppPath};
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct SendRequest {
    pub session_id: Uuid,
    pub text: String,
}

/// POST /api/avatar/start
///
/// Creates a persona conversation (and a streaming room when configured).
/// An empty body starts a session with vendor defaults; a malformed one is rejected
/// before any vendor call.
pub async fn handle_start(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StartResponse>, AppError> {
    let request = parse_start_request(&body)?;
    let response = state.broker.start(request).await?;
    Ok(Json(response))
}

fn parse_start_request(body: &[u8]) -> Result<StartRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StartRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid start request: {e}")))
}

/// POST /api/avatar/send
pub async fn handle_send(
    State(state): State<AppState>,
    AppJson(request): AppJson<SendRequest>,
) -> Result<Json<SendResponse>, AppError> {
    let response = state.broker.send(request.session_id, &request.text).await?;
    Ok(Json(response))
}

/// DELETE /api/avatar/end/:session_id
pub async fn handle_end(
    State(state): State<AppState>,
    AppPath(session_id): AppPath<Uuid>,
) -> Result<Json<EndResponse>, AppError> {
    Ok(Json(state.broker.end(session_id).await?))
}

/// GET /api/avatar/status/:session_id
pub async fn handle_status(
    State(state): State<AppState>,
    AppPath(session_id): AppPath<Uuid>,
) -> Result<Json<StatusResponse>, AppError> {
    Ok(Json(state.broker.status(session_id).await?))
}

/// POST /api/avatar/token
pub async fn handle_token(
    State(state): State<AppState>,
    AppJson(request): AppJson<TokenRequestBody>,
) -> Result<Json<TokenResponse>, AppError> {
    Ok(Json(state.broker.issue_token(request)?))
}

/// POST /api/avatar/webhook
///
/// Vendor callback. Always 200 for well-formed events so the vendor does not retry.
pub async fn handle_webhook(
    State(state): State<AppState>,
    AppJson(event): AppJson<WebhookEvent>,
) -> Result<Json<WebhookAck>, AppError> {
    Ok(Json(state.broker.handle_webhook(event).await?))
}
