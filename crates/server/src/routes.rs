//! Negotiation chat routes.
//!
//! JSON API Endpoints:
//! - `POST /initialize` — create or reset a session and open the negotiation
//! - `POST /chatbot`    — submit one user message to an existing session
//!
//! Both respond with `{response, last_negotiated_price, show_buttons,
//! session_id, state}`. The deal/no-deal affordance sends the sentinel
//! messages `"Deal!"` / `"No Deal!"` through `/chatbot` like any other text.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use haggle_agent::{NegotiationEngine, TurnOutcome};
use haggle_core::{SessionId, SessionState};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::sessions::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<NegotiationEngine>,
    pub sessions: SessionStore,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub last_negotiated_price: Option<f64>,
    pub show_buttons: bool,
    pub session_id: String,
    pub state: SessionState,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

type ApiResult = Result<Json<ChatResponse>, (StatusCode, Json<ApiError>)>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    // The original UI is a static page served elsewhere; the API stays
    // browser-callable from any origin.
    Router::new()
        .route("/initialize", post(initialize))
        .route("/chatbot", post(chatbot))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn initialize(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> ApiResult {
    let message = validated_message(&request)?;
    let session_id = request.session_id.clone().map(SessionId).unwrap_or_else(SessionId::mint);

    let handle = state
        .sessions
        .get_or_insert_with(&session_id, |id| state.engine.new_session(id))
        .map_err(internal_error)?;
    let mut session = handle.lock().await;

    info!(
        event_name = "api.initialize.received",
        session_id = %session_id,
        "initialize request accepted"
    );

    let outcome =
        state.engine.initialize(&mut session, message).await.map_err(internal_error)?;
    Ok(Json(to_response(outcome, &session.id)))
}

async fn chatbot(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> ApiResult {
    let message = validated_message(&request)?;
    let session_id = request.session_id.clone().map(SessionId).ok_or_else(|| {
        bad_request("session_id is required; call /initialize first".to_string())
    })?;

    let handle = state.sessions.get(&session_id).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError { error: format!("unknown session `{session_id}`") }),
        )
    })?;
    let mut session = handle.lock().await;

    let outcome =
        state.engine.submit_message(&mut session, message).await.map_err(internal_error)?;
    Ok(Json(to_response(outcome, &session.id)))
}

fn validated_message(request: &ChatRequest) -> Result<&str, (StatusCode, Json<ApiError>)> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(bad_request("message must not be empty".to_string()));
    }
    Ok(message)
}

fn bad_request(error: String) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(ApiError { error }))
}

fn internal_error(error: haggle_core::DomainError) -> (StatusCode, Json<ApiError>) {
    error!(
        event_name = "api.turn.domain_error",
        error = %error,
        "negotiation turn hit a domain error"
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError { error: "internal negotiation error".to_string() }),
    )
}

fn to_response(outcome: TurnOutcome, session_id: &SessionId) -> ChatResponse {
    ChatResponse {
        response: outcome.reply,
        last_negotiated_price: outcome
            .last_negotiated_price
            .and_then(|price| price.to_f64()),
        show_buttons: outcome.show_buttons,
        session_id: session_id.0.clone(),
        state: outcome.state,
    }
}
