use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use haggle_agent::OllamaLanguageService;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    language: Arc<OllamaLanguageService>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub language_service: HealthCheck,
    pub checked_at: String,
}

pub fn router(language: Arc<OllamaLanguageService>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { language })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    language: Arc<OllamaLanguageService>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(language)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let language_service = language_check(&state.language).await;
    let ready = language_service.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "haggle-server runtime initialized".to_string(),
        },
        language_service,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn language_check(language: &OllamaLanguageService) -> HealthCheck {
    match language.probe().await {
        Ok(()) => HealthCheck {
            status: "ready",
            detail: "language service reachable".to_string(),
        },
        Err(error) => HealthCheck { status: "degraded", detail: error.to_string() },
    }
}
