use crate::config::ApiConfig;
use crate::decision::TokenTable;
use crate::policy::{authorize, AuthError, AuthorizerRequest, AuthorizerResponse};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Create the authorizer router
pub fn create_router(table: Arc<TokenTable>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/authorize", post(authorize_request))
        .layer(TraceLayer::new_for_http())
        .with_state(table)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "request-authorizer"
    }))
}

async fn authorize_request(
    State(table): State<Arc<TokenTable>>,
    Json(request): Json<AuthorizerRequest>,
) -> Result<Json<AuthorizerResponse>, AuthError> {
    authorize(&table, &request).map(Json).map_err(|e| {
        warn!(error = %e, project = %request.project(), "Authorization rejected");
        e
    })
}

/// Start the authorizer API server
pub async fn start_api_server(
    table: Arc<TokenTable>,
    config: &ApiConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = create_router(table);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting authorizer API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}
