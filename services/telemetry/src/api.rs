use crate::config::ApiConfig;
use crate::query::{PathParams, QueryParams};
use crate::response::ApiResponse;
use crate::service::{QueryScope, TelemetryService};
use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{
        rejection::{BytesRejection, PathRejection, QueryRejection},
        Path, Query, Request, State,
    },
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use request_authorizer::{AuthDecision, TokenTable, PROJECT_PARAM, TOKEN_HEADER};
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: TelemetryService,
    pub tokens: Arc<TokenTable>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let telemetry = Router::new()
        .route(
            "/:ProjectId",
            get(query_project)
                .post(add_record)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/:ProjectId/devices/:DeviceId",
            get(query_device)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/:ProjectId/locations/:LocationId",
            get(query_location)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(health_check))
        .merge(telemetry)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                info_span!(
                    "invocation",
                    id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "telemetry-service"
    }))
}

/// Raw query-string pairs, collapsed by [`QueryParams::from_pairs`]
type QueryPairs = Vec<(String, String)>;

/// Token check in front of every telemetry route.
///
/// Preflight requests carry no token and pass straight through.
async fn require_token(
    State(state): State<AppState>,
    path: Result<Path<PathParams>, PathRejection>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let path = match path {
        Ok(Path(path)) => path,
        Err(rejection) => return ApiResponse::from(rejection).into_response(),
    };

    let token = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let project = path.get(PROJECT_PARAM).map(String::as_str).unwrap_or_default();

    let decision = state.tokens.decide(token, project);
    metrics::counter!("authorizer.decisions", "outcome" => decision.as_str()).increment(1);

    match decision {
        AuthDecision::Allow => next.run(request).await,
        AuthDecision::Deny => {
            warn!(project = %project, "Request denied");
            ApiResponse::status(StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
        AuthDecision::Unauthorized => {
            warn!(project = %project, "Request unauthorized");
            ApiResponse::status(StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
        AuthDecision::Invalid => {
            warn!(project = %project, "Invalid token");
            ApiResponse::status(StatusCode::INTERNAL_SERVER_ERROR, "Error: Invalid token")
                .into_response()
        }
    }
}

async fn query_project(
    State(state): State<AppState>,
    path: Result<Path<PathParams>, PathRejection>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> Result<ApiResponse, ApiResponse> {
    query_scope(&state, QueryScope::Project, path, query).await
}

async fn query_device(
    State(state): State<AppState>,
    path: Result<Path<PathParams>, PathRejection>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> Result<ApiResponse, ApiResponse> {
    query_scope(&state, QueryScope::Device, path, query).await
}

async fn query_location(
    State(state): State<AppState>,
    path: Result<Path<PathParams>, PathRejection>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> Result<ApiResponse, ApiResponse> {
    query_scope(&state, QueryScope::Location, path, query).await
}

async fn query_scope(
    state: &AppState,
    scope: QueryScope,
    path: Result<Path<PathParams>, PathRejection>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> Result<ApiResponse, ApiResponse> {
    let Path(path) = path?;
    let Query(pairs) = query?;
    let params = QueryParams::from_pairs(pairs);

    let items = state
        .service
        .query(scope, &path, &params)
        .await
        .map_err(|e| {
            error!(error = %e, scope = scope.as_str(), "Query failed");
            e
        })?;

    Ok(ApiResponse::get_success(&items)?)
}

async fn add_record(
    State(state): State<AppState>,
    path: Result<Path<PathParams>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<ApiResponse, ApiResponse> {
    let Path(path) = path?;
    let body = body?;

    state.service.ingest(&path, &body).await.map_err(|e| {
        if e.is_client_error() {
            warn!(error = %e, "Rejected record");
        } else {
            error!(error = %e, "Failed to add record");
        }
        e
    })?;

    Ok(ApiResponse::post_success())
}

async fn preflight() -> ApiResponse {
    ApiResponse::preflight()
}

async fn method_not_allowed() -> ApiResponse {
    ApiResponse::method_not_allowed()
}

/// Start the API server and serve until `shutdown` resolves
pub async fn start_api_server(
    state: AppState,
    config: &ApiConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting telemetry API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryDescriptor;
    use crate::service::TableLayout;
    use crate::store::{MockTelemetryStore, QueryPage};
    use request_authorizer::{AuthorizerConfig, TokenGrant};
    use tower::ServiceExt;

    fn state(store: MockTelemetryStore) -> AppState {
        let auth = AuthorizerConfig::with_grants(vec![TokenGrant::new("allow", "sensors")]);
        AppState {
            service: TelemetryService::new(Arc::new(store), TableLayout::default()),
            tokens: Arc::new(TokenTable::new(&auth)),
        }
    }

    fn with_token(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(TOKEN_HEADER, token)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let response = create_router(state(MockTelemetryStore::new()))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_query_passes_time_bounds() {
        let mut store = MockTelemetryStore::new();
        store
            .expect_query()
            .withf(|d: &QueryDescriptor| {
                d.partition_key_value == "sensors"
                    && d.key_condition_expression()
                        == "#pk = :pk AND EpochTime BETWEEN :start AND :end"
            })
            .times(1)
            .returning(|_| Ok(QueryPage::default()));

        let response = create_router(state(store))
            .oneshot(with_token("/sensors?start=1&end=2", "allow"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_store_never_reached_without_allow() {
        let mut store = MockTelemetryStore::new();
        store.expect_query().times(0);

        let router = create_router(state(store));
        for (token, status) in [
            ("deny", StatusCode::FORBIDDEN),
            ("unauthorized", StatusCode::UNAUTHORIZED),
            ("allow-other", StatusCode::INTERNAL_SERVER_ERROR),
        ] {
            let response = router
                .clone()
                .oneshot(with_token("/sensors/devices/d1", token))
                .await
                .unwrap();
            assert_eq!(response.status(), status, "token {token}");
        }
    }

    #[tokio::test]
    async fn test_preflight_skips_token_check() {
        let response = create_router(state(MockTelemetryStore::new()))
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/sensors/locations/45203")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()["access-control-allow-methods"],
            "OPTIONS,POST,GET"
        );
    }

    #[tokio::test]
    async fn test_post_adds_record() {
        let mut store = MockTelemetryStore::new();
        store
            .expect_put()
            .withf(|item: &crate::value::Item| item.contains_key("ProjectId#DeviceId"))
            .times(1)
            .returning(|_| Ok(()));

        let response = create_router(state(store))
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/sensors")
                    .header(TOKEN_HEADER, "allow")
                    .body(Body::from(r#"{"EpochTime": 5, "DeviceId": "d1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Success! Item added");
    }

    #[tokio::test]
    async fn test_post_missing_field_is_bad_request() {
        let mut store = MockTelemetryStore::new();
        store.expect_put().times(0);

        let response = create_router(state(store))
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/sensors")
                    .header(TOKEN_HEADER, "allow")
                    .body(Body::from(r#"{"DeviceId": "d1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let response = create_router(state(MockTelemetryStore::new()))
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/sensors")
                    .header(TOKEN_HEADER, "allow")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Method not supported");
    }

    #[tokio::test]
    async fn test_repeated_query_key_uses_last_value() {
        let mut store = MockTelemetryStore::new();
        store
            .expect_query()
            .withf(|d: &QueryDescriptor| !d.is_single() && d.limit.is_none())
            .times(1)
            .returning(|_| Ok(QueryPage::default()));

        let response = create_router(state(store))
            .oneshot(with_token("/sensors?single=true&single=false", "allow"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_undecodable_path_keeps_cors_headers() {
        let mut store = MockTelemetryStore::new();
        store.expect_query().times(0);

        let response = create_router(state(store))
            .oneshot(with_token("/sensors%FF/devices/d1", "allow"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(
            response.headers()["access-control-allow-methods"],
            "OPTIONS,POST,GET"
        );
    }

    #[tokio::test]
    async fn test_oversized_body_keeps_cors_headers() {
        let mut store = MockTelemetryStore::new();
        store.expect_put().times(0);

        let response = create_router(state(store))
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/sensors")
                    .header(TOKEN_HEADER, "allow")
                    .body(Body::from(vec![b' '; 3 * 1024 * 1024]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
