use crate::error::{Result, TelemetryError};
use crate::marshal::item_to_json;
use crate::value::Item;
use axum::extract::rejection::{BytesRejection, PathRejection, QueryRejection};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

pub const ALLOW_HEADERS: &str =
    "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token,authorization-token";
pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "OPTIONS,POST,GET";

pub const POST_SUCCESS_BODY: &str = "Success! Item added";
pub const METHOD_NOT_ALLOWED_BODY: &str = "Method not supported";

/// Fixed CORS headers attached to every response
pub fn cors_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "Access-Control-Allow-Headers".to_string(),
            ALLOW_HEADERS.to_string(),
        ),
        (
            "Access-Control-Allow-Origin".to_string(),
            ALLOW_ORIGIN.to_string(),
        ),
        (
            "Access-Control-Allow-Methods".to_string(),
            ALLOW_METHODS.to_string(),
        ),
    ])
}

/// Response envelope handed back to the transport
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

/// Body of error envelopes
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ApiResponse {
    fn new(status: StatusCode, body: String) -> Self {
        Self {
            status_code: status.as_u16(),
            body,
            headers: cors_headers(),
        }
    }

    /// 200 with the records as a JSON array
    pub fn get_success(items: &[Item]) -> Result<Self> {
        let records: Vec<_> = items.iter().map(item_to_json).collect();
        let body = serde_json::to_string(&records)?;
        Ok(Self::new(StatusCode::OK, body).with_header("Content-Type", "application/json"))
    }

    /// 200 confirming a write
    pub fn post_success() -> Self {
        Self::new(StatusCode::OK, POST_SUCCESS_BODY.to_string())
    }

    /// 405 for methods a route does not serve
    pub fn method_not_allowed() -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            METHOD_NOT_ALLOWED_BODY.to_string(),
        )
    }

    /// 204 answer to a CORS preflight
    pub fn preflight() -> Self {
        Self::new(StatusCode::NO_CONTENT, String::new())
    }

    /// Envelope for an invocation failure: 400 for bad input, 500 otherwise
    pub fn from_error(err: &TelemetryError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = serde_json::to_string(&ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
        })
        .unwrap_or_default();

        Self::new(status, body).with_header("Content-Type", "application/json")
    }

    /// Envelope with a fixed status and plain-text message
    pub fn status(status: StatusCode, message: &str) -> Self {
        Self::new(status, message.to_string())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Envelope for a request the router could not extract
    fn rejected(status: StatusCode, message: String) -> Self {
        warn!(status = status.as_u16(), message = %message, "Request rejected");
        Self::status(status, &message)
    }
}

impl From<TelemetryError> for ApiResponse {
    fn from(err: TelemetryError) -> Self {
        Self::from_error(&err)
    }
}

impl From<PathRejection> for ApiResponse {
    fn from(rejection: PathRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiResponse {
    fn from(rejection: QueryRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<BytesRejection> for ApiResponse {
    fn from(rejection: BytesRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}

impl IntoResponse for TelemetryError {
    fn into_response(self) -> Response {
        ApiResponse::from_error(&self).into_response()
    }
}
