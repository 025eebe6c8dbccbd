//! IAM-style policy rendering for authorization decisions.
//!
//! Gateways that delegate authorization expect either a policy document naming
//! the effect for the invoked method, or an error. `Unauthorized` is reported
//! as its own error so the gateway can answer 401 instead of a generic failure.

use crate::decision::{AuthDecision, TokenTable};
use crate::{PROJECT_PARAM, TOKEN_HEADER};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, instrument};

pub const POLICY_VERSION: &str = "2012-10-17";
pub const INVOKE_ACTION: &str = "execute-api:Invoke";
pub const PRINCIPAL: &str = "user";

/// Errors returned instead of a policy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Error: Invalid token")]
    InvalidToken,
}

/// Policy statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Request-style authorizer input
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerRequest {
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub path_parameters: HashMap<String, String>,
    #[serde(default)]
    pub method_arn: String,
}

impl AuthorizerRequest {
    /// Bearer token from the request headers (header names are case-insensitive)
    pub fn token(&self) -> &str {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(TOKEN_HEADER))
            .map(|(_, value)| value.as_str())
            .unwrap_or_default()
    }

    /// Project named in the request path
    pub fn project(&self) -> &str {
        self.path_parameters
            .get(PROJECT_PARAM)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Authorizer output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    pub principal_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_document: Option<PolicyDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub action: Vec<String>,
    pub effect: Effect,
    pub resource: Vec<String>,
}

/// Build a policy for `principal_id`.
///
/// The document is omitted when there is no resource to scope it to.
pub fn generate_policy(principal_id: &str, effect: Effect, resource: &str) -> AuthorizerResponse {
    let policy_document = (!resource.is_empty()).then(|| PolicyDocument {
        version: POLICY_VERSION.to_string(),
        statement: vec![PolicyStatement {
            action: vec![INVOKE_ACTION.to_string()],
            effect,
            resource: vec![resource.to_string()],
        }],
    });

    AuthorizerResponse {
        principal_id: principal_id.to_string(),
        policy_document,
    }
}

/// Map a decision onto a policy or an authorizer error
pub fn render(decision: AuthDecision, method_arn: &str) -> Result<AuthorizerResponse, AuthError> {
    match decision {
        AuthDecision::Allow => Ok(generate_policy(PRINCIPAL, Effect::Allow, method_arn)),
        AuthDecision::Deny => Ok(generate_policy(PRINCIPAL, Effect::Deny, method_arn)),
        AuthDecision::Unauthorized => Err(AuthError::Unauthorized),
        AuthDecision::Invalid => Err(AuthError::InvalidToken),
    }
}

/// Authorize a request against the token table
#[instrument(skip(table, request), fields(project = %request.project()))]
pub fn authorize(
    table: &TokenTable,
    request: &AuthorizerRequest,
) -> Result<AuthorizerResponse, AuthError> {
    let decision = table.decide(request.token(), request.project());

    debug!(decision = %decision, "Authorization decision");
    metrics::counter!("authorizer.decisions", "outcome" => decision.as_str()).increment(1);

    render(decision, &request.method_arn)
}
