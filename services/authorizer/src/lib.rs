//! Request Authorizer
//!
//! Gates every telemetry API call with a static per-project bearer token.
//! A single telemetry table is shared between projects; the token presented in
//! the `authorization-token` header decides whether the caller may touch the
//! project named in the request path.
//!
//! The decision itself is a pure lookup against a [`TokenTable`] built from
//! configuration. [`policy`] renders a decision as an IAM-style policy for
//! gateways that expect one, and [`server`] exposes that as an HTTP endpoint.

pub mod config;
pub mod decision;
pub mod policy;
pub mod server;

pub use config::{AuthorizerConfig, Config, TokenGrant};
pub use decision::{AuthDecision, TokenTable};
pub use policy::{authorize, AuthError, AuthorizerRequest, AuthorizerResponse, Effect};

/// Header carrying the bearer token
pub const TOKEN_HEADER: &str = "authorization-token";

/// Path parameter naming the project
pub const PROJECT_PARAM: &str = "ProjectId";
