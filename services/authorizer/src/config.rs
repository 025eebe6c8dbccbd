use serde::Deserialize;

/// Main configuration for the authorizer service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Token table configuration
    #[serde(default)]
    pub auth: AuthorizerConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Listen address for the authorizer endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

/// Static token table, fixed at deployment.
///
/// Shared with the telemetry service, which embeds it under its own `auth`
/// section.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizerConfig {
    /// Tokens registered per project
    #[serde(default)]
    pub tokens: Vec<TokenGrant>,
    /// Token that always yields an explicit deny
    #[serde(default = "default_deny_token")]
    pub deny_token: String,
    /// Token that always yields a 401-style outcome
    #[serde(default = "default_unauthorized_token")]
    pub unauthorized_token: String,
}

/// A single (token, project) registration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    pub project: String,
}

impl TokenGrant {
    pub fn new(token: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            project: project.into(),
        }
    }
}

fn default_service_name() -> String {
    "request-authorizer".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9091
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8081
}

fn default_deny_token() -> String {
    "deny".to_string()
}

fn default_unauthorized_token() -> String {
    "unauthorized".to_string()
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .set_default("service.name", "request-authorizer")?
            .set_default("service.log_level", "info")?
            .add_source(config::File::with_name("config/authorizer").required(false))
            .add_source(config::File::with_name("/etc/telemetry/authorizer").required(false))
            // AUTHORIZER__API__PORT -> api.port
            .add_source(
                config::Environment::with_prefix("AUTHORIZER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self::with_grants(Vec::new())
    }
}

impl AuthorizerConfig {
    /// Token table with the standard sentinels and the given grants
    pub fn with_grants(tokens: Vec<TokenGrant>) -> Self {
        Self {
            tokens,
            deny_token: default_deny_token(),
            unauthorized_token: default_unauthorized_token(),
        }
    }
}
