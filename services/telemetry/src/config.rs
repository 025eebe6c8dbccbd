use request_authorizer::AuthorizerConfig;
use serde::Deserialize;

/// Main configuration for the telemetry service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// DynamoDB configuration
    #[serde(default)]
    pub dynamodb: DynamoDbConfig,
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Per-project token table
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

/// DynamoDB table layout and client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DynamoDbConfig {
    /// Telemetry table name
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for DynamoDB Local, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Index keyed by `ProjectId`
    #[serde(default = "default_project_index")]
    pub project_index: Option<String>,
    /// Index keyed by `ProjectId#DeviceId`; unset queries the base table
    #[serde(default)]
    pub device_index: Option<String>,
    /// Index keyed by `ProjectId#LocationId`
    #[serde(default = "default_location_index")]
    pub location_index: Option<String>,
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

// Default value functions
fn default_service_name() -> String {
    "telemetry-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_table_name() -> String {
    "Telemetry".to_string()
}

fn default_region() -> String {
    "us-east-2".to_string()
}

fn default_project_index() -> Option<String> {
    Some("ProjectId-EpochTime-index".to_string())
}

fn default_location_index() -> Option<String> {
    Some("ProjectIdLocationId-EpochTime-index".to_string())
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("service.name", "telemetry-service")?
            .set_default("service.log_level", "info")?
            .set_default("service.metrics_port", 9090)?
            // Add config file if present
            .add_source(config::File::with_name("config/telemetry").required(false))
            .add_source(config::File::with_name("/etc/telemetry/telemetry").required(false))
            // Override with environment variables
            // TELEMETRY__DYNAMODB__TABLE_NAME -> dynamodb.table_name
            .add_source(
                config::Environment::with_prefix("TELEMETRY")
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

impl Default for DynamoDbConfig {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            region: default_region(),
            endpoint_url: None,
            project_index: default_project_index(),
            device_index: None,
            location_index: default_location_index(),
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
