//! Telemetry Service
//!
//! Query and ingestion service for per-project IoT sensor telemetry stored in a
//! single DynamoDB table. Readings are written with composite keys so that a
//! project's data can be read back by project, by device or by location, each
//! optionally bounded by time and optionally reduced to the latest record.
//!
//! ## Features
//!
//! - **Query Building**: partition-key equality plus optional `start`/`end`
//!   bounds on `EpochTime` and a `single` most-recent mode
//! - **Pagination**: follows continuation tokens until the store is drained
//! - **Ingestion**: validates readings and derives the composite index keys
//! - **Token Authorization**: every telemetry route is gated by
//!   [`request_authorizer`]
//!
//! ## Architecture
//!
//! ```text
//!   HTTP (axum)             Telemetry Service              DynamoDB
//! ┌──────────────┐        ┌──────────────────┐        ┌──────────────┐
//! │ Token check  │───────▶│ Query builder    │───────▶│ Telemetry    │
//! └──────────────┘        │ Pagination       │◀───────│   + indexes  │
//!                         │ Ingest / marshal │───────▶│              │
//!                         └──────────────────┘        └──────────────┘
//!                                  │
//!                                  ▼
//!                         ┌──────────────────┐
//!                         │ Response shaping │
//!                         └──────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod dynamo_store;
pub mod error;
pub mod ingest;
pub mod marshal;
pub mod pagination;
pub mod query;
pub mod response;
pub mod service;
pub mod store;
pub mod value;

pub use api::{create_router, AppState};
pub use config::Config;
pub use dynamo_store::DynamoDbStore;
pub use error::{StoreError, TelemetryError};
pub use query::{QueryDescriptor, QueryParams, SortKeyCondition};
pub use response::ApiResponse;
pub use service::{QueryScope, TableLayout, TelemetryService};
pub use store::{QueryPage, TelemetryStore};
pub use value::{Item, StorageValue};
