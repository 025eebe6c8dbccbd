//! Read and write operations behind the telemetry routes.
//!
//! Each operation is one stateless invocation: build a descriptor from the
//! path and query parameters, run it to completion against the store, and
//! hand back plain records. The store client is the only shared resource.

use crate::config::DynamoDbConfig;
use crate::error::Result;
use crate::ingest::{
    self, DEVICE_ID, LOCATION_ID, PROJECT_DEVICE_KEY, PROJECT_ID, PROJECT_LOCATION_KEY,
};
use crate::marshal::to_storage_item;
use crate::pagination::fetch_all;
use crate::query::{composite_key, PathParams, QueryDescriptor, QueryParams};
use crate::store::TelemetryStore;
use crate::value::Item;
use std::sync::Arc;
use tracing::{info, instrument};

/// Which partition a read is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    Project,
    Device,
    Location,
}

impl QueryScope {
    /// Attribute holding the partition key for this scope
    pub fn partition_key_name(&self) -> &'static str {
        match self {
            Self::Project => PROJECT_ID,
            Self::Device => PROJECT_DEVICE_KEY,
            Self::Location => PROJECT_LOCATION_KEY,
        }
    }

    /// Partition key value derived from the path
    pub fn partition_key_value(&self, path: &PathParams) -> String {
        match self {
            Self::Project => path.get(PROJECT_ID).cloned().unwrap_or_default(),
            Self::Device => composite_key(path, PROJECT_ID, DEVICE_ID),
            Self::Location => composite_key(path, PROJECT_ID, LOCATION_ID),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Device => "device",
            Self::Location => "location",
        }
    }
}

/// Table name and index per scope
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub table_name: String,
    pub project_index: Option<String>,
    pub device_index: Option<String>,
    pub location_index: Option<String>,
}

impl TableLayout {
    pub fn index_for(&self, scope: QueryScope) -> Option<String> {
        match scope {
            QueryScope::Project => self.project_index.clone(),
            QueryScope::Device => self.device_index.clone(),
            QueryScope::Location => self.location_index.clone(),
        }
    }
}

impl From<&DynamoDbConfig> for TableLayout {
    fn from(config: &DynamoDbConfig) -> Self {
        Self {
            table_name: config.table_name.clone(),
            project_index: config.project_index.clone(),
            device_index: config.device_index.clone(),
            location_index: config.location_index.clone(),
        }
    }
}

impl Default for TableLayout {
    fn default() -> Self {
        Self::from(&DynamoDbConfig::default())
    }
}

/// Telemetry reads and writes over a store client
#[derive(Clone)]
pub struct TelemetryService {
    store: Arc<dyn TelemetryStore>,
    layout: TableLayout,
}

impl TelemetryService {
    pub fn new(store: Arc<dyn TelemetryStore>, layout: TableLayout) -> Self {
        Self { store, layout }
    }

    /// Descriptor for a read in `scope`, refined by the query parameters
    pub fn build_query(
        &self,
        scope: QueryScope,
        path: &PathParams,
        params: &QueryParams,
    ) -> QueryDescriptor {
        QueryDescriptor::new(
            self.layout.table_name.clone(),
            scope.partition_key_name(),
            scope.partition_key_value(path),
        )
        .with_index(self.layout.index_for(scope))
        .refine(params)
    }

    /// All records in `scope` matching the parameters
    #[instrument(skip(self, path, params), fields(scope = scope.as_str()))]
    pub async fn query(
        &self,
        scope: QueryScope,
        path: &PathParams,
        params: &QueryParams,
    ) -> Result<Vec<Item>> {
        let mut descriptor = self.build_query(scope, path, params);
        fetch_all(self.store.as_ref(), &mut descriptor).await
    }

    /// Validate, augment and store one reading from a raw request body
    #[instrument(
        skip(self, path, body),
        fields(project = path.get(PROJECT_ID).map(String::as_str).unwrap_or_default())
    )]
    pub async fn ingest(&self, path: &PathParams, body: &[u8]) -> Result<()> {
        let record = ingest::decode_body(body)?;
        let record = ingest::prepare_record(record, path)?;
        let item = to_storage_item(&record);

        self.store.put(item).await?;

        metrics::counter!("telemetry.records.written").increment(1);
        info!("Record added");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, TelemetryError};
    use crate::query::SortKeyCondition;
    use crate::store::{MockTelemetryStore, QueryPage};
    use crate::value::StorageValue;

    fn path(pairs: &[(&str, &str)]) -> PathParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn service(store: MockTelemetryStore) -> TelemetryService {
        TelemetryService::new(Arc::new(store), TableLayout::default())
    }

    #[test]
    fn test_build_project_query() {
        let svc = service(MockTelemetryStore::new());
        let query = svc.build_query(
            QueryScope::Project,
            &path(&[("ProjectId", "sensors")]),
            &QueryParams::default(),
        );

        assert_eq!(query.table_name, "Telemetry");
        assert_eq!(query.index_name.as_deref(), Some("ProjectId-EpochTime-index"));
        assert_eq!(query.partition_key_name, "ProjectId");
        assert_eq!(query.partition_key_value, "sensors");
        assert_eq!(query.sort_condition, SortKeyCondition::Unbounded);
    }

    #[test]
    fn test_build_device_query_uses_base_table() {
        let svc = service(MockTelemetryStore::new());
        let query = svc.build_query(
            QueryScope::Device,
            &path(&[("ProjectId", "sensors"), ("DeviceId", "test")]),
            &QueryParams {
                start: Some("100".into()),
                ..Default::default()
            },
        );

        assert_eq!(query.index_name, None);
        assert_eq!(query.partition_key_name, "ProjectId#DeviceId");
        assert_eq!(query.partition_key_value, "sensors#test");
        assert_eq!(query.sort_condition, SortKeyCondition::AtLeast("100".into()));
    }

    #[test]
    fn test_build_location_query() {
        let svc = service(MockTelemetryStore::new());
        let query = svc.build_query(
            QueryScope::Location,
            &path(&[("ProjectId", "sensors"), ("LocationId", "45203")]),
            &QueryParams {
                single: Some("true".into()),
                ..Default::default()
            },
        );

        assert_eq!(
            query.index_name.as_deref(),
            Some("ProjectIdLocationId-EpochTime-index")
        );
        assert_eq!(query.partition_key_value, "sensors#45203");
        assert!(query.is_single());
    }

    #[tokio::test]
    async fn test_query_device_hits_store() {
        let mut store = MockTelemetryStore::new();
        store
            .expect_query()
            .withf(|d: &QueryDescriptor| d.partition_key_value == "p1#d1")
            .times(1)
            .returning(|_| {
                Ok(QueryPage {
                    items: vec![Item::from([(
                        "DeviceId".to_string(),
                        StorageValue::S("d1".into()),
                    )])],
                    last_evaluated_key: None,
                })
            });

        let items = service(store)
            .query(
                QueryScope::Device,
                &path(&[("ProjectId", "p1"), ("DeviceId", "d1")]),
                &QueryParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_writes_marshaled_record() {
        let mut store = MockTelemetryStore::new();
        store
            .expect_put()
            .withf(|item: &Item| {
                item.get("ProjectId") == Some(&StorageValue::S("p1".into()))
                    && item.get("ProjectId#DeviceId") == Some(&StorageValue::S("p1#d1".into()))
                    && item.get("ProjectId#LocationId") == Some(&StorageValue::S("p1#l1".into()))
                    && item.get("EpochTime") == Some(&StorageValue::N("1".into()))
            })
            .times(1)
            .returning(|_| Ok(()));

        service(store)
            .ingest(
                &path(&[("ProjectId", "p1")]),
                br#"{"EpochTime": 1, "DeviceId": "d1", "LocationId": "l1"}"#,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ingest_validation_failure_never_writes() {
        let mut store = MockTelemetryStore::new();
        store.expect_put().times(0);

        let result = service(store)
            .ingest(&path(&[("ProjectId", "p1")]), br#"{"DeviceId": "d1"}"#)
            .await;
        assert!(matches!(result, Err(TelemetryError::MissingField("EpochTime"))));
    }

    #[tokio::test]
    async fn test_ingest_store_failure_propagates() {
        let mut store = MockTelemetryStore::new();
        store
            .expect_put()
            .times(1)
            .returning(|_| Err(StoreError::Put("conditional check".into())));

        let result = service(store)
            .ingest(
                &path(&[("ProjectId", "p1")]),
                br#"{"EpochTime": 1, "DeviceId": "d1"}"#,
            )
            .await;
        assert!(matches!(result, Err(TelemetryError::Store(StoreError::Put(_)))));
    }
}
