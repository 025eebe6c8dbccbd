use crate::config::DynamoDbConfig;
use crate::error::StoreError;
use crate::query::QueryDescriptor;
use crate::store::{QueryPage, TelemetryStore};
use crate::value::{Item, StorageValue};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::Builder as DynamoDbConfigBuilder;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_types::region::Region;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// DynamoDB-backed telemetry store
pub struct DynamoDbStore {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbStore {
    /// Create a new store client from the shared AWS configuration chain
    pub async fn new(config: &DynamoDbConfig) -> anyhow::Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut dynamodb_config_builder = DynamoDbConfigBuilder::from(&aws_config);

        // Configure custom endpoint for DynamoDB Local/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            dynamodb_config_builder = dynamodb_config_builder.endpoint_url(endpoint_url);
        }

        let client = DynamoDbClient::from_conf(dynamodb_config_builder.build());

        info!(
            table = %config.table_name,
            region = %config.region,
            "DynamoDB store initialized"
        );

        Ok(Self::from_client(client, config.table_name.clone()))
    }

    pub fn from_client(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl TelemetryStore for DynamoDbStore {
    #[instrument(
        skip(self, descriptor),
        fields(table = %descriptor.table_name, index = ?descriptor.index_name)
    )]
    async fn query(&self, descriptor: &QueryDescriptor) -> Result<QueryPage, StoreError> {
        let output = self
            .client
            .query()
            .table_name(&descriptor.table_name)
            .set_index_name(descriptor.index_name.clone())
            .key_condition_expression(descriptor.key_condition_expression())
            .set_expression_attribute_names(Some(descriptor.expression_attribute_names()))
            .set_expression_attribute_values(Some(to_sdk_item(
                &descriptor.expression_attribute_values(),
            )))
            .set_limit(descriptor.limit)
            .scan_index_forward(descriptor.scan_forward)
            .set_exclusive_start_key(descriptor.exclusive_start_key.as_ref().map(to_sdk_item))
            .send()
            .await
            .map_err(|e| StoreError::Query(DisplayErrorContext(&e).to_string()))?;

        let items: Vec<Item> = output.items().iter().map(from_sdk_item).collect();
        let last_evaluated_key = output.last_evaluated_key().map(from_sdk_item);

        debug!(
            count = items.len(),
            more = last_evaluated_key.is_some(),
            "Query page received"
        );

        Ok(QueryPage {
            items,
            last_evaluated_key,
        })
    }

    #[instrument(skip(self, item), fields(table = %self.table_name))]
    async fn put(&self, item: Item) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_sdk_item(&item)))
            .send()
            .await
            .map_err(|e| StoreError::Put(DisplayErrorContext(&e).to_string()))?;

        debug!("Item put");
        Ok(())
    }
}

/// Convert a typed value into the SDK representation
pub fn to_sdk_value(value: &StorageValue) -> AttributeValue {
    match value {
        StorageValue::S(s) => AttributeValue::S(s.clone()),
        StorageValue::N(n) => AttributeValue::N(n.clone()),
        StorageValue::Bool(b) => AttributeValue::Bool(*b),
        StorageValue::L(values) => AttributeValue::L(values.iter().map(to_sdk_value).collect()),
        StorageValue::M(map) => AttributeValue::M(to_sdk_item(map)),
        StorageValue::Null => AttributeValue::Null(true),
    }
}

pub fn to_sdk_item(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(key, value)| (key.clone(), to_sdk_value(value)))
        .collect()
}

/// Convert an SDK value read from the table into a typed value.
///
/// Attribute kinds outside the closed value set are folded into it: binary
/// becomes base64 text and sets become lists. Kinds this SDK version does not
/// know map to null.
pub fn from_sdk_value(value: &AttributeValue) -> StorageValue {
    match value {
        AttributeValue::S(s) => StorageValue::S(s.clone()),
        AttributeValue::N(n) => StorageValue::N(n.clone()),
        AttributeValue::Bool(b) => StorageValue::Bool(*b),
        AttributeValue::L(values) => StorageValue::L(values.iter().map(from_sdk_value).collect()),
        AttributeValue::M(map) => StorageValue::M(from_sdk_item(map)),
        AttributeValue::Null(_) => StorageValue::Null,
        AttributeValue::B(blob) => StorageValue::S(STANDARD.encode(blob.as_ref())),
        AttributeValue::Ss(values) => {
            StorageValue::L(values.iter().cloned().map(StorageValue::S).collect())
        }
        AttributeValue::Ns(values) => {
            StorageValue::L(values.iter().cloned().map(StorageValue::N).collect())
        }
        AttributeValue::Bs(blobs) => StorageValue::L(
            blobs
                .iter()
                .map(|blob| StorageValue::S(STANDARD.encode(blob.as_ref())))
                .collect(),
        ),
        _ => StorageValue::Null,
    }
}

pub fn from_sdk_item(item: &HashMap<String, AttributeValue>) -> Item {
    item.iter()
        .map(|(key, value)| (key.clone(), from_sdk_value(value)))
        .collect()
}
