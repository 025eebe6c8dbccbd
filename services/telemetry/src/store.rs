use crate::error::StoreError;
use crate::query::QueryDescriptor;
use crate::value::Item;
use async_trait::async_trait;

/// One page of query results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    /// Where the next page starts; `None` or empty when this was the last page
    pub last_evaluated_key: Option<Item>,
}

impl QueryPage {
    /// Continuation token, if the store reported more results
    pub fn continuation(&self) -> Option<&Item> {
        self.last_evaluated_key.as_ref().filter(|key| !key.is_empty())
    }
}

/// Key-value store with partition/sort-key queries and continuation-token
/// pagination. The DynamoDB client implements this; tests substitute mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Fetch a single page for the descriptor
    async fn query(&self, descriptor: &QueryDescriptor) -> Result<QueryPage, StoreError>;

    /// Insert a record, replacing any record with the same full key
    async fn put(&self, item: Item) -> Result<(), StoreError>;
}
