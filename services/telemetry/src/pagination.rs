use crate::error::Result;
use crate::query::QueryDescriptor;
use crate::store::TelemetryStore;
use crate::value::Item;
use tracing::{debug, instrument};

/// Run `descriptor` to completion, following continuation tokens.
///
/// Pages are fetched one after another; items keep the store's order within
/// a page and page arrival order across pages. In single mode only the first
/// page is read, whatever token it returns. The first store error aborts the
/// whole fetch and nothing collected so far is returned.
#[instrument(
    skip(store, descriptor),
    fields(
        index = descriptor.index_name.as_deref().unwrap_or("<table>"),
        single = descriptor.is_single()
    )
)]
pub async fn fetch_all(
    store: &dyn TelemetryStore,
    descriptor: &mut QueryDescriptor,
) -> Result<Vec<Item>> {
    let single = descriptor.is_single();
    let mut items = Vec::new();
    let mut pages = 0u32;

    loop {
        let page = store.query(descriptor).await.map_err(|e| {
            metrics::counter!("telemetry.store.errors").increment(1);
            e
        })?;
        pages += 1;

        let next = page.continuation().cloned();
        items.extend(page.items);

        match next {
            Some(key) if !single => {
                debug!(pages, items = items.len(), "Fetching next page");
                descriptor.exclusive_start_key = Some(key);
            }
            _ => break,
        }
    }

    metrics::counter!("telemetry.query.pages").increment(u64::from(pages));
    metrics::counter!("telemetry.records.returned").increment(items.len() as u64);
    debug!(pages, items = items.len(), "Query complete");

    Ok(items)
}
