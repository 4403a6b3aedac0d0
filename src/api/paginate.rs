//! Offset-cursor listing of remote resources

use super::types::{DataTableSummary, DecrementTableSummary, TableStructure};
use super::ApiClient;
use crate::transport::{ApiRequest, Transport};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Page size requested from listing endpoints
pub const PAGE_LIMIT: u32 = 200;

/// Position of the next page to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub offset: u64,
    pub limit: u32,
}

impl PageCursor {
    pub fn first(limit: u32) -> Self {
        Self { offset: 0, limit }
    }

    /// Query string for this page; the first page omits `Offset`
    pub fn query(&self) -> String {
        if self.offset > 0 {
            format!("?Limit={}&Offset={}", self.limit, self.offset)
        } else {
            format!("?Limit={}", self.limit)
        }
    }
}

impl<T: Transport> ApiClient<T> {
    /// Fetch every page of `path`, returning items in server order
    ///
    /// Ends when a page has no `items` (including a failed call, which is logged) or no next
    /// `offset`. A server that always returns an offset keeps this looping.
    pub async fn paginate<R: DeserializeOwned>(&self, path: &str, limit: u32) -> Vec<R> {
        let mut cursor = PageCursor::first(limit);
        let mut all_items = Vec::new();

        loop {
            let envelope = self
                .transport
                .call(ApiRequest::get(format!("{}{}", path, cursor.query())))
                .await;

            let items = match envelope.field("items").and_then(Value::as_array) {
                Some(items) => items,
                None => {
                    if envelope.has_error {
                        warn!("Listing {} stopped: {}", path, envelope.describe());
                    } else {
                        debug!("Listing {} returned no items at offset {}", path, cursor.offset);
                    }
                    break;
                }
            };

            for item in items {
                match serde_json::from_value::<R>(item.clone()) {
                    Ok(record) => all_items.push(record),
                    Err(e) => warn!("Skipping malformed item in {}: {}", path, e),
                }
            }

            match envelope.field("offset").and_then(Value::as_u64) {
                Some(next) => cursor.offset = next,
                None => break,
            }
        }

        all_items
    }

    pub async fn list_table_structures(&self, model_id: i64) -> Vec<TableStructure> {
        let structures: Vec<TableStructure> = self
            .paginate(&format!("/Models/{}/TableStructures", model_id), PAGE_LIMIT)
            .await;
        info!("Listed {} table structures for model {}", structures.len(), model_id);
        structures
    }

    pub async fn list_data_tables(&self, model_id: i64) -> Vec<DataTableSummary> {
        let tables: Vec<DataTableSummary> = self
            .paginate(&format!("/Models/{}/DataTables", model_id), PAGE_LIMIT)
            .await;
        info!("Listed {} data tables for model {}", tables.len(), model_id);
        tables
    }

    pub async fn list_decrement_tables(&self, model_id: i64) -> Vec<DecrementTableSummary> {
        let tables: Vec<DecrementTableSummary> = self
            .paginate(&format!("/Models/{}/DecrementTables", model_id), PAGE_LIMIT)
            .await;
        info!("Listed {} decrement tables for model {}", tables.len(), model_id);
        tables
    }
}
