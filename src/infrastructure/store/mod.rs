//! Order Store
//!
//! Durable keyed storage for [`OrderRecord`]s. The aggregation engine only
//! ever reads one record, inserts one record, or updates one record.
//!
//! ## Atomicity
//!
//! - [`OrderStore::insert_one`] fails with [`StoreError::DuplicateKey`] if the
//!   order already exists.
//! - [`OrderStore::update_one`] is a compare-and-swap on
//!   [`OrderRecord::version`] and fails with [`StoreError::VersionConflict`]
//!   if another writer got there first.
//!
//! ## Implementations
//!
//! - [`memory`] - process-local store
//! - [`json_file`] - single JSON document on disk

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileOrderStore;
pub use memory::InMemoryOrderStore;

use crate::domain::errors::StoreError;
use crate::domain::models::{OrderRecord, OrderUpdate};
use async_trait::async_trait;
use std::collections::BTreeMap;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_one(&self, order_id: &str) -> Result<Option<OrderRecord>, StoreError>;

    async fn insert_one(&self, record: OrderRecord) -> Result<(), StoreError>;

    /// Replaces the fields of `update` if the stored version still equals
    /// `expected_version`. Returns the new version.
    async fn update_one(
        &self,
        order_id: &str,
        expected_version: u64,
        update: OrderUpdate,
    ) -> Result<u64, StoreError>;
}

/// Insert rule shared by the bundled stores.
pub(crate) fn insert_record(
    records: &mut BTreeMap<String, OrderRecord>,
    mut record: OrderRecord,
) -> Result<(), StoreError> {
    if records.contains_key(&record.order_id) {
        return Err(StoreError::DuplicateKey(record.order_id));
    }
    record.version = 0;
    records.insert(record.order_id.clone(), record);
    Ok(())
}

/// Compare-and-swap rule shared by the bundled stores.
pub(crate) fn update_record(
    records: &mut BTreeMap<String, OrderRecord>,
    order_id: &str,
    expected_version: u64,
    update: OrderUpdate,
) -> Result<u64, StoreError> {
    let record = records
        .get_mut(order_id)
        .ok_or_else(|| StoreError::NotFound(order_id.to_string()))?;

    if record.version != expected_version {
        return Err(StoreError::VersionConflict {
            order_id: order_id.to_string(),
            expected: expected_version,
            found: record.version,
        });
    }

    record.current_stage = update.current_stage;
    record.duplicate_count = update.duplicate_count;
    record.entries = update.entries;
    record.version += 1;
    Ok(record.version)
}
