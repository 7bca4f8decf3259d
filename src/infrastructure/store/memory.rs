use super::{insert_record, update_record, OrderStore};
use crate::domain::errors::StoreError;
use crate::domain::models::{OrderRecord, OrderUpdate};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Order store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    records: RwLock<BTreeMap<String, OrderRecord>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, ordered by order id.
    pub async fn records(&self) -> Vec<OrderRecord> {
        self.records.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_one(&self, order_id: &str) -> Result<Option<OrderRecord>, StoreError> {
        Ok(self.records.read().await.get(order_id).cloned())
    }

    async fn insert_one(&self, record: OrderRecord) -> Result<(), StoreError> {
        insert_record(&mut *self.records.write().await, record)
    }

    async fn update_one(
        &self,
        order_id: &str,
        expected_version: u64,
        update: OrderUpdate,
    ) -> Result<u64, StoreError> {
        update_record(
            &mut *self.records.write().await,
            order_id,
            expected_version,
            update,
        )
    }
}
