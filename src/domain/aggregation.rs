//! Aggregation Engine
//!
//! Folds scan events into order records. A fold is a read-modify-write
//! against the [`OrderStore`]; lost updates are prevented by the store's
//! conditional insert/update, with the whole fold re-run on conflict.

use crate::domain::errors::{PersistenceError, StoreError};
use crate::domain::models::{OrderRecord, ScanEvent};
use crate::domain::stages::StageSequence;
use crate::infrastructure::store::OrderStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_CONFLICT_RETRIES: u32 = 5;

#[derive(Clone)]
pub struct AggregationEngine {
    store: Arc<dyn OrderStore>,
    stages: Arc<StageSequence>,
    conflict_retries: u32,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn OrderStore>, stages: Arc<StageSequence>) -> Self {
        Self {
            store,
            stages,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }

    /// Number of times a fold is re-run after losing a race.
    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    /// Merges `event` into its order and returns the stored record.
    pub async fn fold_event(&self, event: &ScanEvent) -> Result<OrderRecord, PersistenceError> {
        let persistence_error = |cause: StoreError| PersistenceError {
            order_id: event.order_id.clone(),
            cause,
        };

        for attempt in 0..=self.conflict_retries {
            let existing = self
                .store
                .find_one(&event.order_id)
                .await
                .map_err(persistence_error)?;

            let result = match existing {
                None => {
                    let record = OrderRecord::first_scan(event, &self.stages);
                    self.store
                        .insert_one(record.clone())
                        .await
                        .map(|()| record)
                }
                Some(mut record) => {
                    let expected = record.version;
                    record.apply(event, &self.stages);
                    self.store
                        .update_one(&event.order_id, expected, record.as_update())
                        .await
                        .map(|version| {
                            record.version = version;
                            record
                        })
                }
            };

            match result {
                Ok(record) => {
                    info!(
                        order_id = %record.order_id,
                        stage = %event.stage,
                        current_stage = %record.current_stage,
                        duplicate_count = record.duplicate_count,
                        "Scan folded"
                    );
                    return Ok(record);
                }
                Err(e) if e.is_conflict() => {
                    debug!(
                        order_id = %event.order_id,
                        attempt,
                        "Concurrent write detected, retrying fold: {}",
                        e
                    );
                }
                Err(e) => return Err(persistence_error(e)),
            }
        }

        warn!(
            order_id = %event.order_id,
            retries = self.conflict_retries,
            "Fold abandoned after repeated conflicts"
        );
        Err(persistence_error(StoreError::ConflictRetriesExhausted(
            self.conflict_retries,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::OrderUpdate;
    use crate::infrastructure::store::InMemoryOrderStore;
    use async_trait::async_trait;
    use chrono::Utc;

    fn line() -> Arc<StageSequence> {
        Arc::new(
            StageSequence::new([
                "Tailoring",
                "Sewing_1",
                "Sewing_2",
                "Sewing_3",
                "Checking",
                "Ironing",
            ])
            .unwrap(),
        )
    }

    fn event(order_id: &str, stage: &str) -> ScanEvent {
        ScanEvent {
            order_id: order_id.to_string(),
            stage: stage.to_string(),
            scanning_device: "Scanner".to_string(),
            scanned_by: "Operator".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn engine() -> (AggregationEngine, Arc<InMemoryOrderStore>) {
        let store = Arc::new(InMemoryOrderStore::new());
        (AggregationEngine::new(store.clone(), line()), store)
    }

    #[tokio::test]
    async fn later_fold_of_earlier_stage_keeps_furthest_stage() {
        let (engine, _) = engine();
        engine.fold_event(&event("O1", "Sewing_2")).await.unwrap();
        let record = engine.fold_event(&event("O1", "Tailoring")).await.unwrap();

        assert_eq!(record.duplicate_count, 2);
        assert_eq!(record.current_stage, "Sewing_2");
    }

    #[tokio::test]
    async fn duplicate_count_equals_number_of_folds() {
        let (engine, store) = engine();
        let stages = ["Ironing", "Tailoring", "Tailoring", "Checking", "Sewing_1"];
        for stage in stages {
            engine.fold_event(&event("O2", stage)).await.unwrap();
        }

        let stored = store.find_one("O2").await.unwrap().unwrap();
        assert_eq!(stored.duplicate_count, stages.len() as u64);
        assert_eq!(stored.current_stage, "Ironing");
    }

    #[tokio::test]
    async fn entries_are_append_only() {
        let (engine, _) = engine();
        let first = engine.fold_event(&event("O3", "Checking")).await.unwrap();
        let second = engine.fold_event(&event("O3", "Sewing_3")).await.unwrap();

        assert_eq!(second.entries[..1], first.entries[..]);
        let stages: Vec<_> = second.entries.iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(stages, vec!["Checking", "Sewing_3"]);
    }

    #[tokio::test]
    async fn unranked_stages_fall_back_to_latest_event() {
        let (engine, _) = engine();
        engine.fold_event(&event("O4", "Printing")).await.unwrap();
        let record = engine.fold_event(&event("O4", "Packing")).await.unwrap();
        assert_eq!(record.current_stage, "Packing");
    }

    #[tokio::test]
    async fn concurrent_folds_for_same_order_are_not_lost() {
        let (engine, store) = engine();
        let a = event("O7", "Sewing_1");
        let b = event("O7", "Checking");

        let (ra, rb) = tokio::join!(engine.fold_event(&a), engine.fold_event(&b));
        ra.unwrap();
        rb.unwrap();

        let stored = store.find_one("O7").await.unwrap().unwrap();
        assert_eq!(stored.duplicate_count, 2);
        assert_eq!(stored.current_stage, "Checking");
    }

    struct BrokenStore;

    #[async_trait]
    impl OrderStore for BrokenStore {
        async fn find_one(&self, _: &str) -> Result<Option<OrderRecord>, StoreError> {
            Err(StoreError::Io("disk unplugged".to_string()))
        }

        async fn insert_one(&self, _: OrderRecord) -> Result<(), StoreError> {
            unreachable!()
        }

        async fn update_one(&self, _: &str, _: u64, _: OrderUpdate) -> Result<u64, StoreError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_persistence_error() {
        let engine = AggregationEngine::new(Arc::new(BrokenStore), line());
        let err = engine.fold_event(&event("O5", "Ironing")).await.unwrap_err();
        assert_eq!(err.order_id, "O5");
        assert_eq!(err.cause, StoreError::Io("disk unplugged".to_string()));
    }

    /// Reports a conflict on every update.
    struct ContendedStore(InMemoryOrderStore);

    #[async_trait]
    impl OrderStore for ContendedStore {
        async fn find_one(&self, order_id: &str) -> Result<Option<OrderRecord>, StoreError> {
            self.0.find_one(order_id).await
        }

        async fn insert_one(&self, record: OrderRecord) -> Result<(), StoreError> {
            self.0.insert_one(record).await
        }

        async fn update_one(
            &self,
            order_id: &str,
            expected: u64,
            _: OrderUpdate,
        ) -> Result<u64, StoreError> {
            Err(StoreError::VersionConflict {
                order_id: order_id.to_string(),
                expected,
                found: expected + 1,
            })
        }
    }

    #[tokio::test]
    async fn gives_up_after_configured_conflicts() {
        let engine = AggregationEngine::new(Arc::new(ContendedStore(InMemoryOrderStore::new())), line())
            .with_conflict_retries(2);
        engine.fold_event(&event("O6", "Tailoring")).await.unwrap();

        let err = engine.fold_event(&event("O6", "Ironing")).await.unwrap_err();
        assert_eq!(err.cause, StoreError::ConflictRetriesExhausted(2));
    }
}
