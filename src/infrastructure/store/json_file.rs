use super::{insert_record, update_record, OrderStore};
use crate::domain::errors::StoreError;
use crate::domain::models::{OrderRecord, OrderUpdate};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Order store persisted as one JSON array on disk.
///
/// Every write rewrites the whole document through a temporary file and a
/// rename, so a crash leaves either the old or the new document.
pub struct JsonFileOrderStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, OrderRecord>>,
}

impl JsonFileOrderStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                let list: Vec<OrderRecord> = serde_json::from_str(&contents)?;
                list.into_iter()
                    .map(|r| (r.order_id.clone(), r))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            orders = records.len(),
            "Order store opened"
        );

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn records(&self) -> Vec<OrderRecord> {
        self.records.lock().await.values().cloned().collect()
    }

    async fn persist(&self, records: &BTreeMap<String, OrderRecord>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let list: Vec<&OrderRecord> = records.values().collect();
        let json = serde_json::to_string_pretty(&list)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), orders = list.len(), "Order store written");
        Ok(())
    }
}

#[async_trait]
impl OrderStore for JsonFileOrderStore {
    async fn find_one(&self, order_id: &str) -> Result<Option<OrderRecord>, StoreError> {
        Ok(self.records.lock().await.get(order_id).cloned())
    }

    async fn insert_one(&self, record: OrderRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        // Disk first, memory second: a failed write leaves nothing changed.
        let mut next = records.clone();
        insert_record(&mut next, record)?;
        self.persist(&next).await?;
        *records = next;
        Ok(())
    }

    async fn update_one(
        &self,
        order_id: &str,
        expected_version: u64,
        update: OrderUpdate,
    ) -> Result<u64, StoreError> {
        let mut records = self.records.lock().await;
        let mut next = records.clone();
        let version = update_record(&mut next, order_id, expected_version, update)?;
        self.persist(&next).await?;
        *records = next;
        Ok(version)
    }
}
