#![allow(dead_code)]

use async_trait::async_trait;
use stage_tracker::domain::errors::{RadioError, StoreError};
use stage_tracker::domain::models::{OrderRecord, OrderUpdate, PeripheralRecord};
use stage_tracker::domain::registry::PeripheralRegistry;
use stage_tracker::domain::stages::StageSequence;
use stage_tracker::infrastructure::radio::{
    Advertisement, PayloadStream, Radio, RadioConnection,
};
use stage_tracker::infrastructure::store::{InMemoryOrderStore, OrderStore};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Barrier};

pub const SCANNER_SEWING_2: &str = "AA:FC:4A:1C:10:35";
pub const SCANNER_TAILORING: &str = "AA:FC:8E:56:11:35";
pub const SCANNER_CHECKING: &str = "AA:FC:8C:18:12:33";

pub fn line() -> Arc<StageSequence> {
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

pub fn registry(stages: &StageSequence) -> Arc<PeripheralRegistry> {
    let record = |identity: &str, name: &str, stage: &str, operator: &str| PeripheralRecord {
        identity: identity.to_string(),
        display_name: name.to_string(),
        assigned_stage: stage.to_string(),
        assigned_operator: operator.to_string(),
    };
    Arc::new(
        PeripheralRegistry::new(
            [
                record(SCANNER_SEWING_2, "Scanner 5", "Sewing_2", "Zakhir"),
                record(SCANNER_TAILORING, "Scanner 3", "Tailoring", "Jatin"),
                record(SCANNER_CHECKING, "Scanner 1", "Checking", "Alpa"),
            ],
            stages,
        )
        .unwrap(),
    )
}

/// Behaviour of one fake scanner.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPeripheral {
    pub connect_error: Option<String>,
    pub subscribe_error: Option<String>,
    /// Crash the session task while subscribing
    pub panic_on_subscribe: bool,
    pub payloads: Vec<Vec<u8>>,
    /// Delay before each payload is notified
    pub spacing: Duration,
}

impl ScriptedPeripheral {
    pub fn sending(payloads: &[&str]) -> Self {
        Self {
            payloads: payloads.iter().map(|p| p.as_bytes().to_vec()).collect(),
            spacing: Duration::from_millis(100),
            ..Default::default()
        }
    }

    pub fn crashing() -> Self {
        Self {
            panic_on_subscribe: true,
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            connect_error: Some("device did not respond".to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct RadioStats {
    pub scans: AtomicUsize,
    pub connects: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    pub closes: AtomicUsize,
}

impl RadioStats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// In-process radio driven by per-address scripts.
#[derive(Default)]
pub struct FakeRadio {
    peripherals: Mutex<BTreeMap<String, ScriptedPeripheral>>,
    strangers: Vec<Advertisement>,
    scan_error: Option<String>,
    pub stats: Arc<RadioStats>,
}

impl FakeRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peripheral(self, identity: &str, script: ScriptedPeripheral) -> Self {
        self.peripherals
            .lock()
            .unwrap()
            .insert(identity.to_string(), script);
        self
    }

    /// A device that advertises but is not registered.
    pub fn with_stranger(mut self, identity: &str) -> Self {
        self.strangers.push(Advertisement {
            identity: identity.to_string(),
            advertised_name: Some("BarCode Bluetooth BLE".to_string()),
        });
        self
    }

    pub fn failing_scan(mut self, reason: &str) -> Self {
        self.scan_error = Some(reason.to_string());
        self
    }

    pub fn set_script(&self, identity: &str, script: ScriptedPeripheral) {
        self.peripherals
            .lock()
            .unwrap()
            .insert(identity.to_string(), script);
    }
}

#[async_trait]
impl Radio for FakeRadio {
    async fn scan_advertisements(
        &self,
        timeout: Duration,
    ) -> Result<Vec<Advertisement>, RadioError> {
        self.stats.scans.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.scan_error {
            return Err(RadioError::Scan(reason.clone()));
        }
        tokio::time::sleep(timeout).await;

        let mut seen: Vec<Advertisement> = self
            .peripherals
            .lock()
            .unwrap()
            .keys()
            .map(|identity| Advertisement {
                // Lower-case on purpose: identities are matched case-insensitively.
                identity: identity.to_lowercase(),
                advertised_name: Some("BarCode Bluetooth BLE".to_string()),
            })
            .collect();
        seen.extend(self.strangers.iter().cloned());
        Ok(seen)
    }

    async fn connect(&self, identity: &str) -> Result<Box<dyn RadioConnection>, RadioError> {
        let script = self
            .peripherals
            .lock()
            .unwrap()
            .get(identity)
            .cloned()
            .ok_or_else(|| RadioError::Connect {
                identity: identity.to_string(),
                reason: "not in range".to_string(),
            })?;

        if let Some(reason) = &script.connect_error {
            return Err(RadioError::Connect {
                identity: identity.to_string(),
                reason: reason.clone(),
            });
        }

        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            script,
            sender: None,
            stats: self.stats.clone(),
        }))
    }
}

struct FakeConnection {
    script: ScriptedPeripheral,
    /// Keeps the stream open until unsubscribe, like a live device.
    sender: Option<mpsc::UnboundedSender<Vec<u8>>>,
    stats: Arc<RadioStats>,
}

#[async_trait]
impl RadioConnection for FakeConnection {
    async fn subscribe(&mut self, _characteristic: &str) -> Result<PayloadStream, RadioError> {
        if self.script.panic_on_subscribe {
            panic!("scanner firmware fault");
        }
        if let Some(reason) = &self.script.subscribe_error {
            return Err(RadioError::Subscribe(reason.clone()));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let notifier = sender.clone();
        let payloads = self.script.payloads.clone();
        let spacing = self.script.spacing;
        tokio::spawn(async move {
            for payload in payloads {
                tokio::time::sleep(spacing).await;
                if notifier.send(payload).is_err() {
                    break;
                }
            }
        });

        self.sender = Some(sender);
        Ok(receiver)
    }

    async fn unsubscribe(&mut self, _characteristic: &str) -> Result<(), RadioError> {
        self.sender = None;
        self.stats.unsubscribes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RadioError> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Holds the first two reads at a barrier so both folds see the same
/// snapshot before either writes.
pub struct RacingStore {
    pub inner: InMemoryOrderStore,
    barrier: Barrier,
    reads: AtomicUsize,
}

impl RacingStore {
    pub fn new(inner: InMemoryOrderStore) -> Self {
        Self {
            inner,
            barrier: Barrier::new(2),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for RacingStore {
    async fn find_one(&self, order_id: &str) -> Result<Option<OrderRecord>, StoreError> {
        let snapshot = self.inner.find_one(order_id).await;
        if self.reads.fetch_add(1, Ordering::SeqCst) < 2 {
            self.barrier.wait().await;
        }
        snapshot
    }

    async fn insert_one(&self, record: OrderRecord) -> Result<(), StoreError> {
        self.inner.insert_one(record).await
    }

    async fn update_one(
        &self,
        order_id: &str,
        expected_version: u64,
        update: OrderUpdate,
    ) -> Result<u64, StoreError> {
        self.inner.update_one(order_id, expected_version, update).await
    }
}

/// Fails the first `failures` writes with an I/O error.
pub struct FlakyStore {
    pub inner: InMemoryOrderStore,
    failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryOrderStore::new(),
            failures: AtomicUsize::new(failures),
        }
    }

    fn fail(&self) -> Result<(), StoreError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Io("write timed out".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for FlakyStore {
    async fn find_one(&self, order_id: &str) -> Result<Option<OrderRecord>, StoreError> {
        self.inner.find_one(order_id).await
    }

    async fn insert_one(&self, record: OrderRecord) -> Result<(), StoreError> {
        self.fail()?;
        self.inner.insert_one(record).await
    }

    async fn update_one(
        &self,
        order_id: &str,
        expected_version: u64,
        update: OrderUpdate,
    ) -> Result<u64, StoreError> {
        self.fail()?;
        self.inner.update_one(order_id, expected_version, update).await
    }
}
