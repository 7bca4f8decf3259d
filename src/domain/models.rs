use crate::domain::stages::StageSequence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fixed-position scanner and the stage it is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralRecord {
    /// Hardware address, e.g. `AA:FC:4A:1C:10:35`
    pub identity: String,
    pub display_name: String,
    pub assigned_stage: String,
    pub assigned_operator: String,
}

/// A decoded notification, stamped when the session received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPayload {
    pub text: String,
    pub received_at: DateTime<Utc>,
}

/// One scan ready to be folded into an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub order_id: String,
    pub stage: String,
    pub scanning_device: String,
    pub scanned_by: String,
    pub timestamp: DateTime<Utc>,
}

/// One recorded scan inside an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub stage: String,
    pub scanning_device: String,
    pub scanned_by: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&ScanEvent> for ScanEntry {
    fn from(event: &ScanEvent) -> Self {
        Self {
            stage: event.stage.clone(),
            scanning_device: event.scanning_device.clone(),
            scanned_by: event.scanned_by.clone(),
            timestamp: event.timestamp,
        }
    }
}

/// Durable progress record of a single order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub duplicate_count: u64,
    pub current_stage: String,
    pub entries: Vec<ScanEntry>,
    /// Bumped by the store on every successful update
    #[serde(default)]
    pub version: u64,
}

impl OrderRecord {
    /// Record for an order seen for the first time.
    pub fn first_scan(event: &ScanEvent, stages: &StageSequence) -> Self {
        let mut record = Self {
            order_id: event.order_id.clone(),
            duplicate_count: 1,
            current_stage: String::new(),
            entries: vec![ScanEntry::from(event)],
            version: 0,
        };
        record.current_stage = record.derive_current_stage(stages, &event.stage);
        record
    }

    /// Appends `event` and recomputes the derived fields.
    pub fn apply(&mut self, event: &ScanEvent, stages: &StageSequence) {
        self.duplicate_count += 1;
        self.entries.push(ScanEntry::from(event));
        self.current_stage = self.derive_current_stage(stages, &event.stage);
    }

    fn derive_current_stage(&self, stages: &StageSequence, fallback: &str) -> String {
        stages
            .current_stage(self.entries.iter().map(|e| e.stage.as_str()), fallback)
            .to_string()
    }

    pub fn as_update(&self) -> OrderUpdate {
        OrderUpdate {
            current_stage: self.current_stage.clone(),
            duplicate_count: self.duplicate_count,
            entries: self.entries.clone(),
        }
    }
}

/// Fields replaced together by a single store update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub current_stage: String,
    pub duplicate_count: u64,
    pub entries: Vec<ScanEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    ConnectFailed { cause: String },
    Failed { cause: String },
}

impl SessionOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FoldOutcome {
    Folded {
        order_id: String,
        current_stage: String,
        duplicate_count: u64,
    },
    /// The event was not persisted. It can be handed back to the engine.
    Failed { event: ScanEvent, cause: String },
}

impl FoldOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralReport {
    pub identity: String,
    pub display_name: String,
    pub stage: String,
    pub session: SessionOutcome,
    /// Payloads that produced a scan event
    pub payload_count: usize,
    /// Payloads that did not decode or carried no order id
    pub skipped_payloads: usize,
    pub folds: Vec<FoldOutcome>,
}

/// Result of one discovery + sessions + folds run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub peripherals: Vec<PeripheralReport>,
}

impl CycleReport {
    pub fn no_peripherals_found(&self) -> bool {
        self.peripherals.is_empty()
    }

    pub fn failed_sessions(&self) -> impl Iterator<Item = &PeripheralReport> {
        self.peripherals.iter().filter(|p| p.session.is_failure())
    }

    pub fn failed_folds(&self) -> impl Iterator<Item = &FoldOutcome> {
        self.peripherals
            .iter()
            .flat_map(|p| p.folds.iter())
            .filter(|f| f.is_failure())
    }

    pub fn total_payloads(&self) -> usize {
        self.peripherals.iter().map(|p| p.payload_count).sum()
    }

    pub fn peripheral(&self, identity: &str) -> Option<&PeripheralReport> {
        self.peripherals
            .iter()
            .find(|p| p.identity.eq_ignore_ascii_case(identity))
    }
}

/// Progress notifications for whoever is displaying a cycle.
#[derive(Debug, Clone)]
pub enum CycleEvent {
    DiscoveryStarted,
    PeripheralsFound(Vec<String>),
    SessionConnected { identity: String },
    PayloadReceived { identity: String, payload: String },
    SessionFinished { identity: String, outcome: SessionOutcome },
    OrderFolded(FoldOutcome),
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
