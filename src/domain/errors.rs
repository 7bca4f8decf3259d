//! Error taxonomy for a scan cycle.
//!
//! Only [`DiscoveryError`] is fatal to a cycle. Session, decode and
//! persistence failures are recorded per peripheral or per fold in the
//! [`CycleReport`](crate::domain::models::CycleReport).

use thiserror::Error;

/// Faults raised by a radio backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RadioError {
    #[error("advertisement scan failed: {0}")]
    Scan(String),
    #[error("connection to {identity} failed: {reason}")]
    Connect { identity: String, reason: String },
    #[error("characteristic {characteristic} not found")]
    CharacteristicNotFound { characteristic: String },
    #[error("subscription failed: {0}")]
    Subscribe(String),
    #[error("radio backend error: {0}")]
    Backend(String),
}

impl RadioError {
    /// Reclassifies a fault raised while scanning as [`RadioError::Scan`]
    /// without nesting messages.
    pub fn into_scan(self) -> Self {
        match self {
            Self::Scan(_) => self,
            Self::Backend(reason) => Self::Scan(reason),
            other => Self::Scan(other.to_string()),
        }
    }
}

/// Faults raised by an order store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("order {0} already exists")]
    DuplicateKey(String),
    #[error("order {0} does not exist")]
    NotFound(String),
    #[error("order {order_id} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        order_id: String,
        expected: u64,
        found: u64,
    },
    #[error("gave up after {0} conflicting updates")]
    ConflictRetriesExhausted(u32),
    #[error("storage I/O error: {0}")]
    Io(String),
    #[error("storage encoding error: {0}")]
    Encoding(String),
}

impl StoreError {
    /// Conflicts are resolved by re-reading and re-applying the fold.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::DuplicateKey(_) | Self::VersionConflict { .. })
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

/// The radio scan itself failed. Fatal to the cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("discovery failed: {0}")]
pub struct DiscoveryError(#[from] pub RadioError);

/// Per-peripheral session failure. Never crosses into sibling sessions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("could not connect to {identity}: {cause}")]
    Connect { identity: String, cause: RadioError },
    #[error("session with {identity} failed: {cause}")]
    Session { identity: String, cause: String },
}

/// A single notification could not be turned into an order id.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadDecodeError {
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("payload is empty")]
    Empty,
}

/// A fold did not happen. The event is untouched and may be folded again.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("could not persist scan for order {order_id}: {cause}")]
pub struct PersistenceError {
    pub order_id: String,
    pub cause: StoreError,
}

/// Invalid line configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("stage {0} appears more than once in the stage sequence")]
    DuplicateStage(String),
    #[error("stage sequence is empty")]
    EmptyStageSequence,
    #[error("peripheral {identity} is assigned to unknown stage {stage}")]
    UnknownStage { identity: String, stage: String },
    #[error("peripheral {0} is registered more than once")]
    DuplicatePeripheral(String),
}
