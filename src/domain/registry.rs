//! Known scanners and the stage/operator each one is bound to.

use crate::domain::errors::ConfigError;
use crate::domain::models::PeripheralRecord;
use crate::domain::stages::StageSequence;
use std::collections::HashMap;

/// Placeholder used for scans coming from an unregistered scanner.
pub const UNKNOWN: &str = "Unknown";

/// Result of a registry lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peripheral<'a> {
    Known(&'a PeripheralRecord),
    Unknown,
}

impl<'a> Peripheral<'a> {
    pub fn display_name(&self) -> &'a str {
        match *self {
            Self::Known(record) => &record.display_name,
            Self::Unknown => UNKNOWN,
        }
    }

    pub fn stage(&self) -> &'a str {
        match *self {
            Self::Known(record) => &record.assigned_stage,
            Self::Unknown => UNKNOWN,
        }
    }

    pub fn operator(&self) -> &'a str {
        match *self {
            Self::Known(record) => &record.assigned_operator,
            Self::Unknown => UNKNOWN,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

/// Immutable after construction; shared freely between sessions.
#[derive(Debug, Clone)]
pub struct PeripheralRegistry {
    peripherals: HashMap<String, PeripheralRecord>,
}

impl PeripheralRegistry {
    /// Builds the registry, checking every assigned stage against `stages`.
    pub fn new(
        records: impl IntoIterator<Item = PeripheralRecord>,
        stages: &StageSequence,
    ) -> Result<Self, ConfigError> {
        let mut peripherals = HashMap::new();
        for mut record in records {
            if !stages.contains(&record.assigned_stage) {
                return Err(ConfigError::UnknownStage {
                    identity: record.identity,
                    stage: record.assigned_stage,
                });
            }
            record.identity = normalize_identity(&record.identity);
            if peripherals.contains_key(&record.identity) {
                return Err(ConfigError::DuplicatePeripheral(record.identity));
            }
            peripherals.insert(record.identity.clone(), record);
        }
        Ok(Self { peripherals })
    }

    pub fn lookup(&self, identity: &str) -> Peripheral<'_> {
        match self.peripherals.get(&normalize_identity(identity)) {
            Some(record) => Peripheral::Known(record),
            None => Peripheral::Unknown,
        }
    }

    pub fn is_known(&self, identity: &str) -> bool {
        self.lookup(identity).is_known()
    }

    pub fn len(&self) -> usize {
        self.peripherals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peripherals.is_empty()
    }
}

/// Hardware addresses are compared case-insensitively.
pub fn normalize_identity(identity: &str) -> String {
    identity.trim().to_ascii_uppercase()
}
