//! Scan cycle orchestration.
//!
//! ```text
//! discover ──▶ run_session × N (concurrent) ──▶ fold_event × payloads ──▶ CycleReport
//! ```
//!
//! - [`discovery`] - which known scanners are advertising right now
//! - [`session`] - connect → subscribe → collect → close, per scanner
//! - [`cycle`] - fan-out/fan-in driver producing the [`CycleReport`](crate::domain::models::CycleReport)

pub mod cycle;
pub mod discovery;
pub mod session;

pub use cycle::Orchestrator;
pub use discovery::DiscoveryService;
pub use session::{SessionOutput, SessionRunner};

use crate::domain::models::{CycleEvent, MessageSeverity, StatusMessage};
use tokio::sync::mpsc;

/// Optional progress channel towards a front end.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<mpsc::UnboundedSender<CycleEvent>>,
}

impl EventSink {
    pub fn new(sender: mpsc::UnboundedSender<CycleEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn emit(&self, event: CycleEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn log(&self, message: impl Into<String>, severity: MessageSeverity) {
        self.emit(CycleEvent::LogMessage(StatusMessage {
            message: message.into(),
            severity,
        }));
    }
}
