//! Session Runner
//!
//! One bounded session per scanner:
//!
//! ```text
//! Connecting ──▶ Subscribed ──▶ Collecting (collect window) ──▶ Closing ──▶ Done
//!      │              │                                            ▲
//!      └──▶ Failed    └──────────── subscribe error ───────────────┘──▶ Failed
//! ```
//!
//! Closing always runs once a connection exists, whatever happened while
//! collecting.

use crate::domain::errors::SessionError;
use crate::domain::models::{CycleEvent, ReceivedPayload};
use crate::infrastructure::bluetooth::protocol::{self, DATA_CHAR_UUID};
use crate::infrastructure::radio::{Radio, RadioConnection};
use crate::orchestration::EventSink;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Stand-in deadline for windows too large to represent.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}

/// Everything a session collected, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOutput {
    pub payloads: Vec<ReceivedPayload>,
    /// Notifications dropped because they did not decode
    pub skipped: usize,
}

#[derive(Clone)]
pub struct SessionRunner {
    radio: Arc<dyn Radio>,
    characteristic: String,
    events: EventSink,
}

impl SessionRunner {
    pub fn new(radio: Arc<dyn Radio>) -> Self {
        Self {
            radio,
            characteristic: DATA_CHAR_UUID.to_string(),
            events: EventSink::default(),
        }
    }

    pub fn with_characteristic(mut self, characteristic: impl Into<String>) -> Self {
        self.characteristic = characteristic.into();
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub async fn run_session(
        &self,
        identity: &str,
        collect_window: Duration,
    ) -> Result<SessionOutput, SessionError> {
        let mut connection =
            self.radio
                .connect(identity)
                .await
                .map_err(|cause| SessionError::Connect {
                    identity: identity.to_string(),
                    cause,
                })?;

        info!(identity, "Scanner connected");
        self.events.emit(CycleEvent::SessionConnected {
            identity: identity.to_string(),
        });

        let collected = self
            .collect(&mut connection, identity, collect_window)
            .await;

        if let Err(e) = connection.unsubscribe(&self.characteristic).await {
            warn!(identity, "Failed to unsubscribe: {}", e);
        }
        if let Err(e) = connection.close().await {
            warn!(identity, "Failed to close connection: {}", e);
        }

        collected
    }

    async fn collect(
        &self,
        connection: &mut Box<dyn RadioConnection>,
        identity: &str,
        collect_window: Duration,
    ) -> Result<SessionOutput, SessionError> {
        let mut stream = connection
            .subscribe(&self.characteristic)
            .await
            .map_err(|e| SessionError::Session {
                identity: identity.to_string(),
                cause: e.to_string(),
            })?;

        let deadline = Instant::now()
            .checked_add(collect_window)
            .unwrap_or_else(far_future);
        let mut output = SessionOutput::default();

        loop {
            let bytes = match tokio::time::timeout_at(deadline, stream.recv()).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    debug!(identity, "Payload stream closed before the window ended");
                    break;
                }
                Err(_) => break,
            };
            let received_at = Utc::now();

            match protocol::decode_payload(&bytes) {
                Ok(text) => {
                    debug!(identity, payload = %text, "Payload received");
                    self.events.emit(CycleEvent::PayloadReceived {
                        identity: identity.to_string(),
                        payload: text.clone(),
                    });
                    output.payloads.push(ReceivedPayload { text, received_at });
                }
                Err(e) => {
                    warn!(identity, len = bytes.len(), "Skipping payload: {}", e);
                    output.skipped += 1;
                }
            }
        }

        info!(
            identity,
            payloads = output.payloads.len(),
            skipped = output.skipped,
            "Collection window closed"
        );
        Ok(output)
    }
}
