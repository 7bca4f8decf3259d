use crate::domain::aggregation::AggregationEngine;
use crate::domain::errors::{ConfigError, DiscoveryError, SessionError};
use crate::domain::models::{
    CycleEvent, CycleReport, FoldOutcome, MessageSeverity, PeripheralReport, ReceivedPayload,
    ScanEvent, SessionOutcome,
};
use crate::domain::registry::{Peripheral, PeripheralRegistry};
use crate::domain::settings::{OrderIdFormat, Settings};
use crate::domain::stages::StageSequence;
use crate::infrastructure::radio::Radio;
use crate::infrastructure::store::OrderStore;
use crate::orchestration::{DiscoveryService, EventSink, SessionOutput, SessionRunner};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Runs discovery, one concurrent session per scanner found, then folds.
pub struct Orchestrator {
    discovery: DiscoveryService,
    sessions: SessionRunner,
    engine: AggregationEngine,
    registry: Arc<PeripheralRegistry>,
    order_id_format: OrderIdFormat,
    events: EventSink,
}

impl Orchestrator {
    pub fn new(
        radio: Arc<dyn Radio>,
        store: Arc<dyn OrderStore>,
        registry: Arc<PeripheralRegistry>,
        stages: Arc<StageSequence>,
    ) -> Self {
        Self {
            discovery: DiscoveryService::new(radio.clone(), registry.clone()),
            sessions: SessionRunner::new(radio),
            engine: AggregationEngine::new(store, stages),
            registry,
            order_id_format: OrderIdFormat::default(),
            events: EventSink::default(),
        }
    }

    /// Builds an orchestrator from validated settings.
    pub fn from_settings(
        settings: &Settings,
        radio: Arc<dyn Radio>,
        store: Arc<dyn OrderStore>,
    ) -> Result<Self, ConfigError> {
        let stages = settings.build_stage_sequence()?;
        let registry = settings.build_registry(&stages)?;

        let mut orchestrator = Self::new(radio, store, Arc::new(registry), Arc::new(stages))
            .with_order_id_format(settings.order_id_format);
        orchestrator.sessions = orchestrator
            .sessions
            .with_characteristic(settings.data_characteristic_uuid.clone());
        orchestrator.engine = orchestrator
            .engine
            .with_conflict_retries(settings.fold_conflict_retries);
        Ok(orchestrator)
    }

    pub fn with_order_id_format(mut self, format: OrderIdFormat) -> Self {
        self.order_id_format = format;
        self
    }

    pub fn with_event_sink(mut self, sender: mpsc::UnboundedSender<CycleEvent>) -> Self {
        self.events = EventSink::new(sender);
        self.sessions = self.sessions.with_events(self.events.clone());
        self
    }

    /// The engine, for re-folding events reported as [`FoldOutcome::Failed`].
    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    pub async fn run_cycle(
        &self,
        discovery_timeout: Duration,
        collect_window: Duration,
    ) -> Result<CycleReport, DiscoveryError> {
        let started_at = Utc::now();
        self.events.emit(CycleEvent::DiscoveryStarted);

        let identities = match self.discovery.discover(discovery_timeout).await {
            Ok(identities) => identities,
            Err(e) => {
                error!("Discovery failed: {}", e);
                self.events
                    .log(format!("Discovery failed: {}", e), MessageSeverity::Error);
                return Err(e);
            }
        };

        if identities.is_empty() {
            warn!("No known scanners found nearby");
            self.events
                .log("No scanners found nearby", MessageSeverity::Warning);
            return Ok(CycleReport {
                started_at,
                finished_at: Utc::now(),
                peripherals: Vec::new(),
            });
        }

        self.events.emit(CycleEvent::PeripheralsFound(
            identities.iter().cloned().collect(),
        ));

        // Fan-out: one task per scanner, each owning its own connection.
        let handles: Vec<_> = identities
            .into_iter()
            .map(|identity| {
                let runner = self.sessions.clone();
                let task_identity = identity.clone();
                let handle = tokio::spawn(async move {
                    runner.run_session(&task_identity, collect_window).await
                });
                (identity, handle)
            })
            .collect();

        // Fan-in: wait for every session to reach Done or Failed.
        let mut sessions = Vec::with_capacity(handles.len());
        for (identity, handle) in handles {
            let result = handle.await.unwrap_or_else(|e| {
                Err(SessionError::Session {
                    identity: identity.clone(),
                    cause: format!("session task aborted: {}", e),
                })
            });
            sessions.push((identity, result));
        }

        // Each scanner's payloads fold in arrival order; scanners fold concurrently.
        let peripherals = futures::future::join_all(
            sessions
                .into_iter()
                .map(|(identity, result)| self.fold_session(identity, result)),
        )
        .await;

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            peripherals,
        };
        info!(
            peripherals = report.peripherals.len(),
            failed_sessions = report.failed_sessions().count(),
            payloads = report.total_payloads(),
            failed_folds = report.failed_folds().count(),
            "Cycle complete"
        );
        Ok(report)
    }

    async fn fold_session(
        &self,
        identity: String,
        result: Result<SessionOutput, SessionError>,
    ) -> PeripheralReport {
        let peripheral = self.registry.lookup(&identity);
        let mut report = PeripheralReport {
            identity,
            display_name: peripheral.display_name().to_string(),
            stage: peripheral.stage().to_string(),
            session: SessionOutcome::Completed,
            payload_count: 0,
            skipped_payloads: 0,
            folds: Vec::new(),
        };

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                error!(identity = %report.identity, "{}", e);
                self.events.log(
                    format!("Error with {} by {}: {}", report.display_name, peripheral.operator(), e),
                    MessageSeverity::Error,
                );
                report.session = match e {
                    SessionError::Connect { cause, .. } => SessionOutcome::ConnectFailed {
                        cause: cause.to_string(),
                    },
                    SessionError::Session { cause, .. } => SessionOutcome::Failed { cause },
                };
                self.events.emit(CycleEvent::SessionFinished {
                    identity: report.identity.clone(),
                    outcome: report.session.clone(),
                });
                return report;
            }
        };

        self.events.emit(CycleEvent::SessionFinished {
            identity: report.identity.clone(),
            outcome: SessionOutcome::Completed,
        });
        report.skipped_payloads = output.skipped;

        if output.payloads.is_empty() {
            warn!(identity = %report.identity, "No data received");
            self.events.log(
                format!("No data received from {}", peripheral.operator()),
                MessageSeverity::Warning,
            );
            return report;
        }

        for payload in &output.payloads {
            let Some(event) = self.scan_event(peripheral, payload) else {
                warn!(identity = %report.identity, payload = %payload.text, "No order id in payload, skipping");
                report.skipped_payloads += 1;
                continue;
            };
            report.payload_count += 1;
            let outcome = match self.engine.fold_event(&event).await {
                Ok(record) => FoldOutcome::Folded {
                    order_id: record.order_id,
                    current_stage: record.current_stage,
                    duplicate_count: record.duplicate_count,
                },
                Err(e) => {
                    error!(identity = %report.identity, "{}", e);
                    FoldOutcome::Failed {
                        event,
                        cause: e.to_string(),
                    }
                }
            };
            self.events.emit(CycleEvent::OrderFolded(outcome.clone()));
            report.folds.push(outcome);
        }

        if report.folds.iter().any(FoldOutcome::is_failure) {
            self.events.log(
                format!("Upload from {} incomplete", peripheral.operator()),
                MessageSeverity::Warning,
            );
        } else {
            self.events.log(
                format!("Upload complete from {}", peripheral.operator()),
                MessageSeverity::Success,
            );
        }
        report
    }

    /// Builds the event for one payload from the scanner's registry entry.
    /// `None` when the payload has no order id.
    pub fn scan_event(
        &self,
        peripheral: Peripheral<'_>,
        payload: &ReceivedPayload,
    ) -> Option<ScanEvent> {
        Some(ScanEvent {
            order_id: self.order_id_format.extract(&payload.text)?.to_string(),
            stage: peripheral.stage().to_string(),
            scanning_device: peripheral.display_name().to_string(),
            scanned_by: peripheral.operator().to_string(),
            timestamp: payload.received_at,
        })
    }
}
