use stage_tracker::domain::models::{CycleEvent, MessageSeverity};
use stage_tracker::domain::settings::SettingsService;
use stage_tracker::infrastructure::logging;
use stage_tracker::infrastructure::radio::Radio;
use stage_tracker::infrastructure::store::JsonFileOrderStore;
use stage_tracker::Orchestrator;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[cfg(windows)]
fn platform_radio() -> anyhow::Result<Arc<dyn Radio>> {
    Ok(Arc::new(
        stage_tracker::infrastructure::bluetooth::BluetoothService::new(),
    ))
}

#[cfg(not(windows))]
fn platform_radio() -> anyhow::Result<Arc<dyn Radio>> {
    anyhow::bail!("No Bluetooth backend is available on this platform")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();

    let _logging_guard = logging::init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!(
        settings = %settings_service.path().display(),
        "Starting stage tracker"
    );

    let store = Arc::new(JsonFileOrderStore::open(settings.resolved_store_path()?).await?);
    let radio = platform_radio()?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::from_settings(&settings, radio, store)?.with_event_sink(event_tx);

    let progress = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                CycleEvent::PayloadReceived { identity, payload } => {
                    info!("[{}] ➜ {}", identity, payload)
                }
                CycleEvent::LogMessage(msg) => match msg.severity {
                    MessageSeverity::Error => error!("{}", msg.message),
                    MessageSeverity::Warning => warn!("{}", msg.message),
                    MessageSeverity::Info | MessageSeverity::Success => info!("{}", msg.message),
                },
                _ => {}
            }
        }
    });

    let report = orchestrator
        .run_cycle(settings.discovery_timeout(), settings.collect_window())
        .await?;
    drop(orchestrator);
    if let Err(e) = progress.await {
        warn!("Progress task ended abnormally: {}", e);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
