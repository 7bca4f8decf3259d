//! BLE Scanner Module
//!
//! Advertisement discovery through the WinRT advertisement watcher.

use crate::domain::errors::RadioError;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::radio::Advertisement;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEScanningMode,
};
use windows::Foundation::TypedEventHandler;

/// Listens for advertisements for exactly `timeout`, then stops the watcher.
///
/// Each address is reported once; the first non-empty local name wins.
pub async fn scan(timeout: Duration) -> Result<Vec<Advertisement>, RadioError> {
    info!("Starting BLE scan for {:?}", timeout);

    let watcher = BluetoothLEAdvertisementWatcher::new()?;
    watcher.SetScanningMode(BluetoothLEScanningMode::Active)?;

    let (sender, mut receiver) = mpsc::unbounded_channel();
    let handler = TypedEventHandler::new(
        move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
              args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
            if let Some(args) = args.as_ref() {
                let address = args.BluetoothAddress()?;
                let name = args.Advertisement()?.LocalName()?.to_string();
                let _ = sender.send(Advertisement {
                    identity: protocol::format_address(address),
                    advertised_name: if name.is_empty() { None } else { Some(name) },
                });
            }
            Ok(())
        },
    );

    let token = watcher.Received(&handler)?;
    watcher.Start()?;

    tokio::time::sleep(timeout).await;

    info!("Stopping BLE scan...");
    let stopped = watcher.Stop();
    let _ = watcher.RemoveReceived(token);
    stopped?;

    let mut seen: BTreeMap<String, Advertisement> = BTreeMap::new();
    while let Ok(adv) = receiver.try_recv() {
        let entry = seen
            .entry(adv.identity.clone())
            .or_insert_with(|| adv.clone());
        if entry.advertised_name.is_none() {
            entry.advertised_name = adv.advertised_name;
        }
    }

    debug!("Scan observed {} device(s)", seen.len());
    Ok(seen.into_values().collect())
}
