//! Bluetooth Service Module
//!
//! WinRT implementation of the [`Radio`] capability.

use crate::domain::errors::RadioError;
use crate::infrastructure::bluetooth::{connection::BleConnection, scanner};
use crate::infrastructure::radio::{Advertisement, Radio, RadioConnection};
use async_trait::async_trait;
use std::time::Duration;

/// Radio backed by the Windows Bluetooth LE stack
#[derive(Debug, Default, Clone, Copy)]
pub struct BluetoothService;

impl BluetoothService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Radio for BluetoothService {
    async fn scan_advertisements(
        &self,
        timeout: Duration,
    ) -> Result<Vec<Advertisement>, RadioError> {
        scanner::scan(timeout)
            .await
            .map_err(RadioError::into_scan)
    }

    async fn connect(&self, identity: &str) -> Result<Box<dyn RadioConnection>, RadioError> {
        let connection = BleConnection::connect(identity).await?;
        Ok(Box::new(connection))
    }
}
