//! BLE Connection Module
//!
//! GATT access and notification subscription for one scanner.

use crate::domain::errors::RadioError;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::radio::{PayloadStream, RadioConnection};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use windows::core::GUID;
use windows::Devices::Bluetooth::BluetoothLEDevice;
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattClientCharacteristicConfigurationDescriptorValue,
    GattCommunicationStatus, GattValueChangedEventArgs,
};
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::DataReader;

struct Subscription {
    characteristic: GattCharacteristic,
    token: i64,
}

/// Connection to one scanner. Closed on drop if `close` was never called.
pub struct BleConnection {
    identity: String,
    device: Option<BluetoothLEDevice>,
    subscription: Option<Subscription>,
}

impl BleConnection {
    /// Connect to a device by its `AA:BB:..` address
    pub async fn connect(identity: &str) -> Result<Self, RadioError> {
        let address = protocol::parse_address(identity)?;
        info!("Connecting to Bluetooth device: {}", identity);

        let device = BluetoothLEDevice::FromBluetoothAddressAsync(address)
            .map_err(|e| connect_error(identity, e))?
            .await
            .map_err(|e| connect_error(identity, e))?;

        info!("Device connected: {:?}", device.Name()?);
        Ok(Self {
            identity: identity.to_string(),
            device: Some(device),
            subscription: None,
        })
    }

    fn device(&self) -> Result<&BluetoothLEDevice, RadioError> {
        self.device
            .as_ref()
            .ok_or_else(|| RadioError::Backend("Connection already closed".to_string()))
    }

    /// Searches every GATT service for the characteristic.
    async fn find_characteristic(&self, uuid: GUID) -> Result<GattCharacteristic, RadioError> {
        let services_result = self.device()?.GetGattServicesAsync()?.await?;
        if services_result.Status()? != GattCommunicationStatus::Success {
            return Err(RadioError::Subscribe(format!(
                "Failed to get GATT services: {:?}",
                services_result.Status()?
            )));
        }

        let services = services_result.Services()?;
        for i in 0..services.Size()? {
            let service = services.GetAt(i)?;
            let chars_result = service.GetCharacteristicsForUuidAsync(uuid)?.await?;
            if chars_result.Status()? != GattCommunicationStatus::Success {
                continue;
            }
            let characteristics = chars_result.Characteristics()?;
            if characteristics.Size()? > 0 {
                return Ok(characteristics.GetAt(0)?);
            }
        }

        Err(RadioError::CharacteristicNotFound {
            characteristic: format!("{:?}", uuid),
        })
    }
}

fn connect_error(identity: &str, e: windows::core::Error) -> RadioError {
    RadioError::Connect {
        identity: identity.to_string(),
        reason: e.message().to_string(),
    }
}

#[async_trait]
impl RadioConnection for BleConnection {
    async fn subscribe(&mut self, characteristic: &str) -> Result<PayloadStream, RadioError> {
        let uuid = GUID::from_u128(protocol::parse_uuid(characteristic)?);
        let data_char = self.find_characteristic(uuid).await?;

        let status = data_char
            .WriteClientCharacteristicConfigurationDescriptorAsync(
                GattClientCharacteristicConfigurationDescriptorValue::Notify,
            )?
            .await?;
        if status != GattCommunicationStatus::Success {
            return Err(RadioError::Subscribe(format!(
                "Notification subscription returned status: {:?}",
                status
            )));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattCharacteristic>,
                  args: windows::core::Ref<GattValueChangedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let value = args.CharacteristicValue()?;
                    let reader = DataReader::FromBuffer(&value)?;
                    let mut bytes = vec![0u8; reader.UnconsumedBufferLength()? as usize];
                    reader.ReadBytes(&mut bytes)?;
                    let _ = sender.send(bytes);
                }
                Ok(())
            },
        );
        let token = data_char.ValueChanged(&handler)?;

        info!("Notifications enabled for {}", self.identity);
        self.subscription = Some(Subscription {
            characteristic: data_char,
            token,
        });
        Ok(receiver)
    }

    async fn unsubscribe(&mut self, _characteristic: &str) -> Result<(), RadioError> {
        let Some(sub) = self.subscription.take() else {
            return Ok(());
        };

        // Removing the handler drops its sender, which ends the payload stream.
        sub.characteristic.RemoveValueChanged(sub.token)?;
        let status = sub
            .characteristic
            .WriteClientCharacteristicConfigurationDescriptorAsync(
                GattClientCharacteristicConfigurationDescriptorValue::None,
            )?
            .await?;
        if status != GattCommunicationStatus::Success {
            warn!(
                "Disabling notifications on {} returned status: {:?}",
                self.identity, status
            );
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RadioError> {
        if let Some(sub) = self.subscription.take() {
            let _ = sub.characteristic.RemoveValueChanged(sub.token);
        }
        if let Some(device) = self.device.take() {
            device.Close()?;
            info!("Disconnected from {}", self.identity);
        }
        Ok(())
    }
}

impl Drop for BleConnection {
    fn drop(&mut self) {
        if let Some(sub) = self.subscription.take() {
            let _ = sub.characteristic.RemoveValueChanged(sub.token);
        }
        if let Some(device) = self.device.take() {
            debug!("Closing leaked connection to {}", self.identity);
            let _ = device.Close();
        }
    }
}
