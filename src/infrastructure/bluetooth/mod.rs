//! Bluetooth Module
//!
//! BLE access to the line's barcode scanners.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    BluetoothService                      │
//! │        (implements the Radio capability, Windows)        │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Scanner  │  │ Connection │  │ Protocol │
//! │           │  │            │  │          │
//! │ - BLE     │  │ - GATT     │  │ - UUIDs  │
//! │ discovery │  │ - Notify   │  │ - Address│
//! │           │  │            │  │ - Decode │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Characteristic UUID, address and payload handling (portable)
//! - `scanner` - Advertisement discovery (Windows)
//! - `connection` - Device connection and notification subscription (Windows)
//! - `service` - Radio implementation (Windows)

pub mod protocol;

#[cfg(windows)]
pub mod connection;
#[cfg(windows)]
pub mod scanner;
#[cfg(windows)]
pub mod service;

#[cfg(windows)]
pub use service::BluetoothService;

#[cfg(windows)]
impl From<windows::core::Error> for crate::domain::errors::RadioError {
    fn from(e: windows::core::Error) -> Self {
        Self::Backend(e.message().to_string())
    }
}
