//! Radio capability consumed by discovery and sessions.
//!
//! Backends bridge their notification callbacks into an mpsc channel, so a
//! session reads a finite stream of payloads instead of sharing a buffer with
//! a callback.

use crate::domain::errors::RadioError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// A device seen advertising during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub identity: String,
    pub advertised_name: Option<String>,
}

/// Raw notification payloads for one subscription.
pub type PayloadStream = mpsc::UnboundedReceiver<Vec<u8>>;

#[async_trait]
pub trait Radio: Send + Sync {
    /// Listens for advertisements for the whole of `timeout`.
    async fn scan_advertisements(&self, timeout: Duration)
        -> Result<Vec<Advertisement>, RadioError>;

    async fn connect(&self, identity: &str) -> Result<Box<dyn RadioConnection>, RadioError>;
}

/// An open connection owned by exactly one session.
#[async_trait]
pub trait RadioConnection: Send {
    async fn subscribe(&mut self, characteristic: &str) -> Result<PayloadStream, RadioError>;

    async fn unsubscribe(&mut self, characteristic: &str) -> Result<(), RadioError>;

    /// Releases the peripheral. Later calls are no-ops.
    async fn close(&mut self) -> Result<(), RadioError>;
}
