use crate::domain::errors::DiscoveryError;
use crate::domain::registry::{normalize_identity, PeripheralRegistry};
use crate::infrastructure::radio::Radio;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Finds which registered scanners are currently in range.
#[derive(Clone)]
pub struct DiscoveryService {
    radio: Arc<dyn Radio>,
    registry: Arc<PeripheralRegistry>,
}

impl DiscoveryService {
    pub fn new(radio: Arc<dyn Radio>, registry: Arc<PeripheralRegistry>) -> Self {
        Self { radio, registry }
    }

    /// Scans for `timeout` and keeps only registered identities.
    ///
    /// An empty set means nothing known is nearby; it is not an error.
    pub async fn discover(&self, timeout: Duration) -> Result<BTreeSet<String>, DiscoveryError> {
        info!("Scanning for active scanners...");
        let advertisements = self.radio.scan_advertisements(timeout).await?;

        let mut active = BTreeSet::new();
        for adv in advertisements {
            let identity = normalize_identity(&adv.identity);
            if !self.registry.is_known(&identity) {
                debug!(identity = %identity, "Ignoring unregistered device");
                continue;
            }
            if active.insert(identity.clone()) {
                info!(
                    identity = %identity,
                    name = adv.advertised_name.as_deref().unwrap_or("?"),
                    "Known scanner advertising"
                );
            }
        }

        info!("Found {} active scanner(s)", active.len());
        Ok(active)
    }
}
