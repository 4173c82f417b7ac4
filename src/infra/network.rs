use std::sync::RwLock;

use tracing::debug;

use crate::application::repos::NetworkQuality;
use crate::cache::{rw_read, rw_write};
use crate::domain::types::EffectiveType;

const SOURCE: &str = "infra::network";

/// Network-quality signal set by the host (or by tests).
#[derive(Debug)]
pub struct StaticNetworkQuality {
    effective: RwLock<EffectiveType>,
}

impl StaticNetworkQuality {
    pub fn new(effective: EffectiveType) -> Self {
        Self {
            effective: RwLock::new(effective),
        }
    }

    /// Record a new raw signal such as `"3g"`; unrecognised values become
    /// [`EffectiveType::Unknown`].
    pub fn report(&self, signal: &str) {
        let effective = signal.parse().unwrap_or(EffectiveType::Unknown);
        self.set(effective);
    }

    pub fn set(&self, effective: EffectiveType) {
        debug!(%effective, "Connection type changed");
        *rw_write(&self.effective, SOURCE, "set") = effective;
    }
}

impl Default for StaticNetworkQuality {
    fn default() -> Self {
        Self::new(EffectiveType::Unknown)
    }
}

impl NetworkQuality for StaticNetworkQuality {
    fn effective_type(&self) -> EffectiveType {
        *rw_read(&self.effective, SOURCE, "effective_type")
    }
}
