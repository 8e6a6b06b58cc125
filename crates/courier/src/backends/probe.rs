//! Local backend availability probe
//!
//! The probe runs at most once per process. A failed attach is final: there
//! is no re-probe if the desktop client starts later.

use std::sync::{Arc, OnceLock};

use log::info;

use super::LocalMailClient;

/// Result of probing the local backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendAvailability {
    pub local_available: bool,
    pub local_connected: bool,
}

impl BackendAvailability {
    /// Both reachable and attached
    pub fn local_usable(&self) -> bool {
        self.local_available && self.local_connected
    }
}

/// Lazily probes the local backend and freezes the answer
pub struct AvailabilityProbe {
    local: Option<Arc<dyn LocalMailClient>>,
    cached: OnceLock<BackendAvailability>,
}

impl AvailabilityProbe {
    pub fn new(local: Option<Arc<dyn LocalMailClient>>) -> Self {
        Self {
            local,
            cached: OnceLock::new(),
        }
    }

    /// Probe on first call; later calls return the cached result
    pub fn probe(&self) -> BackendAvailability {
        *self.cached.get_or_init(|| {
            let availability = match &self.local {
                Some(local) => {
                    let available = local.try_connect();
                    BackendAvailability {
                        local_available: available,
                        local_connected: available && local.is_connected(),
                    }
                }
                None => BackendAvailability::default(),
            };
            info!(
                "Local backend probe: available={}, connected={}",
                availability.local_available, availability.local_connected
            );
            availability
        })
    }

    /// Whether the probe has already run
    pub fn is_probed(&self) -> bool {
        self.cached.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryLocalClient;

    #[test]
    fn test_probe_runs_once() {
        let local = Arc::new(InMemoryLocalClient::new());
        let probe = AvailabilityProbe::new(Some(local.clone()));

        assert!(!probe.is_probed());
        let first = probe.probe();
        let second = probe.probe();

        assert_eq!(first, second);
        assert!(first.local_usable());
        assert_eq!(local.connect_attempts(), 1);
    }

    #[test]
    fn test_failed_probe_is_final() {
        let local = Arc::new(InMemoryLocalClient::new().unreachable());
        let probe = AvailabilityProbe::new(Some(local.clone()));

        assert!(!probe.probe().local_available);
        local.set_reachable(true);
        assert!(!probe.probe().local_available);
        assert_eq!(local.connect_attempts(), 1);
    }

    #[test]
    fn test_no_local_client() {
        let probe = AvailabilityProbe::new(None);
        assert_eq!(probe.probe(), BackendAvailability::default());
    }
}
