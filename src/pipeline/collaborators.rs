use crate::codec::PayloadCodec;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Network reachability as seen by the host platform.
#[cfg_attr(test, mockall::automock)]
pub trait Connectivity: Send + Sync {
    fn is_connected(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConnected;

impl Connectivity for AlwaysConnected {
    fn is_connected(&self) -> bool {
        true
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Supplies the device advertising identifier, when the platform exposes
/// one and the user allows tracking.
pub trait AdvertisingIdProvider: Send + Sync {
    fn advertising_id(&self) -> Option<String>;
}

/// Capabilities injected into the coordinator.
#[derive(Clone)]
pub struct Collaborators {
    pub connectivity: Arc<dyn Connectivity>,
    pub clock: Arc<dyn Clock>,
    pub advertising_id: Option<Arc<dyn AdvertisingIdProvider>>,
    pub codec: PayloadCodec,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            connectivity: Arc::new(AlwaysConnected),
            clock: Arc::new(SystemClock),
            advertising_id: None,
            codec: PayloadCodec::default(),
        }
    }
}
