#![allow(dead_code)]

use rask_analytics::domain::{EventKind, EventRecord};
use rask_analytics::pipeline::{Collaborators, Connectivity, FlushCoordinator, QueueConfig};
use rask_analytics::sender::{ClientConfig, HttpTransport};
use rask_analytics::storage::RecordStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const WRITE_KEY: &str = "wk_123";

/// Connectivity that tests can flip at runtime.
#[derive(Debug)]
pub struct SwitchableConnectivity(AtomicBool);

impl SwitchableConnectivity {
    pub fn new(connected: bool) -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(connected)))
    }

    pub fn set(&self, connected: bool) {
        self.0.store(connected, Ordering::SeqCst);
    }
}

impl Connectivity for SwitchableConnectivity {
    fn is_connected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn track_event(n: usize) -> EventRecord {
    EventRecord::builder(EventKind::Track)
        .user_id("user-42")
        .event(format!("Item Viewed {n}"))
        .property("n", n as i64)
        .build()
        .unwrap()
}

pub fn client_config() -> ClientConfig {
    ClientConfig {
        write_key: WRITE_KEY.to_string(),
        connect_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

/// Queue config pointed at `api_host` with the timer effectively disabled.
pub fn queue_config(api_host: &str) -> QueueConfig {
    QueueConfig {
        api_host: api_host.to_string(),
        flush_queue_size: 100,
        flush_interval: Duration::from_secs(3600),
        ..Default::default()
    }
}

pub fn start_coordinator(
    config: QueueConfig,
    store: Box<dyn RecordStore>,
    connectivity: Arc<SwitchableConnectivity>,
) -> FlushCoordinator {
    let transport = Arc::new(HttpTransport::new(client_config()).unwrap());
    FlushCoordinator::start(
        config,
        store,
        transport,
        Collaborators {
            connectivity,
            ..Default::default()
        },
    )
    .unwrap()
}

/// All events received by the mock collector, in arrival order.
pub async fn received_events(server: &wiremock::MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .flat_map(|request| {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            body["batch"].as_array().unwrap().clone()
        })
        .collect()
}

pub fn event_numbers(events: &[serde_json::Value]) -> Vec<i64> {
    events
        .iter()
        .map(|event| event["properties"]["n"].as_i64().unwrap())
        .collect()
}
