use super::event::EventKind;
use crate::app::config::ConfigError;
use crate::codec::CodecError;
use crate::pipeline::CoordinatorError;
use crate::sender::TransportError;
use crate::storage::StorageError;
use thiserror::Error;

/// Top-level error type for the analytics client.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("Invalid event: {0}")]
    Event(#[from] EventError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Event needs a userId or anonymousId")]
    MissingIdentity,
    #[error("Event is missing required field '{field}'")]
    MissingField {
        kind: Option<EventKind>,
        field: &'static str,
    },
    #[error("Unknown event type '{0}'")]
    UnknownKind(String),
    #[error("Event must be a JSON object")]
    NotAnObject,
}
