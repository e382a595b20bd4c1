//! Enqueue/drain coordination between the record store and the uploader.

pub mod collaborators;
pub mod config;
pub mod coordinator;
mod drain;
pub mod error;
mod shared_store;
pub mod stats;

pub use collaborators::{
    AdvertisingIdProvider, AlwaysConnected, Clock, Collaborators, Connectivity, SystemClock,
};
pub use config::QueueConfig;
pub use coordinator::{CoordinatorState, FlushCoordinator, FlushOutcome, FlushReport};
pub use error::CoordinatorError;
pub use stats::{Stats, StatsSnapshot};
