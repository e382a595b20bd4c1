//! Domain layer for rask-analytics.
//!
//! - `EventRecord`: immutable validated event, built through `EventBuilder`
//! - `Property`: JSON-compatible event value
//! - `AnalyticsError`: top-level error type

pub mod error;
pub mod event;
pub mod property;

pub use error::{AnalyticsError, EventError};
pub use event::{EventBuilder, EventKind, EventRecord};
pub use property::{Properties, Property};
