// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Record lengths are bounded by MAX_ELEMENT_LEN
    clippy::cast_precision_loss,      // Acceptable for stats/display
    clippy::missing_errors_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. StorageError in storage module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

pub mod app;
pub mod codec;
pub mod domain;
pub mod pipeline;
pub mod sender;
pub mod storage;

// Re-export main types for easy access
pub use app::{App, Config};
pub use domain::{AnalyticsError, EventKind, EventRecord, Property};
pub use pipeline::{FlushCoordinator, FlushReport, QueueConfig};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
