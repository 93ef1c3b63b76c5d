//! cc-core: stable foundation for the coupled-case tools.
//!
//! Contains:
//! - dates (the text formats each sub-model uses for calendar dates)
//! - duration (run-length expressions and calendar arithmetic)
//! - error (shared error types)

pub mod dates;
pub mod duration;
pub mod error;

// Re-exports: nice ergonomics for downstream crates
pub use dates::*;
pub use duration::{RunLength, add_duration, add_run_length};
pub use error::{CoreError, CoreResult};
