//! Process-wide logging setup shared by the rxstock binaries.

pub mod tracing;

pub use tracing::init;
