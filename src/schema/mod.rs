//! Schema module - Configuration and data-model types for evolution runs.

mod config;
mod curriculum;
mod genome;
mod report;

pub use config::*;
pub use curriculum::*;
pub use genome::*;
pub use report::*;
