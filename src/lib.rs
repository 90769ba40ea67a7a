pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod graph;
pub mod progress;
pub mod snapshot;
pub mod storage;

pub use error::{CtError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
