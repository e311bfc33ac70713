// Public API - sessions, data types and reporters
pub mod config;
pub mod error;
pub mod probe;
pub mod report;
pub mod state;
pub mod trace;

// Command line and enrichment support for the binary
pub mod cli;
pub mod lookup;

pub use error::{Error, Result};
