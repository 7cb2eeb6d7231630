//! # Braze Runtime
//!
//! Orchestration for the braze chat core: figment-layered configuration,
//! tracing setup, the supplemental feature modules, and the application
//! assembly that wires everything into one dispatch tree.

pub mod app;
pub mod config;
pub mod features;
pub mod logging;

pub use app::{App, AppDeps, TreeParts, build_tree};
pub use config::{BrazeConfig, ConfigError};
pub use logging::LogGuard;
