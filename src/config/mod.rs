//! Configuration Management
//!
//! Two independent inputs:
//! - Runner settings, resolved hierarchically (defaults → global → project →
//!   settings file → environment) by [`ConfigLoader`]
//! - The optional per-run pentest config file (YAML), parsed by [`parse_config`]

mod loader;
pub mod pentest;
mod types;

pub use loader::ConfigLoader;
pub use pentest::{PentestConfig, RetryPreset, parse_config, parse_config_str};
pub use types::*;
