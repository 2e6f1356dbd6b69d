//! Service Configuration Module
//!
//! Engine tables and tunables loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `AGRI_CONFIG` environment variable (path to TOML file)
//! 2. `agri_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Environment overrides (`AGRI_MODEL_PATH`, `AGRI_DATASET_PATH`,
//! `AGRI_SERVER_ADDR`) are applied on top of whichever source won.
//!
//! There is no global instance: `main` loads the config once and hands each
//! component the section it needs.

pub mod defaults;
mod service_config;
pub mod validation;

pub use service_config::*;

/// Load config from an explicit path or the standard search order, then
/// apply environment overrides.
pub fn load(explicit: Option<&std::path::Path>) -> Result<ServiceConfig, ConfigError> {
    let mut config = match explicit {
        Some(path) => ServiceConfig::load_from_file(path)?,
        None => ServiceConfig::load(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}
