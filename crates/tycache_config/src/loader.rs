//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::path::Path;

/// Name of the configuration file looked up in a project directory.
pub const CONFIG_FILE: &str = "tycache.toml";

/// Loads and validates `tycache.toml` from a project directory.
///
/// A missing file is not an error: defaults are returned, which leave
/// caching disabled.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(ProjectConfig::default());
    }
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `tycache.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that configuration values are usable.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.cache.max_size_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "cache.max_size_bytes must be positive".to_string(),
        ));
    }
    let flavor = &config.cache.flavor;
    if flavor.is_empty() {
        return Err(ConfigError::ValidationError(
            "cache.flavor must not be empty".to_string(),
        ));
    }
    // The flavor names a file inside cache.dir.
    if flavor.contains(&['/', '\\'][..]) || flavor.contains("..") {
        return Err(ConfigError::ValidationError(format!(
            "cache.flavor {flavor:?} must not contain path separators or '..'"
        )));
    }
    Ok(())
}
