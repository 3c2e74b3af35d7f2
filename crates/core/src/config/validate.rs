use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Debounce window is not 0
/// - Poster height is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.augment.debounce_ms == 0 {
        return Err(ConfigError::ValidationError(
            "augment.debounce_ms cannot be 0".to_string(),
        ));
    }

    if config.augment.poster_height_px == 0 {
        return Err(ConfigError::ValidationError(
            "augment.poster_height_px cannot be 0".to_string(),
        ));
    }

    Ok(())
}
