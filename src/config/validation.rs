use crate::config::types::{ClientConfig, Config, PolitenessConfig};
use crate::ConfigError;

/// Largest TTL a `chrono::Duration` can hold, in hours
const MAX_ROBOTS_TTL_HOURS: u64 = (i64::MAX / 3_600_000) as u64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_client_config(&config.client)?;
    validate_politeness_config(&config.politeness)?;
    Ok(())
}

fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if reqwest::header::HeaderValue::from_str(&config.user_agent).is_err() {
        return Err(ConfigError::Validation(format!(
            "user_agent is not a valid header value: {:?}",
            config.user_agent
        )));
    }

    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout_ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_politeness_config(config: &PolitenessConfig) -> Result<(), ConfigError> {
    if config.robots_ttl_hours == 0 || config.robots_ttl_hours > MAX_ROBOTS_TTL_HOURS {
        return Err(ConfigError::Validation(format!(
            "robots_ttl_hours must be between 1 and {}, got {}",
            MAX_ROBOTS_TTL_HOURS, config.robots_ttl_hours
        )));
    }

    Ok(())
}
