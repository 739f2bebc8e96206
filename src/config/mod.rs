//! Configuration module for the directory core.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;

use crate::models::VerificationLevel;

/// Requirements a guild must meet for its application to be accepted (and to
/// stay listed across refresh passes).
#[derive(Debug, Clone, Copy)]
pub struct ApplyRequirements {
    /// Guilds below this member count are rejected.
    pub min_member_count: u32,
    /// Guilds below this verification level are rejected.
    pub min_verification_level: VerificationLevel,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory holding one subdirectory per collection
    pub data_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Requirements for guilds to be considered
    pub apply_requirements: ApplyRequirements,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let data_dir = env::var("DIRECTORY_DATA_DIR")
            .unwrap_or_else(|_| "./data".to_string())
            .into();

        let log_level = env::var("DIRECTORY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let min_member_count = env::var("DIRECTORY_MIN_MEMBER_COUNT")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .expect("Invalid DIRECTORY_MIN_MEMBER_COUNT format");

        let min_verification_level = match env::var("DIRECTORY_MIN_VERIFICATION_LEVEL")
            .unwrap_or_else(|_| "low".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "none" => VerificationLevel::None,
            "low" => VerificationLevel::Low,
            "medium" => VerificationLevel::Medium,
            "high" => VerificationLevel::High,
            "veryhigh" | "very_high" => VerificationLevel::VeryHigh,
            other => panic!("Invalid DIRECTORY_MIN_VERIFICATION_LEVEL: {other}"),
        };

        Self {
            data_dir,
            log_level,
            apply_requirements: ApplyRequirements {
                min_member_count,
                min_verification_level,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        env::remove_var("DIRECTORY_DATA_DIR");
        env::remove_var("DIRECTORY_LOG_LEVEL");
        env::remove_var("DIRECTORY_MIN_MEMBER_COUNT");
        env::remove_var("DIRECTORY_MIN_VERIFICATION_LEVEL");

        let config = Config::from_env();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.apply_requirements.min_member_count, 100);
        assert_eq!(
            config.apply_requirements.min_verification_level,
            VerificationLevel::Low
        );
    }
}
