//! Configuration management and environment variable loading

use crate::{Result, RiposteError};
use std::env;

/// Default delay between mock stream tokens, in milliseconds
pub const MOCK_STREAM_TOKEN_DELAY_MS: u64 = 42;

/// Maximum accepted user message length
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Number of prior messages included in the prompt context
pub const MAX_HISTORY_MESSAGES: usize = 20;

/// Capacity of the shared recency ring buffer
pub const RECENCY_CAPACITY: usize = 6;

/// Default conversation language
pub const DEFAULT_LANGUAGE: &str = "fr-CA";

/// Load environment variables from a .env file
///
/// Safe to call multiple times; a missing file is not an error.
pub fn load_env() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::info!("✓ Loaded environment from: {}", path.display());
            Ok(())
        }
        Err(dotenvy::Error::LineParse(line, pos)) => Err(RiposteError::config(format!(
            "Failed to parse .env file at line {}, position {}",
            line, pos
        ))),
        Err(dotenvy::Error::Io(_)) => {
            tracing::warn!("No .env file found - using system environment variables only");
            Ok(())
        }
        Err(e) => Err(RiposteError::config(format!(
            "Failed to load .env file: {}",
            e
        ))),
    }
}

/// Get required environment variable
///
/// Returns an error if the variable is not set
pub fn get_required_env(key: &str) -> Result<String> {
    env::var(key).map_err(|_| {
        RiposteError::config(format!(
            "Required environment variable '{}' is not set. \
             Check your .env file or system environment.",
            key
        ))
    })
}

/// Get optional environment variable with default
pub fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get environment variable as integer
pub fn get_env_int<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Delay between mock stream tokens, honoring the env override
pub fn mock_token_delay_ms() -> u64 {
    get_env_int("RIPOSTE_TOKEN_DELAY_MS", MOCK_STREAM_TOKEN_DELAY_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_int() {
        env::set_var("TEST_RIPOSTE_INT", "42");
        assert_eq!(get_env_int("TEST_RIPOSTE_INT", 0), 42);
        assert_eq!(get_env_int("TEST_RIPOSTE_NONEXISTENT", 99), 99);
        env::remove_var("TEST_RIPOSTE_INT");
    }

    #[test]
    fn test_get_env_or() {
        env::set_var("TEST_RIPOSTE_STRING", "hello");
        assert_eq!(get_env_or("TEST_RIPOSTE_STRING", "default"), "hello");
        assert_eq!(get_env_or("TEST_RIPOSTE_NONEXISTENT", "default"), "default");
        env::remove_var("TEST_RIPOSTE_STRING");
    }

    #[test]
    fn test_get_required_env_missing() {
        assert!(get_required_env("TEST_RIPOSTE_MISSING").is_err());
    }
}
