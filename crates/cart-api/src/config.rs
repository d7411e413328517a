//! Cart API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_API_TOKENS` - Bearer token map, `token:identity` pairs separated
//!   by commas (e.g. `tok-alice:alice,tok-bob:bob`)
//!
//! ## Optional
//! - `CART_API_HOST` - Bind address (default: 127.0.0.1)
//! - `CART_API_PORT` - Listen port (default: 4000)
//! - `CART_API_CATALOG_SEED` - Path to a JSON file with catalog records

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// IP address to bind the server to.
    pub host: IpAddr,
    /// Port to listen on.
    pub port: u16,
    /// Bearer token to identity mapping.
    pub tokens: Vec<(String, String)>,
    /// Optional JSON file of catalog records to serve.
    pub catalog_seed: Option<PathBuf>,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("CART_API_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("CART_API_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("CART_API_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("CART_API_PORT".to_string(), e.to_string()))?;
        let tokens = parse_token_map(&get_required_env("CART_API_TOKENS")?)?;
        let catalog_seed = std::env::var("CART_API_CATALOG_SEED").ok().map(PathBuf::from);

        Ok(Self {
            host,
            port,
            tokens,
            catalog_seed,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse `token:identity` pairs separated by commas.
fn parse_token_map(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            pair.split_once(':')
                .map(|(token, identity)| (token.to_string(), identity.to_string()))
                .ok_or_else(|| {
                    ConfigError::InvalidEnvVar(
                        "CART_API_TOKENS".to_string(),
                        format!("expected token:identity, got '{pair}'"),
                    )
                })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_map() {
        let tokens = parse_token_map("tok-a:alice, tok-b:bob").unwrap();
        assert_eq!(
            tokens,
            vec![
                ("tok-a".to_string(), "alice".to_string()),
                ("tok-b".to_string(), "bob".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_token_map_rejects_missing_identity() {
        assert!(parse_token_map("tok-a").is_err());
    }

    #[test]
    fn test_parse_token_map_skips_empty_segments() {
        let tokens = parse_token_map("tok-a:alice,").unwrap();
        assert_eq!(tokens.len(), 1);
    }
}
