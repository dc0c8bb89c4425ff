//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SHOPFRONT_BASE_URL` - Public URL of the API (https enables `Secure` cookies)
//! - `SHOPFRONT_JWT_SECRET` - Session token signing secret (min 32 chars, high entropy)
//! - `CLOUDINARY_CLOUD_NAME` - Media host cloud name
//! - `CLOUDINARY_API_KEY` - Media host API key
//! - `CLOUDINARY_API_SECRET` - Media host API secret
//!
//! ## Optional
//! - `SHOPFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOPFRONT_PORT` - Listen port (default: 50001)
//! - `SHOPFRONT_TOKEN_TTL_HOURS` - Session token lifetime (default: 24)
//! - `SHOPFRONT_CLIENT_ORIGIN` - Browser client origin allowed by CORS (default: <http://localhost:5173>)
//! - `SHOPFRONT_AUTH_RATE_LIMIT` - Rate limit `/api/auth` per client IP (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const MAX_TOKEN_TTL_HOURS: u64 = 24 * 30;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: String,
    /// Session token settings
    pub auth: AuthConfig,
    /// Origin of the browser client allowed to send credentialed requests
    pub client_origin: String,
    /// Whether `/api/auth` is rate limited per client IP
    pub auth_rate_limit: bool,
    /// Media host credentials for product image uploads
    pub media: MediaConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Session token configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens
    pub jwt_secret: SecretString,
    /// Lifetime of an issued token
    pub token_ttl: Duration,
    /// Whether the session cookie carries the `Secure` attribute
    pub secure_cookie: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

/// Media host (Cloudinary) configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct MediaConfig {
    /// Cloud name, part of the upload URL
    pub cloud_name: String,
    /// Public API key sent with each signed upload
    pub api_key: String,
    /// API secret used to sign uploads (never sent)
    pub api_secret: SecretString,
}

impl std::fmt::Debug for MediaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("SHOPFRONT_DATABASE_URL")?;
        let host = parse_env("SHOPFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("SHOPFRONT_PORT", "50001")?;
        let base_url = get_required_env("SHOPFRONT_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("SHOPFRONT_BASE_URL".to_string(), e.to_string())
        })?;

        let jwt_secret = get_validated_secret("SHOPFRONT_JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "SHOPFRONT_JWT_SECRET")?;
        let ttl_hours: u64 = parse_env("SHOPFRONT_TOKEN_TTL_HOURS", "24")?;
        if ttl_hours == 0 || ttl_hours > MAX_TOKEN_TTL_HOURS {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_TOKEN_TTL_HOURS".to_string(),
                format!("must be between 1 and {MAX_TOKEN_TTL_HOURS}"),
            ));
        }

        let auth = AuthConfig {
            jwt_secret,
            token_ttl: Duration::from_secs(ttl_hours * 60 * 60),
            secure_cookie: base_url.starts_with("https://"),
        };

        let client_origin = get_env_or_default("SHOPFRONT_CLIENT_ORIGIN", "http://localhost:5173");
        let auth_rate_limit = parse_env("SHOPFRONT_AUTH_RATE_LIMIT", "true")?;
        let media = MediaConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            auth,
            client_origin,
            auth_rate_limit,
            media,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl MediaConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            cloud_name: get_required_env("CLOUDINARY_CLOUD_NAME")?,
            api_key: get_required_env("CLOUDINARY_API_KEY")?,
            api_secret: get_validated_secret("CLOUDINARY_API_SECRET")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("changeme-jwt-signing-key", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("abababababababababababababababab", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "T").is_err());
        assert!(validate_secret_length(&SecretString::from("k".repeat(32)), "T").is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = ApiConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 50001,
            base_url: "http://localhost:50001".to_string(),
            auth: AuthConfig {
                jwt_secret: SecretString::from("x".repeat(32)),
                token_ttl: Duration::from_secs(3600),
                secure_cookie: false,
            },
            client_origin: "http://localhost:5173".to_string(),
            auth_rate_limit: false,
            media: MediaConfig {
                cloud_name: "demo".to_string(),
                api_key: "123".to_string(),
                api_secret: SecretString::from("s3cr3t"),
            },
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 50001);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let media = MediaConfig {
            cloud_name: "demo-cloud".to_string(),
            api_key: "public-key".to_string(),
            api_secret: SecretString::from("media_api_secret_value"),
        };
        let auth = AuthConfig {
            jwt_secret: SecretString::from("jwt_secret_value_that_is_long"),
            token_ttl: Duration::from_secs(60),
            secure_cookie: true,
        };

        let debug_output = format!("{media:?} {auth:?}");

        assert!(debug_output.contains("demo-cloud"));
        assert!(debug_output.contains("public-key"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("media_api_secret_value"));
        assert!(!debug_output.contains("jwt_secret_value_that_is_long"));
    }
}
