//! Application configuration loaded from environment variables.
//!
//! Loading is fail-fast: required variables must be present and valid or
//! startup aborts with a clear error message.

use std::env;

use thiserror::Error;

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Failed to parse port: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,

    /// Server listen port
    pub port: u16,

    /// PostgreSQL connection string
    pub database_url: String,

    /// OAuth client id issued by the Google console
    pub google_client_id: String,

    /// OAuth client secret issued by the Google console
    pub google_client_secret: String,

    /// Callback URL registered with Google (must match exactly)
    pub google_redirect_url: String,

    /// Whether sign-in via Google is enabled at all
    pub google_login_enabled: bool,

    /// Whether unknown identities may register a new account
    pub registration_open: bool,

    /// Whether session cookies carry the Secure attribute
    pub session_secure: bool,

    /// Browser origin allowed to call the API with credentials, if any
    pub frontend_origin: Option<String>,

    /// Tracing filter directive (e.g., "info,tessera_social=debug")
    pub rust_log: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &"[redacted]")
            .field("google_client_id", &self.google_client_id)
            .field("google_client_secret", &"[redacted]")
            .field("google_redirect_url", &self.google_redirect_url)
            .field("google_login_enabled", &self.google_login_enabled)
            .field("registration_open", &self.registration_open)
            .field("session_secure", &self.session_secure)
            .field("frontend_origin", &self.frontend_origin)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values are
    /// invalid (e.g., a URL without a scheme, an invalid port number).
    ///
    /// # Required Variables
    ///
    /// - `DATABASE_URL` - PostgreSQL connection string
    /// - `GOOGLE_CLIENT_ID` - OAuth client id
    /// - `GOOGLE_CLIENT_SECRET` - OAuth client secret
    /// - `GOOGLE_REDIRECT_URL` - callback URL registered with Google
    ///
    /// # Optional Variables
    ///
    /// - `HOST` - Bind address (default: "0.0.0.0")
    /// - `PORT` - Listen port (default: 8080)
    /// - `GOOGLE_LOGIN_ENABLED` - default: true
    /// - `REGISTRATION_OPEN` - default: true
    /// - `SESSION_SECURE` - default: false
    /// - `FRONTEND_ORIGIN` - allowed CORS origin (default: none)
    /// - `RUST_LOG` - Log level filter (default: "info")
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development only)
        let _ = dotenvy::dotenv();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let google_client_id = env::var("GOOGLE_CLIENT_ID")
            .map_err(|_| ConfigError::MissingVar("GOOGLE_CLIENT_ID".to_string()))?;

        let google_client_secret = env::var("GOOGLE_CLIENT_SECRET")
            .map_err(|_| ConfigError::MissingVar("GOOGLE_CLIENT_SECRET".to_string()))?;

        let google_redirect_url = env::var("GOOGLE_REDIRECT_URL")
            .map_err(|_| ConfigError::MissingVar("GOOGLE_REDIRECT_URL".to_string()))?;
        validate_url("GOOGLE_REDIRECT_URL", &google_redirect_url)?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;

        if port == 0 {
            return Err(ConfigError::InvalidValue {
                var: "PORT".to_string(),
                message: "Port must be between 1 and 65535".to_string(),
            });
        }

        let google_login_enabled = bool_var("GOOGLE_LOGIN_ENABLED", true);
        let registration_open = bool_var("REGISTRATION_OPEN", true);
        let session_secure = bool_var("SESSION_SECURE", false);

        let frontend_origin = env::var("FRONTEND_ORIGIN").ok().filter(|s| !s.is_empty());
        if let Some(origin) = &frontend_origin {
            validate_url("FRONTEND_ORIGIN", origin)?;
        }

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Config {
            host,
            port,
            database_url,
            google_client_id,
            google_client_secret,
            google_redirect_url,
            google_login_enabled,
            registration_open,
            session_secure,
            frontend_origin,
            rust_log,
        })
    }

    /// Get the server bind address as a socket address string.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a boolean flag. Unset falls back to `default`; a set value is false
/// only for an explicit negative.
fn bool_var(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(s) => !matches!(s.to_lowercase().as_str(), "false" | "0" | "no" | "off"),
        Err(_) => default,
    }
}

/// Validate that a configured URL carries an http(s) scheme.
fn validate_url(var_name: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            var: var_name.to_string(),
            message: "Must be a URL starting with http:// or https://".to_string(),
        })
    }
}
