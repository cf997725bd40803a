//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Token and registration configuration.
    pub auth: AuthConfig,
    /// Attachment upload limits.
    #[serde(default)]
    pub uploads: UploadConfig,
    /// Rate limiting for public and list endpoints.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Tracker lifecycle rules.
    #[serde(default)]
    pub trackers: TrackerConfig,
    /// Log output configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// First administrator, created when the user table is empty.
    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens.
    pub jwt_secret: String,
    /// Session token lifetime in hours.
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Accept unauthenticated registrations (development only).
    #[serde(default)]
    pub open_registration: bool,
}

/// Upload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum attachment size in bytes.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_attachment_bytes: default_max_attachment_bytes(),
        }
    }
}

/// Fixed-window rate limit settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Requests allowed per client per window.
    #[serde(default = "default_rate_limit_max_requests")]
    pub max_requests: u32,
    /// Window length in seconds.
    #[serde(default = "default_rate_limit_window_secs")]
    pub window_secs: u64,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP`. Enable only behind a
    /// proxy that overwrites these headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max_requests(),
            window_secs: default_rate_limit_window_secs(),
            trust_proxy_headers: false,
        }
    }
}

/// Tracker lifecycle configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackerConfig {
    /// Treat `approved` and `noted` recipient statuses as terminal.
    #[serde(default)]
    pub lock_final_status: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Bootstrap administrator account.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    /// Username of the initial superadmin.
    pub username: String,
    /// Password of the initial superadmin.
    pub password: String,
    /// Code of the department the superadmin belongs to.
    #[serde(default = "default_bootstrap_department_code")]
    pub department_code: i32,
    /// Name of that department.
    #[serde(default = "default_bootstrap_department_name")]
    pub department_name: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_token_ttl_hours() -> i64 {
    24
}

const fn default_max_attachment_bytes() -> usize {
    50 * 1024 * 1024
}

const fn default_rate_limit_max_requests() -> u32 {
    100
}

const fn default_rate_limit_window_secs() -> u64 {
    15 * 60
}

const fn default_bootstrap_department_code() -> i32 {
    1
}

fn default_bootstrap_department_name() -> String {
    "Administration".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, exported into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `DOCTRACK_ENV`)
    /// 4. Environment variables with `DOCTRACK__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("DOCTRACK_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("DOCTRACK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("DOCTRACK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Configuration suitable for unit and integration tests.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/doctrack_test".to_string(),
                max_connections: 5,
                min_connections: 1,
            },
            auth: AuthConfig {
                jwt_secret: "test-secret-do-not-use".to_string(),
                token_ttl_hours: default_token_ttl_hours(),
                open_registration: false,
            },
            uploads: UploadConfig::default(),
            rate_limit: RateLimitSettings::default(),
            trackers: TrackerConfig::default(),
            logging: LoggingConfig::default(),
            bootstrap: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_toml() {
        let source = r#"
            [database]
            url = "postgres://localhost/doctrack"

            [auth]
            jwt_secret = "s3cret"
        "#;

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .and_then(config::Config::try_deserialize)
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert!(!config.auth.open_registration);
        assert_eq!(config.uploads.max_attachment_bytes, 50 * 1024 * 1024);
        assert_eq!(config.rate_limit.window_secs, 900);
        assert!(!config.rate_limit.trust_proxy_headers);
        assert!(!config.trackers.lock_final_status);
        assert!(config.bootstrap.is_none());
    }

    #[test]
    fn test_bootstrap_section_defaults() {
        let source = r#"
            [database]
            url = "postgres://localhost/doctrack"

            [auth]
            jwt_secret = "s3cret"

            [bootstrap]
            username = "root"
            password = "Root#2024"
        "#;

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .and_then(config::Config::try_deserialize)
            .unwrap();

        let bootstrap = config.bootstrap.unwrap();
        assert_eq!(bootstrap.department_code, 1);
        assert_eq!(bootstrap.department_name, "Administration");
    }
}
