use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_path: PathBuf,
    pub media_dir: PathBuf,
    pub static_dir: PathBuf,

    // Web Server
    pub web_host: String,
    pub web_port: u16,
    /// Absolute origin used for hyperlinks in API responses, feeds and sitemaps.
    pub base_url: String,
    pub page_size: u32,
    pub max_upload_bytes: usize,
    pub cookie_secure: bool,

    // Sessions
    pub session_cleanup_interval: Duration,

    // Bootstrap admin account
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/just_blog.sqlite"),
            media_dir: PathBuf::from("./data/media"),
            static_dir: PathBuf::from("./static"),
            web_host: "0.0.0.0".to_string(),
            web_port: 8080,
            base_url: "http://localhost:8080".to_string(),
            page_size: 10,
            max_upload_bytes: 10 * 1024 * 1024,
            cookie_secure: false,
            session_cleanup_interval: Duration::from_secs(3600),
            admin_username: None,
            admin_password: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; unset or empty values fall back to [`Config::default`].
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            // Storage
            database_path: optional_env("DATABASE_PATH")
                .map_or(defaults.database_path, PathBuf::from),
            media_dir: optional_env("MEDIA_DIR").map_or(defaults.media_dir, PathBuf::from),
            static_dir: optional_env("STATIC_DIR").map_or(defaults.static_dir, PathBuf::from),

            // Web Server
            web_host: env_or_default("WEB_HOST", &defaults.web_host),
            web_port: parse_env_u16("WEB_PORT", defaults.web_port)?,
            base_url: env_or_default("BASE_URL", &defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            page_size: parse_env_u32("PAGE_SIZE", defaults.page_size)?,
            max_upload_bytes: parse_env_usize("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            cookie_secure: parse_env_bool("COOKIE_SECURE", defaults.cookie_secure)?,

            // Sessions
            session_cleanup_interval: Duration::from_secs(parse_env_u64(
                "SESSION_CLEANUP_INTERVAL_SECS",
                defaults.session_cleanup_interval.as_secs(),
            )?),

            // Bootstrap admin account
            admin_username: optional_env("ADMIN_USERNAME"),
            admin_password: optional_env("ADMIN_PASSWORD"),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "PAGE_SIZE".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_UPLOAD_BYTES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                name: "BASE_URL".to_string(),
                message: format!("must start with http:// or https://, got '{}'", self.base_url),
            });
        }
        if self.admin_username.is_some() != self.admin_password.is_some() {
            return Err(ConfigError::InvalidValue {
                name: "ADMIN_USERNAME".to_string(),
                message: "ADMIN_USERNAME and ADMIN_PASSWORD must be set together".to_string(),
            });
        }
        Ok(())
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => parse_bool(name, &val),
        _ => Ok(default),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::ParseBool {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "true").unwrap());
        assert!(parse_bool("X", "ON").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(!parse_bool("X", "No").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }

    #[test]
    fn test_parse_env_defaults() {
        assert!(parse_env_bool("JUST_BLOG_NONEXISTENT_VAR", true).unwrap());
        assert_eq!(parse_env_u16("JUST_BLOG_NONEXISTENT_VAR", 8080).unwrap(), 8080);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let config = Config {
            page_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let config = Config {
            base_url: "example.com".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_admin_pair() {
        let config = Config {
            admin_username: Some("root".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
