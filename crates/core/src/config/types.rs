use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub augment: AugmentConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
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

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration (settings and artwork cache)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("posterboard.db")
}

/// How resolved posters are presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Poster image injected into each listing row.
    #[default]
    Annotate,
    /// Listing replaced by a grid of poster cards.
    Gallery,
}

/// Page augmentation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AugmentConfig {
    /// Quiet period after the last mutation before a rescan
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub display: DisplayMode,
    /// Height of injected poster images
    #[serde(default = "default_poster_height_px")]
    pub poster_height_px: u32,
    /// Upper bound on waiting for in-flight resolutions when serving a page
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
}

impl AugmentConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            display: DisplayMode::default(),
            poster_height_px: default_poster_height_px(),
            settle_timeout_ms: default_settle_timeout_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_poster_height_px() -> u32 {
    300
}

fn default_settle_timeout_ms() -> u64 {
    15_000
}

/// Detail page fetching configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Session cookie sent with every request (secret)
    #[serde(default)]
    pub cookie: Option<String>,
    /// No timeout when unset
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            cookie: None,
            timeout_secs: None,
        }
    }
}

fn default_user_agent() -> String {
    concat!("posterboard/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub augment: AugmentConfig,
    pub fetch: SanitizedFetchConfig,
}

/// Sanitized fetch config (cookie hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedFetchConfig {
    pub user_agent: String,
    pub cookie_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            augment: config.augment.clone(),
            fetch: SanitizedFetchConfig {
                user_agent: config.fetch.user_agent.clone(),
                cookie_configured: config
                    .fetch
                    .cookie
                    .as_deref()
                    .is_some_and(|c| !c.is_empty()),
                timeout_secs: config.fetch.timeout_secs,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, PathBuf::from("posterboard.db"));
        assert_eq!(config.augment.debounce_ms, 500);
        assert_eq!(config.augment.display, DisplayMode::Annotate);
        assert_eq!(config.augment.poster_height_px, 300);
        assert_eq!(config.augment.settle_timeout(), Duration::from_secs(15));
        assert!(config.fetch.cookie.is_none());
        assert!(config.fetch.timeout_secs.is_none());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/tmp/pb.db"

[augment]
debounce_ms = 100
display = "gallery"
poster_height_px = 200

[fetch]
user_agent = "Mozilla/5.0"
cookie = "uid=1; pass=abc"
timeout_secs = 20
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.augment.debounce_window(), Duration::from_millis(100));
        assert_eq!(config.augment.display, DisplayMode::Gallery);
        assert_eq!(config.augment.poster_height_px, 200);
        assert_eq!(config.fetch.user_agent, "Mozilla/5.0");
        assert_eq!(config.fetch.timeout_secs, Some(20));
    }

    #[test]
    fn test_sanitized_config_hides_cookie() {
        let toml = r#"
[fetch]
cookie = "uid=1; pass=secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.fetch.cookie_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("cookie_configured"));
    }

    #[test]
    fn test_sanitized_config_empty_cookie_is_not_configured() {
        let config = Config {
            fetch: FetchConfig {
                cookie: Some(String::new()),
                ..FetchConfig::default()
            },
            ..Config::default()
        };
        assert!(!SanitizedConfig::from(&config).fetch.cookie_configured);
    }
}
