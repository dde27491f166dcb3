use std::time::Duration;

use common::config::{MqAppConfig, StorageAppConfig};
use common::retry::BackoffPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

fn default_cors_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            max_age: default_cors_max_age(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL, used for links in emails.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default)]
    pub cors: CorsConfig,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3000
}
fn default_public_url() -> String {
    "http://localhost:3000".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            cors: CorsConfig::default(),
        }
    }
}

/// Without a URL documents are kept in memory and lost on restart.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// Lifetime of confirmation and reset links.
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

fn default_session_ttl_hours() -> i64 {
    24 * 7
}
fn default_token_ttl_minutes() -> i64 {
    60
}

/// Document store call bounds and the retry policy for conflicting writes.
#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_documents_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_attempts() -> u8 {
    BackoffPolicy::default().max_attempts
}
fn default_base_ms() -> u64 {
    BackoffPolicy::default().base_ms
}
fn default_max_ms() -> u64 {
    BackoffPolicy::default().max_ms
}
fn default_documents_timeout_secs() -> u64 {
    30
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_ms: default_base_ms(),
            max_ms: default_max_ms(),
            timeout_secs: default_documents_timeout_secs(),
        }
    }
}

impl DocumentsConfig {
    pub fn retry_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_attempts,
            base_ms: self.base_ms,
            max_ms: self.max_ms,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MailConfig {
    /// HTTP endpoint accepting emails as JSON. Emails are only logged when unset.
    #[serde(default)]
    pub relay_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SocialConfig {
    /// Also remove the author's copy when a comment is deleted.
    #[serde(default)]
    pub mirror_comment_deletes: bool,
    #[serde(default = "default_max_comment_length")]
    pub max_comment_length: usize,
}

fn default_max_comment_length() -> usize {
    4096
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            mirror_comment_deletes: false,
            max_comment_length: default_max_comment_length(),
        }
    }
}

/// Administrator seeded at startup when `username` is set.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AdminConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageAppConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub social: SocialConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., SAMPLEHIVE__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("SAMPLEHIVE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
