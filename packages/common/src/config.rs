use serde::Deserialize;

/// App-level MQ configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Whether MQ is enabled. Default: true.
    /// When disabled the server keeps scan jobs in an in-process queue.
    #[serde(default = "default_mq_enabled")]
    pub enabled: bool,
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_mq_pool_size")]
    pub pool_size: u8,
    /// Topic scan jobs are published to. Default: "scan".
    #[serde(default = "default_mq_scan_topic")]
    pub scan_topic: String,
    /// Queue name for scan reports (workers publish, server consumes). Default: "scan_results".
    #[serde(default = "default_mq_result_queue_name")]
    pub result_queue_name: String,
    /// Upper bound for a single publish call, in seconds. Default: 30.
    #[serde(default = "default_mq_publish_timeout_secs")]
    pub publish_timeout_secs: u64,
}

fn default_mq_enabled() -> bool {
    true
}
fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_pool_size() -> u8 {
    5
}
fn default_mq_scan_topic() -> String {
    "scan".into()
}
fn default_mq_result_queue_name() -> String {
    "scan_results".into()
}
fn default_mq_publish_timeout_secs() -> u64 {
    30
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            enabled: default_mq_enabled(),
            url: default_mq_url(),
            pool_size: default_mq_pool_size(),
            scan_topic: default_mq_scan_topic(),
            result_queue_name: default_mq_result_queue_name(),
            publish_timeout_secs: default_mq_publish_timeout_secs(),
        }
    }
}

/// Which object store implementation backs the samples and avatars buckets.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Filesystem,
    S3,
}

/// App-level object storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageAppConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,
    /// Root directory for the filesystem backend. Default: "./data/objects".
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Bucket holding submitted samples. Default: "samples".
    #[serde(default = "default_samples_bucket")]
    pub samples_bucket: String,
    /// Bucket holding profile pictures. Default: "avatars".
    #[serde(default = "default_avatars_bucket")]
    pub avatars_bucket: String,
    /// Largest accepted sample in bytes. Default: 64 MiB.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Largest accepted avatar in bytes. Default: 100 KiB.
    #[serde(default = "default_max_avatar_size")]
    pub max_avatar_size: u64,
    /// Upper bound for a single storage call, in seconds. Default: 30.
    #[serde(default = "default_storage_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub s3: S3AppConfig,
}

/// Settings used when `backend = "s3"`.
#[derive(Debug, Deserialize, Clone)]
pub struct S3AppConfig {
    #[serde(default = "default_s3_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub bucket_prefix: String,
    #[serde(default = "default_s3_path_style")]
    pub path_style: bool,
}

fn default_storage_path() -> String {
    "./data/objects".into()
}
fn default_samples_bucket() -> String {
    "samples".into()
}
fn default_avatars_bucket() -> String {
    "avatars".into()
}
fn default_max_file_size() -> u64 {
    64 * 1024 * 1024
}
fn default_max_avatar_size() -> u64 {
    100 * 1024
}
fn default_storage_timeout_secs() -> u64 {
    30
}
fn default_s3_endpoint() -> String {
    "http://localhost:9000".into()
}
fn default_s3_region() -> String {
    "us-east-1".into()
}
fn default_s3_path_style() -> bool {
    true
}

impl Default for S3AppConfig {
    fn default() -> Self {
        Self {
            endpoint: default_s3_endpoint(),
            region: default_s3_region(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket_prefix: String::new(),
            path_style: default_s3_path_style(),
        }
    }
}

impl Default for StorageAppConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            path: default_storage_path(),
            samples_bucket: default_samples_bucket(),
            avatars_bucket: default_avatars_bucket(),
            max_file_size: default_max_file_size(),
            max_avatar_size: default_max_avatar_size(),
            timeout_secs: default_storage_timeout_secs(),
            s3: S3AppConfig::default(),
        }
    }
}
