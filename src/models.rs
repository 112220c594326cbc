use serde::{Deserialize, Serialize};
use crate::core::ClassifierConfig;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
    /// Redis connection pool size
    pub pool_size: u32,
}

/// Aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Number of source IPs to keep in the per-IP ranking
    pub top_source_ips: usize,
    /// Number of attack types to keep in the per-type ranking
    pub top_attack_types: usize,
    /// Size of the recent-alert window read from the store
    pub alert_window: usize,
    /// Number of traffic-stat snapshots served from the history endpoint
    pub stats_window: usize,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Alert count within the rolling window that triggers a volume warning
    pub volume_threshold: usize,
    /// Rolling window length in seconds
    pub volume_window_seconds: u64,
    /// Capacity of the already-notified alert id set
    pub dedup_capacity: usize,
    /// How often the notification loop re-reads the alert window (seconds)
    pub poll_interval_seconds: u64,
    /// Optional webhook URL notifications are delivered to
    pub webhook_url: Option<String>,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Redis configuration
    pub redis: RedisConfig,
    /// Classifier configuration
    pub classifier: ClassifierConfig,
    /// Aggregator configuration
    pub aggregator: AggregatorConfig,
    /// Notification configuration
    pub notifications: NotificationConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST")?,
                port: std::env::var("SERVER_PORT")?.parse()?,
            },
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")?,
                pool_size: std::env::var("REDIS_POOL_SIZE")?.parse()?,
            },
            classifier: ClassifierConfig {
                threshold: std::env::var("CLASSIFIER_THRESHOLD")?.parse()?,
                perturbation_amplitude: std::env::var("CLASSIFIER_PERTURBATION")?.parse()?,
            },
            aggregator: AggregatorConfig {
                top_source_ips: std::env::var("AGGREGATOR_TOP_SOURCES")?.parse()?,
                top_attack_types: std::env::var("AGGREGATOR_TOP_ATTACK_TYPES")?.parse()?,
                alert_window: std::env::var("AGGREGATOR_ALERT_WINDOW")?.parse()?,
                stats_window: std::env::var("AGGREGATOR_STATS_WINDOW")?.parse()?,
            },
            notifications: NotificationConfig {
                volume_threshold: std::env::var("NOTIFY_VOLUME_THRESHOLD")?.parse()?,
                volume_window_seconds: std::env::var("NOTIFY_VOLUME_WINDOW")?.parse()?,
                dedup_capacity: std::env::var("NOTIFY_DEDUP_CAPACITY")?.parse()?,
                poll_interval_seconds: std::env::var("NOTIFY_POLL_INTERVAL")?.parse()?,
                webhook_url: std::env::var("NOTIFY_WEBHOOK_URL").ok(),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            redis: RedisConfig {
                url: "redis://127.0.0.1:6379".to_string(),
                pool_size: 10,
            },
            classifier: ClassifierConfig::default(),
            aggregator: AggregatorConfig {
                top_source_ips: 10,
                top_attack_types: 5,
                alert_window: 100,
                stats_window: 50,
            },
            notifications: NotificationConfig {
                volume_threshold: 10,
                volume_window_seconds: 60,
                dedup_capacity: 1024,
                poll_interval_seconds: 5,
                webhook_url: None,
            },
        }
    }
}
