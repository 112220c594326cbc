//! Configuration management for the NetShield service.
//!
//! This module handles loading and managing application configuration
//! from environment variables and configuration files.

use serde::Deserialize;
use std::env;
use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use crate::models::Config;

/// Load configuration from environment variables
pub fn load_config() -> Result<Config, ConfigError> {
    let config_file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config/default.toml".to_string());

    let config = ConfigBuilder::builder()
        .add_source(File::with_name(&config_file).required(false))
        .add_source(Environment::default())
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080)?
        .set_default("redis.url", "redis://127.0.0.1:6379")?
        .set_default("redis.pool_size", 10)?
        .set_default("classifier.threshold", 0.4)?
        .set_default("classifier.perturbation_amplitude", 0.05)?
        .set_default("aggregator.top_source_ips", 10)?
        .set_default("aggregator.top_attack_types", 5)?
        .set_default("aggregator.alert_window", 100)?
        .set_default("aggregator.stats_window", 50)?
        .set_default("notifications.volume_threshold", 10)?
        .set_default("notifications.volume_window_seconds", 60)?
        .set_default("notifications.dedup_capacity", 1024)?
        .set_default("notifications.poll_interval_seconds", 5)?
        .build()?;

    config.try_deserialize()
}
