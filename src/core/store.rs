//! Redis-backed datastore for the NetShield service.
//!
//! Alerts, traffic-stat snapshots, and blocklist records are stored as
//! JSON members of sorted sets scored by timestamp; writes publish a
//! change message so consumers can react without polling. The service
//! holds no authoritative copy of any record, only transient views over a
//! fetched window.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::classifier::{AttackType, Severity};
use crate::utils::format_store_key;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub const ALERTS_TABLE: &str = "alerts";
pub const TRAFFIC_STATS_TABLE: &str = "traffic_stats";
pub const BLOCKED_IPS_TABLE: &str = "blocked_ips";

const KEY_PREFIX: &str = "netshield";

/// Persisted record of a malicious verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source_ip: String,
    pub dest_ip: String,
    pub attack_type: AttackType,
    pub severity: Severity,
    pub confidence_score: f64,
    /// Raw feature vector attached as opaque payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_data: Option<serde_json::Value>,
}

/// Alert fields supplied by the caller; id and timestamp are assigned on insert
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub source_ip: String,
    pub dest_ip: String,
    pub attack_type: AttackType,
    pub severity: Severity,
    pub confidence_score: f64,
    pub packet_data: Option<serde_json::Value>,
}

/// Cumulative traffic counters, appended as a fresh snapshot each tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficStats {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub total_packets: u64,
    pub normal_packets: u64,
    pub malicious_packets: u64,
    pub bytes_transferred: u64,
}

/// Blocklist record; one lifecycle transition from active to unblocked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedIP {
    pub id: Uuid,
    pub ip_address: String,
    pub block_reason: String,
    pub blocked_at: DateTime<Utc>,
    pub unblock_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Outcome of a block request
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    Created(BlockedIP),
    /// An active block for the IP already exists; treated as a no-op
    AlreadyActive,
}

impl redis::FromRedisValue for Alert {
    fn from_redis_value(v: &redis::Value) -> redis::RedisResult<Self> {
        let str_value: String = redis::FromRedisValue::from_redis_value(v)?;
        serde_json::from_str(&str_value)
            .map_err(|e| redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "Failed to parse Alert from JSON",
                e.to_string(),
            )))
    }
}

impl redis::FromRedisValue for TrafficStats {
    fn from_redis_value(v: &redis::Value) -> redis::RedisResult<Self> {
        let str_value: String = redis::FromRedisValue::from_redis_value(v)?;
        serde_json::from_str(&str_value)
            .map_err(|e| redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "Failed to parse TrafficStats from JSON",
                e.to_string(),
            )))
    }
}

impl redis::FromRedisValue for BlockedIP {
    fn from_redis_value(v: &redis::Value) -> redis::RedisResult<Self> {
        let str_value: String = redis::FromRedisValue::from_redis_value(v)?;
        serde_json::from_str(&str_value)
            .map_err(|e| redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "Failed to parse BlockedIP from JSON",
                e.to_string(),
            )))
    }
}

/// Datastore handle
#[derive(Clone)]
pub struct Store {
    client: redis::Client,
}

impl Store {
    /// Create a new store backed by the given Redis client
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Insert a new alert, assigning its id and timestamp
    pub async fn insert_alert(&self, new_alert: NewAlert) -> Result<Alert, StoreError> {
        let alert = Alert {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_ip: new_alert.source_ip,
            dest_ip: new_alert.dest_ip,
            attack_type: new_alert.attack_type,
            severity: new_alert.severity,
            confidence_score: new_alert.confidence_score,
            packet_data: new_alert.packet_data,
        };
        let alert_json = serde_json::to_string(&alert)?;

        let mut conn = self.client.get_async_connection().await?;
        let _: () = redis::cmd("ZADD")
            .arg(table_key(ALERTS_TABLE))
            .arg(alert.timestamp.timestamp_millis())
            .arg(alert_json)
            .query_async::<_, ()>(&mut conn)
            .await?;
        self.publish_change(&mut conn, ALERTS_TABLE, "insert").await?;

        Ok(alert)
    }

    /// Most-recent-first window of stored alerts
    pub async fn recent_alerts(&self, limit: usize) -> Result<Vec<Alert>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.client.get_async_connection().await?;
        let alerts: Vec<Alert> = redis::cmd("ZREVRANGE")
            .arg(table_key(ALERTS_TABLE))
            .arg(0)
            .arg((limit - 1) as isize)
            .query_async::<_, Vec<Alert>>(&mut conn)
            .await?;
        Ok(alerts)
    }

    /// Latest cumulative traffic snapshot, if any
    pub async fn latest_stats(&self) -> Result<Option<TrafficStats>, StoreError> {
        let mut conn = self.client.get_async_connection().await?;
        let stats: Vec<TrafficStats> = redis::cmd("ZREVRANGE")
            .arg(table_key(TRAFFIC_STATS_TABLE))
            .arg(0)
            .arg(0)
            .query_async::<_, Vec<TrafficStats>>(&mut conn)
            .await?;
        Ok(stats.into_iter().next())
    }

    /// Most-recent-first window of traffic snapshots
    pub async fn stats_history(&self, limit: usize) -> Result<Vec<TrafficStats>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.client.get_async_connection().await?;
        let stats: Vec<TrafficStats> = redis::cmd("ZREVRANGE")
            .arg(table_key(TRAFFIC_STATS_TABLE))
            .arg(0)
            .arg((limit - 1) as isize)
            .query_async::<_, Vec<TrafficStats>>(&mut conn)
            .await?;
        Ok(stats)
    }

    /// Append a traffic snapshot with the given deltas added to the latest
    /// cumulative counters.
    ///
    /// Read-latest-then-append without a transaction: concurrent writers
    /// can under-count. The counters are an accepted approximation, not an
    /// exact tally.
    pub async fn record_traffic(
        &self,
        total: u64,
        normal: u64,
        malicious: u64,
        bytes: u64,
    ) -> Result<TrafficStats, StoreError> {
        let latest = self.latest_stats().await?;
        let (prev_total, prev_normal, prev_malicious, prev_bytes) = latest
            .map(|s| {
                (
                    s.total_packets,
                    s.normal_packets,
                    s.malicious_packets,
                    s.bytes_transferred,
                )
            })
            .unwrap_or((0, 0, 0, 0));

        let stats = TrafficStats {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            total_packets: prev_total + total,
            normal_packets: prev_normal + normal,
            malicious_packets: prev_malicious + malicious,
            bytes_transferred: prev_bytes + bytes,
        };
        let stats_json = serde_json::to_string(&stats)?;

        let mut conn = self.client.get_async_connection().await?;
        let _: () = redis::cmd("ZADD")
            .arg(table_key(TRAFFIC_STATS_TABLE))
            .arg(stats.timestamp.timestamp_millis())
            .arg(stats_json)
            .query_async::<_, ()>(&mut conn)
            .await?;
        self.publish_change(&mut conn, TRAFFIC_STATS_TABLE, "insert")
            .await?;

        Ok(stats)
    }

    /// Block an IP address.
    ///
    /// A second block request for an IP with an active record is an
    /// idempotent no-op; re-blocking after an unblock creates a fresh
    /// record.
    pub async fn block_ip(&self, ip: &str, reason: &str) -> Result<BlockOutcome, StoreError> {
        let active = self.active_blocks().await?;
        if active.iter().any(|block| block.ip_address == ip) {
            warn!("Duplicate block attempt for {} ignored", ip);
            return Ok(BlockOutcome::AlreadyActive);
        }

        let record = BlockedIP {
            id: Uuid::new_v4(),
            ip_address: ip.to_string(),
            block_reason: reason.to_string(),
            blocked_at: Utc::now(),
            unblock_at: None,
            is_active: true,
        };
        let record_json = serde_json::to_string(&record)?;

        let mut conn = self.client.get_async_connection().await?;
        let _: () = redis::cmd("ZADD")
            .arg(table_key(BLOCKED_IPS_TABLE))
            .arg(record.blocked_at.timestamp_millis())
            .arg(record_json)
            .query_async::<_, ()>(&mut conn)
            .await?;
        self.publish_change(&mut conn, BLOCKED_IPS_TABLE, "insert")
            .await?;

        Ok(BlockOutcome::Created(record))
    }

    /// Active blocks, most-recently-blocked first
    pub async fn active_blocks(&self) -> Result<Vec<BlockedIP>, StoreError> {
        let mut conn = self.client.get_async_connection().await?;
        let blocks: Vec<BlockedIP> = redis::cmd("ZREVRANGE")
            .arg(table_key(BLOCKED_IPS_TABLE))
            .arg(0)
            .arg(-1)
            .query_async::<_, Vec<BlockedIP>>(&mut conn)
            .await?;
        Ok(blocks
            .into_iter()
            .filter(|block| block.is_active)
            .collect())
    }

    /// Deactivate a block, stamping its unblock time.
    ///
    /// Returns `false` when no record with the given id exists.
    pub async fn unblock_ip(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.client.get_async_connection().await?;
        let records_json: Vec<String> = redis::cmd("ZRANGE")
            .arg(table_key(BLOCKED_IPS_TABLE))
            .arg(0)
            .arg(-1)
            .query_async::<_, Vec<String>>(&mut conn)
            .await?;

        for record_json in records_json {
            if let Ok(mut record) = serde_json::from_str::<BlockedIP>(&record_json) {
                if record.id == id {
                    record.is_active = false;
                    record.unblock_at = Some(Utc::now());

                    let updated_json = serde_json::to_string(&record)?;
                    let _: () = redis::pipe()
                        .atomic()
                        .cmd("ZREM")
                        .arg(table_key(BLOCKED_IPS_TABLE))
                        .arg(record_json)
                        .cmd("ZADD")
                        .arg(table_key(BLOCKED_IPS_TABLE))
                        .arg(record.blocked_at.timestamp_millis())
                        .arg(updated_json)
                        .query_async::<_, ()>(&mut conn)
                        .await?;
                    self.publish_change(&mut conn, BLOCKED_IPS_TABLE, "update")
                        .await?;

                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Subscribe to change notifications for a table
    pub async fn subscribe(&self, table: &str) -> Result<redis::aio::PubSub, StoreError> {
        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.subscribe(change_channel(table)).await?;
        Ok(pubsub)
    }

    async fn publish_change(
        &self,
        conn: &mut redis::aio::Connection,
        table: &str,
        operation: &str,
    ) -> Result<(), StoreError> {
        let _: () = redis::cmd("PUBLISH")
            .arg(change_channel(table))
            .arg(operation)
            .query_async::<_, ()>(conn)
            .await?;
        Ok(())
    }
}

fn table_key(table: &str) -> String {
    format_store_key(KEY_PREFIX, table)
}

fn change_channel(table: &str) -> String {
    format!("{}:changes:{}", KEY_PREFIX, table)
}
