//! Notification triggers for the NetShield service.
//!
//! Watches the recent alert window for Critical alerts that have not been
//! notified on yet and for bursts of alert volume. De-duplication state is
//! confined to one owner; independent instances keep independent state and
//! may emit duplicates across processes.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use log::{error, info, warn};
use metrics::increment_counter;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time;
use uuid::Uuid;

use crate::core::classifier::{AttackType, Severity};
use crate::core::store::{self, Alert, Store};
use crate::core::webhook::WebhookClient;
use crate::models::{Config, NotificationConfig};

/// Emitted notification
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    CriticalAlert {
        alert_id: Uuid,
        attack_type: AttackType,
        source_ip: String,
    },
    HighVolume {
        count: usize,
        window_seconds: u64,
    },
}

impl Notification {
    pub fn message(&self) -> String {
        match self {
            Notification::CriticalAlert {
                attack_type,
                source_ip,
                ..
            } => format!(
                "Critical security alert: {} detected from {}",
                attack_type, source_ip
            ),
            Notification::HighVolume {
                count,
                window_seconds,
            } => format!(
                "High alert volume: {} alerts in the last {}s",
                count, window_seconds
            ),
        }
    }
}

/// Notification de-duplication state
pub struct Notifier {
    volume_threshold: usize,
    volume_window_seconds: u64,
    dedup_capacity: usize,
    seen_order: VecDeque<Uuid>,
    seen: HashSet<Uuid>,
    last_volume_warning: Option<DateTime<Utc>>,
}

impl Notifier {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            volume_threshold: config.volume_threshold,
            volume_window_seconds: config.volume_window_seconds,
            dedup_capacity: config.dedup_capacity,
            seen_order: VecDeque::new(),
            seen: HashSet::new(),
            last_volume_warning: None,
        }
    }

    /// Evaluate an alert batch against the de-duplication state.
    ///
    /// Emits one notification per not-yet-seen Critical alert and at most
    /// one volume warning per rolling window. The caller supplies `now` so
    /// window arithmetic is deterministic under test.
    pub fn process(&mut self, alerts: &[Alert], now: DateTime<Utc>) -> Vec<Notification> {
        let mut notifications = Vec::new();

        for alert in alerts {
            if alert.severity == Severity::Critical && !self.seen.contains(&alert.id) {
                self.remember(alert.id);
                notifications.push(Notification::CriticalAlert {
                    alert_id: alert.id,
                    attack_type: alert.attack_type,
                    source_ip: alert.source_ip.clone(),
                });
            }
        }

        let window_start = now - chrono::Duration::seconds(self.volume_window_seconds as i64);
        let recent = alerts
            .iter()
            .filter(|alert| alert.timestamp > window_start)
            .count();
        if recent >= self.volume_threshold && self.volume_warning_allowed(now) {
            self.last_volume_warning = Some(now);
            notifications.push(Notification::HighVolume {
                count: recent,
                window_seconds: self.volume_window_seconds,
            });
        }

        notifications
    }

    fn volume_warning_allowed(&self, now: DateTime<Utc>) -> bool {
        match self.last_volume_warning {
            None => true,
            Some(last) => {
                now.signed_duration_since(last)
                    > chrono::Duration::seconds(self.volume_window_seconds as i64)
            }
        }
    }

    /// Record a notified alert id, evicting the oldest beyond capacity.
    ///
    /// Ids are never reused, so eviction can only re-allow an id that has
    /// long since left the recent window.
    fn remember(&mut self, id: Uuid) {
        if self.seen.insert(id) {
            self.seen_order.push_back(id);
            while self.seen_order.len() > self.dedup_capacity {
                if let Some(evicted) = self.seen_order.pop_front() {
                    self.seen.remove(&evicted);
                }
            }
        }
    }
}

/// Drive the notifier against the store until the process exits.
///
/// Reacts to alert change messages when the subscription is available and
/// falls back to plain interval polling when it is not.
pub async fn run_notification_loop(
    store: Store,
    notifier: Arc<Mutex<Notifier>>,
    webhook: Option<WebhookClient>,
    config: Arc<Config>,
) {
    let poll = Duration::from_secs(config.notifications.poll_interval_seconds);
    let window = config.aggregator.alert_window;

    match store.subscribe(store::ALERTS_TABLE).await {
        Ok(mut pubsub) => {
            info!("Notification loop subscribed to alert changes");
            let mut interval = time::interval(poll);
            let mut changes = pubsub.on_message();
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    message = changes.next() => {
                        if message.is_none() {
                            warn!("Alert change subscription closed, falling back to polling");
                            break;
                        }
                    }
                }
                if let Err(e) = poll_and_dispatch(&store, &notifier, webhook.as_ref(), window).await
                {
                    error!("Notification pass failed: {}", e);
                }
            }
        }
        Err(e) => warn!(
            "Could not subscribe to alert changes ({}), falling back to polling",
            e
        ),
    }

    let mut interval = time::interval(poll);
    loop {
        interval.tick().await;
        if let Err(e) = poll_and_dispatch(&store, &notifier, webhook.as_ref(), window).await {
            error!("Notification pass failed: {}", e);
        }
    }
}

async fn poll_and_dispatch(
    store: &Store,
    notifier: &Mutex<Notifier>,
    webhook: Option<&WebhookClient>,
    window: usize,
) -> anyhow::Result<()> {
    let alerts = store.recent_alerts(window).await?;
    let notifications = notifier.lock().await.process(&alerts, Utc::now());

    for notification in notifications {
        info!("{}", notification.message());
        increment_counter!("netshield_notifications_total");
        if let Some(client) = webhook {
            if let Err(e) = client.send(&notification).await {
                warn!("Webhook delivery failed: {}", e);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_config() -> NotificationConfig {
        NotificationConfig {
            volume_threshold: 10,
            volume_window_seconds: 60,
            dedup_capacity: 1024,
            poll_interval_seconds: 5,
            webhook_url: None,
        }
    }

    fn critical_alert(timestamp: DateTime<Utc>) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            timestamp,
            source_ip: "192.168.1.100".to_string(),
            dest_ip: "10.0.0.1".to_string(),
            attack_type: AttackType::R2L,
            severity: Severity::Critical,
            confidence_score: 0.9,
            packet_data: None,
        }
    }

    fn low_alert(timestamp: DateTime<Utc>) -> Alert {
        Alert {
            severity: Severity::Low,
            attack_type: AttackType::Probe,
            confidence_score: 0.4,
            ..critical_alert(timestamp)
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_critical_alert_notified_once() {
        let mut notifier = Notifier::new(&test_config());
        let now = base_time();
        let alert = critical_alert(now);

        let first = notifier.process(std::slice::from_ref(&alert), now);
        assert_eq!(first.len(), 1);
        assert!(matches!(first[0], Notification::CriticalAlert { alert_id, .. } if alert_id == alert.id));

        // Same alert resurfacing in the next batch stays silent.
        let second = notifier.process(std::slice::from_ref(&alert), now + chrono::Duration::seconds(5));
        assert!(second.is_empty());
    }

    #[test]
    fn test_duplicate_id_within_batch_notified_once() {
        let mut notifier = Notifier::new(&test_config());
        let now = base_time();
        let alert = critical_alert(now);
        let batch = vec![alert.clone(), alert];

        let notifications = notifier.process(&batch, now);
        assert_eq!(notifications.len(), 1);
    }

    #[test]
    fn test_low_severity_alerts_do_not_notify() {
        let mut notifier = Notifier::new(&test_config());
        let now = base_time();
        let batch = vec![low_alert(now)];

        assert!(notifier.process(&batch, now).is_empty());
    }

    #[test]
    fn test_dedup_set_is_bounded() {
        let mut notifier = Notifier::new(&NotificationConfig {
            dedup_capacity: 2,
            ..test_config()
        });
        let now = base_time();

        let first = critical_alert(now);
        notifier.process(std::slice::from_ref(&first), now);
        notifier.process(&[critical_alert(now)], now);
        notifier.process(&[critical_alert(now)], now);

        // Capacity 2: the first id has been evicted and notifies again.
        let replay = notifier.process(std::slice::from_ref(&first), now);
        assert_eq!(replay.len(), 1);
    }

    #[test]
    fn test_volume_warning_once_per_window() {
        let mut notifier = Notifier::new(&test_config());
        let start = base_time();

        let mut alerts: Vec<Alert> = (0..12)
            .map(|i| low_alert(start + chrono::Duration::seconds(i)))
            .collect();

        let now = start + chrono::Duration::seconds(12);
        let first = notifier.process(&alerts, now);
        assert_eq!(first.len(), 1);
        assert!(matches!(first[0], Notification::HighVolume { count: 12, .. }));

        // Another alert five seconds later stays within the warned window.
        alerts.push(low_alert(now + chrono::Duration::seconds(5)));
        let second = notifier.process(&alerts, now + chrono::Duration::seconds(5));
        assert!(second.is_empty());

        // Past the window a fresh burst may warn again.
        let later = now + chrono::Duration::seconds(65);
        let burst: Vec<Alert> = (0..12)
            .map(|i| low_alert(later - chrono::Duration::seconds(i)))
            .collect();
        let third = notifier.process(&burst, later);
        assert_eq!(third.len(), 1);
    }

    #[test]
    fn test_empty_batch_is_silent() {
        let mut notifier = Notifier::new(&test_config());
        assert!(notifier.process(&[], base_time()).is_empty());
    }
}
