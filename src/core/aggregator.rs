//! Aggregation views over the stored alert stream.
//!
//! Pure derivations consumed by the summary endpoint and the notification
//! loop: per-source and per-attack-type frequency rankings, a composite
//! threat score, and the recommended response for an alert. All functions
//! expect the alert slice most-recent-first, as returned by the store.

use serde::{Deserialize, Serialize};

use crate::core::classifier::{AttackType, Severity};
use crate::core::store::Alert;

/// One entry of the per-source-IP ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpCount {
    pub ip: String,
    pub count: u64,
}

/// One entry of the per-attack-type ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackTypeCount {
    pub attack_type: AttackType,
    pub count: u64,
}

/// Response recommended for an alert, derived from its severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedAction {
    BlockImmediately,
    BlockAndMonitor,
    MonitorClosely,
    LogAndContinue,
}

/// Rank source IPs by alert count, descending.
///
/// Ties keep the first-seen order of the input. The ranking is truncated
/// to `top_k`; counts of excluded IPs are dropped.
pub fn rank_by_source_ip(alerts: &[Alert], top_k: usize) -> Vec<IpCount> {
    let mut counts: Vec<IpCount> = Vec::new();
    for alert in alerts {
        match counts.iter_mut().find(|entry| entry.ip == alert.source_ip) {
            Some(entry) => entry.count += 1,
            None => counts.push(IpCount {
                ip: alert.source_ip.clone(),
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(top_k);
    counts
}

/// Rank attack types by alert count, descending, same ordering rule as
/// [`rank_by_source_ip`].
pub fn rank_by_attack_type(alerts: &[Alert], top_k: usize) -> Vec<AttackTypeCount> {
    let mut counts: Vec<AttackTypeCount> = Vec::new();
    for alert in alerts {
        match counts
            .iter_mut()
            .find(|entry| entry.attack_type == alert.attack_type)
        {
            Some(entry) => entry.count += 1,
            None => counts.push(AttackTypeCount {
                attack_type: alert.attack_type,
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(top_k);
    counts
}

/// Composite threat score in `[0, 100]`.
///
/// The confidence-derived base is raised to a per-severity floor so a low
/// confidence value can never contradict the severity band.
pub fn threat_score(alert: &Alert) -> u8 {
    let base = (alert.confidence_score * 100.0).round() as i64;
    let floored = base.max(i64::from(severity_floor(alert.severity)));
    floored.clamp(0, 100) as u8
}

/// Minimum threat score for a severity band
pub fn severity_floor(severity: Severity) -> u8 {
    match severity {
        Severity::Critical => 90,
        Severity::High => 70,
        Severity::Medium => 50,
        Severity::Low => 0,
    }
}

/// Recommended response for an alert, a pure function of its severity
pub fn recommended_action(alert: &Alert) -> RecommendedAction {
    match alert.severity {
        Severity::Critical => RecommendedAction::BlockImmediately,
        Severity::High => RecommendedAction::BlockAndMonitor,
        Severity::Medium => RecommendedAction::MonitorClosely,
        Severity::Low => RecommendedAction::LogAndContinue,
    }
}
