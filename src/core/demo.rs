//! Synthetic traffic generation for demo deployments.
//!
//! Seeds the store with randomized alerts, a cumulative traffic snapshot,
//! and auto-blocks for some generated Critical alerts so a fresh
//! deployment has data to display.

use log::info;
use rand::Rng;
use serde::Serialize;

use crate::core::classifier::{AttackType, Severity};
use crate::core::store::{BlockOutcome, NewAlert, Store, StoreError};

const ATTACK_TYPES: [AttackType; 5] = [
    AttackType::DoS,
    AttackType::Probe,
    AttackType::R2L,
    AttackType::U2R,
    AttackType::Normal,
];

const SEVERITIES: [Severity; 4] = [
    Severity::Low,
    Severity::Medium,
    Severity::High,
    Severity::Critical,
];

/// Summary of one demo-traffic generation pass
#[derive(Debug, Clone, Serialize)]
pub struct DemoSummary {
    pub alerts_created: usize,
    pub ips_blocked: usize,
}

struct SyntheticFlow {
    source_ip: String,
    dest_ip: String,
    attack_type: AttackType,
    severity: Severity,
    confidence: f64,
    auto_block: bool,
}

struct SyntheticBatch {
    flows: Vec<SyntheticFlow>,
    normal_packets: u64,
    malicious_packets: u64,
    bytes_transferred: u64,
}

/// Append one synthetic traffic snapshot and a handful of synthetic alerts
pub async fn generate_demo_traffic(store: &Store) -> Result<DemoSummary, StoreError> {
    let batch = synthesize_batch();

    let mut alerts_created = 0;
    let mut ips_blocked = 0;
    for flow in &batch.flows {
        if flow.attack_type == AttackType::Normal {
            continue;
        }
        store
            .insert_alert(NewAlert {
                source_ip: flow.source_ip.clone(),
                dest_ip: flow.dest_ip.clone(),
                attack_type: flow.attack_type,
                severity: flow.severity,
                confidence_score: flow.confidence,
                packet_data: None,
            })
            .await?;
        alerts_created += 1;

        if flow.auto_block {
            if let BlockOutcome::Created(_) = store
                .block_ip(
                    &flow.source_ip,
                    &format!("Detected {} attack pattern", flow.attack_type),
                )
                .await?
            {
                ips_blocked += 1;
            }
        }
    }

    store
        .record_traffic(
            batch.normal_packets + batch.malicious_packets,
            batch.normal_packets,
            batch.malicious_packets,
            batch.bytes_transferred,
        )
        .await?;

    info!(
        "Generated demo traffic: {} alerts, {} auto-blocks",
        alerts_created, ips_blocked
    );
    Ok(DemoSummary {
        alerts_created,
        ips_blocked,
    })
}

/// Draw all random decisions up front so no RNG is held across awaits
fn synthesize_batch() -> SyntheticBatch {
    let mut rng = rand::thread_rng();

    let flow_count = rng.gen_range(1..=3);
    let flows = (0..flow_count)
        .map(|_| {
            let attack_type = ATTACK_TYPES[rng.gen_range(0..ATTACK_TYPES.len())];
            let severity = SEVERITIES[rng.gen_range(0..SEVERITIES.len())];
            SyntheticFlow {
                source_ip: random_ip(&mut rng),
                dest_ip: random_ip(&mut rng),
                attack_type,
                severity,
                confidence: rng.gen::<f64>(),
                auto_block: severity == Severity::Critical && rng.gen_bool(0.5),
            }
        })
        .collect::<Vec<_>>();

    let malicious = flows
        .iter()
        .filter(|flow| flow.attack_type != AttackType::Normal)
        .count() as u64;
    SyntheticBatch {
        flows,
        normal_packets: rng.gen_range(1..=50),
        malicious_packets: malicious * rng.gen_range(1..=10),
        bytes_transferred: rng.gen_range(1_000..=10_000),
    }
}

fn random_ip(rng: &mut impl Rng) -> String {
    format!(
        "{}.{}.{}.{}",
        rng.gen_range(1..=254),
        rng.gen_range(0..=255),
        rng.gen_range(0..=255),
        rng.gen_range(1..=254)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_batch_shape() {
        for _ in 0..50 {
            let batch = synthesize_batch();
            assert!((1..=3).contains(&batch.flows.len()));
            for flow in &batch.flows {
                assert!((0.0..=1.0).contains(&flow.confidence));
                assert!(flow.source_ip.split('.').count() == 4);
                if flow.auto_block {
                    assert_eq!(flow.severity, Severity::Critical);
                }
            }
        }
    }
}
