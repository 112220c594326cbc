//! Core functionality for the NetShield service.
//!
//! This module contains the core components of the service: the rule-based
//! classifier, the aggregation views, notification de-duplication, the
//! Redis-backed datastore, and the webhook delivery channel.

pub mod aggregator;
pub mod classifier;
pub mod demo;
pub mod notifier;
pub mod store;
pub mod webhook;

pub use aggregator::{
    rank_by_attack_type, rank_by_source_ip, recommended_action, threat_score, AttackTypeCount,
    IpCount, RecommendedAction,
};
pub use classifier::{
    AttackType, Classifier, ClassifierConfig, ClassifierError, FeatureVector, NoPerturbation,
    Perturbation, Severity, UniformPerturbation, Verdict,
};
pub use notifier::{run_notification_loop, Notification, Notifier};
pub use store::{Alert, BlockOutcome, BlockedIP, NewAlert, Store, StoreError, TrafficStats};
pub use webhook::{WebhookClient, WebhookError};
