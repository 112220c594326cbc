//! Threshold-rule classifier for the NetShield service.
//!
//! This module maps a packet-feature vector onto an intrusion verdict.
//! Detection is a fixed ensemble of threshold rules whose suspicion
//! increments accumulate additively; the scoring function sits behind the
//! `Perturbation` seam so a trained model backend can replace it without
//! touching the aggregation side.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Errors that can occur during classification
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Suspicion score above which a flow is flagged malicious
    pub threshold: f64,
    /// Upper bound of the random perturbation added to the score
    pub perturbation_amplitude: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            perturbation_amplitude: 0.05,
        }
    }
}

/// Attack family assigned to a malicious flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackType {
    Normal,
    DoS,
    Probe,
    R2L,
    U2R,
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttackType::Normal => "Normal",
            AttackType::DoS => "DoS",
            AttackType::Probe => "Probe",
            AttackType::R2L => "R2L",
            AttackType::U2R => "U2R",
        };
        write!(f, "{}", name)
    }
}

/// Severity band, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        };
        write!(f, "{}", name)
    }
}

/// Classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_malicious: bool,
    pub attack_type: AttackType,
    pub severity: Severity,
    /// Suspicion score capped at 1.0
    pub confidence: f64,
}

/// Fixed-shape description of one observed network flow.
///
/// Field layout follows the KDD-style 41-feature traffic record submitted
/// by probes. Missing fields are rejected at deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub duration: u64,
    pub protocol_type: String,
    pub service: String,
    pub flag: String,
    pub src_bytes: u64,
    pub dst_bytes: u64,
    pub land: u8,
    pub wrong_fragment: u32,
    pub urgent: u32,
    pub hot: u32,
    pub num_failed_logins: u32,
    pub logged_in: u8,
    pub num_compromised: u32,
    pub root_shell: u8,
    pub su_attempted: u32,
    pub num_root: u32,
    pub num_file_creations: u32,
    pub num_shells: u32,
    pub num_access_files: u32,
    pub num_outbound_cmds: u32,
    pub is_host_login: u8,
    pub is_guest_login: u8,
    pub count: u32,
    pub srv_count: u32,
    pub serror_rate: f64,
    pub srv_serror_rate: f64,
    pub rerror_rate: f64,
    pub srv_rerror_rate: f64,
    pub same_srv_rate: f64,
    pub diff_srv_rate: f64,
    pub srv_diff_host_rate: f64,
    pub dst_host_count: u32,
    pub dst_host_srv_count: u32,
    pub dst_host_same_srv_rate: f64,
    pub dst_host_diff_srv_rate: f64,
    pub dst_host_same_src_port_rate: f64,
    pub dst_host_srv_diff_host_rate: f64,
    pub dst_host_serror_rate: f64,
    pub dst_host_srv_serror_rate: f64,
    pub dst_host_rerror_rate: f64,
    pub dst_host_srv_rerror_rate: f64,
}

const KNOWN_PROTOCOLS: [&str; 3] = ["tcp", "udp", "icmp"];

/// Source of the bounded random perturbation added to the suspicion score.
///
/// Injectable so tests can pin the score and a model backend can supply its
/// own uncertainty term.
#[cfg_attr(test, automock)]
pub trait Perturbation {
    /// Sample a perturbation in `[0, amplitude]`
    fn sample(&self, amplitude: f64) -> f64;
}

/// Uniform random perturbation in `[0, amplitude]`
pub struct UniformPerturbation;

impl Perturbation for UniformPerturbation {
    fn sample(&self, amplitude: f64) -> f64 {
        rand::thread_rng().gen::<f64>() * amplitude
    }
}

/// Zero perturbation, for deterministic classification
pub struct NoPerturbation;

impl Perturbation for NoPerturbation {
    fn sample(&self, _amplitude: f64) -> f64 {
        0.0
    }
}

/// Rule-based classifier
pub struct Classifier {
    config: ClassifierConfig,
    perturbation: Box<dyn Perturbation + Send + Sync>,
}

impl Classifier {
    /// Create a classifier with the default uniform perturbation source
    pub fn new(config: ClassifierConfig) -> Self {
        Self::with_perturbation(config, Box::new(UniformPerturbation))
    }

    /// Create a classifier with an injected perturbation source
    pub fn with_perturbation(
        config: ClassifierConfig,
        perturbation: Box<dyn Perturbation + Send + Sync>,
    ) -> Self {
        Self {
            config,
            perturbation,
        }
    }

    /// Classify one feature vector into a verdict
    ///
    /// Rules are evaluated in a fixed order and their suspicion increments
    /// accumulate; when several rules fire, the last firing rule's proposed
    /// attack family wins. Severity is the maximum of the score band and
    /// the winning rule's proposed severity, so a credential or privilege
    /// hit is never reported below Critical.
    pub fn classify(&self, features: &FeatureVector) -> Result<Verdict, ClassifierError> {
        validate(features)?;

        let mut score: f64 = 0.0;
        let mut proposal: Option<(AttackType, Severity)> = None;

        // Volume rule: flood-scale connection counts or byte volume
        if features.count > 500 || features.src_bytes > 10_000 {
            score += 0.3;
            proposal = Some((AttackType::DoS, Severity::High));
        }

        // Service-diversity rule: many destination hosts, little same-service traffic
        if features.dst_host_count > 100 && features.same_srv_rate < 0.1 {
            score += 0.4;
            proposal = Some((AttackType::Probe, Severity::Medium));
        }

        // Authentication rule: repeated login failures or guest entry
        if features.num_failed_logins > 3 || features.is_guest_login == 1 {
            score += 0.5;
            proposal = Some((AttackType::R2L, Severity::Critical));
        }

        // Privilege rule: root access indicators
        if features.num_root > 0 || features.root_shell > 0 {
            score += 0.6;
            proposal = Some((AttackType::U2R, Severity::Critical));
        }

        score += self
            .perturbation
            .sample(self.config.perturbation_amplitude);

        let is_malicious = score > self.config.threshold;
        let confidence = score.min(1.0);

        if !is_malicious {
            return Ok(Verdict {
                is_malicious,
                attack_type: AttackType::Normal,
                severity: Severity::Low,
                confidence,
            });
        }

        let (attack_type, proposed_severity) =
            proposal.unwrap_or((AttackType::Normal, Severity::Low));
        let severity = severity_band(score).max(proposed_severity);

        Ok(Verdict {
            is_malicious,
            attack_type,
            severity,
            confidence,
        })
    }
}

/// Map a suspicion score onto its severity band
fn severity_band(score: f64) -> Severity {
    if score > 0.8 {
        Severity::Critical
    } else if score >= 0.6 {
        Severity::High
    } else if score >= 0.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Validate the value ranges of a feature vector
///
/// Counts and byte fields are non-negative by construction; this checks
/// the rate fields, the binary indicator fields, and the protocol label.
pub fn validate(features: &FeatureVector) -> Result<(), ClassifierError> {
    let rates = [
        ("serror_rate", features.serror_rate),
        ("srv_serror_rate", features.srv_serror_rate),
        ("rerror_rate", features.rerror_rate),
        ("srv_rerror_rate", features.srv_rerror_rate),
        ("same_srv_rate", features.same_srv_rate),
        ("diff_srv_rate", features.diff_srv_rate),
        ("srv_diff_host_rate", features.srv_diff_host_rate),
        ("dst_host_same_srv_rate", features.dst_host_same_srv_rate),
        ("dst_host_diff_srv_rate", features.dst_host_diff_srv_rate),
        (
            "dst_host_same_src_port_rate",
            features.dst_host_same_src_port_rate,
        ),
        (
            "dst_host_srv_diff_host_rate",
            features.dst_host_srv_diff_host_rate,
        ),
        ("dst_host_serror_rate", features.dst_host_serror_rate),
        ("dst_host_srv_serror_rate", features.dst_host_srv_serror_rate),
        ("dst_host_rerror_rate", features.dst_host_rerror_rate),
        ("dst_host_srv_rerror_rate", features.dst_host_srv_rerror_rate),
    ];
    for (name, value) in rates {
        if !(0.0..=1.0).contains(&value) || value.is_nan() {
            return Err(ClassifierError::InvalidInput(format!(
                "{} must be within [0, 1], got {}",
                name, value
            )));
        }
    }

    let binaries = [
        ("land", features.land),
        ("logged_in", features.logged_in),
        ("root_shell", features.root_shell),
        ("is_host_login", features.is_host_login),
        ("is_guest_login", features.is_guest_login),
    ];
    for (name, value) in binaries {
        if value > 1 {
            return Err(ClassifierError::InvalidInput(format!(
                "{} must be 0 or 1, got {}",
                name, value
            )));
        }
    }

    if !KNOWN_PROTOCOLS.contains(&features.protocol_type.as_str()) {
        return Err(ClassifierError::InvalidInput(format!(
            "unknown protocol_type: {}",
            features.protocol_type
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn benign_vector() -> FeatureVector {
        FeatureVector {
            protocol_type: "tcp".to_string(),
            service: "http".to_string(),
            flag: "SF".to_string(),
            ..Default::default()
        }
    }

    fn deterministic_classifier() -> Classifier {
        Classifier::with_perturbation(ClassifierConfig::default(), Box::new(NoPerturbation))
    }

    #[test]
    fn test_zeroed_vector_is_normal() {
        let classifier = deterministic_classifier();
        let verdict = classifier.classify(&benign_vector()).unwrap();

        assert!(!verdict.is_malicious);
        assert_eq!(verdict.attack_type, AttackType::Normal);
        assert_eq!(verdict.severity, Severity::Low);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn test_failed_logins_flag_credential_attack() {
        let classifier = deterministic_classifier();
        let features = FeatureVector {
            num_failed_logins: 5,
            is_guest_login: 1,
            ..benign_vector()
        };

        let verdict = classifier.classify(&features).unwrap();
        assert!(verdict.is_malicious);
        assert_eq!(verdict.attack_type, AttackType::R2L);
        assert_eq!(verdict.severity, Severity::Critical);
        assert!(verdict.confidence >= 0.5);
    }

    #[test]
    fn test_root_shell_flags_privilege_escalation() {
        let classifier = deterministic_classifier();
        let features = FeatureVector {
            root_shell: 1,
            ..benign_vector()
        };

        let verdict = classifier.classify(&features).unwrap();
        assert!(verdict.is_malicious);
        assert_eq!(verdict.attack_type, AttackType::U2R);
        assert_eq!(verdict.severity, Severity::Critical);
        assert_eq!(verdict.confidence, 0.6);
    }

    #[test]
    fn test_volume_rule_alone_stays_below_threshold() {
        let classifier = deterministic_classifier();
        let features = FeatureVector {
            count: 600,
            ..benign_vector()
        };

        let verdict = classifier.classify(&features).unwrap();
        assert!(!verdict.is_malicious);
        assert_eq!(verdict.attack_type, AttackType::Normal);
    }

    #[test]
    fn test_last_firing_rule_wins_attack_type() {
        let classifier = deterministic_classifier();
        let features = FeatureVector {
            count: 600,
            dst_host_count: 150,
            same_srv_rate: 0.05,
            ..benign_vector()
        };

        // Both the volume and service-diversity rules fire; the
        // service-diversity rule is evaluated later and wins.
        let verdict = classifier.classify(&features).unwrap();
        assert!(verdict.is_malicious);
        assert_eq!(verdict.attack_type, AttackType::Probe);
        assert_eq!(verdict.severity, Severity::High);
        assert!((verdict.confidence - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_rules_cap_confidence() {
        let classifier = deterministic_classifier();
        let features = FeatureVector {
            count: 600,
            src_bytes: 20_000,
            dst_host_count: 150,
            same_srv_rate: 0.05,
            num_failed_logins: 5,
            num_root: 2,
            root_shell: 1,
            ..benign_vector()
        };

        let verdict = classifier.classify(&features).unwrap();
        assert!(verdict.is_malicious);
        assert_eq!(verdict.attack_type, AttackType::U2R);
        assert_eq!(verdict.severity, Severity::Critical);
        assert_eq!(verdict.confidence, 1.0);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = deterministic_classifier();
        let features = FeatureVector {
            num_failed_logins: 5,
            ..benign_vector()
        };

        let first = classifier.classify(&features).unwrap();
        let second = classifier.classify(&features).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_out_of_range_rate_is_rejected() {
        let classifier = deterministic_classifier();
        let features = FeatureVector {
            serror_rate: 1.5,
            ..benign_vector()
        };

        assert!(matches!(
            classifier.classify(&features),
            Err(ClassifierError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unknown_protocol_is_rejected() {
        let classifier = deterministic_classifier();
        let features = FeatureVector {
            protocol_type: "gre".to_string(),
            ..benign_vector()
        };

        assert!(matches!(
            classifier.classify(&features),
            Err(ClassifierError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_non_binary_indicator_is_rejected() {
        let classifier = deterministic_classifier();
        let features = FeatureVector {
            land: 2,
            ..benign_vector()
        };

        assert!(matches!(
            classifier.classify(&features),
            Err(ClassifierError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_perturbation_amplitude_is_forwarded() {
        let mut perturbation = MockPerturbation::new();
        perturbation
            .expect_sample()
            .withf(|amplitude| (*amplitude - 0.05).abs() < f64::EPSILON)
            .return_const(0.3f64);

        let classifier =
            Classifier::with_perturbation(ClassifierConfig::default(), Box::new(perturbation));
        let verdict = classifier.classify(&benign_vector()).unwrap();

        // 0.3 of pure perturbation stays below the 0.4 decision threshold.
        assert!(!verdict.is_malicious);
        assert!((verdict.confidence - 0.3).abs() < f64::EPSILON);
    }
}
