//! API endpoints for the NetShield service.
//!
//! This module provides the HTTP surface: packet classification, demo
//! traffic seeding, aggregated alert summaries, blocklist management, and
//! operational endpoints.

use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use metrics::increment_counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::aggregator::{
    rank_by_attack_type, rank_by_source_ip, recommended_action, threat_score, AttackTypeCount,
    IpCount, RecommendedAction,
};
use crate::core::classifier::{Classifier, FeatureVector, Severity, Verdict};
use crate::core::demo::{generate_demo_traffic, DemoSummary};
use crate::core::store::{Alert, BlockOutcome, NewAlert, Store, TrafficStats};
use crate::models::Config;

/// Average observed packet size, used for the per-request byte counter
const AVG_PACKET_BYTES: u64 = 1500;

pub struct ApiState {
    pub classifier: Classifier,
    pub store: Store,
    pub config: Arc<Config>,
    pub metrics: Option<PrometheusHandle>,
}

/// API configuration function for Actix-web
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(ErrorResponse {
            error: err.to_string(),
        });
        actix_web::error::InternalError::from_response(err, response).into()
    }));
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/health").route(web::get().to(health_check)))
            .service(web::resource("/classify").route(web::post().to(classify)))
            .service(web::resource("/demo").route(web::get().to(demo)))
            .service(web::resource("/alerts/summary").route(web::get().to(alerts_summary)))
            .service(web::resource("/stats").route(web::get().to(traffic_stats)))
            .service(
                web::resource("/blocked")
                    .route(web::get().to(list_blocked))
                    .route(web::post().to(block_ip)),
            )
            .service(web::resource("/blocked/{id}/unblock").route(web::post().to(unblock_ip)))
            .service(web::resource("/metrics").route(web::get().to(metrics_snapshot))),
    );
}

/// Health check endpoint response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Classification request
#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub features: FeatureVector,
    pub source_ip: String,
    pub dest_ip: String,
}

/// Classification response
#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub prediction: Verdict,
    pub alert_stored: bool,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Demo endpoint query parameters
#[derive(Debug, Deserialize)]
pub struct DemoQuery {
    pub action: String,
}

/// Demo endpoint response
#[derive(Serialize)]
struct DemoResponse {
    success: bool,
    #[serde(flatten)]
    summary: DemoSummary,
}

/// One alert of the summary, annotated with its derived assessment
#[derive(Debug, Serialize, Deserialize)]
pub struct AlertAssessment {
    pub threat_score: u8,
    pub recommended_action: RecommendedAction,
    #[serde(flatten)]
    pub alert: Alert,
}

/// Aggregated view over the recent alert window
#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub total_alerts: usize,
    pub top_sources: Vec<IpCount>,
    pub top_attack_types: Vec<AttackTypeCount>,
    pub recent: Vec<AlertAssessment>,
}

/// Traffic statistics response
#[derive(Serialize)]
struct StatsResponse {
    latest: Option<TrafficStats>,
    history: Vec<TrafficStats>,
}

/// Manual block request
#[derive(Debug, Serialize, Deserialize)]
pub struct BlockRequest {
    pub ip_address: String,
    pub reason: Option<String>,
}

/// Block response
#[derive(Serialize)]
struct BlockResponse {
    success: bool,
    duplicate: bool,
}

/// Number of annotated alerts returned by the summary endpoint
const SUMMARY_RECENT_LIMIT: usize = 10;

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Classify a submitted feature vector and persist the outcome.
///
/// The verdict is computed before any store access and is returned even
/// when persistence fails; storage trouble only shows up as
/// `alert_stored: false`.
pub async fn classify(
    state: web::Data<ApiState>,
    request: web::Json<ClassifyRequest>,
) -> impl Responder {
    increment_counter!("netshield_classify_requests_total");
    let request = request.into_inner();

    let prediction = match state.classifier.classify(&request.features) {
        Ok(verdict) => verdict,
        Err(e) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    };

    let mut alert_stored = false;
    if prediction.is_malicious {
        increment_counter!("netshield_malicious_verdicts_total");
        let packet_data = serde_json::to_value(&request.features).ok();
        match state
            .store
            .insert_alert(NewAlert {
                source_ip: request.source_ip.clone(),
                dest_ip: request.dest_ip.clone(),
                attack_type: prediction.attack_type,
                severity: prediction.severity,
                confidence_score: prediction.confidence,
                packet_data,
            })
            .await
        {
            Ok(alert) => {
                alert_stored = true;
                info!(
                    "Stored {} alert {} from {}",
                    alert.attack_type, alert.id, alert.source_ip
                );
            }
            Err(e) => error!("Failed to store alert: {}", e),
        }

        // Auto-block policy: Critical verdicts block the source immediately
        if prediction.severity == Severity::Critical {
            match state
                .store
                .block_ip(
                    &request.source_ip,
                    &format!("Detected {} attack pattern", prediction.attack_type),
                )
                .await
            {
                Ok(BlockOutcome::Created(_)) => info!("Auto-blocked {}", request.source_ip),
                Ok(BlockOutcome::AlreadyActive) => {}
                Err(e) => error!("Failed to auto-block {}: {}", request.source_ip, e),
            }
        }
    }

    let normal = u64::from(!prediction.is_malicious);
    if let Err(e) = state
        .store
        .record_traffic(1, normal, 1 - normal, AVG_PACKET_BYTES)
        .await
    {
        error!("Failed to update traffic stats: {}", e);
    }

    HttpResponse::Ok().json(ClassifyResponse {
        prediction,
        alert_stored,
    })
}

/// Demo/seed endpoint
async fn demo(state: web::Data<ApiState>, query: web::Query<DemoQuery>) -> impl Responder {
    if query.action != "generate_demo_traffic" {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: format!("unknown action: {}", query.action),
        });
    }

    match generate_demo_traffic(&state.store).await {
        Ok(summary) => HttpResponse::Ok().json(DemoResponse {
            success: true,
            summary,
        }),
        Err(e) => store_unavailable(e),
    }
}

/// Aggregated summary over the recent alert window
async fn alerts_summary(state: web::Data<ApiState>) -> impl Responder {
    let alerts = match state
        .store
        .recent_alerts(state.config.aggregator.alert_window)
        .await
    {
        Ok(alerts) => alerts,
        Err(e) => return store_unavailable(e),
    };

    let top_sources = rank_by_source_ip(&alerts, state.config.aggregator.top_source_ips);
    let top_attack_types = rank_by_attack_type(&alerts, state.config.aggregator.top_attack_types);
    let recent = alerts
        .iter()
        .take(SUMMARY_RECENT_LIMIT)
        .map(|alert| AlertAssessment {
            threat_score: threat_score(alert),
            recommended_action: recommended_action(alert),
            alert: alert.clone(),
        })
        .collect();

    HttpResponse::Ok().json(SummaryResponse {
        total_alerts: alerts.len(),
        top_sources,
        top_attack_types,
        recent,
    })
}

/// Latest traffic snapshot plus recent history
async fn traffic_stats(state: web::Data<ApiState>) -> impl Responder {
    match state
        .store
        .stats_history(state.config.aggregator.stats_window)
        .await
    {
        Ok(history) => HttpResponse::Ok().json(StatsResponse {
            latest: history.first().cloned(),
            history,
        }),
        Err(e) => store_unavailable(e),
    }
}

/// Active blocklist
async fn list_blocked(state: web::Data<ApiState>) -> impl Responder {
    match state.store.active_blocks().await {
        Ok(blocks) => HttpResponse::Ok().json(blocks),
        Err(e) => store_unavailable(e),
    }
}

/// Manually block an IP
async fn block_ip(state: web::Data<ApiState>, request: web::Json<BlockRequest>) -> impl Responder {
    let reason = request.reason.as_deref().unwrap_or("Manual block");
    match state.store.block_ip(&request.ip_address, reason).await {
        Ok(outcome) => HttpResponse::Ok().json(BlockResponse {
            success: true,
            duplicate: outcome == BlockOutcome::AlreadyActive,
        }),
        Err(e) => store_unavailable(e),
    }
}

/// Deactivate a block
async fn unblock_ip(state: web::Data<ApiState>, path: web::Path<Uuid>) -> impl Responder {
    let id = path.into_inner();
    match state.store.unblock_ip(id).await {
        Ok(true) => HttpResponse::Ok().json(BlockResponse {
            success: true,
            duplicate: false,
        }),
        Ok(false) => HttpResponse::NotFound().json(ErrorResponse {
            error: format!("no block record with id {}", id),
        }),
        Err(e) => store_unavailable(e),
    }
}

/// Prometheus metrics snapshot
async fn metrics_snapshot(state: web::Data<ApiState>) -> impl Responder {
    match &state.metrics {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::ServiceUnavailable().json(ErrorResponse {
            error: "metrics recorder not installed".to_string(),
        }),
    }
}

fn store_unavailable(e: crate::core::store::StoreError) -> HttpResponse {
    error!("Store unavailable: {}", e);
    HttpResponse::ServiceUnavailable().json(ErrorResponse {
        error: format!("store unavailable: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App};
    use redis::Client;

    use crate::core::classifier::{AttackType, ClassifierConfig, NoPerturbation};

    fn test_state() -> web::Data<ApiState> {
        let client = Client::open("redis://127.0.0.1:6379").unwrap();
        web::Data::new(ApiState {
            classifier: Classifier::with_perturbation(
                ClassifierConfig::default(),
                Box::new(NoPerturbation),
            ),
            store: Store::new(client),
            config: Arc::new(Config::default()),
            metrics: None,
        })
    }

    fn benign_features() -> FeatureVector {
        FeatureVector {
            protocol_type: "tcp".to_string(),
            service: "http".to_string(),
            flag: "SF".to_string(),
            ..Default::default()
        }
    }

    #[actix_web::test]
    async fn test_health_check() {
        let app = test::init_service(App::new().app_data(test_state()).configure(config)).await;

        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_classify_rejects_invalid_rates() {
        let app = test::init_service(App::new().app_data(test_state()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/classify")
            .set_json(ClassifyRequest {
                features: FeatureVector {
                    serror_rate: 2.0,
                    ..benign_features()
                },
                source_ip: "192.168.1.100".to_string(),
                dest_ip: "10.0.0.1".to_string(),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert!(body.error.contains("serror_rate"));
    }

    #[actix_web::test]
    async fn test_classify_returns_verdict_even_without_store() {
        let app = test::init_service(App::new().app_data(test_state()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/classify")
            .set_json(ClassifyRequest {
                features: FeatureVector {
                    num_failed_logins: 5,
                    is_guest_login: 1,
                    ..benign_features()
                },
                source_ip: "192.168.1.100".to_string(),
                dest_ip: "10.0.0.1".to_string(),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        let body: ClassifyResponse = test::read_body_json(resp).await;
        assert!(body.prediction.is_malicious);
        assert_eq!(body.prediction.attack_type, AttackType::R2L);
        assert_eq!(body.prediction.severity, Severity::Critical);
        assert!(body.prediction.confidence >= 0.5);
    }

    #[actix_web::test]
    async fn test_classify_benign_vector() {
        let app = test::init_service(App::new().app_data(test_state()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/classify")
            .set_json(ClassifyRequest {
                features: benign_features(),
                source_ip: "192.168.1.100".to_string(),
                dest_ip: "10.0.0.1".to_string(),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        let body: ClassifyResponse = test::read_body_json(resp).await;
        assert!(!body.prediction.is_malicious);
        assert_eq!(body.prediction.severity, Severity::Low);
        assert!(!body.alert_stored);
    }

    #[actix_web::test]
    async fn test_demo_rejects_unknown_action() {
        let app = test::init_service(App::new().app_data(test_state()).configure(config)).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/demo?action=drop_everything")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
