//! AdmissionReview requests through the webhook and health routers.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use generic_validator::config::RuleStore;
use generic_validator::health::{self, HealthState};
use generic_validator::webhooks::{
    AdmissionPolicy, VALIDATE_PATH, WebhookState, create_webhook_router,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::common::fixtures::{AdmissionReviewBuilder, ConfigDocumentBuilder, rule, widget};

fn store() -> Arc<RuleStore> {
    let store = Arc::new(RuleStore::new());
    store
        .load(
            &ConfigDocumentBuilder::new()
                .kind(
                    "Widget",
                    vec![
                        rule("spec.tier", "string", "In", json!(["gold", "platinum"])),
                        rule("spec.replicas", "int", "GreaterThan", json!(5)),
                    ],
                )
                .admin_group("ops")
                .build(),
        )
        .unwrap();
    store
}

fn webhook_router(health_state: Option<Arc<HealthState>>) -> Router {
    create_webhook_router(Arc::new(WebhookState::new(
        AdmissionPolicy::new(store()),
        health_state,
    )))
}

async fn post_review(router: Router, review: Value) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(VALIDATE_PATH)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&review).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get_text(router: Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_allowed_request() {
    let review = AdmissionReviewBuilder::new("Widget")
        .uid("allowed-uid")
        .object(widget(json!({"tier": "gold", "replicas": 10})))
        .build();

    let (status, body) = post_review(webhook_router(None), review).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "AdmissionReview");
    assert_eq!(body["response"]["uid"], "allowed-uid");
    assert_eq!(body["response"]["allowed"], true);
}

#[tokio::test]
async fn test_oversized_decision_timeout_still_decides() {
    let router = create_webhook_router(Arc::new(
        WebhookState::new(AdmissionPolicy::new(store()), None)
            .with_decision_timeout(Duration::from_secs(u64::MAX)),
    ));
    let review = AdmissionReviewBuilder::new("Widget")
        .object(widget(json!({"tier": "gold", "replicas": 10})))
        .build();

    let (status, body) = post_review(router, review).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["allowed"], true);
}

#[tokio::test]
async fn test_denied_request_names_rule() {
    let review = AdmissionReviewBuilder::new("Widget")
        .object(widget(json!({"tier": "gold", "replicas": 3})))
        .build();

    let (status, body) = post_review(webhook_router(None), review).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["allowed"], false);
    let message = body["response"]["status"]["message"].as_str().unwrap();
    assert!(message.starts_with("[RuleViolated]"), "{message}");
    assert!(message.contains("spec.replicas"), "{message}");
}

#[tokio::test]
async fn test_missing_field_denied() {
    let review = AdmissionReviewBuilder::new("Widget")
        .object(widget(json!({"replicas": 10})))
        .build();

    let (_, body) = post_review(webhook_router(None), review).await;
    assert_eq!(body["response"]["allowed"], false);
    let message = body["response"]["status"]["message"].as_str().unwrap();
    assert!(message.starts_with("[RuleEvaluationFailed]"), "{message}");
    assert!(message.contains("FieldNotFound"), "{message}");
}

#[tokio::test]
async fn test_admin_group_bypasses_rules() {
    let review = AdmissionReviewBuilder::new("Widget")
        .groups(&["ops", "system:authenticated"])
        .object(widget(json!({})))
        .build();

    let (_, body) = post_review(webhook_router(None), review).await;
    assert_eq!(body["response"]["allowed"], true);
}

#[tokio::test]
async fn test_kind_without_rules_allowed() {
    let review = AdmissionReviewBuilder::new("Gadget")
        .object(json!({
            "apiVersion": "example.com/v1",
            "kind": "Gadget",
            "metadata": {"name": "g1"},
        }))
        .build();

    let (_, body) = post_review(webhook_router(None), review).await;
    assert_eq!(body["response"]["allowed"], true);
}

#[tokio::test]
async fn test_request_without_object_denied_as_invalid() {
    let review = AdmissionReviewBuilder::new("Widget").build();

    let (status, body) = post_review(webhook_router(None), review).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["allowed"], false);
    let message = body["response"]["status"]["message"].as_str().unwrap();
    assert!(message.starts_with("[InvalidRequest]"), "{message}");
}

#[tokio::test]
async fn test_review_without_request_is_bad_request() {
    let review = json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
    });

    let (status, body) = post_review(webhook_router(None), review).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["response"]["allowed"], false);
}

#[tokio::test]
async fn test_decisions_recorded_in_metrics() {
    let health_state = Arc::new(HealthState::new());
    let router = webhook_router(Some(health_state.clone()));

    let denied = AdmissionReviewBuilder::new("Widget")
        .object(widget(json!({"tier": "bronze", "replicas": 10})))
        .build();
    post_review(router.clone(), denied).await;
    let allowed = AdmissionReviewBuilder::new("Widget")
        .object(widget(json!({"tier": "gold", "replicas": 10})))
        .build();
    post_review(router, allowed).await;

    let (status, metrics) = get_text(health::create_router(health_state), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(metrics.contains("genericvalidator_admission_decisions_total"));
    assert!(metrics.contains("reason=\"RuleViolated\""), "{metrics}");
    assert!(metrics.contains("reason=\"AllRulesSatisfied\""), "{metrics}");
    assert!(metrics.contains("genericvalidator_admission_decision_duration_seconds"));
}

#[tokio::test]
async fn test_readiness_follows_initial_load() {
    let health_state = Arc::new(HealthState::new());

    let (status, _) = get_text(health::create_router(health_state.clone()), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    health_state.set_ready(true).await;
    let (status, body) = get_text(health::create_router(health_state.clone()), "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ready");

    let (status, _) = get_text(health::create_router(health_state), "/healthz").await;
    assert_eq!(status, StatusCode::OK);
}
