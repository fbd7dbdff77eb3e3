use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use super::{router, AppState};
use crate::mail::FulfillmentRecord;
use crate::testing::{MockGateway, MockMailer};
use crate::Config;

const COURSE_LINK: &str = "https://academy.example.com/course-1";

struct TestApp {
    router: Router,
    gateway: Arc<MockGateway>,
    mailer: Arc<MockMailer>,
}

fn base_config() -> Config {
    Config {
        course_link: COURSE_LINK.to_string(),
        thank_you_url: "https://academy.example.com/thanks".to_string(),
        failure_url: "https://academy.example.com/failed".to_string(),
        ..Config::default()
    }
}

fn app_with(config: Config, gateway: MockGateway, mailer: MockMailer) -> TestApp {
    let gateway = Arc::new(gateway);
    let mailer = Arc::new(mailer);
    let (state, _worker) = AppState::with_worker(
        config,
        gateway.clone(),
        mailer.clone(),
        reqwest::Client::new(),
    );
    TestApp {
        router: router(state),
        gateway,
        mailer,
    }
}

fn app() -> TestApp {
    app_with(base_config(), MockGateway::default(), MockMailer::default())
}

async fn get(router: &Router, uri: &str) -> Response {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post(router: &Router, uri: &str, body: &str, headers: &[(&str, &str)]) -> Response {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    router
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Wait until the background worker has attempted `n` sends.
async fn wait_for_attempts(mailer: &MockMailer, n: usize) {
    for _ in 0..300 {
        if mailer.attempts() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// Webhook
// =============================================================================

#[tokio::test]
async fn test_webhook_paid_event_sends_email_and_is_inspectable() {
    let app = app();
    let body = r#"{"type":"checkout.paid","data":{"customer":{"email":"a@b.com"}}}"#;

    let response = post(&app.router, "/webhook", body, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let ack = json_body(response).await;
    assert_eq!(ack["received"], true);
    assert!(ack["timestamp"].is_string());

    wait_for_attempts(&app.mailer, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        app.mailer.sent(),
        vec![FulfillmentRecord::new("a@b.com", COURSE_LINK)]
    );

    let response = get(&app.router, "/last-webhook").await;
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = json_body(response).await;
    assert_eq!(snapshot["raw"], body);
    assert_eq!(snapshot["parsed"]["type"], "checkout.paid");
    assert_eq!(snapshot["signature_present"], false);
}

#[tokio::test]
async fn test_webhook_acknowledges_unparseable_body() {
    let app = app();

    let response = post(&app.router, "/webhook", "not json", &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["received"], true);

    let snapshot = json_body(get(&app.router, "/last-webhook").await).await;
    assert_eq!(snapshot["raw"], "not json");
    assert!(snapshot["parsed"].is_null());
}

#[tokio::test]
async fn test_webhook_acknowledges_under_strict_policy() {
    let config = Config {
        gateway_secret_key: Some("test_sk".to_string()),
        signature_policy: crate::config::SignaturePolicy::Strict,
        ..base_config()
    };
    let app = app_with(config, MockGateway::default(), MockMailer::default());
    let body = r#"{"type":"checkout.paid","data":{"customer":{"email":"a@b.com"}}}"#;

    let response = post(&app.router, "/webhook", body, &[("x-signature", "bogus")]).await;
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(app.mailer.attempts(), 0);

    let snapshot = json_body(get(&app.router, "/last-webhook").await).await;
    assert_eq!(snapshot["signature_present"], true);
}

#[tokio::test]
async fn test_last_webhook_404_before_any() {
    let app = app();

    let response = get(&app.router, "/last-webhook").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(json_body(response).await["message"].is_string());
}

#[tokio::test]
async fn test_recent_webhooks_newest_first() {
    let app = app();
    post(&app.router, "/webhook", r#"{"n":1}"#, &[]).await;
    post(&app.router, "/webhook", r#"{"n":2}"#, &[]).await;

    let recent = json_body(get(&app.router, "/webhooks/recent").await).await;

    let raws: Vec<&str> = recent
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["raw"].as_str().unwrap())
        .collect();
    assert_eq!(raws, vec![r#"{"n":2}"#, r#"{"n":1}"#]);
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_checkout_unconfigured_is_500() {
    let app = app();

    let response = get(&app.router, "/checkout").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["message"],
        "payment gateway is not configured"
    );
}

#[tokio::test]
async fn test_checkout_static_link_redirects_exactly() {
    let link = "https://pay.chargily.com/payment-links/01hj5n8abc";
    let config = Config {
        static_payment_link: Some(link.to_string()),
        ..base_config()
    };
    let app = app_with(config, MockGateway::default(), MockMailer::default());

    let response = get(&app.router, "/checkout").await;

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), link);
    assert!(app.gateway.checkout_requests().is_empty());
}

#[tokio::test]
async fn test_checkout_invalid_static_link_is_500() {
    let config = Config {
        static_payment_link: Some("not a url".to_string()),
        ..base_config()
    };
    let app = app_with(config, MockGateway::default(), MockMailer::default());

    let response = get(&app.router, "/checkout").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_checkout_static_link_with_control_character_is_500() {
    let config = Config {
        static_payment_link: Some("https://pay.chargily.com/link\nabc".to_string()),
        ..base_config()
    };
    let app = app_with(config, MockGateway::default(), MockMailer::default());

    let response = get(&app.router, "/checkout").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["message"],
        "configured payment link is not a valid URL"
    );
}

#[tokio::test]
async fn test_checkout_dynamic_redirects_to_created_session() {
    let config = Config {
        gateway_secret_key: Some("test_sk".to_string()),
        ..base_config()
    };
    let gateway = MockGateway::default().creating("https://pay.chargily.net/checkout/chk_test");
    let app = app_with(config, gateway, MockMailer::default());

    let response = get(&app.router, "/checkout?email=buyer@example.com").await;

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "https://pay.chargily.net/checkout/chk_test");

    let requests = app.gateway.checkout_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount, 4900);
    assert_eq!(requests[0].metadata["email"], "buyer@example.com");
    assert_eq!(requests[0].success_url, "https://academy.example.com/thanks");
}

#[tokio::test]
async fn test_checkout_gateway_failure_is_500_with_detail() {
    let config = Config {
        gateway_secret_key: Some("test_sk".to_string()),
        ..base_config()
    };
    let app = app_with(config, MockGateway::default(), MockMailer::default());

    let response = get(&app.router, "/checkout").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["message"], "failed to generate payment link");
    assert!(body["detail"].as_str().unwrap().contains("422"));
}

#[tokio::test]
async fn test_checkout_unusable_session_url_is_500() {
    let config = Config {
        gateway_secret_key: Some("test_sk".to_string()),
        ..base_config()
    };
    for created in ["https://pay.chargily.net/checkout/x\ny", "/checkout/chk_test"] {
        let gateway = MockGateway::default().creating(created);
        let app = app_with(config.clone(), gateway, MockMailer::default());

        let response = get(&app.router, "/checkout").await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{created:?}");
        assert_eq!(
            json_body(response).await["message"],
            "failed to generate payment link"
        );
    }
}

#[tokio::test]
async fn test_create_payment_requires_email() {
    let config = Config {
        gateway_secret_key: Some("test_sk".to_string()),
        ..base_config()
    };
    let app = app_with(config, MockGateway::default().creating("https://x"), MockMailer::default());

    let response = post(&app.router, "/create-payment", r#"{"amount":1000}"#, &[]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.gateway.checkout_requests().is_empty());
}

#[tokio::test]
async fn test_create_payment_returns_url() {
    let config = Config {
        gateway_secret_key: Some("test_sk".to_string()),
        ..base_config()
    };
    let gateway = MockGateway::default().creating("https://pay.chargily.net/checkout/chk_test");
    let app = app_with(config, gateway, MockMailer::default());

    let response = post(
        &app.router,
        "/create-payment",
        r#"{"email":"buyer@example.com","amount":2500}"#,
        &[],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["payment_url"],
        "https://pay.chargily.net/checkout/chk_test"
    );
    assert_eq!(app.gateway.checkout_requests()[0].amount, 2500);
}

// =============================================================================
// Return, Redirects, Test Email
// =============================================================================

#[tokio::test]
async fn test_payment_return_fulfills_and_redirects() {
    let app = app();

    let response = get(
        &app.router,
        "/payment-return?id=chk_1&payment_status=paid&customer_email=r%40b.com",
    )
    .await;

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "https://academy.example.com/thanks");
    assert_eq!(
        app.mailer.sent(),
        vec![FulfillmentRecord::new("r@b.com", COURSE_LINK)]
    );
}

#[tokio::test]
async fn test_payment_return_redirects_even_when_unpaid() {
    let app = app();

    let response = get(&app.router, "/payment-return?payment_id=chk_1&status=failed").await;

    assert_eq!(location(&response), "https://academy.example.com/thanks");
    assert_eq!(app.mailer.attempts(), 0);
}

#[tokio::test]
async fn test_static_redirects() {
    let app = app();

    for (uri, target) in [
        ("/simulate-success", "https://academy.example.com/thanks"),
        ("/thank-you", "https://academy.example.com/thanks"),
        ("/simulate-failed", "https://academy.example.com/failed"),
        ("/failed", "https://academy.example.com/failed"),
    ] {
        let response = get(&app.router, uri).await;
        assert!(response.status().is_redirection(), "{uri}");
        assert_eq!(location(&response), target, "{uri}");
    }
}

#[tokio::test]
async fn test_test_email_requires_recipient() {
    let app = app();

    let response = get(&app.router, "/test-email").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_test_email_uses_configured_default() {
    let config = Config {
        test_email_to: Some("ops@example.com".to_string()),
        ..base_config()
    };
    let app = app_with(config, MockGateway::default(), MockMailer::default());

    let response = get(&app.router, "/test-email").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["sent"], true);
    assert_eq!(body["to"], "ops@example.com");
    assert_eq!(
        app.mailer.sent(),
        vec![FulfillmentRecord::new("ops@example.com", COURSE_LINK)]
    );
}

#[tokio::test]
async fn test_test_email_rejects_malformed_recipient() {
    let config = Config {
        test_email_to: Some("ops@example.com".to_string()),
        ..base_config()
    };
    let app = app_with(config, MockGateway::default(), MockMailer::default());

    let response = get(&app.router, "/test-email?to=not-an-email").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.mailer.attempts(), 0);
}

#[tokio::test]
async fn test_test_email_provider_failure_is_502() {
    let app = app_with(base_config(), MockGateway::default(), MockMailer::failing());

    let response = get(&app.router, "/test-email?to=me@example.com").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(app.mailer.attempts(), 1);
}

#[tokio::test]
async fn test_health() {
    let app = app();

    let response = get(&app.router, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}
