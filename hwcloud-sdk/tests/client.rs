use std::time::Duration;

use hwcloud_sdk::services::dms::instances;
use hwcloud_sdk::{Credentials, ProviderClient, SdkError, ServiceClient};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn aksk() -> Credentials {
    Credentials::AkSk {
        access_key: "test-ak".to_string(),
        secret_key: "test-sk".to_string(),
        security_token: None,
    }
}

fn dms_client(server: &MockServer, credentials: Credentials, retries: u32) -> ServiceClient {
    let provider = ProviderClient::new(credentials, retries, false)
        .unwrap()
        .with_retry_delay(Duration::from_millis(1));
    ServiceClient::new(provider, &server.uri(), "v2/proj", "proj").unwrap()
}

#[tokio::test]
async fn test_aksk_requests_are_signed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/proj/instances/i-1"))
        .and(header_exists("x-sdk-date"))
        .and(header("x-project-id", "proj"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "instance_id": "i-1",
            "status": "RUNNING"
        })))
        .mount(&server)
        .await;

    let client = dms_client(&server, aksk(), 0);
    let inst = instances::get(&client, "i-1").await.unwrap();
    assert_eq!(inst.status, "RUNNING");

    let requests = server.received_requests().await.unwrap();
    let auth = requests[0]
        .headers
        .get("authorization")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(auth.starts_with(
        "SDK-HMAC-SHA256 Access=test-ak, SignedHeaders=content-type;host;x-project-id;x-sdk-date, Signature="
    ));
}

#[tokio::test]
async fn test_security_token_is_signed_and_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/proj/instances/i-1"))
        .and(header("x-security-token", "sts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "instance_id": "i-1"
        })))
        .mount(&server)
        .await;

    let creds = Credentials::AkSk {
        access_key: "test-ak".to_string(),
        secret_key: "test-sk".to_string(),
        security_token: Some("sts".to_string()),
    };
    let client = dms_client(&server, creds, 0);
    instances::get(&client, "i-1").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let auth = requests[0].headers.get("authorization").unwrap().to_str().unwrap();
    assert!(auth.contains("x-sdk-date;x-security-token"));
}

#[tokio::test]
async fn test_token_auth_header() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v2/proj/instances/i-1"))
        .and(header("x-auth-token", "tok"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = dms_client(&server, Credentials::Token("tok".to_string()), 0);
    instances::delete(&client, "i-1").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_not_found_maps_to_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/proj/instances/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"error_code\":\"DMS.404\"}"))
        .mount(&server)
        .await;

    let client = dms_client(&server, aksk(), 0);
    let err = instances::get(&client, "gone").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_unexpected_status_carries_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/proj/instances"))
        .respond_with(ResponseTemplate::new(400).set_body_string("{\"error_msg\":\"bad spec\"}"))
        .mount(&server)
        .await;

    let client = dms_client(&server, aksk(), 0);
    let err = instances::create(&client, &instances::CreateOpts::default())
        .await
        .unwrap_err();
    match err {
        SdkError::Unexpected {
            status,
            method,
            body,
            ..
        } => {
            assert_eq!(status, 400);
            assert_eq!(method, "POST");
            assert!(body.contains("bad spec"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_retries_on_service_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/proj/instances/i-1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/proj/instances/i-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "instance_id": "i-1",
            "status": "CREATING"
        })))
        .mount(&server)
        .await;

    let client = dms_client(&server, aksk(), 3);
    let inst = instances::get(&client, "i-1").await.unwrap();
    assert_eq!(inst.status, "CREATING");
}

#[tokio::test]
async fn test_retry_budget_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/proj/instances/i-1"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let client = dms_client(&server, aksk(), 1);
    let err = instances::get(&client, "i-1").await.unwrap_err();
    assert_eq!(err.status(), Some(429));
}
