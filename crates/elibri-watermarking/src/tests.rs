//! Tests for the watermarking client.

use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::WatermarkingClient;
use crate::error::WatermarkError;
use crate::signer::Credentials;
use crate::transport::HttpTransport;
use crate::types::{Endpoints, WatermarkRequest, WatermarkingConfig};

fn test_config(endpoints: Endpoints) -> WatermarkingConfig {
    WatermarkingConfig {
        token: "test-token".to_string(),
        secret: "test-secret".to_string(),
        endpoints,
        ..WatermarkingConfig::default()
    }
}

fn client_for(server: &MockServer) -> WatermarkingClient {
    WatermarkingClient::new(test_config(Endpoints::single(server.uri()))).unwrap()
}

fn form_pairs(body: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

fn value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[tokio::test]
async fn test_watermark_then_deliver() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/watermarking/watermark"))
        .and(body_string_contains("isbn=9780000000000"))
        .and(body_string_contains("title_postfix=Title+Suffix"))
        .respond_with(ResponseTemplate::new(200).set_body_string("abc123"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/watermarking/deliver"))
        .and(body_string_contains("trans_id=abc123"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request =
        WatermarkRequest::new("9780000000000", "epub,mobi", "footer").title_postfix("Title Suffix");

    let trans_id = client.watermark(&request).await.unwrap();
    assert_eq!(trans_id, "abc123");

    let ack = client.deliver(&trans_id).await.unwrap();
    assert_eq!(ack, "");
}

#[tokio::test]
async fn test_watermark_body_is_signed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/watermarking/watermark"))
        .respond_with(ResponseTemplate::new(200).set_body_string("tx1\n"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = WatermarkRequest::new("book-rr-17", "mobi,epub", "Książka dla Wojtka")
        .customer_ip("178.42.78.98")
        .client_symbol("promo");
    let trans_id = client.watermark(&request).await.unwrap();
    assert_eq!(trans_id, "tx1");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let pairs = form_pairs(&requests[0].body);

    let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        keys,
        [
            "record_reference",
            "formats",
            "visible_watermark",
            "customer_ip",
            "client_symbol",
            "stamp",
            "sig",
            "token",
        ]
    );
    assert_eq!(value(&pairs, "visible_watermark"), Some("Książka dla Wojtka"));
    assert_eq!(value(&pairs, "token"), Some("test-token"));

    let stamp: i64 = value(&pairs, "stamp").unwrap().parse().unwrap();
    let expected = Credentials::new("test-token", "test-secret").sign(stamp);
    assert_eq!(value(&pairs, "sig"), Some(expected.as_str()));
}

#[tokio::test]
async fn test_invalid_format_never_reaches_server() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("abc123"))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = WatermarkRequest::new("9780000000000", "epub, doc", "footer");
    let err = client.watermark(&request).await.unwrap_err();

    assert!(matches!(err, WatermarkError::InvalidFormat(f) if f == "epub, doc"));
}

#[tokio::test]
async fn test_retry_returns_new_transaction_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/watermarking/retry"))
        .and(body_string_contains("trans_id=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("def456"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/watermarking/deliver"))
        .and(body_string_contains("trans_id=def456"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let new_id = client.retry("abc123").await.unwrap();
    assert_eq!(new_id, "def456");
    assert_eq!(client.deliver(&new_id).await.unwrap(), "OK");
}

#[tokio::test]
async fn test_check_suppliers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/watermarking/check_suppliers"))
        .and(query_param("isbn", "9788324631766"))
        .and(query_param("token", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("12, 7,,31"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let suppliers = client.check_suppliers("9788324631766").await.unwrap();
    assert_eq!(suppliers, ["12", "7", "31"]);
}

#[tokio::test]
async fn test_get_supplier() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/watermarking/get_supplier"))
        .and(query_param("id", "12"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Wydawnictwo Example\n"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.get_supplier("12").await.unwrap(), "Wydawnictwo Example");
}

#[tokio::test]
async fn test_get_query_is_signed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/watermarking/get_supplier"))
        .respond_with(ResponseTemplate::new(200).set_body_string("name"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.get_supplier("3").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let pairs: Vec<(String, String)> = requests[0].url.query_pairs().into_owned().collect();
    let stamp: i64 = value(&pairs, "stamp").unwrap().parse().unwrap();
    let expected = Credentials::new("test-token", "test-secret").sign(stamp);
    assert_eq!(value(&pairs, "sig"), Some(expected.as_str()));
    assert!(requests[0].body.is_empty());
}

#[tokio::test]
async fn test_catalog_listings() {
    let server = MockServer::start().await;

    let listing = serde_json::json!([
        {"record_reference": "rr-1", "isbn": "9780000000000", "formats": ["epub", "mobi"]}
    ]);
    for name in [
        "available_files.json",
        "soon_available_files.json",
        "soon_unavailable_files.json",
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/watermarking/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing.clone()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = client_for(&server);
    assert_eq!(client.available_files().await.unwrap(), listing);
    assert_eq!(client.soon_available_files().await.unwrap(), listing);
    assert_eq!(client.soon_unavailable_files().await.unwrap(), listing);
}

#[tokio::test]
async fn test_catalog_malformed_json() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/watermarking/available_files.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not valid json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.available_files().await.unwrap_err();
    assert!(matches!(err, WatermarkError::Serialization(_)));
}

#[tokio::test]
async fn test_status_mapping() {
    let cases: [(u16, fn(&WatermarkError) -> bool); 5] = [
        (400, |e: &WatermarkError| matches!(e, WatermarkError::InvalidParameters(m) if m == "body")),
        (401, |e: &WatermarkError| matches!(e, WatermarkError::Unauthorized)),
        (403, |e: &WatermarkError| matches!(e, WatermarkError::Forbidden(m) if m == "body")),
        (404, |e: &WatermarkError| matches!(e, WatermarkError::NotFound)),
        (408, |e: &WatermarkError| matches!(e, WatermarkError::RequestExpired)),
    ];

    for (status, check) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/watermarking/deliver"))
            .respond_with(ResponseTemplate::new(status).set_body_string("body"))
            .mount(&server)
            .await;

        let err = client_for(&server).deliver("abc123").await.unwrap_err();
        assert!(check(&err), "status {status} produced {err:?}");
    }
}

#[tokio::test]
async fn test_precondition_failed_is_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/watermarking/deliver"))
        .respond_with(ResponseTemplate::new(412).set_body_string("already delivered"))
        .mount(&server)
        .await;

    let body = client_for(&server).deliver("abc123").await.unwrap();
    assert_eq!(body, "already delivered");
}

#[tokio::test]
async fn test_failover_across_servers() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    let third = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&first)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("abc123"))
        .expect(1)
        .mount(&second)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("never"))
        .expect(0)
        .mount(&third)
        .await;

    let endpoints = Endpoints::hosts([first.uri(), second.uri(), third.uri()]);
    let client = WatermarkingClient::new(test_config(endpoints)).unwrap();
    let request = WatermarkRequest::new("9780000000000", "epub", "footer");
    assert_eq!(client.watermark(&request).await.unwrap(), "abc123");

    // Every attempt carries the same signed envelope.
    let a = first.received_requests().await.unwrap();
    let b = second.received_requests().await.unwrap();
    assert_eq!(a[0].body, b[0].body);
}

#[tokio::test]
async fn test_forbidden_stops_failover() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("shop blocked"))
        .expect(1)
        .mount(&first)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&second)
        .await;

    let endpoints = Endpoints::hosts([first.uri(), second.uri()]);
    let client = WatermarkingClient::new(test_config(endpoints)).unwrap();
    let err = client.deliver("abc123").await.unwrap_err();
    assert!(matches!(err, WatermarkError::Forbidden(m) if m == "shop blocked"));
}

#[tokio::test]
async fn test_no_server_responding() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;

    for server in [&first, &second] {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(server)
            .await;
    }

    let endpoints = Endpoints::hosts([first.uri(), second.uri()]);
    let client = WatermarkingClient::new(test_config(endpoints)).unwrap();
    let err = client.deliver("abc123").await.unwrap_err();
    assert!(matches!(err, WatermarkError::NoServerResponding { attempts: 2 }));
}

#[tokio::test]
async fn test_connection_refused_fails_over() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/watermarking/deliver"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    // Connect to a port that's definitely not listening
    let endpoints = Endpoints::hosts(["http://127.0.0.1:1".to_string(), server.uri()]);
    let client = WatermarkingClient::new(test_config(endpoints)).unwrap();
    assert_eq!(client.deliver("abc123").await.unwrap(), "");
}

#[tokio::test]
async fn test_connection_refused_single_host() {
    let client =
        WatermarkingClient::new(test_config(Endpoints::single("http://127.0.0.1:1"))).unwrap();
    let err = client.deliver("abc123").await.unwrap_err();
    assert!(matches!(err, WatermarkError::NoServerResponding { attempts: 1 }));
}

#[tokio::test]
async fn test_cancelled_client_sends_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let token = tokio_util::sync::CancellationToken::new();
    let client = client_for(&server).with_cancellation(token.clone());
    token.cancel();

    let err = client.deliver("abc123").await.unwrap_err();
    assert!(matches!(err, WatermarkError::Cancelled));
}

#[tokio::test]
async fn test_deadline_from_config() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = WatermarkingConfig {
        deadline: Some(std::time::Duration::from_millis(100)),
        ..test_config(Endpoints::single(server.uri()))
    };
    let client = WatermarkingClient::new(config).unwrap();
    let err = client.deliver("abc123").await.unwrap_err();
    assert!(matches!(err, WatermarkError::Timeout));
}

#[tokio::test]
async fn test_attempt_timeout_fails_over() {
    let slow = MockServer::start().await;
    let fast = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&slow)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fast"))
        .mount(&fast)
        .await;

    let config = WatermarkingConfig {
        attempt_timeout: std::time::Duration::from_millis(100),
        ..test_config(Endpoints::hosts([slow.uri(), fast.uri()]))
    };
    let client = WatermarkingClient::new(config).unwrap();
    assert_eq!(client.deliver("abc123").await.unwrap(), "fast");
}

#[tokio::test]
async fn test_user_agent_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;

    client_for(&server).available_files().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let agent = requests[0]
        .headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(agent.starts_with("elibri-watermarking/"));
}

#[tokio::test]
async fn test_client_over_custom_reqwest_client() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/watermarking/deliver"))
        .and(body_string_contains("trans_id=abc123"))
        .and(body_string_contains("token=shop-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let http = reqwest::Client::builder()
        .user_agent("shop-backend/2.1")
        .build()
        .unwrap();
    let client = WatermarkingClient::with_parts(
        Credentials::new("shop-token", "shop-secret"),
        HttpTransport::from_client(http),
        Endpoints::single(server.uri()),
    );

    assert_eq!(client.deliver("abc123").await.unwrap(), "ok");

    let requests = server.received_requests().await.unwrap();
    let agent = requests[0]
        .headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok());
    assert_eq!(agent, Some("shop-backend/2.1"));
}
