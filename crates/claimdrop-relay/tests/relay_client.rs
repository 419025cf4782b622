use claimdrop_relay::{ClaimRequest, RelayClient};
use claimdrop_types::{ChainTarget, ClaimdropError};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "secret-token";
const WALLET: &str = "0x1111111111111111111111111111111111111111";
const CONTRACT: &str = "0x2222222222222222222222222222222222222222";

fn target() -> ChainTarget {
    ChainTarget::new(84532, CONTRACT, WALLET)
}

fn request() -> ClaimRequest {
    ClaimRequest {
        recipient: "0xde709f2102306220921060314715629080e2fb77".into(),
        amount: "3".into(),
    }
}

#[tokio::test]
async fn claim_to_posts_request_and_returns_queue_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/contract/84532/{CONTRACT}/erc20/claim-to")))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(header("x-backend-wallet-address", WALLET))
        .and(body_json(json!({
            "recipient": "0xde709f2102306220921060314715629080e2fb77",
            "amount": "3"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "queueId": "9f3c1a" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RelayClient::new(&format!("{}/", server.uri()), TOKEN, Some(5_000));
    let queue_id = client.claim_to(&target(), &request()).await.unwrap();
    assert_eq!(queue_id, "9f3c1a");
}

#[tokio::test]
async fn claim_to_surfaces_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("insufficient funds"))
        .mount(&server)
        .await;

    let client = RelayClient::new(&server.uri(), TOKEN, None);
    match client.claim_to(&target(), &request()).await {
        Err(ClaimdropError::RelayStatus { status, body }) => {
            assert_eq!(status, 400);
            assert_eq!(body, "insufficient funds");
        }
        other => panic!("expected RelayStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn claim_to_rejects_empty_queue_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "queueId": "" }
        })))
        .mount(&server)
        .await;

    let client = RelayClient::new(&server.uri(), TOKEN, None);
    let err = client.claim_to(&target(), &request()).await.unwrap_err();
    assert!(matches!(err, ClaimdropError::MalformedResponse(_)), "{err:?}");
}

#[tokio::test]
async fn transaction_status_parses_mined_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/status/9f3c1a"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "queueId": "9f3c1a",
                "status": "mined",
                "chainId": "84532",
                "transactionHash": "0xdead",
                "errorMessage": null,
                "fromAddress": WALLET
            }
        })))
        .mount(&server)
        .await;

    let client = RelayClient::new(&server.uri(), TOKEN, None);
    let raw = client.transaction_status("9f3c1a").await.unwrap();
    assert_eq!(raw.status.as_deref(), Some("mined"));
    assert_eq!(raw.chain_id, Some(84532));
    assert_eq!(raw.transaction_hash.as_deref(), Some("0xdead"));
    assert!(raw.error_message.is_none());
}

#[tokio::test]
async fn transaction_status_encodes_queue_id_as_one_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/status/a%2Fb%3Fx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "status": "queued" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RelayClient::new(&server.uri(), TOKEN, None);
    let raw = client.transaction_status("a/b?x").await.unwrap();
    assert_eq!(raw.status.as_deref(), Some("queued"));
}

#[tokio::test]
async fn endpoints_keep_base_path_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/transaction/status/9f3c1a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "status": "sent" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RelayClient::new(&format!("{}/v1/", server.uri()), TOKEN, None);
    let raw = client.transaction_status("9f3c1a").await.unwrap();
    assert_eq!(raw.status.as_deref(), Some("sent"));
}

#[tokio::test]
async fn invalid_base_url_is_a_relay_error() {
    let client = RelayClient::new("not a url", TOKEN, None);
    let err = client.transaction_status("9f3c1a").await.unwrap_err();
    assert!(matches!(err, ClaimdropError::Relay(_)), "{err:?}");
}

#[tokio::test]
async fn transaction_status_reports_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let client = RelayClient::new(&server.uri(), TOKEN, None);
    let err = client.transaction_status("9f3c1a").await.unwrap_err();
    assert!(matches!(err, ClaimdropError::MalformedResponse(_)), "{err:?}");
}

#[tokio::test]
async fn create_backend_wallet_sends_kind() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/backend-wallet/create"))
        .and(body_json(json!({ "type": "smart:local" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "walletAddress": WALLET,
                "status": "success",
                "type": "smart:local"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RelayClient::new(&server.uri(), TOKEN, None);
    let wallet = client.create_backend_wallet("smart:local").await.unwrap();
    assert_eq!(wallet.wallet_address, WALLET);
    assert_eq!(wallet.kind.as_deref(), Some("smart:local"));
}
