//! Integration tests for the submission pipeline over real HTTP
//!
//! This test validates:
//! - The JSON-RPC frames the client puts on the wire
//! - Acceptance followed by a successful confirmation poll
//! - Immediate rejection carrying the remote error payload back

use microgig::amount::Stroops;
use microgig::error::MarketplaceError;
use microgig::rpc::{RetryPolicy, SorobanRpcClient};
use microgig::task::ReceiptStatus;
use microgig::telemetry::OperationContext;
use microgig::tx::{submit_and_confirm, EnvelopeBuilder, OperationSpec, SubmissionConfig};
use microgig::wallet::{LocalSigner, Signer};
use mockito::Matcher;
use std::time::Duration;
use stellar_xdr::curr::TransactionEnvelope;

const TESTNET: &str = "Test SDF Network ; September 2015";

fn fast_config() -> SubmissionConfig {
    SubmissionConfig {
        poll_interval: Duration::from_millis(1),
        max_poll_attempts: 3,
    }
}

fn client(url: &str) -> SorobanRpcClient {
    SorobanRpcClient::new(url, Duration::from_secs(5))
        .unwrap()
        .with_retry(RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        })
}

fn payment_envelope(signer: &LocalSigner) -> TransactionEnvelope {
    EnvelopeBuilder::new(100, 30)
        .build(
            &signer.address(),
            7,
            OperationSpec::Payment {
                destination: "GA7QYNF7SOWQ3GLR2BGMZEHXAVIRZA4KVWLTJJFC7MGXUA74P7UJVSGZ"
                    .to_string(),
                amount: Stroops::from_whole_lumens(2),
            },
        )
        .unwrap()
}

#[tokio::test]
async fn accepted_submission_confirms_over_http() {
    let mut server = mockito::Server::new_async().await;

    let send_mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "jsonrpc": "2.0",
            "method": "sendTransaction",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"jsonrpc":"2.0","id":1,"result":{"status":"PENDING","hash":"f00dfeed","latestLedger":5}}"#,
        )
        .create_async()
        .await;

    let poll_mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "method": "getTransaction",
            "params": { "hash": "f00dfeed" },
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"jsonrpc":"2.0","id":1,"result":{"status":"SUCCESS","ledger":12345}}"#,
        )
        .create_async()
        .await;

    let signer = LocalSigner::random(TESTNET);
    let ctx = OperationContext::new("http_success");
    let receipt = submit_and_confirm(
        &client(&server.url()),
        &signer,
        payment_envelope(&signer),
        false,
        &fast_config(),
        &ctx,
    )
    .await
    .unwrap();

    assert_eq!(receipt.hash, "f00dfeed");
    assert_eq!(receipt.status, ReceiptStatus::Success);
    assert_eq!(receipt.ledger, Some(12345));
    send_mock.assert_async().await;
    poll_mock.assert_async().await;
}

#[tokio::test]
async fn rejected_submission_carries_remote_payload() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "method": "sendTransaction",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"jsonrpc":"2.0","id":1,"result":{"status":"ERROR","errorResultXdr":"AAAAErr","latestLedger":5}}"#,
        )
        .create_async()
        .await;

    let signer = LocalSigner::random(TESTNET);
    let ctx = OperationContext::new("http_rejection");
    let err = submit_and_confirm(
        &client(&server.url()),
        &signer,
        payment_envelope(&signer),
        false,
        &fast_config(),
        &ctx,
    )
    .await
    .unwrap_err();

    match err {
        MarketplaceError::SubmissionRejected { status, payload } => {
            assert_eq!(status, "Error");
            assert_eq!(payload, "AAAAErr");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn poll_timeout_after_budget_of_not_found() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "method": "sendTransaction",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"jsonrpc":"2.0","id":1,"result":{"status":"PENDING","hash":"feedface"}}"#,
        )
        .create_async()
        .await;

    let poll_mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "method": "getTransaction",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{"status":"NOT_FOUND"}}"#)
        .expect(3)
        .create_async()
        .await;

    let signer = LocalSigner::random(TESTNET);
    let ctx = OperationContext::new("http_timeout");
    let err = submit_and_confirm(
        &client(&server.url()),
        &signer,
        payment_envelope(&signer),
        false,
        &fast_config(),
        &ctx,
    )
    .await
    .unwrap_err();

    match err {
        MarketplaceError::PollTimeout { hash, attempts } => {
            assert_eq!(hash, "feedface");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    poll_mock.assert_async().await;
}
