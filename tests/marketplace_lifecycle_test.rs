//! Integration test for the full marketplace lifecycle
//!
//! This test validates:
//! - Posting, claiming, submitting work, and picking a winner end to end
//! - The scripted ledger seeing one submission per mutating operation
//! - The local cache mirroring every state change
//! - Forward-only status enforcement across the flow

use microgig::cache::TaskCache;
use microgig::marketplace::Marketplace;
use microgig::rpc::HorizonClient;
use microgig::task::{ReceiptStatus, TaskStatus};
use microgig::test_utils::MockLedger;
use microgig::tx::scval::{addr_val, str_val, symbol_val, u64_val};
use microgig::tx::{EnvelopeBuilder, SubmissionConfig};
use microgig::wallet::{LocalSigner, Signer};
use std::sync::Arc;
use std::time::Duration;
use stellar_xdr::curr::{ScMap, ScMapEntry, ScVal, ScVec, VecM};

const TESTNET: &str = "Test SDF Network ; September 2015";
const CONTRACT: &str = "CCIMNZ2TTDBRAONQE56XAQUGCNM7IBKNWKDTK42DYRMQUABJ45IOOSQV";
const WORKER: &str = "GAAZI4TCR3TY5OJHCTJC2A4QSY6CJWJH5IAJTGKIN2ER7LBNVKOCCWN7";

fn map_entry(key: &str, val: ScVal) -> ScMapEntry {
    ScMapEntry {
        key: symbol_val(key).unwrap(),
        val,
    }
}

/// The on-chain board as the registry would return it: one open gig.
fn board_with_open_gig(poster: &str) -> ScVal {
    let entries: VecM<ScMapEntry> = vec![
        map_entry("id", u64_val(1)),
        map_entry("title", str_val("Translate landing page").unwrap()),
        map_entry("description", str_val("EN -> PL, ~600 words").unwrap()),
        map_entry("reward", u64_val(55_000_000)),
        map_entry("poster", addr_val(poster).unwrap()),
        map_entry("worker", ScVal::Void),
        map_entry("status", ScVal::U32(0)),
        map_entry("submissions", ScVal::Vec(Some(ScVec(VecM::default())))),
        map_entry("payment_hash", ScVal::Void),
    ]
    .try_into()
    .unwrap();
    let gig = ScVal::Map(Some(ScMap(entries)));
    ScVal::Vec(Some(ScVec(vec![gig].try_into().unwrap())))
}

async fn build_marketplace(
    rpc: MockLedger,
) -> (
    Marketplace,
    Arc<MockLedger>,
    mockito::ServerGuard,
    tempfile::TempDir,
) {
    let signer = Arc::new(LocalSigner::random(TESTNET));
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", format!("/accounts/{}", signer.address()).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"sequence":"41","balances":[{"balance":"200.0000000","asset_type":"native"}]}"#,
        )
        .expect_at_least(1)
        .create_async()
        .await;

    let horizon = HorizonClient::new(server.url(), server.url(), Duration::from_secs(5)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let cache = TaskCache::open(dir.path().join("cache")).unwrap();
    let rpc = Arc::new(rpc);

    let marketplace = Marketplace::new(
        rpc.clone(),
        horizon,
        signer,
        cache,
        EnvelopeBuilder::new(100, 30),
        CONTRACT.to_string(),
        SubmissionConfig {
            poll_interval: Duration::from_millis(1),
            max_poll_attempts: 5,
        },
        TESTNET.to_string(),
        10_000,
    );
    (marketplace, rpc, server, dir)
}

#[tokio::test]
async fn full_gig_lifecycle_updates_ledger_and_cache() {
    // Every mutating call is accepted and confirms on the first poll.
    let rpc = MockLedger::new()
        .accept_with_hash("lifecycle-hash")
        .poll_success(7_001)
        .poll_success(7_002)
        .poll_success(7_003)
        .poll_success(7_004);
    let (marketplace, rpc, _server, _dir) = build_marketplace(rpc).await;

    // Seed the scripted board with one open gig and load it through the
    // read-only simulation path.
    rpc.set_simulate_retval(&board_with_open_gig(&marketplace.address()));

    let tasks = marketplace.fetch_gigs(true).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "1");
    assert_eq!(tasks[0].status, TaskStatus::Open);
    assert_eq!(tasks[0].reward, 5.5);

    // Claim.
    let receipt = marketplace.claim_gig(1).await.unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Success);

    let cached = marketplace.cached_tasks().unwrap();
    assert_eq!(cached[0].status, TaskStatus::Assigned);
    assert_eq!(
        cached[0].worker_address.as_deref(),
        Some(marketplace.address().as_str())
    );

    // Submit work.
    marketplace
        .submit_work(1, "https://example.com/delivery.zip")
        .await
        .unwrap();
    let cached = marketplace.cached_tasks().unwrap();
    assert_eq!(cached[0].submissions.len(), 1);
    assert_eq!(
        cached[0].submissions[0].link,
        "https://example.com/delivery.zip"
    );

    // Pay and record the winner.
    let payment = marketplace.pay_and_pick_winner(1, WORKER, 5.5).await.unwrap();
    assert_eq!(payment.hash, "lifecycle-hash");

    let cached = marketplace.cached_tasks().unwrap();
    assert_eq!(cached[0].status, TaskStatus::Completed);
    assert_eq!(
        cached[0].transaction_hash.as_deref(),
        Some("lifecycle-hash")
    );

    // claim + submit_work + payment + pick_winner = four submissions.
    assert_eq!(rpc.send_count(), 4);
}

#[tokio::test]
async fn lifecycle_never_moves_backwards() {
    let rpc = MockLedger::new()
        .accept_with_hash("hash")
        .poll_success(1)
        .poll_success(2);
    let (marketplace, rpc, _server, _dir) = build_marketplace(rpc).await;

    rpc.set_simulate_retval(&board_with_open_gig(&marketplace.address()));
    marketplace.fetch_gigs(true).await.unwrap();

    marketplace.pick_winner(1, WORKER, "paid").await.unwrap();
    let cached = marketplace.cached_tasks().unwrap();
    assert_eq!(cached[0].status, TaskStatus::Completed);

    // Whatever the ledger later says about a claim, the local mirror never
    // regresses; the task stays completed.
    marketplace.claim_gig(1).await.unwrap();
    let cached = marketplace.cached_tasks().unwrap();
    assert_eq!(cached[0].status, TaskStatus::Completed);
}
