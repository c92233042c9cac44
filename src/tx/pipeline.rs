//! Submission/confirmation protocol
//!
//! The one piece of real state-machine shape in the client. Given a built
//! envelope and a signer:
//!
//! 1. contract invocations are simulated first and the simulation results
//!    grafted onto the envelope (classic payments skip this);
//! 2. the envelope is signed through the [`Signer`] gateway;
//! 3. the signed envelope is submitted once; an immediate rejection fails
//!    with the remote error payload and never enters the poll loop;
//! 4. on acceptance, status is polled by hash at a fixed interval up to a
//!    fixed attempt budget. `SUCCESS` resolves to a receipt, `FAILED` is an
//!    on-chain failure, and an exhausted budget is a poll timeout.
//!
//! The sequence is strictly linear: one suspend point per network round
//! trip, fixed delay between polls, no concurrent polling and no
//! cancellation threaded through.

use crate::error::{MarketplaceError, Result};
use crate::rpc::types::{SendStatus, TransactionStatus};
use crate::rpc::LedgerRpc;
use crate::task::{ReceiptStatus, TxReceipt};
use crate::telemetry::OperationContext;
use crate::tx::builder::{apply_simulation, envelope_to_base64};
use crate::wallet::Signer;
use std::time::Duration;
use stellar_xdr::curr::{Limits, ReadXdr, ScVal, TransactionEnvelope};

/// Poll cadence and budget for one submission.
#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    /// Delay between status polls.
    pub poll_interval: Duration,

    /// Maximum number of status polls before giving up.
    pub max_poll_attempts: u32,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 20,
        }
    }
}

/// Submit an envelope and wait for a terminal status.
///
/// `prepare` runs the simulate-and-graft step required for Soroban
/// invocations; payments pass `false`.
pub async fn submit_and_confirm(
    rpc: &dyn LedgerRpc,
    signer: &dyn Signer,
    mut envelope: TransactionEnvelope,
    prepare: bool,
    config: &SubmissionConfig,
    ctx: &OperationContext,
) -> Result<TxReceipt> {
    if prepare {
        let sim = rpc
            .simulate_transaction(&envelope_to_base64(&envelope)?)
            .await?;
        envelope = apply_simulation(envelope, &sim)?;
    }

    let signed = signer.sign(&envelope).await?;

    ctx.log_submitting();
    let response = rpc
        .send_transaction(&envelope_to_base64(&signed)?)
        .await?;

    let accepted = matches!(response.status, SendStatus::Pending | SendStatus::Duplicate);
    if !accepted {
        let status = format!("{:?}", response.status);
        let payload = response
            .error_result_xdr
            .unwrap_or_else(|| "no error payload".to_string());
        let err = MarketplaceError::SubmissionRejected { status, payload };
        ctx.log_failed(&err.to_string());
        return Err(err);
    }

    let hash = response.hash.ok_or_else(|| {
        MarketplaceError::SubmissionRejected {
            status: "PENDING".to_string(),
            payload: "no transaction hash returned".to_string(),
        }
    })?;
    ctx.log_accepted(&hash);

    confirm(rpc, &hash, config, ctx).await
}

/// Poll a submitted transaction until it reaches a terminal state or the
/// attempt budget runs out.
pub async fn confirm(
    rpc: &dyn LedgerRpc,
    hash: &str,
    config: &SubmissionConfig,
    ctx: &OperationContext,
) -> Result<TxReceipt> {
    for attempt in 1..=config.max_poll_attempts {
        let status = rpc.get_transaction(hash).await?;
        ctx.log_poll(hash, attempt, status.status.as_str());

        match status.status {
            TransactionStatus::Success => {
                ctx.log_confirmed(hash, status.ledger);
                return Ok(TxReceipt {
                    hash: hash.to_string(),
                    status: ReceiptStatus::Success,
                    ledger: status.ledger,
                });
            }
            TransactionStatus::Failed => {
                let err = MarketplaceError::OnChainFailed {
                    hash: hash.to_string(),
                    result_xdr: status.result_xdr,
                };
                ctx.log_failed(&err.to_string());
                return Err(err);
            }
            // NOT_FOUND: not yet ingested, keep waiting.
            TransactionStatus::NotFound | TransactionStatus::Unknown => {}
        }

        if attempt < config.max_poll_attempts {
            tokio::time::sleep(config.poll_interval).await;
        }
    }

    let err = MarketplaceError::PollTimeout {
        hash: hash.to_string(),
        attempts: config.max_poll_attempts,
    };
    ctx.log_failed(&err.to_string());
    Err(err)
}

/// Run a read-only contract call via simulation and return the decoded
/// return value. Nothing is signed or submitted.
pub async fn simulate_call(rpc: &dyn LedgerRpc, envelope: &TransactionEnvelope) -> Result<ScVal> {
    let sim = rpc
        .simulate_transaction(&envelope_to_base64(envelope)?)
        .await?;

    if let Some(error) = &sim.error {
        return Err(MarketplaceError::Decode(format!(
            "simulation failed: {error}"
        )));
    }

    let result = sim
        .results
        .as_ref()
        .and_then(|r| r.first())
        .ok_or_else(|| MarketplaceError::Decode("simulation returned no results".to_string()))?;

    Ok(ScVal::from_xdr_base64(&result.xdr, Limits::none())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Stroops;
    use crate::test_utils::{DecliningSigner, MockLedger};
    use crate::tx::builder::{EnvelopeBuilder, OperationSpec};
    use crate::wallet::LocalSigner;

    const TESTNET: &str = "Test SDF Network ; September 2015";

    fn fast_config() -> SubmissionConfig {
        SubmissionConfig {
            poll_interval: Duration::from_millis(1),
            max_poll_attempts: 5,
        }
    }

    fn payment_envelope(signer: &LocalSigner) -> TransactionEnvelope {
        EnvelopeBuilder::new(100, 30)
            .build(
                &signer.address(),
                0,
                OperationSpec::Payment {
                    destination: "GA7QYNF7SOWQ3GLR2BGMZEHXAVIRZA4KVWLTJJFC7MGXUA74P7UJVSGZ"
                        .to_string(),
                    amount: Stroops(10),
                },
            )
            .unwrap()
    }

    #[tokio::test]
    async fn success_after_pending_polls() {
        let signer = LocalSigner::random(TESTNET);
        let rpc = MockLedger::new()
            .accept_with_hash("abc123")
            .poll_not_found(2)
            .poll_success(4242);
        let ctx = OperationContext::new("test_success");

        let receipt = submit_and_confirm(
            &rpc,
            &signer,
            payment_envelope(&signer),
            false,
            &fast_config(),
            &ctx,
        )
        .await
        .unwrap();

        assert_eq!(receipt.hash, "abc123");
        assert_eq!(receipt.status, ReceiptStatus::Success);
        assert_eq!(receipt.ledger, Some(4242));
        assert_eq!(rpc.poll_count(), 3);
    }

    #[tokio::test]
    async fn immediate_rejection_never_polls() {
        let signer = LocalSigner::random(TESTNET);
        let rpc = MockLedger::new().reject("AAAA.error.xdr");
        let ctx = OperationContext::new("test_rejection");

        let err = submit_and_confirm(
            &rpc,
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
                assert_eq!(payload, "AAAA.error.xdr");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(rpc.poll_count(), 0);
    }

    #[tokio::test]
    async fn on_chain_failure_is_terminal() {
        let signer = LocalSigner::random(TESTNET);
        let rpc = MockLedger::new()
            .accept_with_hash("abc123")
            .poll_not_found(1)
            .poll_failed("AAAA.result.xdr");
        let ctx = OperationContext::new("test_failed");

        let err = submit_and_confirm(
            &rpc,
            &signer,
            payment_envelope(&signer),
            false,
            &fast_config(),
            &ctx,
        )
        .await
        .unwrap_err();

        match err {
            MarketplaceError::OnChainFailed { hash, result_xdr } => {
                assert_eq!(hash, "abc123");
                assert_eq!(result_xdr.as_deref(), Some("AAAA.result.xdr"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn poll_budget_exhaustion_times_out() {
        let signer = LocalSigner::random(TESTNET);
        let rpc = MockLedger::new()
            .accept_with_hash("abc123")
            .poll_not_found(50);
        let ctx = OperationContext::new("test_timeout");

        let err = submit_and_confirm(
            &rpc,
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
                assert_eq!(hash, "abc123");
                assert_eq!(attempts, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Exactly the attempt budget, no more.
        assert_eq!(rpc.poll_count(), 5);
    }

    #[tokio::test]
    async fn declined_signature_stops_before_submission() {
        let helper = LocalSigner::random(TESTNET);
        let rpc = MockLedger::new().accept_with_hash("abc123");
        let ctx = OperationContext::new("test_decline");

        let err = submit_and_confirm(
            &rpc,
            &DecliningSigner::default(),
            payment_envelope(&helper),
            false,
            &fast_config(),
            &ctx,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MarketplaceError::SignerDeclined(_)));
        assert_eq!(rpc.send_count(), 0);
    }

    #[tokio::test]
    async fn missing_hash_on_acceptance_is_a_rejection() {
        let signer = LocalSigner::random(TESTNET);
        let rpc = MockLedger::new().accept_without_hash();
        let ctx = OperationContext::new("test_no_hash");

        let err = submit_and_confirm(
            &rpc,
            &signer,
            payment_envelope(&signer),
            false,
            &fast_config(),
            &ctx,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            MarketplaceError::SubmissionRejected { .. }
        ));
    }

    #[tokio::test]
    async fn prepare_step_applies_simulation_fee() {
        let signer = LocalSigner::random(TESTNET);
        let rpc = MockLedger::new()
            .simulate_ok_with_fee("1000")
            .accept_with_hash("abc123")
            .poll_success(1);
        let ctx = OperationContext::new("test_prepare");

        let envelope = EnvelopeBuilder::new(100, 30)
            .build(
                &signer.address(),
                0,
                OperationSpec::InvokeContract {
                    contract_id: "CCIMNZ2TTDBRAONQE56XAQUGCNM7IBKNWKDTK42DYRMQUABJ45IOOSQV"
                        .to_string(),
                    function: "post_gig".to_string(),
                    args: vec![],
                },
            )
            .unwrap();

        submit_and_confirm(&rpc, &signer, envelope, true, &fast_config(), &ctx)
            .await
            .unwrap();

        assert_eq!(rpc.simulate_count(), 1);
        // The submitted envelope carries the bumped fee.
        let submitted = rpc.last_submitted_envelope().unwrap();
        let TransactionEnvelope::Tx(v1) = submitted else {
            panic!("unexpected envelope");
        };
        assert_eq!(v1.tx.fee, 1_100);
    }
}
