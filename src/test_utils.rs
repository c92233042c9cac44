//! Test utilities
//!
//! Scripted stand-ins for the remote collaborators: a [`MockLedger`] whose
//! submission and poll responses are queued up front, and a
//! [`DecliningSigner`] that refuses every envelope. Used by the pipeline and
//! marketplace tests for deterministic runs without a network.

use crate::error::{MarketplaceError, Result as ClientResult};
use crate::rpc::types::{
    GetEventsResponse, GetTransactionResponse, SendStatus, SendTransactionResponse,
    SimulateHostFunctionResult, SimulateTransactionResponse, TransactionStatus,
};
use crate::rpc::{LedgerRpc, RpcError};
use crate::wallet::Signer;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use stellar_xdr::curr::{Limits, ReadXdr, ScVal, TransactionEnvelope, WriteXdr};

/// In-memory ledger with pre-scripted responses.
#[derive(Default)]
pub struct MockLedger {
    simulate_response: Mutex<Option<SimulateTransactionResponse>>,
    send_response: Mutex<Option<SendTransactionResponse>>,
    poll_queue: Mutex<VecDeque<GetTransactionResponse>>,
    events_response: Mutex<Option<GetEventsResponse>>,
    latest_ledger: AtomicU32,
    simulate_calls: AtomicU32,
    send_calls: AtomicU32,
    poll_calls: AtomicU32,
    last_envelope: Mutex<Option<String>>,
}

impl MockLedger {
    pub fn new() -> Self {
        let ledger = Self::default();
        ledger.latest_ledger.store(100_000, Ordering::SeqCst);
        ledger
    }

    /// Script a successful simulation carrying only a resource fee.
    pub fn simulate_ok_with_fee(self, fee: &str) -> Self {
        *self.simulate_response.lock() = Some(SimulateTransactionResponse {
            error: None,
            transaction_data: None,
            min_resource_fee: Some(fee.to_string()),
            results: Some(vec![SimulateHostFunctionResult {
                auth: vec![],
                xdr: String::new(),
            }]),
            latest_ledger: Some(1),
        });
        self
    }

    /// Script a successful simulation whose return value is `retval`.
    pub fn simulate_retval(self, retval: &ScVal) -> Self {
        let xdr = retval
            .to_xdr_base64(Limits::none())
            .expect("retval encodes");
        *self.simulate_response.lock() = Some(SimulateTransactionResponse {
            error: None,
            transaction_data: None,
            min_resource_fee: Some("0".to_string()),
            results: Some(vec![SimulateHostFunctionResult { auth: vec![], xdr }]),
            latest_ledger: Some(1),
        });
        self
    }

    /// Script the simulation return value on an already-shared ledger.
    pub fn set_simulate_retval(&self, retval: &ScVal) {
        let xdr = retval
            .to_xdr_base64(Limits::none())
            .expect("retval encodes");
        *self.simulate_response.lock() = Some(SimulateTransactionResponse {
            error: None,
            transaction_data: None,
            min_resource_fee: Some("0".to_string()),
            results: Some(vec![SimulateHostFunctionResult { auth: vec![], xdr }]),
            latest_ledger: Some(1),
        });
    }

    /// Script a failed simulation.
    pub fn simulate_error(self, error: &str) -> Self {
        *self.simulate_response.lock() = Some(SimulateTransactionResponse {
            error: Some(error.to_string()),
            transaction_data: None,
            min_resource_fee: None,
            results: None,
            latest_ledger: Some(1),
        });
        self
    }

    /// Accept submissions, handing back `hash`.
    pub fn accept_with_hash(self, hash: &str) -> Self {
        *self.send_response.lock() = Some(SendTransactionResponse {
            status: SendStatus::Pending,
            hash: Some(hash.to_string()),
            latest_ledger: Some(1),
            error_result_xdr: None,
        });
        self
    }

    /// Accept submissions without a hash (a malformed acceptance).
    pub fn accept_without_hash(self) -> Self {
        *self.send_response.lock() = Some(SendTransactionResponse {
            status: SendStatus::Pending,
            hash: None,
            latest_ledger: Some(1),
            error_result_xdr: None,
        });
        self
    }

    /// Reject submissions immediately with the given error payload.
    pub fn reject(self, error_result_xdr: &str) -> Self {
        *self.send_response.lock() = Some(SendTransactionResponse {
            status: SendStatus::Error,
            hash: None,
            latest_ledger: Some(1),
            error_result_xdr: Some(error_result_xdr.to_string()),
        });
        self
    }

    /// Queue `n` NOT_FOUND poll responses.
    pub fn poll_not_found(self, n: usize) -> Self {
        {
            let mut queue = self.poll_queue.lock();
            for _ in 0..n {
                queue.push_back(GetTransactionResponse {
                    status: TransactionStatus::NotFound,
                    ledger: None,
                    created_at: None,
                    result_xdr: None,
                    return_value: None,
                });
            }
        }
        self
    }

    /// Queue a SUCCESS poll response applied in `ledger`.
    pub fn poll_success(self, ledger: u32) -> Self {
        self.poll_queue.lock().push_back(GetTransactionResponse {
            status: TransactionStatus::Success,
            ledger: Some(ledger),
            created_at: None,
            result_xdr: None,
            return_value: None,
        });
        self
    }

    /// Queue a FAILED poll response.
    pub fn poll_failed(self, result_xdr: &str) -> Self {
        self.poll_queue.lock().push_back(GetTransactionResponse {
            status: TransactionStatus::Failed,
            ledger: Some(1),
            created_at: None,
            result_xdr: Some(result_xdr.to_string()),
            return_value: None,
        });
        self
    }

    /// Script the events response.
    pub fn with_events(self, events: GetEventsResponse) -> Self {
        *self.events_response.lock() = Some(events);
        self
    }

    pub fn simulate_count(&self) -> u32 {
        self.simulate_calls.load(Ordering::SeqCst)
    }

    pub fn send_count(&self) -> u32 {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> u32 {
        self.poll_calls.load(Ordering::SeqCst)
    }

    /// The last envelope posted through `send_transaction`, decoded.
    pub fn last_submitted_envelope(&self) -> Option<TransactionEnvelope> {
        self.last_envelope
            .lock()
            .as_ref()
            .map(|xdr| TransactionEnvelope::from_xdr_base64(xdr, Limits::none()).expect("decodes"))
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn send_transaction(
        &self,
        envelope_xdr: &str,
    ) -> Result<SendTransactionResponse, RpcError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_envelope.lock() = Some(envelope_xdr.to_string());
        Ok(self
            .send_response
            .lock()
            .clone()
            .expect("send response scripted"))
    }

    async fn get_transaction(&self, _hash: &str) -> Result<GetTransactionResponse, RpcError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.poll_queue.lock().pop_front().unwrap_or(
            GetTransactionResponse {
                status: TransactionStatus::NotFound,
                ledger: None,
                created_at: None,
                result_xdr: None,
                return_value: None,
            },
        ))
    }

    async fn simulate_transaction(
        &self,
        _envelope_xdr: &str,
    ) -> Result<SimulateTransactionResponse, RpcError> {
        self.simulate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .simulate_response
            .lock()
            .clone()
            .expect("simulate response scripted"))
    }

    async fn latest_ledger(&self) -> Result<u32, RpcError> {
        Ok(self.latest_ledger.load(Ordering::SeqCst))
    }

    async fn events(
        &self,
        _start_ledger: u32,
        _contract_id: &str,
    ) -> Result<GetEventsResponse, RpcError> {
        Ok(self.events_response.lock().clone().unwrap_or(GetEventsResponse {
            events: vec![],
            latest_ledger: Some(self.latest_ledger.load(Ordering::SeqCst)),
        }))
    }
}

/// Signer that refuses everything, for exercising the decline path.
#[derive(Default)]
pub struct DecliningSigner;

#[async_trait]
impl Signer for DecliningSigner {
    fn address(&self) -> String {
        "GA7QYNF7SOWQ3GLR2BGMZEHXAVIRZA4KVWLTJJFC7MGXUA74P7UJVSGZ".to_string()
    }

    async fn sign(&self, _envelope: &TransactionEnvelope) -> ClientResult<TransactionEnvelope> {
        Err(MarketplaceError::SignerDeclined(
            "user dismissed the signing dialog".to_string(),
        ))
    }
}
