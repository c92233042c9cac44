//! Ledger transport clients
//!
//! Two remote surfaces back the marketplace:
//! - the Soroban JSON-RPC endpoint (simulate / send / poll / events), spoken
//!   directly over POSTed JSON-RPC frames;
//! - Horizon REST, used only for account reads and friendbot funding.
//!
//! The `LedgerRpc` trait is the seam the submission pipeline is written
//! against; production code uses [`SorobanRpcClient`], tests substitute a
//! scripted ledger.

use crate::rpc::error::{RetryPolicy, RpcError};
use crate::rpc::types::*;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Remote ledger surface the submission pipeline depends on.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Post a signed envelope. Never retried internally; submission is not
    /// idempotent from the caller's point of view.
    async fn send_transaction(&self, envelope_xdr: &str)
        -> Result<SendTransactionResponse, RpcError>;

    /// Fetch transaction status by hash.
    async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse, RpcError>;

    /// Simulate an unsigned envelope.
    async fn simulate_transaction(
        &self,
        envelope_xdr: &str,
    ) -> Result<SimulateTransactionResponse, RpcError>;

    /// Sequence of the latest closed ledger.
    async fn latest_ledger(&self) -> Result<u32, RpcError>;

    /// Contract events starting at `start_ledger`, filtered to one contract.
    async fn events(&self, start_ledger: u32, contract_id: &str)
        -> Result<GetEventsResponse, RpcError>;
}

/// JSON-RPC client for a Soroban RPC endpoint.
pub struct SorobanRpcClient {
    http: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl SorobanRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let url = url.into();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::from_reqwest(e, &url))?;
        Ok(Self {
            http,
            url,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One JSON-RPC round trip, no retries.
    async fn rpc_call(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let request = JsonRpcRequest::new(method, params);

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(e, &self.url))?;

        let frame: JsonRpcResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| RpcError::MalformedResponse(e.to_string()))?;

        if let Some(err) = frame.error {
            return Err(RpcError::JsonRpc {
                code: err.code,
                message: err.message,
            });
        }
        frame
            .result
            .ok_or_else(|| RpcError::MalformedResponse(format!("{method}: missing result")))
    }

    /// JSON-RPC round trip with the read retry policy applied.
    async fn rpc_read<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<R, RpcError> {
        let mut attempt = 0;
        loop {
            match self.rpc_call(method, params.clone()).await {
                Ok(value) => {
                    return serde_json::from_value(value)
                        .map_err(|e| RpcError::MalformedResponse(format!("{method}: {e}")));
                }
                Err(err) if err.is_retryable() => match self.retry.delay_after(attempt) {
                    Some(delay) => {
                        warn!(method, attempt, error = %err, "read failed, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl LedgerRpc for SorobanRpcClient {
    async fn send_transaction(
        &self,
        envelope_xdr: &str,
    ) -> Result<SendTransactionResponse, RpcError> {
        debug!(method = "sendTransaction", "submitting raw envelope");
        let value = self
            .rpc_call("sendTransaction", json!({ "transaction": envelope_xdr }))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| RpcError::MalformedResponse(format!("sendTransaction: {e}")))
    }

    async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse, RpcError> {
        self.rpc_read("getTransaction", json!({ "hash": hash })).await
    }

    async fn simulate_transaction(
        &self,
        envelope_xdr: &str,
    ) -> Result<SimulateTransactionResponse, RpcError> {
        self.rpc_read("simulateTransaction", json!({ "transaction": envelope_xdr }))
            .await
    }

    async fn latest_ledger(&self) -> Result<u32, RpcError> {
        let resp: GetLatestLedgerResponse = self.rpc_read("getLatestLedger", json!({})).await?;
        Ok(resp.sequence)
    }

    async fn events(
        &self,
        start_ledger: u32,
        contract_id: &str,
    ) -> Result<GetEventsResponse, RpcError> {
        self.rpc_read(
            "getEvents",
            json!({
                "startLedger": start_ledger,
                "filters": [{
                    "type": "contract",
                    "contractIds": [contract_id],
                }],
                "pagination": { "limit": 100 },
            }),
        )
        .await
    }
}

/// Outcome of a friendbot funding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingOutcome {
    Funded,
    /// Friendbot refuses accounts that already exist; callers treat that as
    /// success.
    AlreadyFunded,
}

/// Minimal Horizon REST client.
pub struct HorizonClient {
    http: reqwest::Client,
    base_url: String,
    friendbot_url: String,
}

impl HorizonClient {
    pub fn new(
        base_url: impl Into<String>,
        friendbot_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RpcError> {
        let base_url = base_url.into();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::from_reqwest(e, &base_url))?;
        Ok(Self {
            http,
            base_url,
            friendbot_url: friendbot_url.into(),
        })
    }

    /// Load an account record (sequence + balances).
    pub async fn account(&self, account_id: &str) -> Result<HorizonAccount, RpcError> {
        let url = format!(
            "{}/accounts/{}",
            self.base_url.trim_end_matches('/'),
            account_id
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(e, &url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Horizon {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| RpcError::MalformedResponse(format!("account: {e}")))
    }

    /// Current sequence number for `account_id`.
    pub async fn sequence(&self, account_id: &str) -> Result<i64, RpcError> {
        let account = self.account(account_id).await?;
        account
            .sequence
            .parse::<i64>()
            .map_err(|e| RpcError::MalformedResponse(format!("sequence: {e}")))
    }

    /// Ask friendbot to fund a testnet account.
    pub async fn fund(&self, account_id: &str) -> Result<FundingOutcome, RpcError> {
        let url = format!("{}?addr={}", self.friendbot_url, account_id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(e, &url))?;

        let status = response.status();
        if status.is_success() {
            Ok(FundingOutcome::Funded)
        } else if status.as_u16() == 400 {
            // Friendbot 400s when the account already exists.
            Ok(FundingOutcome::AlreadyFunded)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RpcError::Horizon {
                status: status.as_u16(),
                body,
            })
        }
    }
}
