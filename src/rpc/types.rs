//! Wire types for the Soroban JSON-RPC and Horizon REST interfaces
//!
//! Only the fields this client reads are modeled; everything else in the
//! remote schema is ignored during deserialization.

use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 request frame.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u32,
    pub method: &'static str,
    pub params: P,
}

impl<P: Serialize> JsonRpcRequest<P> {
    pub fn new(method: &'static str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 response frame.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<R> {
    pub result: Option<R>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Immediate status returned by `sendTransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendStatus {
    Pending,
    Duplicate,
    TryAgainLater,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionResponse {
    pub status: SendStatus,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub latest_ledger: Option<u32>,
    #[serde(default)]
    pub error_result_xdr: Option<String>,
}

/// Status reported by `getTransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Failed,
    NotFound,
    #[serde(other)]
    Unknown,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::NotFound => "NOT_FOUND",
            TransactionStatus::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTransactionResponse {
    pub status: TransactionStatus,
    #[serde(default)]
    pub ledger: Option<u32>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub result_xdr: Option<String>,
    #[serde(default)]
    pub return_value: Option<String>,
}

/// Per-host-function result inside a successful simulation.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulateHostFunctionResult {
    #[serde(default)]
    pub auth: Vec<String>,
    pub xdr: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateTransactionResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub transaction_data: Option<String>,
    #[serde(default)]
    pub min_resource_fee: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<SimulateHostFunctionResult>>,
    #[serde(default)]
    pub latest_ledger: Option<u32>,
}

impl SimulateTransactionResponse {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLatestLedgerResponse {
    pub sequence: u32,
}

/// One contract event from `getEvents`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    pub id: String,
    pub ledger: u32,
    pub ledger_closed_at: String,
    #[serde(default)]
    pub contract_id: Option<String>,
    #[serde(default)]
    pub topic: Vec<String>,
    pub value: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEventsResponse {
    #[serde(default)]
    pub events: Vec<EventInfo>,
    #[serde(default)]
    pub latest_ledger: Option<u32>,
}

/// Native balance entry from a Horizon account record.
#[derive(Debug, Clone, Deserialize)]
pub struct HorizonBalance {
    pub balance: String,
    pub asset_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HorizonAccount {
    /// Current sequence number, as Horizon's decimal string.
    pub sequence: String,
    #[serde(default)]
    pub balances: Vec<HorizonBalance>,
}

impl HorizonAccount {
    /// Native XLM balance, `"0"` when the account holds none.
    pub fn native_balance(&self) -> String {
        self.balances
            .iter()
            .find(|b| b.asset_type == "native")
            .map(|b| b.balance.clone())
            .unwrap_or_else(|| "0".to_string())
    }
}
