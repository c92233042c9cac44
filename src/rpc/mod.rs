//! Ledger transport layer
//!
//! JSON-RPC (Soroban) and REST (Horizon) clients, the error taxonomy for
//! remote failures, and the `LedgerRpc` trait the submission pipeline is
//! written against.

mod client;
mod error;
pub mod types;

pub use client::{FundingOutcome, HorizonClient, LedgerRpc, SorobanRpcClient};
pub use error::{RetryPolicy, RpcError};
